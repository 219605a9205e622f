//! The constraint model shared by both exact back-ends (spec.md §4.2).
//!
//! Builds boolean placement variables `x[r,d,p]`, the auxiliary busy
//! indicators `cb`/`tb`, and the per-(agent, day) compactness family
//! (`has_lessons`, `day_load`, `start_p`, `end_p`) over `good_lp`. Reified
//! constraints from the original `OnlyEnforceIf` CP-SAT style are expressed
//! as big-M implications, since the booleans already bound every term.
use domain::{Day, Lesson, RequestSet, DAYS};
use good_lp::{variable, Expression, ProblemVariables, SolverModel, Variable};
use std::collections::HashMap;

/// Safely larger than any period/day-load difference that can occur; used
/// as the big-M constant in every conditional (reified) constraint below.
const BIG_M: f64 = 16.0;

#[derive(Clone, Copy, Debug)]
pub struct AgentDayVars {
    pub has_lessons: Variable,
    pub day_load: Variable,
    pub start_p: Variable,
    pub end_p: Variable,
}

/// One request placed on one (day, period); `x` only holds entries for
/// slots that survive teacher availability filtering (H4) — a missing
/// entry means "forced to zero" by construction, not by constraint.
pub struct Vars {
    pub x: HashMap<(usize, usize, u8), Variable>,
    pub cb: HashMap<(String, usize, u8), Variable>,
    pub tb: HashMap<(String, usize, u8), Variable>,
    pub class_day: HashMap<(String, usize), AgentDayVars>,
    pub teacher_day: HashMap<(String, usize), AgentDayVars>,
}

/// Indices and lookups the builder needs repeatedly, computed once.
pub struct Prep<'a> {
    pub rs: &'a RequestSet,
    pub days: &'a [Day],
    pub periods: Vec<u8>,
    pub min_period: u8,
    pub class_ids: Vec<String>,
    pub teacher_ids: Vec<String>,
    /// Remaining coverage count per request after greedily absorbing
    /// `fixed` lessons (H5); same length/order as `rs.requests`.
    pub remaining: Vec<u32>,
    /// Fixed lessons matched to a request: `(request_idx, day, period)`.
    pub forced: Vec<(usize, Day, u8)>,
    /// Fixed lessons that matched no request with remaining capacity;
    /// dropped silently per spec.md §9, logged by the caller.
    pub dropped_fixed: usize,
}

/// Greedily matches each `fixed` lesson to an unbound request sharing
/// `(class, subject, teacher)`, per spec.md §4.2 H5. Matching is fungible
/// across requests with the same key; a lesson with no remaining-capacity
/// match is dropped (counted in `dropped_fixed`), never a hard failure.
fn absorb_fixed(rs: &RequestSet, fixed: Option<&[Lesson]>) -> (Vec<u32>, Vec<(usize, Day, u8)>, usize) {
    let mut remaining: Vec<u32> = rs.requests.iter().map(|r| r.count).collect();
    let mut forced = Vec::new();
    let mut dropped = 0usize;

    let Some(fixed) = fixed else {
        return (remaining, forced, dropped);
    };

    for lesson in fixed {
        let slot = rs.requests.iter().position(|r| {
            r.class_id == lesson.class_id
                && r.subject_id == lesson.subject_id
                && r.teacher_id == lesson.teacher_id
        });
        match slot {
            Some(idx) if remaining[idx] > 0 => {
                remaining[idx] -= 1;
                forced.push((idx, lesson.day, lesson.period));
            }
            _ => dropped += 1,
        }
    }
    (remaining, forced, dropped)
}

pub fn prep<'a>(rs: &'a RequestSet, periods: &[u8], fixed: Option<&[Lesson]>) -> Prep<'a> {
    let mut periods = periods.to_vec();
    periods.sort_unstable();
    periods.dedup();
    let min_period = periods.iter().copied().min().unwrap_or(1);

    let mut class_ids: Vec<String> = rs
        .requests
        .iter()
        .map(|r| r.class_id.0.clone())
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    class_ids.sort();
    let mut teacher_ids: Vec<String> = rs
        .requests
        .iter()
        .map(|r| r.teacher_id.0.clone())
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    teacher_ids.sort();

    let (remaining, forced, dropped_fixed) = absorb_fixed(rs, fixed);
    if dropped_fixed > 0 {
        tracing::warn!(dropped_fixed, "fixed lesson(s) matched no available request");
    }

    Prep {
        rs,
        days: &DAYS,
        periods,
        min_period,
        class_ids,
        teacher_ids,
        remaining,
        forced,
        dropped_fixed,
    }
}

/// Whether the teacher of request `idx` is unavailable at `(day, period)`
/// (H4). Availability lists the *blocked* periods, per spec.md §3.
fn blocked(rs: &RequestSet, idx: usize, day: Day, period: u8) -> bool {
    rs.teacher(&rs.requests[idx].teacher_id)
        .map(|t| t.is_blocked(day, period))
        .unwrap_or(false)
}

pub fn declare_vars(prep: &Prep) -> (ProblemVariables, Vars) {
    let mut pvars = ProblemVariables::new();
    let mut x = HashMap::new();

    for (r, _req) in prep.rs.requests.iter().enumerate() {
        for (d, &day) in prep.days.iter().enumerate() {
            for &p in &prep.periods {
                if blocked(prep.rs, r, day, p) {
                    continue;
                }
                x.insert((r, d, p), pvars.add(variable().binary()));
            }
        }
    }

    let mut cb = HashMap::new();
    let mut class_day = HashMap::new();
    for c in &prep.class_ids {
        for d in 0..prep.days.len() {
            for &p in &prep.periods {
                cb.insert((c.clone(), d, p), pvars.add(variable().binary()));
            }
            class_day.insert(
                (c.clone(), d),
                AgentDayVars {
                    has_lessons: pvars.add(variable().binary()),
                    day_load: pvars.add(variable().integer().min(0.0).max(prep.periods.len() as f64)),
                    start_p: pvars.add(
                        variable()
                            .integer()
                            .min(prep.min_period as f64)
                            .max(*prep.periods.iter().max().unwrap_or(&7) as f64),
                    ),
                    end_p: pvars.add(
                        variable()
                            .integer()
                            .min(prep.min_period as f64)
                            .max(*prep.periods.iter().max().unwrap_or(&7) as f64),
                    ),
                },
            );
        }
    }

    let mut tb = HashMap::new();
    let mut teacher_day = HashMap::new();
    for t in &prep.teacher_ids {
        for d in 0..prep.days.len() {
            for &p in &prep.periods {
                tb.insert((t.clone(), d, p), pvars.add(variable().binary()));
            }
            teacher_day.insert(
                (t.clone(), d),
                AgentDayVars {
                    has_lessons: pvars.add(variable().binary()),
                    day_load: pvars.add(variable().integer().min(0.0).max(prep.periods.len() as f64)),
                    start_p: pvars.add(
                        variable()
                            .integer()
                            .min(prep.min_period as f64)
                            .max(*prep.periods.iter().max().unwrap_or(&7) as f64),
                    ),
                    end_p: pvars.add(
                        variable()
                            .integer()
                            .min(prep.min_period as f64)
                            .max(*prep.periods.iter().max().unwrap_or(&7) as f64),
                    ),
                },
            );
        }
    }

    (pvars, Vars { x, cb, tb, class_day, teacher_day })
}

fn forced_at(prep: &Prep, r: usize, d: usize, p: u8) -> bool {
    prep.forced
        .iter()
        .any(|&(fr, fday, fp)| fr == r && fday.index() == d && fp == p)
}

/// H1: coverage. Each request's remaining count (after absorbing `fixed`)
/// must equal the sum of its placement variables.
pub fn add_coverage<M: SolverModel>(mut model: M, prep: &Prep, v: &Vars) -> M {
    for (r, _req) in prep.rs.requests.iter().enumerate() {
        let mut sum = Expression::from(0.0);
        for (d, _) in prep.days.iter().enumerate() {
            for &p in &prep.periods {
                if let Some(&var) = v.x.get(&(r, d, p)) {
                    sum = sum + var;
                }
            }
        }
        model = model.with(sum.eq(prep.remaining[r] as f64));
    }
    model
}

/// Links `cb`/`tb` to the sum of placements (plus any forced/fixed lesson
/// already occupying that slot) and enforces H2/H3 single-booking.
pub fn add_busy_links<M: SolverModel>(mut model: M, prep: &Prep, v: &Vars) -> M {
    for c in &prep.class_ids {
        for d in 0..prep.days.len() {
            for &p in &prep.periods {
                let mut sum = Expression::from(0.0);
                let mut forced_here = 0.0;
                for (r, req) in prep.rs.requests.iter().enumerate() {
                    if req.class_id.0 != *c {
                        continue;
                    }
                    if let Some(&var) = v.x.get(&(r, d, p)) {
                        sum = sum + var;
                    }
                    if forced_at(prep, r, d, p) {
                        forced_here += 1.0;
                    }
                }
                let cb = v.cb[&(c.clone(), d, p)];
                model = model.with((sum + forced_here).eq(cb));
                model = model.with(cb.leq(1.0));
            }
        }
    }

    for t in &prep.teacher_ids {
        for d in 0..prep.days.len() {
            for &p in &prep.periods {
                let mut sum = Expression::from(0.0);
                let mut forced_here = 0.0;
                for (r, req) in prep.rs.requests.iter().enumerate() {
                    if req.teacher_id.0 != *t {
                        continue;
                    }
                    if let Some(&var) = v.x.get(&(r, d, p)) {
                        sum = sum + var;
                    }
                    if forced_at(prep, r, d, p) {
                        forced_here += 1.0;
                    }
                }
                let tb = v.tb[&(t.clone(), d, p)];
                model = model.with((sum + forced_here).eq(tb));
                model = model.with(tb.leq(1.0));
            }
        }
    }
    model
}

/// Links `day_load`/`has_lessons`/`start_p`/`end_p` to the busy indicators
/// for one agent family (class or teacher), and — only when `strict` — adds
/// H6's no-gap/start-at-1 compactness constraints. Callers must only pass
/// `strict = true` for the class family; H6 is per-(class, day) only.
fn link_agent_day<M: SolverModel>(
    mut model: M,
    ids: &[String],
    busy: &HashMap<(String, usize, u8), Variable>,
    day_vars: &HashMap<(String, usize), AgentDayVars>,
    prep: &Prep,
    strict: bool,
) -> M {
    for id in ids {
        for d in 0..prep.days.len() {
            let vars = day_vars[&(id.clone(), d)];

            let mut load_sum = Expression::from(0.0);
            for &p in &prep.periods {
                load_sum = load_sum + busy[&(id.clone(), d, p)];
            }
            model = model.with(load_sum.eq(vars.day_load));
            model = model.with(vars.has_lessons.leq(vars.day_load));
            model = model.with(vars.day_load.leq(BIG_M * vars.has_lessons));

            for &p in &prep.periods {
                let occ = busy[&(id.clone(), d, p)];
                // start_p <= p whenever this slot is occupied.
                model = model.with((vars.start_p - (p as f64)).leq(BIG_M * (1.0 - occ)));
                // end_p >= p whenever this slot is occupied.
                model = model.with((vars.end_p - (p as f64)).geq(-BIG_M * (1.0 - occ)));
            }

            if strict {
                let min_p = prep.min_period as f64;
                model = model.with((vars.start_p - min_p).leq(BIG_M * (1.0 - vars.has_lessons)));
                model = model.with((vars.start_p - min_p).geq(-BIG_M * (1.0 - vars.has_lessons)));
                let span = vars.end_p - vars.start_p + 1.0 - vars.day_load;
                model = model.with(span.clone().leq(BIG_M * (1.0 - vars.has_lessons)));
                model = model.with(span.geq(-BIG_M * (1.0 - vars.has_lessons)));
            }
        }
    }
    model
}

pub fn add_compactness<M: SolverModel>(mut model: M, prep: &Prep, v: &Vars, strict: bool) -> M {
    model = link_agent_day(model, &prep.class_ids, &v.cb, &v.class_day, prep, strict);
    // H6 is a per-(class, day) rule (spec.md §4.2); teachers only ever get
    // the has_lessons/day_load/start_p/end_p links feeding the soft
    // teacher-gap term, never the hard no-gap/start-at-1 constraints, or a
    // second teacher covering a later period of the same class would make
    // the strict pass infeasible.
    model = link_agent_day(model, &prep.teacher_ids, &v.tb, &v.teacher_day, prep, false);
    model
}

/// Forces the greedily matched fixed lessons (H5) — nothing to encode,
/// they are already subtracted from `remaining` and added into the busy
/// links via `forced_at`. Kept as a named step purely for readability of
/// the builder pipeline at the call site.
pub fn add_fixed_noop<M: SolverModel>(model: M, _prep: &Prep, _v: &Vars) -> M {
    model
}

/// Epigraph helper: adds a fresh non-negative variable `g` with
/// `g >= expr - BIG_M*(1-gate)` and `g >= 0`, returning `g`. Standard
/// "max(0, expr) when gate" linearization, the same pattern the teacher's
/// adjacency-variable constraints use for AND-linearization.
pub fn epigraph(pvars: &mut ProblemVariables, model_terms: &mut Vec<Expression>, expr: Expression, gate: Option<Variable>) -> Variable {
    let g = pvars.add(variable().min(0.0));
    let constraint = match gate {
        Some(gate) => expr - BIG_M * (1.0 - gate),
        None => expr,
    };
    model_terms.push(g - constraint);
    g
}

/// Builds the base soft objective (spec.md §4.2's shared table, applying
/// to both exact back-ends). Returns the objective expression plus the
/// epigraph side-constraints (`expr >= 0`) that must be added to whichever
/// model the caller eventually solves — the MIP back-end splices its own
/// richer catalog onto the same variable set the same way.
pub fn build_base_objective(
    pvars: &mut ProblemVariables,
    prep: &Prep,
    v: &Vars,
    strict: bool,
) -> (Expression, Vec<Expression>) {
    let mut objective = Expression::from(0.0);
    let mut epigraph_constraints: Vec<Expression> = Vec::new();
    let has_zero = prep.periods.contains(&0);

    // Earlier-period preference: 1 per unit, always.
    for ((_r, _d, p), &var) in v.x.iter() {
        objective = objective + (*p as f64) * var;
    }

    if !strict {
        // Class gaps (5000) and late start (1000), relaxed mode only.
        for c in &prep.class_ids {
            for d in 0..prep.days.len() {
                let vars = v.class_day[&(c.clone(), d)];
                let gap_expr = vars.end_p - vars.start_p + 1.0 - vars.day_load;
                let gap = epigraph(pvars, &mut epigraph_constraints, gap_expr, Some(vars.has_lessons));
                objective = objective + 5000.0 * gap;

                if prep.periods.contains(&1) {
                    let late_expr = vars.start_p - 1.0;
                    let late = epigraph(pvars, &mut epigraph_constraints, late_expr, Some(vars.has_lessons));
                    objective = objective + 1000.0 * late;
                }
            }
        }
    }

    // Class day overload > 5: weight 50, always.
    for c in &prep.class_ids {
        for d in 0..prep.days.len() {
            let vars = v.class_day[&(c.clone(), d)];
            let over_expr = vars.day_load - 5.0;
            let over = epigraph(pvars, &mut epigraph_constraints, over_expr, None);
            objective = objective + 50.0 * over;
        }
    }

    // Teacher gaps: weight 10, always.
    for t in &prep.teacher_ids {
        for d in 0..prep.days.len() {
            let vars = v.teacher_day[&(t.clone(), d)];
            let gap_expr = vars.end_p - vars.start_p + 1.0 - vars.day_load;
            let gap = epigraph(pvars, &mut epigraph_constraints, gap_expr, Some(vars.has_lessons));
            objective = objective + 10.0 * gap;
        }
    }

    // Period-0 placement preference, only when period 0 is in play.
    if has_zero {
        for (r, req) in prep.rs.requests.iter().enumerate() {
            let prefers_zero = prep
                .rs
                .teacher(&req.teacher_id)
                .map(|t| t.prefers_period_zero)
                .unwrap_or(false);
            for d in 0..prep.days.len() {
                if let Some(&var) = v.x.get(&(r, d, 0)) {
                    objective = objective
                        + if prefers_zero { -5000.0 } else { 10000.0 } * var;
                }
            }
        }
    }

    (objective, epigraph_constraints)
}

/// Adds the epigraph side-constraints returned by [`build_base_objective`]
/// to the final model. Separate from objective construction so the caller
/// can splice additional epigraph constraints (the MIP back-end's extended
/// catalog) onto the same `Vec` before attaching them all at once.
pub fn add_epigraph_constraints<M: SolverModel>(mut model: M, constraints: Vec<Expression>) -> M {
    for expr in constraints {
        model = model.with(expr.geq(0.0));
    }
    model
}

/// Reads a solved `good_lp` solution back into the wire `Lesson` list:
/// forced (fixed) lessons first, then one per `x[r,d,p] > 0.5`, in
/// request-major/day-major/period-major order per spec.md §6.
pub fn extract(prep: &Prep, v: &Vars, sol: &impl good_lp::Solution) -> Vec<Lesson> {
    let mut out = Vec::new();
    for &(r, day, period) in &prep.forced {
        let req = &prep.rs.requests[r];
        out.push(Lesson {
            class_id: req.class_id.clone(),
            subject_id: req.subject_id.clone(),
            teacher_id: req.teacher_id.clone(),
            day,
            period,
        });
    }
    for (r, _req) in prep.rs.requests.iter().enumerate() {
        for (d, &day) in prep.days.iter().enumerate() {
            for &p in &prep.periods {
                let Some(&var) = v.x.get(&(r, d, p)) else { continue };
                if sol.value(var) > 0.5 {
                    let req = &prep.rs.requests[r];
                    out.push(Lesson {
                        class_id: req.class_id.clone(),
                        subject_id: req.subject_id.clone(),
                        teacher_id: req.teacher_id.clone(),
                        day,
                        period: p,
                    });
                }
            }
        }
    }
    out
}
