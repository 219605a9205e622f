//! The MIP back-end's extended soft-objective catalog (spec.md §4.3), built
//! on top of the shared constraint model from `solver_cpsat::model`. Every
//! term here reuses the same epigraph linearization the base catalog uses,
//! so the two catalogs splice onto one `Vec<Expression>` of side-constraints
//! at the call site.

use good_lp::{Expression, ProblemVariables};
use solver_cpsat::model::{epigraph, Prep, Vars};

const CONSECUTIVE_PENALTY: f64 = 200.0;
const OVERLOAD_PENALTY: f64 = 300.0;
const PREFERENCE_BONUS: f64 = 20.0;
const PREFERENCE_PENALTY: f64 = 50.0;
const DISTRIBUTION_PENALTY: f64 = 100.0;
const DAYS_OFF_BONUS: f64 = 500.0;
const DAYS_OFF_LOAD_CEILING: u32 = 30;

const HARD_SUBJECT_KEYWORDS: &[&str] = &[
    "Математика",
    "Фізика",
    "Хімія",
    "Біологія",
    "Алгебра",
    "Геометрія",
];

fn subject_name(prep: &Prep, subject_id: &domain::SubjectId) -> &str {
    prep.rs
        .subjects
        .iter()
        .find(|s| &s.id == subject_id)
        .map(|s| s.name.as_str())
        .unwrap_or("")
}

fn is_hard_subject(name: &str) -> bool {
    HARD_SUBJECT_KEYWORDS.iter().any(|kw| name.contains(kw))
}

/// Builds the additional soft-objective terms the MIP back-end layers on
/// top of the shared base catalog. Returns the extra objective expression
/// plus its epigraph side-constraints (`expr >= 0`), in the same shape
/// `solver_cpsat::model::build_base_objective` uses.
pub fn build_extended_objective(
    pvars: &mut ProblemVariables,
    prep: &Prep,
    v: &Vars,
) -> (Expression, Vec<Expression>) {
    let mut objective = Expression::from(0.0);
    let mut epigraph_constraints: Vec<Expression> = Vec::new();

    objective = objective + consecutive_same_subject(pvars, prep, v, &mut epigraph_constraints);
    objective = objective + day_overload(pvars, prep, v, &mut epigraph_constraints);
    objective = objective + hard_subject_preference(prep, v);
    objective = objective + distribution_balance(pvars, prep, v, &mut epigraph_constraints);
    objective = objective + teacher_days_off(prep, v);

    (objective, epigraph_constraints)
}

/// Penalizes 3+ consecutive periods of the same (class, subject) on a day,
/// regardless of which teacher delivers them.
fn consecutive_same_subject(
    pvars: &mut ProblemVariables,
    prep: &Prep,
    v: &Vars,
    epi: &mut Vec<Expression>,
) -> Expression {
    let mut objective = Expression::from(0.0);
    let mut groups: std::collections::HashMap<(String, String), Vec<usize>> =
        std::collections::HashMap::new();
    for (r, req) in prep.rs.requests.iter().enumerate() {
        groups
            .entry((req.class_id.0.clone(), req.subject_id.0.clone()))
            .or_default()
            .push(r);
    }

    let sorted_periods = {
        let mut p = prep.periods.clone();
        p.sort_unstable();
        p
    };

    for req_indices in groups.values() {
        for d in 0..prep.days.len() {
            for window in sorted_periods.windows(3) {
                let (p0, p1, p2) = (window[0], window[1], window[2]);
                if p1 != p0 + 1 || p2 != p1 + 1 {
                    continue;
                }
                let mut sum = Expression::from(0.0);
                for &r in req_indices {
                    for &p in &[p0, p1, p2] {
                        if let Some(&var) = v.x.get(&(r, d, p)) {
                            sum = sum + var;
                        }
                    }
                }
                let excess = epigraph(pvars, epi, sum - 2.0, None);
                objective = objective + CONSECUTIVE_PENALTY * excess;
            }
        }
    }
    objective
}

/// Penalizes a class's daily load above 7 lessons, on top of the shared
/// catalog's softer >5 penalty.
fn day_overload(
    pvars: &mut ProblemVariables,
    prep: &Prep,
    v: &Vars,
    epi: &mut Vec<Expression>,
) -> Expression {
    let mut objective = Expression::from(0.0);
    for c in &prep.class_ids {
        for d in 0..prep.days.len() {
            let vars = v.class_day[&(c.clone(), d)];
            let over = epigraph(pvars, epi, vars.day_load - 7.0, None);
            objective = objective + OVERLOAD_PENALTY * over;
        }
    }
    objective
}

/// Rewards hard subjects (math, physics, chemistry, biology, algebra,
/// geometry) landing in periods 2-4 and penalizes them landing at the very
/// start or end of the day.
fn hard_subject_preference(prep: &Prep, v: &Vars) -> Expression {
    let mut objective = Expression::from(0.0);
    for (r, req) in prep.rs.requests.iter().enumerate() {
        if !is_hard_subject(subject_name(prep, &req.subject_id)) {
            continue;
        }
        for d in 0..prep.days.len() {
            for &p in &prep.periods {
                let Some(&var) = v.x.get(&(r, d, p)) else { continue };
                if (2..=4).contains(&p) {
                    objective = objective - PREFERENCE_BONUS * var;
                } else if p == 1 || p == 6 || p == 7 {
                    objective = objective + PREFERENCE_PENALTY * var;
                }
            }
        }
    }
    objective
}

/// Penalizes a (subject, class) pair's lessons clustering unevenly across
/// the week instead of spreading close to `total / 5` per day.
fn distribution_balance(
    pvars: &mut ProblemVariables,
    prep: &Prep,
    v: &Vars,
    epi: &mut Vec<Expression>,
) -> Expression {
    let mut objective = Expression::from(0.0);
    let mut groups: std::collections::HashMap<(String, String), Vec<usize>> =
        std::collections::HashMap::new();
    for (r, req) in prep.rs.requests.iter().enumerate() {
        groups
            .entry((req.class_id.0.clone(), req.subject_id.0.clone()))
            .or_default()
            .push(r);
    }

    for req_indices in groups.values() {
        let total: f64 = req_indices.iter().map(|&r| prep.remaining[r] as f64).sum();
        if total <= 0.0 {
            continue;
        }
        let ideal = total / 5.0;
        for d in 0..prep.days.len() {
            let mut day_count = Expression::from(0.0);
            for &r in req_indices {
                for &p in &prep.periods {
                    if let Some(&var) = v.x.get(&(r, d, p)) {
                        day_count = day_count + var;
                    }
                }
            }
            let deviation = day_count - ideal;
            let pos = epigraph(pvars, epi, deviation.clone(), None);
            let neg = epigraph(pvars, epi, -deviation, None);
            objective = objective + DISTRIBUTION_PENALTY * (pos + neg);
        }
    }
    objective
}

/// Encourages a free weekday for teachers whose total weekly load is light
/// enough to plausibly compress into fewer days.
fn teacher_days_off(prep: &Prep, v: &Vars) -> Expression {
    let mut objective = Expression::from(0.0);
    let mut load_by_teacher: std::collections::HashMap<&str, u32> =
        std::collections::HashMap::new();
    for (r, req) in prep.rs.requests.iter().enumerate() {
        *load_by_teacher.entry(req.teacher_id.0.as_str()).or_default() += prep.remaining[r];
    }

    for t in &prep.teacher_ids {
        let load = load_by_teacher.get(t.as_str()).copied().unwrap_or(0);
        if load >= DAYS_OFF_LOAD_CEILING {
            continue;
        }
        for d in 0..prep.days.len() {
            let vars = v.teacher_day[&(t.clone(), d)];
            objective = objective + DAYS_OFF_BONUS * vars.has_lessons;
        }
    }
    objective
}
