//! Back-end A (spec.md §4.3): the base constraint model, solved with
//! `good_lp`'s pure-Rust `microlp` backend. No CP-SAT binding exists in this
//! ecosystem's dependency set, so this is the idiomatic Rust analogue of
//! the original's OR-Tools CP-SAT solver — same model, same strict/relaxed
//! semantics, a different (linear) solving technology underneath.
pub mod model;

use domain::{Lesson, RequestSet};
use engine::ExactBackend;
use good_lp::SolverModel;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub struct CpSatBackend;

impl CpSatBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpSatBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ExactBackend for CpSatBackend {
    fn solve(
        &self,
        rs: &RequestSet,
        periods: &[u8],
        strict: bool,
        fixed: Option<&[Lesson]>,
        timeout: Duration,
    ) -> (Option<Vec<Lesson>>, Option<String>) {
        solve_with_timeout(rs, periods, strict, fixed, timeout)
    }
}

/// Runs the solve on a worker thread and gives up (returning `None`, not an
/// error) once `timeout` elapses, per spec.md §5 ("expiry yields 'no
/// solution' rather than an exception").
fn solve_with_timeout(
    rs: &RequestSet,
    periods: &[u8],
    strict: bool,
    fixed: Option<&[Lesson]>,
    timeout: Duration,
) -> (Option<Vec<Lesson>>, Option<String>) {
    let rs = rs.clone();
    let periods = periods.to_vec();
    let fixed = fixed.map(|f| f.to_vec());

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = solve_sync(&rs, &periods, strict, fixed.as_deref());
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => (None, Some("solver timed out".to_string())),
    }
}

fn solve_sync(
    rs: &RequestSet,
    periods: &[u8],
    strict: bool,
    fixed: Option<&[Lesson]>,
) -> (Option<Vec<Lesson>>, Option<String>) {
    let prep = model::prep(rs, periods, fixed);
    let (mut pvars, vars) = model::declare_vars(&prep);
    let (objective, epigraph_constraints) =
        model::build_base_objective(&mut pvars, &prep, &vars, strict);

    let mut solver_model = pvars.minimise(objective).using(good_lp::microlp);
    solver_model = model::add_coverage(solver_model, &prep, &vars);
    solver_model = model::add_busy_links(solver_model, &prep, &vars);
    solver_model = model::add_compactness(solver_model, &prep, &vars, strict);
    solver_model = model::add_fixed_noop(solver_model, &prep, &vars);
    solver_model = model::add_epigraph_constraints(solver_model, epigraph_constraints);

    match solver_model.solve() {
        Ok(solution) => (Some(model::extract(&prep, &vars, &solution)), None),
        Err(e) => (None, Some(format!("no feasible schedule: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ClassId, Day, PlanItem, ScheduleRequest, Strategy, Subject, SubjectId, Teacher, TeacherId};
    use std::collections::HashSet;
    use std::time::Duration;

    fn minimal_request_set() -> RequestSet {
        let req = ScheduleRequest {
            teachers: vec![Teacher {
                id: TeacherId::from("t1"),
                name: "Ivanenko".to_string(),
                subjects: HashSet::from([SubjectId::from("math")]),
                is_primary: false,
                prefers_period_zero: false,
                availability: Default::default(),
            }],
            subjects: vec![Subject {
                id: SubjectId::from("math"),
                name: "Math".to_string(),
            }],
            classes: vec![domain::Class {
                id: ClassId::from("c1"),
                name: "5-A".to_string(),
                excluded_subjects: HashSet::new(),
            }],
            plan: vec![PlanItem {
                class_id: ClassId::from("c1"),
                subject_id: SubjectId::from("math"),
                teacher_id: TeacherId::from("t1"),
                hours_per_week: 2,
            }],
            strategy: Strategy::Cp,
            timeout: 30,
            genetic_population_size: 8,
            genetic_generations: 3,
            genetic_mutation_rate: 0.4,
        };
        RequestSet::build(&req)
    }

    #[test]
    fn solves_minimal_strict_instance() {
        let rs = minimal_request_set();
        let backend = CpSatBackend::new();
        let (schedule, _msg) = backend.solve(&rs, &[1, 2, 3, 4, 5, 6, 7], true, None, Duration::from_secs(15));
        let schedule = schedule.expect("strict pass should find a schedule for 2 lessons / 1 teacher");
        assert_eq!(schedule.len(), 2);
        for l in &schedule {
            assert!(l.period >= 1 && l.period <= 7);
        }
    }

    #[test]
    fn honors_teacher_availability() {
        let mut rs = minimal_request_set();
        rs.teachers[0]
            .availability
            .insert(Day::Mon, HashSet::from([1u8, 2, 3, 4, 5, 6, 7]));
        let backend = CpSatBackend::new();
        let (schedule, _msg) = backend.solve(&rs, &[1, 2, 3, 4, 5, 6, 7], true, None, Duration::from_secs(15));
        let schedule = schedule.expect("should still fit on other days");
        assert!(schedule.iter().all(|l| l.day != Day::Mon));
    }

    /// Regression test: H6 (spec.md §4.2) is a per-(class, day) rule only.
    /// A second teacher who only ever covers a later period of the same
    /// class (e.g. Physics at period 2, after Math at period 1 by a
    /// different teacher) must not be forced to personally start at period
    /// 1 — that constraint belongs to the class, not to each teacher.
    #[test]
    fn strict_pass_allows_a_second_teacher_starting_later_in_the_day() {
        let req = ScheduleRequest {
            teachers: vec![
                Teacher {
                    id: TeacherId::from("t1"),
                    name: "Ivanenko".to_string(),
                    subjects: HashSet::from([SubjectId::from("math")]),
                    is_primary: false,
                    prefers_period_zero: false,
                    availability: Default::default(),
                },
                Teacher {
                    id: TeacherId::from("t2"),
                    name: "Petrenko".to_string(),
                    subjects: HashSet::from([SubjectId::from("physics")]),
                    is_primary: false,
                    prefers_period_zero: false,
                    availability: Default::default(),
                },
            ],
            subjects: vec![
                Subject { id: SubjectId::from("math"), name: "Math".to_string() },
                Subject { id: SubjectId::from("physics"), name: "Physics".to_string() },
            ],
            classes: vec![domain::Class {
                id: ClassId::from("c1"),
                name: "5-A".to_string(),
                excluded_subjects: HashSet::new(),
            }],
            plan: vec![
                PlanItem {
                    class_id: ClassId::from("c1"),
                    subject_id: SubjectId::from("math"),
                    teacher_id: TeacherId::from("t1"),
                    hours_per_week: 1,
                },
                PlanItem {
                    class_id: ClassId::from("c1"),
                    subject_id: SubjectId::from("physics"),
                    teacher_id: TeacherId::from("t2"),
                    hours_per_week: 1,
                },
            ],
            strategy: Strategy::Cp,
            timeout: 30,
            genetic_population_size: 8,
            genetic_generations: 3,
            genetic_mutation_rate: 0.4,
        };
        let rs = RequestSet::build(&req);
        let backend = CpSatBackend::new();
        let (schedule, msg) =
            backend.solve(&rs, &[1, 2, 3, 4, 5, 6, 7], true, None, Duration::from_secs(15));
        let schedule = schedule.unwrap_or_else(|| {
            panic!("strict pass should be feasible with two single-period teachers: {msg:?}")
        });
        assert_eq!(schedule.len(), 2);
    }
}
