//! Lifts "period-0" lessons (an early slot ahead of the regular day) into
//! the regular 1..=7 range whenever the teacher doesn't prefer it and a
//! free slot exists.

use domain::{Lesson, ScheduleRequest};
use std::collections::HashMap;

/// Mutates `schedule` in place. Idempotent: a lesson already moved (or with
/// no free target) is left alone on a second call. Only moves a lesson into
/// a slot free of conflicts, so it can never break teacher/class exclusivity.
pub fn optimize_period_zero(schedule: &mut [Lesson], req: &ScheduleRequest) {
    if schedule.is_empty() {
        return;
    }

    let prefers_zero: HashMap<&str, bool> = req
        .teachers
        .iter()
        .map(|t| (t.id.0.as_str(), t.prefers_period_zero))
        .collect();

    let zero_idxs: Vec<usize> = schedule
        .iter()
        .enumerate()
        .filter(|(_, l)| l.period == 0)
        .map(|(i, _)| i)
        .collect();

    for idx in zero_idxs {
        let wants_zero = prefers_zero
            .get(schedule[idx].teacher_id.0.as_str())
            .copied()
            .unwrap_or(false);
        if wants_zero {
            continue;
        }
        let lesson = schedule[idx].clone();
        for target in 1..=7u8 {
            if can_move(&lesson, idx, target, schedule) {
                schedule[idx].period = target;
                break;
            }
        }
    }
}

fn can_move(lesson: &Lesson, self_idx: usize, target: u8, schedule: &[Lesson]) -> bool {
    schedule.iter().enumerate().all(|(i, other)| {
        if i == self_idx {
            return true;
        }
        if other.day != lesson.day || other.period != target {
            return true;
        }
        other.teacher_id != lesson.teacher_id && other.class_id != lesson.class_id
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ClassId, Day, ScheduleRequest, Strategy, SubjectId, Teacher, TeacherId};
    use std::collections::HashSet;

    fn lesson(day: Day, period: u8, teacher: &str, class: &str) -> Lesson {
        Lesson {
            class_id: ClassId::from(class),
            subject_id: SubjectId::from("math"),
            teacher_id: TeacherId::from(teacher),
            day,
            period,
        }
    }

    fn request(prefers_zero: bool) -> ScheduleRequest {
        ScheduleRequest {
            teachers: vec![Teacher {
                id: TeacherId::from("t1"),
                name: "Ivanenko".to_string(),
                subjects: HashSet::from([SubjectId::from("math")]),
                is_primary: false,
                prefers_period_zero: prefers_zero,
                availability: Default::default(),
            }],
            subjects: vec![],
            classes: vec![],
            plan: vec![],
            strategy: Strategy::Cp,
            timeout: 30,
            genetic_population_size: 8,
            genetic_generations: 3,
            genetic_mutation_rate: 0.4,
        }
    }

    #[test]
    fn lifts_period_zero_into_first_free_slot() {
        let req = request(false);
        let mut schedule = vec![lesson(Day::Mon, 0, "t1", "c1")];
        optimize_period_zero(&mut schedule, &req);
        assert_eq!(schedule[0].period, 1);
    }

    #[test]
    fn leaves_period_zero_when_teacher_prefers_it() {
        let req = request(true);
        let mut schedule = vec![lesson(Day::Mon, 0, "t1", "c1")];
        optimize_period_zero(&mut schedule, &req);
        assert_eq!(schedule[0].period, 0);
    }

    #[test]
    fn skips_occupied_target_slots() {
        let req = request(false);
        let mut schedule = vec![
            lesson(Day::Mon, 0, "t1", "c1"),
            lesson(Day::Mon, 1, "t1", "c2"),
        ];
        optimize_period_zero(&mut schedule, &req);
        assert_eq!(schedule[0].period, 2);
    }

    #[test]
    fn idempotent() {
        let req = request(false);
        let mut schedule = vec![lesson(Day::Mon, 0, "t1", "c1")];
        optimize_period_zero(&mut schedule, &req);
        let after_first = schedule.clone();
        optimize_period_zero(&mut schedule, &req);
        assert_eq!(schedule, after_first);
    }
}
