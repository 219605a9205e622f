//! Pure diagnosis of an imperfect (or perfect) schedule: coverage gaps,
//! teacher mismatches, compactness violations, and double-bookings.

use domain::{Day, Lesson, ScheduleRequest};
use std::collections::{HashMap, HashSet};

/// Checks performed, in order: (1) structural validity of each lesson, (2)
/// coverage vs. the plan, (3) teacher-match, (4) per-(class,day)
/// compactness, (5) teacher double-booking, (6) class double-booking, (7)
/// daily overload, (8) a summary advisory when lessons are missing. The set
/// of violations is order-independent; only the printed order follows this
/// list.
pub fn analyze(schedule: &[Lesson], req: &ScheduleRequest) -> Vec<String> {
    let mut violations = Vec::new();

    let class_names: HashMap<&str, &str> = req
        .classes
        .iter()
        .map(|c| (c.id.0.as_str(), c.name.as_str()))
        .collect();
    let teacher_names: HashMap<&str, &str> = req
        .teachers
        .iter()
        .map(|t| (t.id.0.as_str(), t.name.as_str()))
        .collect();
    let subject_names: HashMap<&str, &str> = req
        .subjects
        .iter()
        .map(|s| (s.id.0.as_str(), s.name.as_str()))
        .collect();

    let mut plan_map: HashMap<(&str, &str), (i64, &str)> = HashMap::new();
    for p in &req.plan {
        if p.hours_per_week > 0 {
            plan_map.insert(
                (p.class_id.0.as_str(), p.subject_id.0.as_str()),
                (p.hours_per_week, p.teacher_id.0.as_str()),
            );
        }
    }

    let name_of = |map: &HashMap<&str, &str>, id: &str| -> String {
        map.get(id).copied().unwrap_or(id).to_string()
    };

    // 1. structural validity
    for l in schedule {
        if l.period > 8 {
            let c_name = name_of(&class_names, l.class_id.0.as_str());
            violations.push(format!(
                "class {c_name} ({}): invalid period {} (must be 0-8)",
                l.day, l.period
            ));
        }
        if !class_names.contains_key(l.class_id.0.as_str()) {
            violations.push(format!(
                "lesson references an unknown class (id: {})",
                l.class_id
            ));
        }
        if !subject_names.contains_key(l.subject_id.0.as_str()) {
            let c_name = name_of(&class_names, l.class_id.0.as_str());
            violations.push(format!("class {c_name}: unknown subject (id: {})", l.subject_id));
        }
        if !teacher_names.contains_key(l.teacher_id.0.as_str()) {
            let c_name = name_of(&class_names, l.class_id.0.as_str());
            let s_name = name_of(&subject_names, l.subject_id.0.as_str());
            violations.push(format!(
                "class {c_name}, subject {s_name}: unknown teacher (id: {})",
                l.teacher_id
            ));
        }
    }

    // 2. coverage
    let mut actual_counts: HashMap<(&str, &str), i64> = HashMap::new();
    for l in schedule {
        *actual_counts
            .entry((l.class_id.0.as_str(), l.subject_id.0.as_str()))
            .or_insert(0) += 1;
    }
    let mut all_keys: HashSet<(&str, &str)> = plan_map.keys().copied().collect();
    all_keys.extend(actual_counts.keys().copied());

    let mut missing: Vec<(String, String, i64, i64, i64)> = Vec::new();
    let mut extra: Vec<(String, String, i64, i64, i64)> = Vec::new();
    for key in all_keys {
        let expected = plan_map.get(&key).map(|(h, _)| *h).unwrap_or(0);
        let actual = actual_counts.get(&key).copied().unwrap_or(0);
        let c_name = name_of(&class_names, key.0);
        let s_name = name_of(&subject_names, key.1);
        if actual < expected {
            missing.push((c_name, s_name, expected - actual, expected, actual));
        } else if actual > expected {
            extra.push((c_name, s_name, actual - expected, expected, actual));
        }
    }
    missing.sort_by(|a, b| b.2.cmp(&a.2));
    extra.sort_by(|a, b| b.2.cmp(&a.2));

    for (c_name, s_name, diff, expected, actual) in &missing {
        violations.push(format!(
            "cannot place {diff} lesson(s) of '{s_name}' for class {c_name} (planned {expected}, placed {actual})"
        ));
    }
    for (c_name, s_name, diff, expected, actual) in &extra {
        violations.push(format!(
            "{diff} extra lesson(s) of '{s_name}' in class {c_name} (planned {expected}, placed {actual})"
        ));
    }
    if !missing.is_empty() {
        let total_missing: i64 = missing.iter().map(|m| m.2).sum();
        let total_planned: i64 = req
            .plan
            .iter()
            .filter(|p| p.hours_per_week > 0)
            .map(|p| p.hours_per_week)
            .sum();
        violations.push(format!(
            "total unplaced: {total_missing} of {total_planned} planned lessons"
        ));
    }

    // 3. teacher match
    for l in schedule {
        if let Some((_, expected_teacher)) =
            plan_map.get(&(l.class_id.0.as_str(), l.subject_id.0.as_str()))
        {
            if l.teacher_id.0.as_str() != *expected_teacher {
                let c_name = name_of(&class_names, l.class_id.0.as_str());
                let s_name = name_of(&subject_names, l.subject_id.0.as_str());
                let expected_name = name_of(&teacher_names, expected_teacher);
                let actual_name = name_of(&teacher_names, l.teacher_id.0.as_str());
                violations.push(format!(
                    "class {c_name}, subject {s_name}: wrong teacher ({actual_name} instead of {expected_name})"
                ));
            }
        }
    }

    // 4. per-(class,day) compactness, 7. daily overload
    let mut class_days: HashMap<(&str, Day), Vec<u8>> = HashMap::new();
    for l in schedule {
        class_days
            .entry((l.class_id.0.as_str(), l.day))
            .or_default()
            .push(l.period);
    }
    for ((c_id, day), periods) in class_days.iter() {
        let c_name = name_of(&class_names, c_id);
        let mut periods = periods.clone();
        periods.sort_unstable();
        if let Some(&first) = periods.first() {
            if first > 1 {
                violations.push(format!("{c_name} ({day}): starts at period {first} instead of 1"));
            }
        }
        for w in periods.windows(2) {
            if w[1] - w[0] > 1 {
                violations.push(format!(
                    "{c_name} ({day}): gap between periods {} and {}",
                    w[0], w[1]
                ));
            }
        }
        if periods.len() > 8 {
            violations.push(format!(
                "{c_name} ({day}): {} lessons scheduled in one day (maximum 8)",
                periods.len()
            ));
        }
    }

    // 5. teacher double-booking, 6. class double-booking
    let mut teacher_slots: HashMap<(&str, Day, u8), Vec<&str>> = HashMap::new();
    let mut class_slots: HashMap<(&str, Day, u8), i64> = HashMap::new();
    for l in schedule {
        teacher_slots
            .entry((l.teacher_id.0.as_str(), l.day, l.period))
            .or_default()
            .push(l.class_id.0.as_str());
        *class_slots
            .entry((l.class_id.0.as_str(), l.day, l.period))
            .or_insert(0) += 1;
    }
    for ((t_id, day, period), class_ids) in &teacher_slots {
        if class_ids.len() > 1 {
            let t_name = name_of(&teacher_names, t_id);
            let list = class_ids
                .iter()
                .map(|c| name_of(&class_names, c))
                .collect::<Vec<_>>()
                .join(", ");
            violations.push(format!(
                "teacher {t_name} ({day}, period {period}): simultaneously in classes {list}"
            ));
        }
    }
    for ((c_id, day, period), count) in &class_slots {
        if *count > 1 {
            let c_name = name_of(&class_names, c_id);
            violations.push(format!(
                "class {c_name} ({day}, period {period}): {count} lessons scheduled at once"
            ));
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ClassId, PlanItem, Strategy, SubjectId, Teacher, TeacherId};
    use std::collections::HashSet as Set;

    fn request() -> ScheduleRequest {
        ScheduleRequest {
            teachers: vec![Teacher {
                id: TeacherId::from("t1"),
                name: "Ivanenko".to_string(),
                subjects: Set::from([SubjectId::from("math")]),
                is_primary: false,
                prefers_period_zero: false,
                availability: Default::default(),
            }],
            subjects: vec![domain::Subject {
                id: SubjectId::from("math"),
                name: "Math".to_string(),
            }],
            classes: vec![domain::Class {
                id: ClassId::from("c1"),
                name: "5-A".to_string(),
                excluded_subjects: Set::new(),
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
        }
    }

    fn lesson(day: Day, period: u8) -> Lesson {
        Lesson {
            class_id: ClassId::from("c1"),
            subject_id: SubjectId::from("math"),
            teacher_id: TeacherId::from("t1"),
            day,
            period,
        }
    }

    #[test]
    fn perfect_schedule_has_no_violations() {
        let schedule = vec![lesson(Day::Mon, 1), lesson(Day::Tue, 1)];
        assert!(analyze(&schedule, &request()).is_empty());
    }

    #[test]
    fn missing_lesson_is_reported_with_summary() {
        let schedule = vec![lesson(Day::Mon, 1)];
        let violations = analyze(&schedule, &request());
        assert!(violations.iter().any(|v| v.contains("cannot place 1 lesson")));
        assert!(violations.iter().any(|v| v.contains("total unplaced: 1 of 2")));
    }

    #[test]
    fn late_start_and_gap_are_reported() {
        let schedule = vec![lesson(Day::Mon, 2), lesson(Day::Mon, 4)];
        let violations = analyze(&schedule, &request());
        assert!(violations.iter().any(|v| v.contains("instead of 1")));
        assert!(violations.iter().any(|v| v.contains("gap between periods 2 and 4")));
    }

    #[test]
    fn teacher_double_booking_is_reported() {
        let mut other = lesson(Day::Mon, 1);
        other.class_id = ClassId::from("c2");
        let schedule = vec![lesson(Day::Mon, 1), other];
        let violations = analyze(&schedule, &request());
        assert!(violations
            .iter()
            .any(|v| v.contains("simultaneously in classes")));
    }

    #[test]
    fn class_double_booking_is_reported() {
        let mut other = lesson(Day::Mon, 1);
        other.teacher_id = TeacherId::from("t2");
        let schedule = vec![lesson(Day::Mon, 1), other];
        let violations = analyze(&schedule, &request());
        assert!(violations
            .iter()
            .any(|v| v.contains("lessons scheduled at once")));
    }

    #[test]
    fn daily_overload_is_reported() {
        let schedule: Vec<Lesson> = (1..=9u8).map(|p| lesson(Day::Mon, p)).collect();
        let violations = analyze(&schedule, &request());
        assert!(violations
            .iter()
            .any(|v| v.contains("maximum 8")));
    }
}
