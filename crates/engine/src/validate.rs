//! Pre-solve validation of a teaching plan against capacity, qualification,
//! and uniqueness invariants.

use domain::{Class, ScheduleRequest, Teacher};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

const MAX_WEEKLY_SLOTS: i64 = 40;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Msg(String),
}

/// Checks invariants 1-6 over the plan and returns a human-readable message
/// per violation, joined with `; `. Class, subject, and teacher names are
/// substituted from the lookup maps wherever the id resolves.
pub fn validate(req: &ScheduleRequest) -> Result<(), ValidationError> {
    let teacher_by_id: HashMap<&str, &Teacher> =
        req.teachers.iter().map(|t| (t.id.0.as_str(), t)).collect();
    let class_by_id: HashMap<&str, &Class> =
        req.classes.iter().map(|c| (c.id.0.as_str(), c)).collect();
    let subject_names: HashMap<&str, &str> = req
        .subjects
        .iter()
        .map(|s| (s.id.0.as_str(), s.name.as_str()))
        .collect();

    let mut errors: Vec<String> = Vec::new();

    let has_active = req.plan.iter().any(|p| p.hours_per_week > 0);
    if !has_active {
        errors.push("empty plan: no lesson to schedule".to_string());
        return Err(ValidationError::Msg(errors.join("; ")));
    }

    let mut seen_combos: HashSet<(&str, &str)> = HashSet::new();
    let mut teacher_loads: HashMap<&str, i64> = HashMap::new();
    let mut class_loads: HashMap<&str, i64> = HashMap::new();

    for p in &req.plan {
        let class_name = class_by_id
            .get(p.class_id.0.as_str())
            .map(|c| c.name.as_str())
            .unwrap_or(p.class_id.0.as_str());
        let subject_name = subject_names
            .get(p.subject_id.0.as_str())
            .copied()
            .unwrap_or(p.subject_id.0.as_str());

        if p.hours_per_week < 0 {
            errors.push(format!(
                "class '{class_name}', subject '{subject_name}': negative hours ({})",
                p.hours_per_week
            ));
            continue;
        }
        if p.hours_per_week == 0 {
            continue;
        }
        if !subject_names.contains_key(p.subject_id.0.as_str()) {
            errors.push(format!(
                "class '{class_name}': unknown subject (id: {})",
                p.subject_id
            ));
            continue;
        }
        let class = match class_by_id.get(p.class_id.0.as_str()) {
            Some(c) => *c,
            None => {
                errors.push(format!(
                    "subject '{subject_name}': unknown class (id: {})",
                    p.class_id
                ));
                continue;
            }
        };
        let teacher = match teacher_by_id.get(p.teacher_id.0.as_str()) {
            Some(t) => *t,
            None => {
                if p.teacher_id.0.is_empty() {
                    errors.push(format!(
                        "class '{class_name}', subject '{subject_name}': no teacher specified"
                    ));
                } else {
                    errors.push(format!(
                        "class '{class_name}', subject '{subject_name}': unknown teacher (id: {})",
                        p.teacher_id
                    ));
                }
                continue;
            }
        };

        let can_teach =
            teacher.subjects.contains(&p.subject_id) || (teacher.is_primary && class.is_primary());
        if !can_teach {
            errors.push(format!(
                "class '{class_name}', subject '{subject_name}': teacher {} does not teach this subject",
                teacher.name
            ));
            continue;
        }

        let combo = (p.class_id.0.as_str(), p.subject_id.0.as_str());
        if !seen_combos.insert(combo) {
            errors.push(format!(
                "class '{class_name}', subject '{subject_name}': duplicate entry in plan"
            ));
            continue;
        }

        *teacher_loads.entry(p.teacher_id.0.as_str()).or_insert(0) += p.hours_per_week;
        *class_loads.entry(p.class_id.0.as_str()).or_insert(0) += p.hours_per_week;
    }

    for t in &req.teachers {
        let load = teacher_loads.get(t.id.0.as_str()).copied().unwrap_or(0);
        let available = MAX_WEEKLY_SLOTS - t.blocked_slot_count() as i64;
        if load > available {
            errors.push(format!(
                "teacher {} has {load} hours/week, but only {available} slots are available given the schedule",
                t.name
            ));
        } else if load > MAX_WEEKLY_SLOTS {
            errors.push(format!(
                "teacher {} has {load} hours/week (absolute maximum {MAX_WEEKLY_SLOTS})",
                t.name
            ));
        }
    }

    for c in &req.classes {
        let load = class_loads.get(c.id.0.as_str()).copied().unwrap_or(0);
        if load > MAX_WEEKLY_SLOTS {
            errors.push(format!(
                "class {} has {load} lessons/week (maximum {MAX_WEEKLY_SLOTS})",
                c.name
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Msg(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ClassId, PlanItem, Strategy, SubjectId, Teacher, TeacherId};
    use std::collections::HashSet as Set;

    fn base_request() -> ScheduleRequest {
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

    #[test]
    fn minimal_plan_is_valid() {
        assert!(validate(&base_request()).is_ok());
    }

    #[test]
    fn overload_is_rejected() {
        let mut req = base_request();
        req.plan[0].hours_per_week = 50;
        let err = validate(&req).unwrap_err();
        let ValidationError::Msg(message) = err;
        assert!(message.contains("50 hours/week"));
        assert!(message.contains("40"));
    }

    #[test]
    fn unqualified_teacher_is_rejected() {
        let mut req = base_request();
        req.plan[0].subject_id = SubjectId::from("physics");
        req.subjects.push(domain::Subject {
            id: SubjectId::from("physics"),
            name: "Physics".to_string(),
        });
        let err = validate(&req).unwrap_err();
        let ValidationError::Msg(message) = err;
        assert!(message.contains("Physics"));
        assert!(message.contains("Ivanenko"));
    }

    #[test]
    fn empty_plan_is_rejected() {
        let mut req = base_request();
        req.plan[0].hours_per_week = 0;
        assert!(validate(&req).is_err());
    }
}
