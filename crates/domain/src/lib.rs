//! Entities, identifiers, and wire types for a weekly school timetable.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use utoipa::ToSchema;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}
id_newtype!(TeacherId);
id_newtype!(SubjectId);
id_newtype!(ClassId);

/// A weekday a lesson can be placed on. Saturdays and Sundays are not part
/// of this engine's week.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

pub const DAYS: [Day; 5] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri];

impl Day {
    pub fn index(self) -> usize {
        match self {
            Day::Mon => 0,
            Day::Tue => 1,
            Day::Wed => 2,
            Day::Thu => 3,
            Day::Fri => 4,
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Day::Mon => "Mon",
            Day::Tue => "Tue",
            Day::Wed => "Wed",
            Day::Thu => "Thu",
            Day::Fri => "Fri",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    #[serde(default)]
    pub subjects: HashSet<SubjectId>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub prefers_period_zero: bool,
    /// Periods the teacher is *unavailable* at, per day.
    #[serde(default)]
    pub availability: HashMap<Day, HashSet<u8>>,
}

impl Teacher {
    /// Number of (day, period) slots blocked across the whole week.
    pub fn blocked_slot_count(&self) -> u32 {
        self.availability.values().map(|s| s.len() as u32).sum()
    }

    pub fn is_blocked(&self, day: Day, period: u8) -> bool {
        self.availability
            .get(&day)
            .map(|blocked| blocked.contains(&period))
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    #[serde(default)]
    pub excluded_subjects: HashSet<SubjectId>,
}

impl Class {
    /// Grade parsed from the decimal prefix before the first `-` in the
    /// class name (e.g. `"5-А"` -> `5`). Missing or unparseable names are
    /// conservatively treated as non-primary by returning `None`.
    pub fn grade(&self) -> Option<u32> {
        let prefix = self.name.split('-').next().unwrap_or(&self.name);
        let digits: String = prefix.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<u32>().ok()
    }

    /// Grades 1-4 are primary; anything else (including unparseable names)
    /// is not.
    pub fn is_primary(&self) -> bool {
        matches!(self.grade(), Some(g) if (1..=4).contains(&g))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct PlanItem {
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    /// Signed so the validator can report negative/fractional inputs as a
    /// localized finding rather than a deserialization failure.
    pub hours_per_week: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
pub struct Lesson {
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub day: Day,
    pub period: u8,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Cp,
    Mip,
    Genetic,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Cp
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_pop_size() -> usize {
    8
}
fn default_generations() -> usize {
    3
}
fn default_mutation_rate() -> f64 {
    0.4
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ScheduleRequest {
    pub teachers: Vec<Teacher>,
    pub subjects: Vec<Subject>,
    pub classes: Vec<Class>,
    pub plan: Vec<PlanItem>,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_pop_size")]
    pub genetic_population_size: usize,
    #[serde(default = "default_generations")]
    pub genetic_generations: usize,
    #[serde(default = "default_mutation_rate")]
    pub genetic_mutation_rate: f64,
}

/// A single `(class, subject, teacher)` scheduling obligation, flattened out
/// of the teaching plan. `count` is always >= 1.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Request {
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub count: u32,
}

/// The flattened, validated scheduling problem: requests plus lookup tables
/// the back-ends and analyzer all need. Built once per invocation and never
/// mutated.
#[derive(Clone, Debug)]
pub struct RequestSet {
    pub requests: Vec<Request>,
    pub teachers: Vec<Teacher>,
    pub classes: Vec<Class>,
    pub subjects: Vec<Subject>,
}

impl RequestSet {
    /// Flattens `plan` into `requests`, dropping zero-hour items and items
    /// whose class is primary (grades 1-4), per spec.md §3.
    pub fn build(req: &ScheduleRequest) -> Self {
        let primary_classes: HashSet<&ClassId> = req
            .classes
            .iter()
            .filter(|c| c.is_primary())
            .map(|c| &c.id)
            .collect();

        let requests = req
            .plan
            .iter()
            .filter(|p| p.hours_per_week > 0 && !primary_classes.contains(&p.class_id))
            .map(|p| Request {
                class_id: p.class_id.clone(),
                subject_id: p.subject_id.clone(),
                teacher_id: p.teacher_id.clone(),
                count: p.hours_per_week as u32,
            })
            .collect();

        RequestSet {
            requests,
            teachers: req.teachers.clone(),
            classes: req.classes.clone(),
            subjects: req.subjects.clone(),
        }
    }

    pub fn teacher(&self, id: &TeacherId) -> Option<&Teacher> {
        self.teachers.iter().find(|t| &t.id == id)
    }

    pub fn class(&self, id: &ClassId) -> Option<&Class> {
        self.classes.iter().find(|c| &c.id == id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SolveOutcome {
    Success {
        schedule: Vec<Lesson>,
    },
    Conflict {
        schedule: Vec<Lesson>,
        violations: Vec<String>,
    },
    Error {
        message: String,
    },
}

impl SolveOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            SolveOutcome::Success { .. } => "success",
            SolveOutcome::Conflict { .. } => "conflict",
            SolveOutcome::Error { .. } => "error",
        }
    }

    pub fn schedule(&self) -> Option<&[Lesson]> {
        match self {
            SolveOutcome::Success { schedule } => Some(schedule),
            SolveOutcome::Conflict { schedule, .. } => Some(schedule),
            SolveOutcome::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str) -> Class {
        Class {
            id: ClassId::from("c1"),
            name: name.to_string(),
            excluded_subjects: HashSet::new(),
        }
    }

    #[test]
    fn grade_parses_decimal_prefix() {
        assert_eq!(class("5-А").grade(), Some(5));
        assert_eq!(class("11-Б").grade(), Some(11));
    }

    #[test]
    fn grade_missing_or_odd_name_is_not_primary() {
        assert!(!class("Drama Club").is_primary());
        assert!(!class("").is_primary());
    }

    #[test]
    fn primary_is_grades_one_through_four() {
        assert!(class("1-А").is_primary());
        assert!(class("4-В").is_primary());
        assert!(!class("5-А").is_primary());
        assert!(!class("10-А").is_primary());
    }

    #[test]
    fn request_set_drops_zero_hours_and_primary_classes() {
        let req = ScheduleRequest {
            teachers: vec![],
            subjects: vec![],
            classes: vec![class("5-А"), class("2-А")],
            plan: vec![PlanItem {
                class_id: ClassId::from("c1"),
                subject_id: SubjectId::from("math"),
                teacher_id: TeacherId::from("t1"),
                hours_per_week: 0,
            }],
            strategy: Strategy::Cp,
            timeout: 30,
            genetic_population_size: 8,
            genetic_generations: 3,
            genetic_mutation_rate: 0.4,
        };
        let rs = RequestSet::build(&req);
        assert!(rs.requests.is_empty());
    }
}
