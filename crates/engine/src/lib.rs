pub mod analyze;
pub mod orchestrate;
pub mod postprocess;
pub mod validate;

use async_trait::async_trait;

pub use analyze::analyze;
pub use orchestrate::{
    cascade, cascade_with_fixed, cascade_with_progress, solve, solve_with_progress, ExactBackend,
    ProgressSink,
};
pub use postprocess::optimize_period_zero;
pub use validate::{validate, ValidationError};

pub use domain::{
    Class, ClassId, Day, Lesson, PlanItem, Request, RequestSet, ScheduleRequest, SolveOutcome,
    Strategy, Subject, SubjectId, Teacher, TeacherId, DAYS,
};

/// Top-level entry point a hosting service drives per invocation. Composed
/// at the edge (see the api crate's dispatcher) from the exact back-ends and
/// the evolutionary solver; this crate only supplies the pure pieces.
#[async_trait]
pub trait Solver: Send + Sync + 'static {
    async fn solve(&self, req: ScheduleRequest) -> anyhow::Result<SolveOutcome>;
}
