//! In-memory async job queue fronting the engine's `Solver` trait. One job
//! per `POST /v1/solve` call; the hosting service polls `get` for status.
use domain::{ScheduleRequest, SolveOutcome};
use engine::Solver;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, ToSchema)]
pub struct JobId(pub String);

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, ToSchema)]
#[serde(tag = "status")]
pub enum JobStatus {
    Queued,
    Running,
    Solved { result: SolveOutcome },
    Failed { message: String },
}

#[derive(Clone)]
pub struct InMemJobs<S: Solver> {
    inner: std::sync::Arc<RwLock<HashMap<String, JobStatus>>>,
    solver: std::sync::Arc<S>,
}

impl<S: Solver> InMemJobs<S> {
    pub fn new(solver: S) -> Self {
        Self {
            inner: Default::default(),
            solver: std::sync::Arc::new(solver),
        }
    }

    pub fn enqueue(&self, req: ScheduleRequest) -> JobId {
        let id = Uuid::new_v4().to_string();
        self.inner.write().insert(id.clone(), JobStatus::Queued);

        let map = self.inner.clone();
        let solver = self.solver.clone();
        let id_for_task = id.clone();

        tokio::spawn(async move {
            {
                let mut w = map.write();
                w.insert(id_for_task.clone(), JobStatus::Running);
            }
            match solver.solve(req).await {
                Ok(outcome) => {
                    map.write()
                        .insert(id_for_task, JobStatus::Solved { result: outcome });
                }
                Err(e) => {
                    error!(?e, "job failed");
                    map.write().insert(
                        id_for_task,
                        JobStatus::Failed {
                            message: e.to_string(),
                        },
                    );
                }
            }
        });

        JobId(id)
    }

    pub fn get(&self, id: &str) -> Option<JobStatus> {
        self.inner.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::Lesson;

    struct StubSolver;

    #[async_trait]
    impl Solver for StubSolver {
        async fn solve(&self, _req: ScheduleRequest) -> anyhow::Result<SolveOutcome> {
            Ok(SolveOutcome::Success {
                schedule: Vec::<Lesson>::new(),
            })
        }
    }

    #[tokio::test]
    async fn enqueue_transitions_to_solved() {
        let jobs = InMemJobs::new(StubSolver);
        let id = jobs.enqueue(sample_request());
        // Give the spawned task a chance to run.
        for _ in 0..50 {
            if matches!(jobs.get(&id.0), Some(JobStatus::Solved { .. })) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(matches!(jobs.get(&id.0), Some(JobStatus::Solved { .. })));
    }

    #[test]
    fn unknown_job_id_is_none() {
        let jobs = InMemJobs::new(StubSolver);
        assert!(jobs.get("missing").is_none());
    }

    fn sample_request() -> ScheduleRequest {
        ScheduleRequest {
            teachers: vec![],
            subjects: vec![],
            classes: vec![],
            plan: vec![],
            strategy: domain::Strategy::Cp,
            timeout: 30,
            genetic_population_size: 8,
            genetic_generations: 3,
            genetic_mutation_rate: 0.4,
        }
    }
}
