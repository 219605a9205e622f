use async_trait::async_trait;
use domain::{ScheduleRequest, SolveOutcome, Strategy};
use engine::{ExactBackend, Solver};
use jobs::InMemJobs;
use solver_cpsat::CpSatBackend;
use solver_evo::GeneticBackend;
use solver_milp::MilpBackend;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<InMemJobs<DispatchSolver>>,
}

/// Fronts `engine::orchestrate::solve` with the two exact back-ends and the
/// evolutionary back-end behind one `Solver` impl, the way the teacher's
/// `DispatchSolver` fronts its MILP and heuristic solvers.
#[derive(Clone)]
pub struct DispatchSolver {
    cp: Arc<CpSatBackend>,
    mip: Arc<MilpBackend>,
}

impl DispatchSolver {
    pub fn new() -> Self {
        Self {
            cp: Arc::new(CpSatBackend::new()),
            mip: Arc::new(MilpBackend::new()),
        }
    }
}

impl Default for DispatchSolver {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch(req: &ScheduleRequest, cp: &dyn ExactBackend, mip: &dyn ExactBackend) -> SolveOutcome {
    let timeout = Duration::from_secs(req.timeout);
    let population_size = req.genetic_population_size;
    let generations = req.genetic_generations;
    let mutation_rate = req.genetic_mutation_rate;
    let strategy = req.strategy;

    engine::orchestrate::solve(req, cp, mip, |rs| {
        if !matches!(strategy, Strategy::Genetic) {
            return None;
        }
        GeneticBackend::default().solve(rs, population_size, generations, mutation_rate, cp, timeout)
    })
}

#[async_trait]
impl Solver for DispatchSolver {
    async fn solve(&self, req: ScheduleRequest) -> anyhow::Result<SolveOutcome> {
        let cp = self.cp.clone();
        let mip = self.mip.clone();
        tokio::task::spawn_blocking(move || dispatch(&req, cp.as_ref(), mip.as_ref()))
            .await
            .map_err(|e| anyhow::anyhow!("solver task panicked: {e}"))
    }
}

impl AppState {
    pub fn new_default() -> Self {
        let jobs = InMemJobs::new(DispatchSolver::new());
        Self { jobs: Arc::new(jobs) }
    }
}
