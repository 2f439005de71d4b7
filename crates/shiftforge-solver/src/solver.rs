//! Solver implementation.
//!
//! Runs the construction heuristic followed by local search against one
//! schedule, under the termination budgets of a [`SolverConfig`]. Solving
//! is synchronous; the job manager wraps it in worker threads.
//!
//! Logging levels:
//! - **INFO**: solve start/end, phase summaries, problem scale
//! - **DEBUG**: per-second progress during local search
//! - **TRACE**: individual steps

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use shiftforge_config::SolverConfig;
use shiftforge_core::{AssignmentRecord, HardSoftScore, ShiftSchedule};
use shiftforge_scoring::{ConstraintWeightOverrides, RuleWeights, ScoreDirector};

use crate::construction::ConstructionHeuristic;
use crate::localsearch::LocalSearch;
use crate::scope::SolverScope;
use crate::termination::{
    OrTermination, StepCountTermination, TimeTermination, UnimprovedStepCountTermination,
    UnimprovedTimeTermination,
};

/// Fallback time budget when the configuration resolves to no limit at all.
const DEFAULT_TIME_LIMIT_SECS: u64 = 120;

/// Callback invoked with every new best solution, including the
/// construction result. The schedule carries its score.
pub type BestSolutionCallback = Box<dyn Fn(&ShiftSchedule) + Send + Sync>;

/// Aggregate metrics for one solve run.
#[derive(Debug, Clone)]
pub struct SolveStats {
    /// Local search steps taken.
    pub step_count: u64,
    /// Moves evaluated across the run.
    pub moves_evaluated: u64,
    /// Wall time spent solving.
    pub duration: Duration,
    /// Score right after construction.
    pub initial_score: HardSoftScore,
    /// Score of the returned solution.
    pub best_score: HardSoftScore,
}

/// The solved schedule plus run statistics.
#[derive(Debug, Clone)]
pub struct SolveResult {
    pub solution: ShiftSchedule,
    pub stats: SolveStats,
}

/// Two-phase schedule optimizer.
///
/// A solver is built from a [`SolverConfig`] and solves one schedule per
/// call. `terminate_early` (or the shared flag behind [`terminate_handle`])
/// cancels a run from another thread; the best solution found so far is
/// still returned.
///
/// [`terminate_handle`]: Solver::terminate_handle
///
/// # Examples
///
/// ```no_run
/// use shiftforge_config::SolverConfig;
/// use shiftforge_solver::Solver;
/// # fn schedule() -> shiftforge_core::ShiftSchedule { unimplemented!() }
///
/// let config = SolverConfig::new()
///     .with_random_seed(42)
///     .with_termination_seconds(30);
/// let result = Solver::new(config).solve(schedule());
/// println!("solved: {}", result.stats.best_score);
/// ```
pub struct Solver {
    config: SolverConfig,
    weights: RuleWeights,
    terminate_early_flag: Arc<AtomicBool>,
    solving: Arc<AtomicBool>,
    best_solution_callback: Option<BestSolutionCallback>,
}

impl Solver {
    /// Creates a solver, deriving rule weights from the config's overrides.
    pub fn new(config: SolverConfig) -> Self {
        let overrides = ConstraintWeightOverrides::from_pairs(
            config
                .rules
                .weights
                .iter()
                .map(|(name, w)| (name.clone(), HardSoftScore::of(w.hard, w.soft))),
        );
        let weights = RuleWeights::with_overrides(&overrides);
        Self {
            config,
            weights,
            terminate_early_flag: Arc::new(AtomicBool::new(false)),
            solving: Arc::new(AtomicBool::new(false)),
            best_solution_callback: None,
        }
    }

    /// Replaces the derived rule weights.
    pub fn with_weights(mut self, weights: RuleWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Registers a callback fired on every new best solution.
    pub fn with_best_solution_callback(mut self, callback: BestSolutionCallback) -> Self {
        self.best_solution_callback = Some(callback);
        self
    }

    /// Shares an externally owned cancellation flag.
    ///
    /// The flag is never reset by the solver, so a request raised before
    /// solving starts still cancels the run at the first check.
    pub fn with_terminate_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.terminate_early_flag = flag;
        self
    }

    /// Handle to the cancellation flag, for terminating from other threads.
    pub fn terminate_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminate_early_flag)
    }

    /// Requests early termination of a running solve.
    ///
    /// Thread-safe. Returns false when no solve is in progress.
    pub fn terminate_early(&self) -> bool {
        if self.solving.load(Ordering::SeqCst) {
            self.terminate_early_flag.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Returns true while a solve is in progress.
    pub fn is_solving(&self) -> bool {
        self.solving.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn weights(&self) -> &RuleWeights {
        &self.weights
    }

    /// Solves a schedule from a cold start.
    pub fn solve(&self, schedule: ShiftSchedule) -> SolveResult {
        self.solve_with_prior(schedule, Vec::new())
    }

    /// Solves a schedule, warm starting from a prior period's records when
    /// the configuration allows it.
    pub fn solve_with_prior(
        &self,
        schedule: ShiftSchedule,
        prior: Vec<AssignmentRecord>,
    ) -> SolveResult {
        self.solving.store(true, Ordering::SeqCst);

        let director = ScoreDirector::new(
            schedule,
            self.weights.clone(),
            self.config.rules.consecutive_days_limit,
        );
        let mut scope = match self.config.random_seed {
            Some(seed) => SolverScope::with_seed(director, seed),
            None => SolverScope::new(director),
        };
        scope.set_terminate_early_flag(Arc::clone(&self.terminate_early_flag));
        scope.start_solving();

        {
            let problem = scope.working_solution();
            info!(
                event = "solve_start",
                records = problem.records.len(),
                employees = problem.employees.len(),
                stations = problem.stations.len(),
                demand_slots = problem.demand.len(),
            );
        }

        let mut construction = ConstructionHeuristic::new();
        if self.config.construction.warm_start && !prior.is_empty() {
            construction = construction.with_prior(prior);
        }
        construction.run(&mut scope);
        let initial_score = scope.calculate_score();
        if let (Some(callback), Some(best)) = (&self.best_solution_callback, scope.best_solution())
        {
            callback(best);
        }

        let time_limit = self
            .config
            .time_limit()
            .unwrap_or(Duration::from_secs(DEFAULT_TIME_LIMIT_SECS));
        let termination = OrTermination::new((
            TimeTermination::new(time_limit),
            self.config
                .unimproved_time_limit()
                .map(UnimprovedTimeTermination::new),
            self.config
                .termination
                .step_count_limit
                .map(StepCountTermination::new),
            self.config
                .termination
                .unimproved_step_count_limit
                .map(UnimprovedStepCountTermination::new),
        ));

        let local_search = LocalSearch::new(self.config.local_search.accepted_count_limit);
        let callback = self.best_solution_callback.as_ref();
        local_search.run(&mut scope, &termination, |best| {
            if let Some(cb) = callback {
                cb(best);
            }
        });

        let stats = SolveStats {
            step_count: scope.total_step_count(),
            moves_evaluated: scope.moves_evaluated(),
            duration: scope.elapsed().unwrap_or_default(),
            initial_score,
            best_score: scope
                .best_score()
                .unwrap_or_else(|| scope.calculate_score()),
        };
        self.solving.store(false, Ordering::SeqCst);

        info!(
            event = "solve_end",
            score = %stats.best_score,
            steps = stats.step_count,
            moves_evaluated = stats.moves_evaluated,
            duration_ms = stats.duration.as_millis() as u64,
        );

        let solution = scope.take_best_or_working_solution();
        SolveResult { solution, stats }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use chrono::{NaiveDate, NaiveTime};
    use shiftforge_core::{DemandSlot, Employee, Station, StationId};

    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn quick_config(seed: u64) -> SolverConfig {
        let mut config = SolverConfig::new().with_random_seed(seed);
        config.termination.step_count_limit = Some(200);
        config.termination.unimproved_step_count_limit = Some(8);
        config
    }

    fn two_register_morning() -> ShiftSchedule {
        ShiftSchedule::new(
            vec![
                Employee::new("E1", "S1")
                    .with_skill(StationId(0), 3)
                    .with_skill(StationId(1), 2),
                Employee::new("E2", "S1")
                    .with_skill(StationId(0), 2)
                    .with_skill(StationId(1), 3),
            ],
            vec![
                Station::new("S1", 1, "Register 1"),
                Station::new("S1", 2, "Register 2"),
            ],
            vec![
                DemandSlot::new("S1", d(3), t(9, 0), 2),
                DemandSlot::new("S1", d(3), t(9, 15), 2),
            ],
            vec![],
        )
    }

    #[test]
    fn test_solve_produces_feasible_covered_schedule() {
        let result = Solver::new(quick_config(42)).solve(two_register_morning());

        assert!(result.stats.best_score.is_feasible());
        assert_eq!(result.solution.assigned_count(), 4);
        assert_eq!(result.solution.score, Some(result.stats.best_score));
    }

    #[test]
    fn test_final_score_never_below_construction() {
        let result = Solver::new(quick_config(5)).solve(two_register_morning());

        assert!(result.stats.best_score >= result.stats.initial_score);
    }

    #[test]
    fn test_same_seed_reproduces_solution() {
        let first = Solver::new(quick_config(9)).solve(two_register_morning());
        let second = Solver::new(quick_config(9)).solve(two_register_morning());

        assert_eq!(first.stats.best_score, second.stats.best_score);
        assert_eq!(first.solution.records, second.solution.records);
    }

    #[test]
    fn test_callback_sees_construction_and_improvements() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let solver = Solver::new(quick_config(3)).with_best_solution_callback(Box::new(
            move |solution| {
                assert!(solution.score.is_some());
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));

        solver.solve(two_register_morning());

        assert!(fired.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_weight_override_flows_into_result() {
        let mut config = quick_config(21);
        config = config.with_weight("unmet_demand", 0, 250);
        let solver = Solver::new(config);
        assert_eq!(
            solver.weights().unmet_demand,
            HardSoftScore::of_soft(250)
        );
    }

    #[test]
    fn test_preset_terminate_flag_cancels_immediately() {
        let flag = Arc::new(AtomicBool::new(true));
        let solver = Solver::new(quick_config(2)).with_terminate_flag(Arc::clone(&flag));

        let result = solver.solve(two_register_morning());

        // Both phases see the flag before placing or stepping
        assert_eq!(result.solution.assigned_count(), 0);
        assert_eq!(result.stats.step_count, 0);
        assert!(result.stats.best_score >= result.stats.initial_score);
    }
}
