//! Solver-level scope.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use shiftforge_core::{HardSoftScore, ShiftSchedule};
use shiftforge_scoring::ScoreDirector;

/// Top-level state for one solving process.
///
/// Owns the score director (and through it the working solution), tracks the
/// best solution seen so far, and carries the seeded random source every
/// phase draws from. Both phases run against the same scope, so counters
/// and the best solution span the whole solve.
pub struct SolverScope {
    director: ScoreDirector,
    best_solution: Option<ShiftSchedule>,
    best_score: Option<HardSoftScore>,
    rng: StdRng,
    start_time: Option<Instant>,
    total_step_count: u64,
    moves_evaluated: u64,
    terminate_early_flag: Option<Arc<AtomicBool>>,
}

impl SolverScope {
    /// Creates a scope with an OS-seeded random source.
    pub fn new(director: ScoreDirector) -> Self {
        Self::build(director, StdRng::from_os_rng())
    }

    /// Creates a scope with a fixed seed for reproducible runs.
    pub fn with_seed(director: ScoreDirector, seed: u64) -> Self {
        Self::build(director, StdRng::seed_from_u64(seed))
    }

    fn build(director: ScoreDirector, rng: StdRng) -> Self {
        Self {
            director,
            best_solution: None,
            best_score: None,
            rng,
            start_time: None,
            total_step_count: 0,
            moves_evaluated: 0,
            terminate_early_flag: None,
        }
    }

    /// Marks the start of solving and resets the counters.
    pub fn start_solving(&mut self) {
        self.start_time = Some(Instant::now());
        self.total_step_count = 0;
        self.moves_evaluated = 0;
    }

    /// Time since `start_solving`, if solving has started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|t| t.elapsed())
    }

    pub fn director(&self) -> &ScoreDirector {
        &self.director
    }

    pub fn director_mut(&mut self) -> &mut ScoreDirector {
        &mut self.director
    }

    pub fn working_solution(&self) -> &ShiftSchedule {
        self.director.working_solution()
    }

    pub fn calculate_score(&self) -> HardSoftScore {
        self.director.calculate_score()
    }

    pub fn best_solution(&self) -> Option<&ShiftSchedule> {
        self.best_solution.as_ref()
    }

    pub fn best_score(&self) -> Option<HardSoftScore> {
        self.best_score
    }

    /// Snapshots the working solution as the new best if it improves on the
    /// best seen so far. Returns true on improvement.
    pub fn update_best_solution(&mut self) -> bool {
        let current = self.director.calculate_score();
        let improved = match self.best_score {
            None => true,
            Some(best) => current > best,
        };
        if improved {
            self.best_solution = Some(self.director.clone_working_solution());
            self.best_score = Some(current);
        }
        improved
    }

    /// The best solution seen, or the working solution if none was recorded.
    pub fn take_best_or_working_solution(self) -> ShiftSchedule {
        match self.best_solution {
            Some(best) => best,
            None => self.director.into_solution(),
        }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn increment_step_count(&mut self) -> u64 {
        self.total_step_count += 1;
        self.total_step_count
    }

    pub fn total_step_count(&self) -> u64 {
        self.total_step_count
    }

    pub fn record_move_evaluated(&mut self) {
        self.moves_evaluated += 1;
    }

    pub fn moves_evaluated(&self) -> u64 {
        self.moves_evaluated
    }

    pub fn set_terminate_early_flag(&mut self, flag: Arc<AtomicBool>) {
        self.terminate_early_flag = Some(flag);
    }

    /// True once external cancellation has been requested.
    pub fn is_terminate_early(&self) -> bool {
        self.terminate_early_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use shiftforge_core::{DemandSlot, Employee, EmployeeId, Station, StationId};
    use shiftforge_scoring::RuleWeights;

    use super::*;

    fn small_scope() -> SolverScope {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let schedule = ShiftSchedule::new(
            vec![Employee::new("E1", "S1").with_skill(StationId(0), 3)],
            vec![Station::new("S1", 1, "Register 1")],
            vec![DemandSlot::new("S1", date, nine, 1)],
            vec![],
        );
        let director = ScoreDirector::new(schedule, RuleWeights::default(), 6);
        SolverScope::with_seed(director, 42)
    }

    #[test]
    fn test_best_solution_tracking() {
        let mut scope = small_scope();
        assert!(scope.best_solution().is_none());

        assert!(scope.update_best_solution());
        let first_best = scope.best_score().unwrap();

        // Assigning the only record improves the score
        scope
            .director_mut()
            .assign(0, Some(EmployeeId(0)), Some(StationId(0)));
        assert!(scope.update_best_solution());
        assert!(scope.best_score().unwrap() > first_best);

        // Reverting does not overwrite the recorded best
        scope.director_mut().assign(0, None, Some(StationId(0)));
        assert!(!scope.update_best_solution());
        assert!(scope.best_score().unwrap() > first_best);
    }

    #[test]
    fn test_take_best_prefers_recorded_best() {
        let mut scope = small_scope();
        scope
            .director_mut()
            .assign(0, Some(EmployeeId(0)), Some(StationId(0)));
        scope.update_best_solution();
        let best_score = scope.best_score().unwrap();

        // Worsen the working solution after the snapshot
        scope.director_mut().assign(0, None, Some(StationId(0)));

        let solution = scope.take_best_or_working_solution();
        assert_eq!(solution.score, Some(best_score));
        assert_eq!(solution.assigned_count(), 1);
    }

    #[test]
    fn test_terminate_early_flag() {
        let mut scope = small_scope();
        assert!(!scope.is_terminate_early());

        let flag = Arc::new(AtomicBool::new(false));
        scope.set_terminate_early_flag(Arc::clone(&flag));
        assert!(!scope.is_terminate_early());

        flag.store(true, Ordering::SeqCst);
        assert!(scope.is_terminate_early());
    }
}
