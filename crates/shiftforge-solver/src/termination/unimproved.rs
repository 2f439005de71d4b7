//! Termination conditions based on lack of improvement.

use std::cell::RefCell;
use std::fmt::Debug;
use std::time::{Duration, Instant};

use shiftforge_core::HardSoftScore;

use super::Termination;
use crate::scope::SolverScope;

/// Terminates if no improvement occurs for a number of steps.
///
/// Useful to stop early once the solver has plateaued and further steps
/// are unlikely to find better solutions.
pub struct UnimprovedStepCountTermination {
    limit: u64,
    state: RefCell<UnimprovedState>,
}

impl Debug for UnimprovedStepCountTermination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("UnimprovedStepCountTermination")
            .field("limit", &self.limit)
            .field("steps_since_improvement", &state.steps_since_improvement)
            .finish()
    }
}

#[derive(Default)]
struct UnimprovedState {
    last_best_score: Option<HardSoftScore>,
    steps_since_improvement: u64,
    last_checked_step: Option<u64>,
}

impl UnimprovedStepCountTermination {
    /// Creates a termination that stops after `limit` steps without
    /// improvement.
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            state: RefCell::new(UnimprovedState::default()),
        }
    }
}

impl Termination for UnimprovedStepCountTermination {
    fn is_terminated(&self, solver_scope: &SolverScope) -> bool {
        let mut state = self.state.borrow_mut();
        let current_step = solver_scope.total_step_count();

        // Avoid rechecking on the same step
        if state.last_checked_step == Some(current_step) {
            return state.steps_since_improvement >= self.limit;
        }
        state.last_checked_step = Some(current_step);

        match (state.last_best_score, solver_scope.best_score()) {
            (None, Some(score)) => {
                state.last_best_score = Some(score);
                state.steps_since_improvement = 0;
            }
            (Some(last), Some(current)) => {
                if current > last {
                    state.last_best_score = Some(current);
                    state.steps_since_improvement = 0;
                } else {
                    state.steps_since_improvement += 1;
                }
            }
            (Some(_), None) | (None, None) => {}
        }

        state.steps_since_improvement >= self.limit
    }
}

/// Terminates if no improvement occurs for a duration.
///
/// Time-boxes stagnation: solving continues as long as improvements keep
/// arriving, and stops once the best score has sat still for the limit.
pub struct UnimprovedTimeTermination {
    limit: Duration,
    state: RefCell<UnimprovedTimeState>,
}

impl Debug for UnimprovedTimeTermination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnimprovedTimeTermination")
            .field("limit", &self.limit)
            .finish()
    }
}

#[derive(Default)]
struct UnimprovedTimeState {
    last_best_score: Option<HardSoftScore>,
    last_improvement_time: Option<Instant>,
}

impl UnimprovedTimeTermination {
    /// Creates a termination that stops after `limit` time without
    /// improvement.
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            state: RefCell::new(UnimprovedTimeState::default()),
        }
    }

    /// Creates a termination with limit in milliseconds.
    pub fn millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Creates a termination with limit in seconds.
    pub fn seconds(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }
}

impl Termination for UnimprovedTimeTermination {
    fn is_terminated(&self, solver_scope: &SolverScope) -> bool {
        let mut state = self.state.borrow_mut();
        let now = Instant::now();

        match (state.last_best_score, solver_scope.best_score()) {
            (None, Some(score)) => {
                state.last_best_score = Some(score);
                state.last_improvement_time = Some(now);
                false
            }
            (Some(last), Some(current)) => {
                if current > last {
                    state.last_best_score = Some(current);
                    state.last_improvement_time = Some(now);
                    false
                } else {
                    state
                        .last_improvement_time
                        .is_some_and(|t| now.duration_since(t) >= self.limit)
                }
            }
            (Some(_), None) | (None, None) => false,
        }
    }
}
