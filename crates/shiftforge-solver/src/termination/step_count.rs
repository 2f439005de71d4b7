//! Step count termination.

use super::Termination;
use crate::scope::SolverScope;

/// Terminates after a total step count.
///
/// # Example
///
/// ```
/// use shiftforge_solver::termination::StepCountTermination;
///
/// // Terminate after 1000 steps
/// let term = StepCountTermination::new(1000);
/// ```
#[derive(Debug, Clone)]
pub struct StepCountTermination {
    limit: u64,
}

impl StepCountTermination {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }
}

impl Termination for StepCountTermination {
    fn is_terminated(&self, solver_scope: &SolverScope) -> bool {
        solver_scope.total_step_count() >= self.limit
    }
}
