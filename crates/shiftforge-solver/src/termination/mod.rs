//! Termination conditions for the solving loop.

mod composite;
mod external;
mod step_count;
mod time;
mod unimproved;

use std::fmt::Debug;

use crate::scope::SolverScope;

pub use composite::OrTermination;
pub use external::ExternalTermination;
pub use step_count::StepCountTermination;
pub use time::TimeTermination;
pub use unimproved::{UnimprovedStepCountTermination, UnimprovedTimeTermination};

/// Decides when to stop solving.
///
/// Checked at step boundaries; an in-progress move evaluation is never
/// interrupted.
pub trait Termination: Send + Debug {
    /// Returns true if solving should terminate.
    fn is_terminated(&self, solver_scope: &SolverScope) -> bool;
}

// A missing condition never terminates, so optional conditions compose
// directly into OrTermination tuples.
impl<T: Termination> Termination for Option<T> {
    fn is_terminated(&self, solver_scope: &SolverScope) -> bool {
        self.as_ref().is_some_and(|t| t.is_terminated(solver_scope))
    }
}
