//! ShiftForge Solver Engine
//!
//! This crate drives the scheduling pipeline:
//! - Construction heuristic (greedy placement with optional warm starts)
//! - Local search over reassign and swap moves
//! - Termination conditions
//! - Job management for concurrent solves
//!
//! [`Solver`] runs a single solve end to end. [`SolverJobManager`] tracks
//! many solves keyed by problem id, with status polling, best-solution
//! streaming, and early termination.

pub mod construction;
pub mod localsearch;
pub mod manager;
pub mod moves;
pub mod scope;
pub mod solver;
pub mod termination;

pub use construction::ConstructionHeuristic;
pub use localsearch::LocalSearch;
pub use manager::{JobError, JobStatus, SolvePhase, SolverJobManager};
pub use moves::Move;
pub use scope::SolverScope;
pub use solver::{BestSolutionCallback, SolveResult, SolveStats, Solver};
pub use termination::{
    ExternalTermination, OrTermination, StepCountTermination, Termination, TimeTermination,
    UnimprovedStepCountTermination, UnimprovedTimeTermination,
};
