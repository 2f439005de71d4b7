//! Error types for ShiftForge core.

use thiserror::Error;

/// Errors raised while preparing or normalizing a scheduling problem.
#[derive(Debug, Error)]
pub enum ShiftForgeError {
    /// An interval's bounds are not aligned to the slot grid.
    #[error("Time not aligned to {granularity}-minute grid: {time}")]
    Unaligned {
        time: chrono::NaiveTime,
        granularity: u32,
    },

    /// An interval's bounds are malformed (empty or inverted).
    #[error("Invalid interval range: from {from} to {to}")]
    InvalidRange {
        from: chrono::NaiveTime,
        to: chrono::NaiveTime,
    },

    /// A slot index falls outside the day grid.
    #[error("Slot index out of range: {index} (valid 0..{slots_per_day})")]
    OutOfRange { index: u32, slots_per_day: u32 },

    /// The grid granularity does not divide a day evenly.
    #[error("Invalid grid granularity: {0} minutes")]
    InvalidGranularity(u32),

    /// A domain reference points at a missing fact.
    #[error("Domain model error: {0}")]
    DomainModel(String),
}

/// Convenience result alias for core operations.
pub type Result<T> = std::result::Result<T, ShiftForgeError>;
