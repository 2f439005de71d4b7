//! Score types for solution quality.

mod hard_soft;

pub use hard_soft::HardSoftScore;
