//! Incremental constraint scoring for ShiftForge.
//!
//! This crate evaluates shift schedules against the scheduling rule
//! catalog:
//! - `RuleWeights` and `ConstraintWeightOverrides` for per-rule weights
//! - `ScoreDirector`, the incremental evaluator moves are scored through
//! - `analyze`, the full-rescan breakdown used for score explanation
//!
//! The director keeps per-slot and per-employee-day tallies so scoring a
//! record change costs a few hash lookups; `analyze` recomputes everything
//! from scratch and reports per-rule matches, which also makes it the
//! reference the director's bookkeeping is checked against in tests.

pub mod analysis;
pub mod director;
pub mod weights;

pub use analysis::{analyze, ConstraintAnalysis, ScoreAnalysis};
pub use director::ScoreDirector;
pub use weights::{
    ConstraintWeightOverrides, RuleWeights, CONSECUTIVE_DAYS_CAP, DAILY_MINUTES_CAP,
    DAY_OFF_OVERLAP, EMPLOYEE_SLOT_CONFLICT, FRAGMENTED_BLOCKS, PERIOD_DAYS_CAP, RULE_NAMES,
    SKILL_FLOOR, STATION_SLOT_CONFLICT, UNMET_DEMAND, WORKLOAD_BALANCE,
};
