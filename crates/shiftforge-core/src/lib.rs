//! ShiftForge Core - domain model and slot grid codec for shift scheduling
//!
//! This crate provides the building blocks of the optimizer:
//! - `HardSoftScore` for representing solution quality
//! - Problem facts (employees, stations, demand, preference requests)
//! - `AssignmentRecord` and `ShiftSchedule`, the mutable planning state
//! - The slot grid codec that converts interval demand into a fixed
//!   15-minute grid and back

pub mod domain;
pub mod error;
pub mod score;
pub mod slotgrid;

pub use domain::{
    AssignmentRecord, DemandSlot, Employee, EmployeeId, PreferenceRequest, Provenance,
    RequestKind, ShiftSchedule, Station, StationCategory, StationId,
};
pub use error::{Result, ShiftForgeError};
pub use score::HardSoftScore;
pub use slotgrid::{dedup_demand_rows, DemandInterval, Rounding, SlotGrid, GRID_MINUTES};
