//! Planning domain for shift scheduling.
//!
//! Problem facts (employees, stations, demand slots, preference requests)
//! are immutable during a solve. `AssignmentRecord` is the mutable decision
//! variable, and `ShiftSchedule` bundles facts, records and score into one
//! planning solution.
//!
//! Records refer to facts through arena indices (`EmployeeId`, `StationId`)
//! into the solution's flat fact tables, never through back-pointers.

mod assignment;
mod demand;
mod employee;
mod request;
mod schedule;
mod station;

use serde::{Deserialize, Serialize};

pub use assignment::{AssignmentRecord, Provenance};
pub use demand::DemandSlot;
pub use employee::Employee;
pub use request::{PreferenceRequest, RequestKind};
pub use schedule::ShiftSchedule;
pub use station::{Station, StationCategory};

/// Stable handle into [`ShiftSchedule::employees`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub usize);

/// Stable handle into [`ShiftSchedule::stations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(pub usize);
