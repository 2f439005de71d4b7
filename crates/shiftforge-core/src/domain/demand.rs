//! Demand slot problem fact.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Required staffing for one grid slot.
///
/// Produced by the slot grid codec from interval records; `start` is always
/// aligned to the grid granularity. After aggregation at most one slot
/// exists per `(location, sub_area, date, start, task)` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandSlot {
    /// Location code.
    pub location: String,
    /// Optional sub-area (department) within the location.
    #[serde(default)]
    pub sub_area: Option<String>,
    /// Calendar date.
    pub date: NaiveDate,
    /// Slot start time, grid-aligned.
    pub start: NaiveTime,
    /// Number of workers required in this slot.
    pub required_units: u32,
    /// Optional task code when the demand is task-specific.
    #[serde(default)]
    pub task: Option<String>,
}

impl DemandSlot {
    /// Creates a demand slot with no sub-area or task.
    pub fn new(
        location: impl Into<String>,
        date: NaiveDate,
        start: NaiveTime,
        required_units: u32,
    ) -> Self {
        Self {
            location: location.into(),
            sub_area: None,
            date,
            start,
            required_units,
            task: None,
        }
    }

    /// Sets the sub-area.
    pub fn with_sub_area(mut self, sub_area: impl Into<String>) -> Self {
        self.sub_area = Some(sub_area.into());
        self
    }

    /// Sets the task code.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}
