//! Assignment record - the mutable decision variable.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use super::{EmployeeId, StationId};

/// Origin of an assignment record.
///
/// Manually edited records are pinned: the construction heuristic and local
/// search never modify them, but the score engine still evaluates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    System,
    Manual,
}

impl Provenance {
    /// Returns true if the optimizer must not modify the record.
    pub fn is_pinned(self) -> bool {
        matches!(self, Provenance::Manual)
    }
}

/// One slot-sized staffing decision.
///
/// A record exists per (demand slot, required unit index); a demand slot
/// requiring 3 units yields 3 records. `employee` and `station` are the
/// planning variables; `None` means unassigned. `end` is always
/// `start + granularity` (the 23:45 slot wraps to a stored end of 00:00,
/// matching how downstream persistence represents the last slot of a day;
/// score logic works in minutes-of-day and is unaffected).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// Location code.
    pub location: String,
    /// Calendar date.
    pub date: NaiveDate,
    /// Slot start time, grid-aligned.
    pub start: NaiveTime,
    /// Slot end time.
    pub end: NaiveTime,
    /// Assigned employee, if any.
    pub employee: Option<EmployeeId>,
    /// Assigned station, if any.
    pub station: Option<StationId>,
    /// Who produced this record.
    pub provenance: Provenance,
}

impl AssignmentRecord {
    /// Creates an unassigned system record for one slot.
    pub fn placeholder(
        location: impl Into<String>,
        date: NaiveDate,
        start: NaiveTime,
        station: Option<StationId>,
        granularity: u32,
    ) -> Self {
        let end_minutes = (start.hour() * 60 + start.minute() + granularity) % (24 * 60);
        let end = NaiveTime::from_hms_opt(end_minutes / 60, end_minutes % 60, 0)
            .unwrap_or(NaiveTime::MIN);
        Self {
            location: location.into(),
            date,
            start,
            end,
            employee: None,
            station,
            provenance: Provenance::System,
        }
    }

    /// Returns true if both planning variables are set.
    pub fn is_assigned(&self) -> bool {
        self.employee.is_some() && self.station.is_some()
    }

    /// Slot start in minutes of day.
    pub fn start_minutes(&self) -> u32 {
        self.start.hour() * 60 + self.start.minute()
    }

    /// Slot end in minutes of day, without midnight wrap: the 23:45 slot
    /// ends at 1440.
    pub fn end_minutes(&self, granularity: u32) -> u32 {
        self.start_minutes() + granularity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_placeholder_end() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let rec = AssignmentRecord::placeholder("S1", date, t(9, 0), None, 15);
        assert_eq!(rec.end, t(9, 15));
        assert_eq!(rec.provenance, Provenance::System);
        assert!(!rec.is_assigned());
    }

    #[test]
    fn test_last_slot_wraps_stored_end_only() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let rec = AssignmentRecord::placeholder("S1", date, t(23, 45), None, 15);
        assert_eq!(rec.end, t(0, 0));
        assert_eq!(rec.end_minutes(15), 1440);
    }
}
