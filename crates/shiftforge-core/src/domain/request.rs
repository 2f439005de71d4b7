//! Preference request problem fact.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::EmployeeId;

/// Kind of a preference request. All three kinds block assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    DayOff,
    PartialOff,
    PaidLeave,
}

/// An employee's request to not be scheduled.
///
/// A request without a time window covers the entire day.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, NaiveTime};
/// use shiftforge_core::{EmployeeId, PreferenceRequest, RequestKind};
///
/// let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
/// let full_day = PreferenceRequest::new(EmployeeId(0), date, RequestKind::DayOff);
///
/// let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
/// let nine_15 = NaiveTime::from_hms_opt(9, 15, 0).unwrap();
/// assert!(full_day.overlaps(nine, nine_15));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceRequest {
    /// The requesting employee.
    pub employee: EmployeeId,
    /// The date the request applies to.
    pub date: NaiveDate,
    /// Covered time window; `None` covers the full day.
    #[serde(default)]
    pub window: Option<(NaiveTime, NaiveTime)>,
    /// Request kind.
    pub kind: RequestKind,
    /// Request priority; higher is stronger. Defaults to 2.
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Free-form note from the employee.
    #[serde(default)]
    pub note: Option<String>,
}

fn default_priority() -> u8 {
    2
}

impl PreferenceRequest {
    /// Creates a full-day request with default priority.
    pub fn new(employee: EmployeeId, date: NaiveDate, kind: RequestKind) -> Self {
        Self {
            employee,
            date,
            window: None,
            kind,
            priority: default_priority(),
            note: None,
        }
    }

    /// Restricts the request to a time window.
    pub fn with_window(mut self, from: NaiveTime, to: NaiveTime) -> Self {
        self.window = Some((from, to));
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Returns true if a shift `[shift_start, shift_end]` on this request's
    /// date overlaps the requested window.
    ///
    /// Two ranges overlap iff `shift_end >= window_start` and
    /// `shift_start <= window_end`. A request without a window always
    /// overlaps.
    pub fn overlaps(&self, shift_start: NaiveTime, shift_end: NaiveTime) -> bool {
        self.overlaps_minutes(minute_of_day(shift_start), minute_of_day(shift_end))
    }

    /// Minute-of-day variant of [`overlaps`]. The last slot of the day ends
    /// at minute 1440, which a `NaiveTime` cannot carry.
    ///
    /// [`overlaps`]: PreferenceRequest::overlaps
    pub fn overlaps_minutes(&self, shift_start: u32, shift_end: u32) -> bool {
        match self.window {
            None => true,
            Some((from, to)) => {
                shift_end >= minute_of_day(from) && shift_start <= minute_of_day(to)
            }
        }
    }
}

fn minute_of_day(time: NaiveTime) -> u32 {
    use chrono::Timelike;
    time.hour() * 60 + time.minute()
}
