//! Employee problem fact.

use serde::{Deserialize, Serialize};

use super::StationId;

/// A worker who can be assigned to stations.
///
/// Immutable during a solve. Skill levels are kept sorted by station id so
/// lookups are a binary search.
///
/// # Examples
///
/// ```
/// use shiftforge_core::{Employee, StationId};
///
/// let employee = Employee::new("E042", "S001")
///     .with_daily_cap(480)
///     .with_skill(StationId(0), 3)
///     .with_skill(StationId(2), 1);
///
/// assert_eq!(employee.skill_level(StationId(0)), Some(3));
/// assert_eq!(employee.skill_level(StationId(1)), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique employee code.
    pub code: String,
    /// Home location code.
    pub location: String,
    /// Maximum work minutes per day; `None` means uncapped.
    #[serde(default)]
    pub max_minutes_per_day: Option<u32>,
    /// Maximum distinct work days in the planning period; `None` means uncapped.
    #[serde(default)]
    pub max_days_per_period: Option<u32>,
    /// Skill levels per station, sorted by station id.
    #[serde(default)]
    skills: Vec<(StationId, u8)>,
}

impl Employee {
    /// Creates an employee with no caps and no skills.
    pub fn new(code: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            location: location.into(),
            max_minutes_per_day: None,
            max_days_per_period: None,
            skills: Vec::new(),
        }
    }

    /// Sets the daily work-minutes cap.
    pub fn with_daily_cap(mut self, minutes: u32) -> Self {
        self.max_minutes_per_day = Some(minutes);
        self
    }

    /// Sets the per-period work-days cap.
    pub fn with_period_cap(mut self, days: u32) -> Self {
        self.max_days_per_period = Some(days);
        self
    }

    /// Records a skill level for a station, replacing any previous level.
    pub fn with_skill(mut self, station: StationId, level: u8) -> Self {
        match self.skills.binary_search_by_key(&station, |&(s, _)| s) {
            Ok(pos) => self.skills[pos].1 = level,
            Err(pos) => self.skills.insert(pos, (station, level)),
        }
        self
    }

    /// Returns the recorded skill level for a station, if any.
    pub fn skill_level(&self, station: StationId) -> Option<u8> {
        self.skills
            .binary_search_by_key(&station, |&(s, _)| s)
            .ok()
            .map(|pos| self.skills[pos].1)
    }

    /// Returns all recorded skills, sorted by station id.
    pub fn skills(&self) -> &[(StationId, u8)] {
        &self.skills
    }
}
