//! Station problem fact.

use serde::{Deserialize, Serialize};

/// Category of a station, used for assignment-priority ordering.
///
/// Auxiliary stations (e.g. self-checkout supervision, service counters)
/// are staffed before standard registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationCategory {
    Auxiliary,
    Standard,
}

impl StationCategory {
    /// Rank for priority ordering; auxiliary stations come first.
    pub fn rank(self) -> u8 {
        match self {
            StationCategory::Auxiliary => 0,
            StationCategory::Standard => 1,
        }
    }
}

/// A staffable unit (register or task) at a location.
///
/// Identified by `(location, number)`. Immutable during a solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    /// Location code this station belongs to.
    pub location: String,
    /// Station number, unique within the location.
    pub number: u16,
    /// Display name.
    pub name: String,
    /// Abbreviated display name.
    pub short_name: String,
    /// Category used for assignment-priority ordering.
    pub category: StationCategory,
    /// Opening priority rank; lower ranks are opened first.
    #[serde(default = "default_open_priority")]
    pub open_priority: u8,
    /// Whether this station may be opened automatically by the optimizer.
    #[serde(default = "default_auto_open")]
    pub auto_open: bool,
}

fn default_open_priority() -> u8 {
    99
}

fn default_auto_open() -> bool {
    true
}

impl Station {
    /// Creates a standard station with default priority.
    pub fn new(location: impl Into<String>, number: u16, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            location: location.into(),
            number,
            short_name: name.clone(),
            name,
            category: StationCategory::Standard,
            open_priority: default_open_priority(),
            auto_open: default_auto_open(),
        }
    }

    /// Sets the category.
    pub fn with_category(mut self, category: StationCategory) -> Self {
        self.category = category;
        self
    }

    /// Sets the opening priority rank.
    pub fn with_open_priority(mut self, priority: u8) -> Self {
        self.open_priority = priority;
        self
    }

    /// Sets the abbreviated display name.
    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = short_name.into();
        self
    }

    /// Excludes this station from automatic opening.
    pub fn without_auto_open(mut self) -> Self {
        self.auto_open = false;
        self
    }

    /// Sort key for assignment-priority ordering: auxiliary before standard,
    /// then opening priority, then station number.
    pub fn priority_key(&self) -> (u8, u8, u16) {
        (self.category.rank(), self.open_priority, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        let aux = Station::new("S1", 9, "Service").with_category(StationCategory::Auxiliary);
        let reg1 = Station::new("S1", 1, "Register 1").with_open_priority(1);
        let reg2 = Station::new("S1", 2, "Register 2").with_open_priority(1);
        let reg3 = Station::new("S1", 3, "Register 3");

        let mut stations = vec![reg3.clone(), reg2.clone(), aux.clone(), reg1.clone()];
        stations.sort_by_key(|s| s.priority_key());

        assert_eq!(stations[0].number, 9);
        assert_eq!(stations[1].number, 1);
        assert_eq!(stations[2].number, 2);
        assert_eq!(stations[3].number, 3);
    }
}
