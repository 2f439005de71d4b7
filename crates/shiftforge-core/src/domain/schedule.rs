//! The planning solution.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::score::HardSoftScore;
use crate::slotgrid::GRID_MINUTES;

use super::{
    AssignmentRecord, DemandSlot, Employee, EmployeeId, PreferenceRequest, Station, StationId,
};

/// A complete scheduling problem and its working assignment.
///
/// Facts (`employees`, `stations`, `demand`, `requests`) are read-only during
/// a solve; `records` is the mutable planning state. `score` caches the score
/// of the current record set, `None` until first evaluation.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, NaiveTime};
/// use shiftforge_core::{DemandSlot, Employee, ShiftSchedule, Station};
///
/// let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
/// let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
///
/// let schedule = ShiftSchedule::new(
///     vec![Employee::new("E1", "S1")],
///     vec![Station::new("S1", 1, "Register 1")],
///     vec![DemandSlot::new("S1", date, nine, 2)],
///     vec![],
/// );
///
/// // One placeholder record per required unit
/// assert_eq!(schedule.records.len(), 2);
/// assert_eq!(schedule.assigned_count(), 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftSchedule {
    pub employees: Vec<Employee>,
    pub stations: Vec<Station>,
    pub demand: Vec<DemandSlot>,
    pub requests: Vec<PreferenceRequest>,
    pub records: Vec<AssignmentRecord>,
    #[serde(default)]
    pub score: Option<HardSoftScore>,
}

impl ShiftSchedule {
    /// Creates a schedule with placeholder records derived from demand.
    ///
    /// Each demand slot requiring `n` units yields `n` unassigned records.
    /// Stations are pre-seeded across the units of each (location, date,
    /// start) group in priority order (auxiliary first, then opening
    /// priority, then station number), so the initial station layout never
    /// double-claims a station; units beyond the location's station count
    /// stay stationless.
    pub fn new(
        employees: Vec<Employee>,
        stations: Vec<Station>,
        demand: Vec<DemandSlot>,
        requests: Vec<PreferenceRequest>,
    ) -> Self {
        let records = build_placeholders(&stations, &demand);
        Self {
            employees,
            stations,
            demand,
            requests,
            records,
            score: None,
        }
    }

    /// Creates a schedule from an explicit record set.
    ///
    /// Used when the collaborator supplies records directly, e.g. manual
    /// edits or a solved schedule under re-evaluation.
    pub fn with_records(
        employees: Vec<Employee>,
        stations: Vec<Station>,
        demand: Vec<DemandSlot>,
        requests: Vec<PreferenceRequest>,
        records: Vec<AssignmentRecord>,
    ) -> Self {
        Self {
            employees,
            stations,
            demand,
            requests,
            records,
            score: None,
        }
    }

    /// Returns the employee behind a handle.
    pub fn employee(&self, id: EmployeeId) -> &Employee {
        &self.employees[id.0]
    }

    /// Returns the station behind a handle.
    pub fn station(&self, id: StationId) -> &Station {
        &self.stations[id.0]
    }

    /// Records with both planning variables set.
    pub fn assigned_records(&self) -> impl Iterator<Item = &AssignmentRecord> {
        self.records.iter().filter(|r| r.is_assigned())
    }

    /// Number of fully assigned records.
    pub fn assigned_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_assigned()).count()
    }

    /// Station handles at a location, in assignment-priority order.
    pub fn stations_by_priority(&self, location: &str) -> Vec<StationId> {
        let mut ids: Vec<StationId> = self
            .stations
            .iter()
            .enumerate()
            .filter(|(_, s)| s.location == location)
            .map(|(i, _)| StationId(i))
            .collect();
        ids.sort_by_key(|id| self.stations[id.0].priority_key());
        ids
    }
}

fn build_placeholders(stations: &[Station], demand: &[DemandSlot]) -> Vec<AssignmentRecord> {
    // Priority-ordered station handles per location
    let mut by_location: HashMap<&str, Vec<StationId>> = HashMap::new();
    for (i, station) in stations.iter().enumerate() {
        by_location
            .entry(station.location.as_str())
            .or_default()
            .push(StationId(i));
    }
    for ids in by_location.values_mut() {
        ids.sort_by_key(|id| stations[id.0].priority_key());
    }

    // Units at the same (location, date, start) share the station sequence,
    // regardless of which demand slot they come from
    let mut used: HashMap<(&str, NaiveDate, NaiveTime), usize> = HashMap::new();
    let mut records = Vec::new();
    for slot in demand {
        for _ in 0..slot.required_units {
            let key = (slot.location.as_str(), slot.date, slot.start);
            let unit_index = used.entry(key).or_insert(0);
            let station = by_location
                .get(slot.location.as_str())
                .and_then(|ids| ids.get(*unit_index))
                .copied();
            *unit_index += 1;
            records.push(AssignmentRecord::placeholder(
                slot.location.clone(),
                slot.date,
                slot.start,
                station,
                GRID_MINUTES,
            ));
        }
    }
    records
}
