//! Incremental score director.
//!
//! Owns the working [`ShiftSchedule`] and keeps its score current as
//! records change. A record mutation costs a handful of hash lookups
//! instead of a full rescan: the director maintains per-slot and
//! per-employee-day tallies and adjusts the running score by the
//! difference each change makes, so move evaluation is independent of the
//! total record count. Day-run and slot-run rules touch at most one
//! employee's neighborhood per change.
//!
//! The mutation protocol follows retract/reinsert: call
//! [`before_record_changed`], mutate the record, then
//! [`after_record_changed`]. [`assign`] bundles all three.
//!
//! [`before_record_changed`]: ScoreDirector::before_record_changed
//! [`after_record_changed`]: ScoreDirector::after_record_changed
//! [`assign`]: ScoreDirector::assign

use std::collections::HashMap;

use chrono::Datelike;
use shiftforge_core::{EmployeeId, HardSoftScore, ShiftSchedule, StationId, GRID_MINUTES};
use smallvec::SmallVec;

use crate::analysis::{self, ScoreAnalysis};
use crate::weights::RuleWeights;

/// Days from the common era; cheap to step and compare.
type DayNum = i32;

/// Immutable per-record lookup data, cached once per solve.
#[derive(Debug, Clone, Copy)]
struct RecordKey {
    location: u32,
    day: DayNum,
    start: u32,
    end: u32,
}

/// Score director over one working schedule.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, NaiveTime};
/// use shiftforge_core::{DemandSlot, Employee, EmployeeId, ShiftSchedule, Station, StationId};
/// use shiftforge_scoring::{RuleWeights, ScoreDirector};
///
/// let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
/// let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
/// let schedule = ShiftSchedule::new(
///     vec![Employee::new("E1", "S1").with_skill(StationId(0), 3)],
///     vec![Station::new("S1", 1, "Register 1")],
///     vec![DemandSlot::new("S1", date, nine, 1)],
///     vec![],
/// );
///
/// let mut director = ScoreDirector::new(schedule, RuleWeights::default(), 6);
/// assert_eq!(director.calculate_score().soft(), -100);
///
/// director.assign(0, Some(EmployeeId(0)), Some(StationId(0)));
/// assert_eq!(director.calculate_score().soft(), -5);
/// ```
#[derive(Debug)]
pub struct ScoreDirector {
    schedule: ShiftSchedule,
    weights: RuleWeights,
    consecutive_days_limit: u32,
    score: HardSoftScore,

    // Rebuilt by reset(), constant while solving
    record_keys: Vec<RecordKey>,
    demand_required: HashMap<(u32, DayNum, u32), SmallVec<[u32; 2]>>,
    requests_by_day: HashMap<(EmployeeId, DayNum), SmallVec<[usize; 2]>>,
    daily_cap_slots: Vec<Option<u32>>,
    period_cap_days: Vec<Option<u32>>,

    // Live tallies, adjusted on every record change
    employee_slot: HashMap<(DayNum, u32, EmployeeId), u32>,
    station_slot: HashMap<(DayNum, u32, StationId), u32>,
    coverage: HashMap<(u32, DayNum, u32), u32>,
    employee_day: HashMap<(EmployeeId, DayNum), u32>,
    days_worked: HashMap<EmployeeId, u32>,
    day_runs: HashMap<(EmployeeId, DayNum), u32>,
}

impl ScoreDirector {
    /// Creates a director and scores the given schedule.
    pub fn new(schedule: ShiftSchedule, weights: RuleWeights, consecutive_days_limit: u32) -> Self {
        let mut director = Self {
            schedule,
            weights,
            consecutive_days_limit,
            score: HardSoftScore::ZERO,
            record_keys: Vec::new(),
            demand_required: HashMap::new(),
            requests_by_day: HashMap::new(),
            daily_cap_slots: Vec::new(),
            period_cap_days: Vec::new(),
            employee_slot: HashMap::new(),
            station_slot: HashMap::new(),
            coverage: HashMap::new(),
            employee_day: HashMap::new(),
            days_worked: HashMap::new(),
            day_runs: HashMap::new(),
        };
        director.reset();
        director
    }

    /// Returns a reference to the working solution.
    pub fn working_solution(&self) -> &ShiftSchedule {
        &self.schedule
    }

    /// Returns the current score.
    pub fn calculate_score(&self) -> HardSoftScore {
        self.score
    }

    /// Effective rule weights.
    pub fn weights(&self) -> &RuleWeights {
        &self.weights
    }

    /// Configured consecutive-days limit.
    pub fn consecutive_days_limit(&self) -> u32 {
        self.consecutive_days_limit
    }

    /// Clones the working solution with its score attached.
    pub fn clone_working_solution(&self) -> ShiftSchedule {
        let mut solution = self.schedule.clone();
        solution.score = Some(self.score);
        solution
    }

    /// Consumes the director, yielding the working solution with its score.
    pub fn into_solution(mut self) -> ShiftSchedule {
        self.schedule.score = Some(self.score);
        self.schedule
    }

    /// Full per-rule breakdown of the current solution.
    pub fn analyze(&self) -> ScoreAnalysis {
        analysis::analyze(&self.schedule, &self.weights, self.consecutive_days_limit)
    }

    /// Sets both planning variables of one record, keeping the score current.
    pub fn assign(
        &mut self,
        index: usize,
        employee: Option<EmployeeId>,
        station: Option<StationId>,
    ) {
        self.before_record_changed(index);
        let record = &mut self.schedule.records[index];
        record.employee = employee;
        record.station = station;
        self.after_record_changed(index);
    }

    /// Retracts a record's score contributions ahead of a mutation.
    pub fn before_record_changed(&mut self, index: usize) {
        self.retract_record(index);
    }

    /// Reinserts a record's score contributions after a mutation.
    pub fn after_record_changed(&mut self, index: usize) {
        self.insert_record(index);
    }

    /// Rebuilds every tally and the score from the schedule as it stands.
    pub fn reset(&mut self) {
        self.employee_slot.clear();
        self.station_slot.clear();
        self.coverage.clear();
        self.employee_day.clear();
        self.days_worked.clear();
        self.day_runs.clear();
        self.score = HardSoftScore::ZERO;

        let mut location_ids: HashMap<String, u32> = HashMap::new();
        let mut demand_required: HashMap<(u32, DayNum, u32), SmallVec<[u32; 2]>> = HashMap::new();
        for slot in &self.schedule.demand {
            let next = location_ids.len() as u32;
            let location = *location_ids.entry(slot.location.clone()).or_insert(next);
            let key = (location, slot.date.num_days_from_ce(), minute_of(slot.start));
            demand_required.entry(key).or_default().push(slot.required_units);
        }

        let mut record_keys = Vec::with_capacity(self.schedule.records.len());
        for record in &self.schedule.records {
            let next = location_ids.len() as u32;
            let location = *location_ids.entry(record.location.clone()).or_insert(next);
            record_keys.push(RecordKey {
                location,
                day: record.date.num_days_from_ce(),
                start: record.start_minutes(),
                end: record.end_minutes(GRID_MINUTES),
            });
        }
        self.record_keys = record_keys;

        let mut requests_by_day: HashMap<(EmployeeId, DayNum), SmallVec<[usize; 2]>> =
            HashMap::new();
        for (index, request) in self.schedule.requests.iter().enumerate() {
            requests_by_day
                .entry((request.employee, request.date.num_days_from_ce()))
                .or_default()
                .push(index);
        }
        self.requests_by_day = requests_by_day;

        self.daily_cap_slots = self
            .schedule
            .employees
            .iter()
            .map(|e| e.max_minutes_per_day.map(|cap| cap / GRID_MINUTES))
            .collect();
        self.period_cap_days = self
            .schedule
            .employees
            .iter()
            .map(|e| e.max_days_per_period)
            .collect();

        // Baseline: with nothing assigned every demand unit is unmet
        let total_required: i64 = demand_required
            .values()
            .flat_map(|units| units.iter())
            .map(|&r| i64::from(r))
            .sum();
        self.demand_required = demand_required;
        self.score -= self.weights.unmet_demand * total_required;

        for index in 0..self.schedule.records.len() {
            self.insert_record(index);
        }
    }

    fn insert_record(&mut self, index: usize) {
        let (employee, station) = {
            let record = &self.schedule.records[index];
            (record.employee, record.station)
        };
        let Some(employee) = employee else {
            return;
        };
        let key = self.record_keys[index];

        // Employee/timeslot conflict: every prior holder forms one new pair
        let slot_count = {
            let n = self
                .employee_slot
                .entry((key.day, key.start, employee))
                .or_insert(0);
            *n += 1;
            *n
        };
        self.score -= self.weights.employee_slot_conflict * i64::from(slot_count - 1);

        if let Some(station) = station {
            let station_count = {
                let n = self
                    .station_slot
                    .entry((key.day, key.start, station))
                    .or_insert(0);
                *n += 1;
                *n
            };
            self.score -= self.weights.station_slot_conflict * i64::from(station_count - 1);

            if !self.meets_skill_floor(employee, station) {
                self.score -= self.weights.skill_floor;
            }

            // Demand coverage: units repaired are those still short before
            // this record arrived
            if let Some(required) = self.demand_required.get(&(key.location, key.day, key.start)) {
                let covered = self
                    .coverage
                    .entry((key.location, key.day, key.start))
                    .or_insert(0);
                let repaired = required.iter().filter(|&&r| r > *covered).count() as i64;
                *covered += 1;
                self.score += self.weights.unmet_demand * repaired;
            }
        }

        if self.overlaps_request(employee, key.day, key.start, key.end) {
            self.score -= self.weights.day_off_overlap;
        }

        let (day_before, day_after) = {
            let n = self.employee_day.entry((employee, key.day)).or_insert(0);
            let before = *n;
            *n += 1;
            (before, before + 1)
        };

        if let Some(cap) = self.daily_cap_slots[employee.0] {
            let grown = i64::from(day_after.saturating_sub(cap)) - i64::from(day_before.saturating_sub(cap));
            self.score -= self.weights.daily_minutes_cap * grown;
        }

        let grown = square(day_after) - square(day_before);
        self.score -= self.weights.workload_balance * grown;

        if day_before == 0 {
            self.day_started(employee, key.day);
        }
        if slot_count == 1 {
            self.slot_presence_added(employee, key.day, key.start);
        }
    }

    fn retract_record(&mut self, index: usize) {
        let (employee, station) = {
            let record = &self.schedule.records[index];
            (record.employee, record.station)
        };
        let Some(employee) = employee else {
            return;
        };
        let key = self.record_keys[index];

        if let Some(n) = self.employee_slot.get_mut(&(key.day, key.start, employee)) {
            *n -= 1;
            let remaining = *n;
            self.score += self.weights.employee_slot_conflict * i64::from(remaining);
            if remaining == 0 {
                self.employee_slot.remove(&(key.day, key.start, employee));
                self.slot_presence_removed(employee, key.day, key.start);
            }
        }

        if let Some(station) = station {
            if let Some(n) = self.station_slot.get_mut(&(key.day, key.start, station)) {
                *n -= 1;
                let remaining = *n;
                self.score += self.weights.station_slot_conflict * i64::from(remaining);
                if remaining == 0 {
                    self.station_slot.remove(&(key.day, key.start, station));
                }
            }

            if !self.meets_skill_floor(employee, station) {
                self.score += self.weights.skill_floor;
            }

            if let Some(required) = self.demand_required.get(&(key.location, key.day, key.start)) {
                if let Some(covered) = self.coverage.get_mut(&(key.location, key.day, key.start)) {
                    *covered -= 1;
                    let broken = required.iter().filter(|&&r| r > *covered).count() as i64;
                    self.score -= self.weights.unmet_demand * broken;
                }
            }
        }

        if self.overlaps_request(employee, key.day, key.start, key.end) {
            self.score += self.weights.day_off_overlap;
        }

        if let Some(n) = self.employee_day.get_mut(&(employee, key.day)) {
            let before = *n;
            *n -= 1;
            let after = before - 1;

            if let Some(cap) = self.daily_cap_slots[employee.0] {
                let shrunk =
                    i64::from(after.saturating_sub(cap)) - i64::from(before.saturating_sub(cap));
                self.score -= self.weights.daily_minutes_cap * shrunk;
            }

            let shrunk = square(after) - square(before);
            self.score -= self.weights.workload_balance * shrunk;

            if after == 0 {
                self.employee_day.remove(&(employee, key.day));
                self.day_ended(employee, key.day);
            }
        }
    }

    /// The employee now works `day`: period-days and consecutive-run deltas.
    fn day_started(&mut self, employee: EmployeeId, day: DayNum) {
        let worked = {
            let n = self.days_worked.entry(employee).or_insert(0);
            *n += 1;
            *n
        };
        if let Some(cap) = self.period_cap_days[employee.0] {
            let grown = i64::from(worked.saturating_sub(cap)) - i64::from((worked - 1).saturating_sub(cap));
            self.score -= self.weights.period_days_cap * grown;
        }

        let left = self.run_length_before(employee, day);
        let right = self.run_length_after(employee, day);
        let limit = i64::from(self.consecutive_days_limit);
        let grown = over(left + 1 + right, limit) - over(left, limit) - over(right, limit);
        self.score -= self.weights.consecutive_days_cap * grown;
    }

    /// The employee no longer works `day`; its entry is already gone.
    fn day_ended(&mut self, employee: EmployeeId, day: DayNum) {
        if let Some(n) = self.days_worked.get_mut(&employee) {
            let before = *n;
            *n -= 1;
            if *n == 0 {
                self.days_worked.remove(&employee);
            }
            if let Some(cap) = self.period_cap_days[employee.0] {
                let shrunk =
                    i64::from((before - 1).saturating_sub(cap)) - i64::from(before.saturating_sub(cap));
                self.score -= self.weights.period_days_cap * shrunk;
            }
        }

        let left = self.run_length_before(employee, day);
        let right = self.run_length_after(employee, day);
        let limit = i64::from(self.consecutive_days_limit);
        let shrunk = over(left, limit) + over(right, limit) - over(left + 1 + right, limit);
        self.score -= self.weights.consecutive_days_cap * shrunk;
    }

    /// First record at this (employee, day, start): slot-run deltas.
    fn slot_presence_added(&mut self, employee: EmployeeId, day: DayNum, start: u32) {
        let left = start >= GRID_MINUTES
            && self
                .employee_slot
                .contains_key(&(day, start - GRID_MINUTES, employee));
        let right = self
            .employee_slot
            .contains_key(&(day, start + GRID_MINUTES, employee));

        let runs = self.day_runs.entry((employee, day)).or_insert(0);
        let before = *runs;
        let after = match (left, right) {
            (true, true) => before - 1,
            (true, false) | (false, true) => before,
            (false, false) => before + 1,
        };
        *runs = after;
        let grown = gaps(after) - gaps(before);
        self.score -= self.weights.fragmented_blocks * grown;
    }

    /// Last record left this (employee, day, start); its entry is gone.
    fn slot_presence_removed(&mut self, employee: EmployeeId, day: DayNum, start: u32) {
        let left = start >= GRID_MINUTES
            && self
                .employee_slot
                .contains_key(&(day, start - GRID_MINUTES, employee));
        let right = self
            .employee_slot
            .contains_key(&(day, start + GRID_MINUTES, employee));

        if let Some(runs) = self.day_runs.get_mut(&(employee, day)) {
            let before = *runs;
            let after = match (left, right) {
                (true, true) => before + 1,
                (true, false) | (false, true) => before,
                (false, false) => before - 1,
            };
            *runs = after;
            if after == 0 {
                self.day_runs.remove(&(employee, day));
            }
            let shrunk = gaps(after) - gaps(before);
            self.score -= self.weights.fragmented_blocks * shrunk;
        }
    }

    fn run_length_before(&self, employee: EmployeeId, day: DayNum) -> i64 {
        let mut length = 0;
        let mut cursor = day - 1;
        while self.employee_day.contains_key(&(employee, cursor)) {
            length += 1;
            cursor -= 1;
        }
        length
    }

    fn run_length_after(&self, employee: EmployeeId, day: DayNum) -> i64 {
        let mut length = 0;
        let mut cursor = day + 1;
        while self.employee_day.contains_key(&(employee, cursor)) {
            length += 1;
            cursor += 1;
        }
        length
    }

    fn meets_skill_floor(&self, employee: EmployeeId, station: StationId) -> bool {
        self.schedule
            .employee(employee)
            .skill_level(station)
            .is_some_and(|level| level >= 2)
    }

    fn overlaps_request(&self, employee: EmployeeId, day: DayNum, start: u32, end: u32) -> bool {
        let Some(indexes) = self.requests_by_day.get(&(employee, day)) else {
            return false;
        };
        indexes
            .iter()
            .any(|&i| self.schedule.requests[i].overlaps_minutes(start, end))
    }
}

fn minute_of(time: chrono::NaiveTime) -> u32 {
    use chrono::Timelike;
    time.hour() * 60 + time.minute()
}

fn square(n: u32) -> i64 {
    let n = i64::from(n);
    n * n
}

fn over(length: i64, limit: i64) -> i64 {
    (length - limit).max(0)
}

fn gaps(runs: u32) -> i64 {
    i64::from(runs.saturating_sub(1))
}
