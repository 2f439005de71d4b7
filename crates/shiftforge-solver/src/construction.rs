//! Construction heuristic.
//!
//! Builds a starting solution greedily: records are visited in a
//! deterministic order (date, start time, station priority) and each gets
//! the best legal employee, preferring employees still under their caps
//! and balancing load by cumulative assigned minutes. Records with no
//! legal employee stay unassigned; an unassigned record only costs unmet
//! demand, never a hard violation.
//!
//! With a prior-period solution supplied, matching (employee, station,
//! weekday, start time) pairings are seeded first so the schedule leans
//! toward continuity before the greedy pass fills the rest.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use tracing::info;

use shiftforge_core::{AssignmentRecord, EmployeeId, ShiftSchedule, StationId, GRID_MINUTES};

use crate::scope::SolverScope;

/// Greedy initial-solution builder.
#[derive(Debug, Default)]
pub struct ConstructionHeuristic {
    prior: Vec<AssignmentRecord>,
}

impl ConstructionHeuristic {
    pub fn new() -> Self {
        Self { prior: Vec::new() }
    }

    /// Supplies a prior-period assignment list for warm starting.
    ///
    /// Prior records must reference this problem's employee and station
    /// tables; records with either variable unset are ignored.
    pub fn with_prior(mut self, prior: Vec<AssignmentRecord>) -> Self {
        self.prior = prior;
        self
    }

    /// Runs the heuristic against the scope's working solution.
    pub fn run(&self, scope: &mut SolverScope) {
        let phase_start = Instant::now();
        info!(event = "phase_start", phase = "Construction Heuristic", phase_index = 0);

        let mut tally = WorkTally::from_schedule(scope.working_solution());

        let seeded = if self.prior.is_empty() {
            0
        } else {
            self.seed_from_prior(scope, &mut tally)
        };

        let order = visit_order(scope.working_solution());
        let mut assigned = 0usize;
        let mut skipped = 0usize;

        for index in order {
            if scope.is_terminate_early() {
                break;
            }
            let (date, start, station, employee_count) = {
                let schedule = scope.working_solution();
                let rec = &schedule.records[index];
                let Some(station) = rec.station else {
                    skipped += 1;
                    continue;
                };
                (rec.date, rec.start, station, schedule.employees.len())
            };

            let pick = (0..employee_count)
                .map(EmployeeId)
                .filter(|&e| tally.placement_is_legal(scope.working_solution(), e, station, date, start))
                .min_by_key(|&e| tally.rank(scope.working_solution(), e, date));

            match pick {
                Some(employee) => {
                    scope
                        .director_mut()
                        .assign(index, Some(employee), Some(station));
                    tally.record(employee, date, start);
                    assigned += 1;
                }
                None => skipped += 1,
            }
        }

        scope.update_best_solution();
        let score = scope.calculate_score();
        info!(
            event = "phase_end",
            phase = "Construction Heuristic",
            phase_index = 0,
            duration_ms = phase_start.elapsed().as_millis() as u64,
            seeded = seeded as u64,
            assigned = assigned as u64,
            skipped = skipped as u64,
            score = %score,
        );
    }

    /// Pre-seeds pairings that match the prior period, when still legal.
    fn seed_from_prior(&self, scope: &mut SolverScope, tally: &mut WorkTally) -> usize {
        let mut by_slot: HashMap<(StationId, Weekday, NaiveTime), EmployeeId> = HashMap::new();
        for prior in &self.prior {
            if let (Some(employee), Some(station)) = (prior.employee, prior.station) {
                by_slot
                    .entry((station, prior.date.weekday(), prior.start))
                    .or_insert(employee);
            }
        }

        let mut seeded = 0usize;
        for index in 0..scope.working_solution().records.len() {
            let (date, start, station, employee) = {
                let schedule = scope.working_solution();
                let rec = &schedule.records[index];
                if rec.provenance.is_pinned() || rec.employee.is_some() {
                    continue;
                }
                let Some(station) = rec.station else {
                    continue;
                };
                let Some(&employee) = by_slot.get(&(station, rec.date.weekday(), rec.start)) else {
                    continue;
                };
                (rec.date, rec.start, station, employee)
            };

            if employee.0 < scope.working_solution().employees.len()
                && tally.placement_is_legal(scope.working_solution(), employee, station, date, start)
            {
                scope
                    .director_mut()
                    .assign(index, Some(employee), Some(station));
                tally.record(employee, date, start);
                seeded += 1;
            }
        }
        seeded
    }
}

/// Deterministic visit order: date, start time, then station priority.
fn visit_order(schedule: &ShiftSchedule) -> Vec<usize> {
    let mut order: Vec<usize> = schedule
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            !rec.provenance.is_pinned() && rec.employee.is_none() && rec.station.is_some()
        })
        .map(|(i, _)| i)
        .collect();
    order.sort_by_key(|&i| {
        let rec = &schedule.records[i];
        let station_key = rec
            .station
            .map(|s| schedule.station(s).priority_key())
            .unwrap_or((u8::MAX, u8::MAX, u16::MAX));
        (rec.date, rec.start, station_key, i)
    });
    order
}

/// Running per-employee workload, kept current as the pass assigns.
struct WorkTally {
    occupied: HashSet<(EmployeeId, NaiveDate, u32)>,
    day_slots: HashMap<(EmployeeId, NaiveDate), u32>,
    worked_days: HashMap<EmployeeId, HashSet<NaiveDate>>,
    minutes: HashMap<EmployeeId, u32>,
}

impl WorkTally {
    fn from_schedule(schedule: &ShiftSchedule) -> Self {
        let mut tally = Self {
            occupied: HashSet::new(),
            day_slots: HashMap::new(),
            worked_days: HashMap::new(),
            minutes: HashMap::new(),
        };
        for rec in &schedule.records {
            if let Some(employee) = rec.employee {
                tally.record_minutes(employee, rec.date, rec.start_minutes());
            }
        }
        tally
    }

    fn record(&mut self, employee: EmployeeId, date: NaiveDate, start: NaiveTime) {
        self.record_minutes(employee, date, minute_of(start));
    }

    fn record_minutes(&mut self, employee: EmployeeId, date: NaiveDate, start: u32) {
        self.occupied.insert((employee, date, start));
        *self.day_slots.entry((employee, date)).or_insert(0) += 1;
        self.worked_days.entry(employee).or_default().insert(date);
        *self.minutes.entry(employee).or_insert(0) += GRID_MINUTES;
    }

    fn placement_is_legal(
        &self,
        schedule: &ShiftSchedule,
        employee: EmployeeId,
        station: StationId,
        date: NaiveDate,
        start: NaiveTime,
    ) -> bool {
        let skilled = schedule
            .employee(employee)
            .skill_level(station)
            .is_some_and(|level| level >= 2);
        if !skilled {
            return false;
        }
        let start_minute = minute_of(start);
        if self.occupied.contains(&(employee, date, start_minute)) {
            return false;
        }
        let end_minute = start_minute + GRID_MINUTES;
        !schedule.requests.iter().any(|req| {
            req.employee == employee
                && req.date == date
                && req.overlaps_minutes(start_minute, end_minute)
        })
    }

    /// Candidate ordering: under-cap employees first, then lowest
    /// cumulative minutes, then stable employee index.
    fn rank(&self, schedule: &ShiftSchedule, employee: EmployeeId, date: NaiveDate) -> (bool, u32, usize) {
        (
            self.would_exceed_caps(schedule, employee, date),
            self.minutes.get(&employee).copied().unwrap_or(0),
            employee.0,
        )
    }

    fn would_exceed_caps(
        &self,
        schedule: &ShiftSchedule,
        employee: EmployeeId,
        date: NaiveDate,
    ) -> bool {
        let facts = schedule.employee(employee);
        if let Some(cap) = facts.max_minutes_per_day {
            let slots = self.day_slots.get(&(employee, date)).copied().unwrap_or(0);
            if slots + 1 > cap / GRID_MINUTES {
                return true;
            }
        }
        if let Some(cap) = facts.max_days_per_period {
            let days = self.worked_days.get(&employee);
            let day_count = days.map(HashSet::len).unwrap_or(0);
            let new_day = days.map_or(true, |set| !set.contains(&date));
            if new_day && day_count as u32 + 1 > cap {
                return true;
            }
        }
        false
    }
}

fn minute_of(time: NaiveTime) -> u32 {
    use chrono::Timelike;
    time.hour() * 60 + time.minute()
}
