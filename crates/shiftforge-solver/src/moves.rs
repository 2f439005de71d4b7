//! Moves over assignment records.
//!
//! A move mutates one or two records through the score director, which
//! keeps the score current. `apply` returns the inverse move so a
//! candidate evaluation is do, score, undo.

use shiftforge_core::{EmployeeId, ShiftSchedule, StationId, GRID_MINUTES};
use shiftforge_scoring::ScoreDirector;

/// A candidate change to the working solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Sets one record's employee and station.
    Reassign {
        record: usize,
        employee: Option<EmployeeId>,
        station: Option<StationId>,
    },
    /// Exchanges the employees of two records; stations stay put.
    Swap { first: usize, second: usize },
}

impl Move {
    /// Cheap static legality check, run before scoring a candidate.
    ///
    /// Rejects no-ops, pinned records, skill-floor violations, and day-off
    /// overlaps. Timeslot conflicts are left to the score, which already
    /// prices them.
    pub fn is_doable(&self, schedule: &ShiftSchedule) -> bool {
        match *self {
            Move::Reassign {
                record,
                employee,
                station,
            } => {
                let rec = &schedule.records[record];
                if rec.provenance.is_pinned() {
                    return false;
                }
                if rec.employee == employee && rec.station == station {
                    return false;
                }
                employee.map_or(true, |e| placement_is_legal(schedule, record, e, station))
            }
            Move::Swap { first, second } => {
                if first == second {
                    return false;
                }
                let a = &schedule.records[first];
                let b = &schedule.records[second];
                if a.provenance.is_pinned() || b.provenance.is_pinned() {
                    return false;
                }
                let (Some(ea), Some(eb)) = (a.employee, b.employee) else {
                    return false;
                };
                if ea == eb {
                    return false;
                }
                placement_is_legal(schedule, first, eb, a.station)
                    && placement_is_legal(schedule, second, ea, b.station)
            }
        }
    }

    /// Applies the move through the director and returns its inverse.
    pub fn apply(&self, director: &mut ScoreDirector) -> Move {
        match *self {
            Move::Reassign {
                record,
                employee,
                station,
            } => {
                let prev = &director.working_solution().records[record];
                let inverse = Move::Reassign {
                    record,
                    employee: prev.employee,
                    station: prev.station,
                };
                director.assign(record, employee, station);
                inverse
            }
            Move::Swap { first, second } => {
                let records = &director.working_solution().records;
                let (ea, sa) = (records[first].employee, records[first].station);
                let (eb, sb) = (records[second].employee, records[second].station);
                director.assign(first, eb, sa);
                director.assign(second, ea, sb);
                // A swap is its own inverse
                *self
            }
        }
    }
}

/// Skill floor and preference requests; both phases use the same filter.
fn placement_is_legal(
    schedule: &ShiftSchedule,
    record: usize,
    employee: EmployeeId,
    station: Option<StationId>,
) -> bool {
    let rec = &schedule.records[record];
    if let Some(station) = station {
        let skilled = schedule
            .employee(employee)
            .skill_level(station)
            .is_some_and(|level| level >= 2);
        if !skilled {
            return false;
        }
    }
    let start = rec.start_minutes();
    let end = rec.end_minutes(GRID_MINUTES);
    !schedule
        .requests
        .iter()
        .any(|req| req.employee == employee && req.date == rec.date && req.overlaps_minutes(start, end))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use shiftforge_core::{
        DemandSlot, Employee, PreferenceRequest, Provenance, RequestKind, Station,
    };
    use shiftforge_scoring::RuleWeights;

    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn schedule() -> ShiftSchedule {
        ShiftSchedule::new(
            vec![
                Employee::new("E1", "S1")
                    .with_skill(StationId(0), 3)
                    .with_skill(StationId(1), 2),
                Employee::new("E2", "S1").with_skill(StationId(1), 3),
            ],
            vec![
                Station::new("S1", 1, "Register 1"),
                Station::new("S1", 2, "Register 2"),
            ],
            vec![
                DemandSlot::new("S1", d(3), t(9, 0), 2),
                DemandSlot::new("S1", d(4), t(9, 0), 1),
            ],
            vec![PreferenceRequest::new(EmployeeId(1), d(4), RequestKind::DayOff)],
        )
    }

    #[test]
    fn test_reassign_doable_checks() {
        let mut s = schedule();
        s.records[0].employee = Some(EmployeeId(0));

        // No-op is not doable
        let noop = Move::Reassign {
            record: 0,
            employee: Some(EmployeeId(0)),
            station: s.records[0].station,
        };
        assert!(!noop.is_doable(&s));

        // E2 has no skill at station 0
        let unskilled = Move::Reassign {
            record: 0,
            employee: Some(EmployeeId(1)),
            station: Some(StationId(0)),
        };
        assert!(!unskilled.is_doable(&s));

        // Unassigning is always doable on an unpinned record
        let unassign = Move::Reassign {
            record: 0,
            employee: None,
            station: s.records[0].station,
        };
        assert!(unassign.is_doable(&s));

        // Day-off request blocks E2 on day 4 (record index 2)
        let blocked = Move::Reassign {
            record: 2,
            employee: Some(EmployeeId(1)),
            station: Some(StationId(1)),
        };
        assert!(!blocked.is_doable(&s));
    }

    #[test]
    fn test_pinned_records_are_immovable() {
        let mut s = schedule();
        s.records[0].employee = Some(EmployeeId(0));
        s.records[0].provenance = Provenance::Manual;
        s.records[1].employee = Some(EmployeeId(1));

        let reassign = Move::Reassign {
            record: 0,
            employee: None,
            station: s.records[0].station,
        };
        assert!(!reassign.is_doable(&s));

        let swap = Move::Swap { first: 0, second: 1 };
        assert!(!swap.is_doable(&s));
    }

    #[test]
    fn test_swap_requires_two_distinct_employees() {
        let mut s = schedule();
        s.records[0].employee = Some(EmployeeId(0));

        // Second record unassigned
        assert!(!Move::Swap { first: 0, second: 1 }.is_doable(&s));

        s.records[1].employee = Some(EmployeeId(0));
        // Same employee on both sides
        assert!(!Move::Swap { first: 0, second: 1 }.is_doable(&s));
    }

    #[test]
    fn test_apply_returns_inverse() {
        let mut director = ScoreDirector::new(schedule(), RuleWeights::default(), 6);
        let initial = director.calculate_score();

        let mv = Move::Reassign {
            record: 0,
            employee: Some(EmployeeId(0)),
            station: Some(StationId(0)),
        };
        let undo = mv.apply(&mut director);
        assert_ne!(director.calculate_score(), initial);

        undo.apply(&mut director);
        assert_eq!(director.calculate_score(), initial);
    }

    #[test]
    fn test_swap_exchanges_employees_and_keeps_stations() {
        let mut s = schedule();
        s.records[0].employee = Some(EmployeeId(0));
        s.records[1].employee = Some(EmployeeId(1));
        let mut director = ScoreDirector::new(s, RuleWeights::default(), 6);
        let before = director.calculate_score();

        let swap = Move::Swap { first: 0, second: 1 };
        let undo = swap.apply(&mut director);

        let records = &director.working_solution().records;
        assert_eq!(records[0].employee, Some(EmployeeId(1)));
        assert_eq!(records[1].employee, Some(EmployeeId(0)));
        assert_eq!(records[0].station, Some(StationId(0)));
        assert_eq!(records[1].station, Some(StationId(1)));

        undo.apply(&mut director);
        assert_eq!(director.calculate_score(), before);
        let records = &director.working_solution().records;
        assert_eq!(records[0].employee, Some(EmployeeId(0)));
    }
}
