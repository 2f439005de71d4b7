//! Per-rule score breakdown.
//!
//! [`analyze`] evaluates a schedule from scratch, rule by rule, and reports
//! every rule's weight, accumulated score, and match count. It is the
//! explanation surface for callers and the reference the incremental
//! director is tested against; it makes no attempt to be fast.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use shiftforge_core::{EmployeeId, HardSoftScore, ShiftSchedule, StationId, GRID_MINUTES};

use crate::weights::{self, RuleWeights};

/// Analysis of a single rule's contribution to the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintAnalysis {
    /// Name of the rule.
    pub name: String,
    /// Weight of the rule (score per penalty unit).
    pub weight: HardSoftScore,
    /// Score contribution from this rule.
    pub score: HardSoftScore,
    /// Number of matches (violating tuples).
    pub match_count: usize,
}

/// Result of analyzing a schedule's rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreAnalysis {
    /// The total score.
    pub score: HardSoftScore,
    /// Analysis of each rule, in catalog order.
    pub constraints: Vec<ConstraintAnalysis>,
}

impl ScoreAnalysis {
    /// Looks a rule's analysis up by name.
    pub fn constraint(&self, name: &str) -> Option<&ConstraintAnalysis> {
        self.constraints.iter().find(|c| c.name == name)
    }
}

/// Evaluates every rule over the full record set.
pub fn analyze(
    schedule: &ShiftSchedule,
    weights: &RuleWeights,
    consecutive_days_limit: u32,
) -> ScoreAnalysis {
    let granularity = GRID_MINUTES;

    let mut employee_slot: HashMap<(NaiveDate, NaiveTime, EmployeeId), i64> = HashMap::new();
    let mut station_slot: HashMap<(NaiveDate, NaiveTime, StationId), i64> = HashMap::new();
    let mut coverage: HashMap<(&str, NaiveDate, NaiveTime), i64> = HashMap::new();
    let mut day_counts: HashMap<(EmployeeId, NaiveDate), i64> = HashMap::new();
    let mut day_slots: HashMap<(EmployeeId, NaiveDate), Vec<u32>> = HashMap::new();
    let mut skill_units: i64 = 0;
    let mut day_off_units: i64 = 0;

    for record in &schedule.records {
        let Some(employee) = record.employee else {
            continue;
        };
        *employee_slot
            .entry((record.date, record.start, employee))
            .or_insert(0) += 1;
        *day_counts.entry((employee, record.date)).or_insert(0) += 1;
        day_slots
            .entry((employee, record.date))
            .or_default()
            .push(record.start_minutes());

        let shift_start = record.start_minutes();
        let shift_end = record.end_minutes(granularity);
        let blocked = schedule.requests.iter().any(|req| {
            req.employee == employee
                && req.date == record.date
                && req.overlaps_minutes(shift_start, shift_end)
        });
        if blocked {
            day_off_units += 1;
        }

        if let Some(station) = record.station {
            *station_slot
                .entry((record.date, record.start, station))
                .or_insert(0) += 1;
            let skilled = schedule
                .employee(employee)
                .skill_level(station)
                .is_some_and(|level| level >= 2);
            if !skilled {
                skill_units += 1;
            }
            *coverage
                .entry((record.location.as_str(), record.date, record.start))
                .or_insert(0) += 1;
        }
    }

    let employee_pairs = pair_units(&employee_slot);
    let station_pairs = pair_units(&station_slot);

    let mut unmet_units: i64 = 0;
    let mut unmet_matches: usize = 0;
    for slot in &schedule.demand {
        let covered = coverage
            .get(&(slot.location.as_str(), slot.date, slot.start))
            .copied()
            .unwrap_or(0);
        let missing = i64::from(slot.required_units) - covered;
        if missing > 0 {
            unmet_units += missing;
            unmet_matches += 1;
        }
    }

    let mut daily_cap_units: i64 = 0;
    let mut daily_cap_matches: usize = 0;
    let mut balance_units: i64 = 0;
    for (&(employee, _), &count) in &day_counts {
        if let Some(cap) = schedule.employee(employee).max_minutes_per_day {
            let over = count - i64::from(cap / granularity);
            if over > 0 {
                daily_cap_units += over;
                daily_cap_matches += 1;
            }
        }
        balance_units += count * count;
    }

    let mut days_per_employee: HashMap<EmployeeId, Vec<i32>> = HashMap::new();
    for &(employee, date) in day_counts.keys() {
        days_per_employee
            .entry(employee)
            .or_default()
            .push(date.num_days_from_ce());
    }

    let mut period_units: i64 = 0;
    let mut period_matches: usize = 0;
    let mut consecutive_units: i64 = 0;
    let mut consecutive_matches: usize = 0;
    for (&employee, days) in &mut days_per_employee {
        if let Some(cap) = schedule.employee(employee).max_days_per_period {
            let over = days.len() as i64 - i64::from(cap);
            if over > 0 {
                period_units += over;
                period_matches += 1;
            }
        }
        days.sort_unstable();
        for run in consecutive_runs(days) {
            let over = run - i64::from(consecutive_days_limit);
            if over > 0 {
                consecutive_units += over;
                consecutive_matches += 1;
            }
        }
    }

    let mut fragment_units: i64 = 0;
    let mut fragment_matches: usize = 0;
    for starts in day_slots.values_mut() {
        starts.sort_unstable();
        starts.dedup();
        let gaps = starts
            .windows(2)
            .filter(|pair| pair[1] != pair[0] + granularity)
            .count() as i64;
        if gaps > 0 {
            fragment_units += gaps;
            fragment_matches += 1;
        }
    }

    let entries = [
        (weights::EMPLOYEE_SLOT_CONFLICT, weights.employee_slot_conflict, employee_pairs, employee_pairs as usize),
        (weights::STATION_SLOT_CONFLICT, weights.station_slot_conflict, station_pairs, station_pairs as usize),
        (weights::SKILL_FLOOR, weights.skill_floor, skill_units, skill_units as usize),
        (weights::DAY_OFF_OVERLAP, weights.day_off_overlap, day_off_units, day_off_units as usize),
        (weights::UNMET_DEMAND, weights.unmet_demand, unmet_units, unmet_matches),
        (weights::DAILY_MINUTES_CAP, weights.daily_minutes_cap, daily_cap_units, daily_cap_matches),
        (weights::PERIOD_DAYS_CAP, weights.period_days_cap, period_units, period_matches),
        (weights::CONSECUTIVE_DAYS_CAP, weights.consecutive_days_cap, consecutive_units, consecutive_matches),
        (weights::WORKLOAD_BALANCE, weights.workload_balance, balance_units, day_counts.len()),
        (weights::FRAGMENTED_BLOCKS, weights.fragmented_blocks, fragment_units, fragment_matches),
    ];

    let constraints: Vec<ConstraintAnalysis> = entries
        .into_iter()
        .map(|(name, weight, units, match_count)| ConstraintAnalysis {
            name: name.to_string(),
            weight,
            score: -(weight * units),
            match_count,
        })
        .collect();
    let score = constraints.iter().map(|c| c.score).sum();

    ScoreAnalysis { score, constraints }
}

/// One penalty unit per unordered pair of records sharing a slot key.
fn pair_units<K>(counts: &HashMap<K, i64>) -> i64 {
    counts.values().map(|&n| n * (n - 1) / 2).sum()
}

/// Lengths of maximal runs of consecutive day numbers. Input must be sorted.
fn consecutive_runs(days: &[i32]) -> Vec<i64> {
    let mut runs = Vec::new();
    let mut iter = days.iter();
    let Some(&first) = iter.next() else {
        return runs;
    };
    let mut prev = first;
    let mut len: i64 = 1;
    for &day in iter {
        if day == prev + 1 {
            len += 1;
        } else {
            runs.push(len);
            len = 1;
        }
        prev = day;
    }
    runs.push(len);
    runs
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;
    use shiftforge_core::{AssignmentRecord, DemandSlot, Employee, PreferenceRequest, RequestKind, Station};

    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn record(date: NaiveDate, start: NaiveTime, employee: usize, station: usize) -> AssignmentRecord {
        let mut rec = AssignmentRecord::placeholder("S1", date, start, Some(StationId(station)), 15);
        rec.employee = Some(EmployeeId(employee));
        rec
    }

    #[test]
    fn test_empty_schedule_owes_all_demand() {
        let schedule = ShiftSchedule::new(
            vec![Employee::new("E1", "S1")],
            vec![Station::new("S1", 1, "Register 1")],
            vec![DemandSlot::new("S1", d(3), t(9, 0), 3)],
            vec![],
        );

        let analysis = analyze(&schedule, &RuleWeights::default(), 6);
        assert_eq!(analysis.score, HardSoftScore::of_soft(-300));
        let unmet = analysis.constraint(weights::UNMET_DEMAND).unwrap();
        assert_eq!(unmet.match_count, 1);
        assert_eq!(unmet.score, HardSoftScore::of_soft(-300));
    }

    #[test]
    fn test_pairwise_conflicts_and_skill() {
        // Two records at 09:00 held by the same employee on the same
        // station; the employee has no recorded skill there.
        let records = vec![
            record(d(3), t(9, 0), 0, 0),
            record(d(3), t(9, 0), 0, 0),
        ];
        let schedule = ShiftSchedule::with_records(
            vec![Employee::new("E1", "S1")],
            vec![Station::new("S1", 1, "Register 1")],
            vec![],
            vec![],
            records,
        );

        let analysis = analyze(&schedule, &RuleWeights::default(), 6);
        assert_eq!(
            analysis.constraint(weights::EMPLOYEE_SLOT_CONFLICT).unwrap().match_count,
            1
        );
        assert_eq!(
            analysis.constraint(weights::STATION_SLOT_CONFLICT).unwrap().match_count,
            1
        );
        assert_eq!(analysis.constraint(weights::SKILL_FLOOR).unwrap().match_count, 2);
        // 1 employee pair + 1 station pair + 2 skill violations
        assert_eq!(analysis.score.hard(), -4);
    }

    #[test]
    fn test_day_off_and_fragmentation() {
        let employee = Employee::new("E1", "S1").with_skill(StationId(0), 3);
        // 09:00 and 10:00 with a hole at 09:15-10:00: one gap
        let records = vec![
            record(d(3), t(9, 0), 0, 0),
            record(d(3), t(10, 0), 0, 0),
        ];
        let schedule = ShiftSchedule::with_records(
            vec![employee],
            vec![Station::new("S1", 1, "Register 1")],
            vec![],
            vec![PreferenceRequest::new(EmployeeId(0), d(3), RequestKind::DayOff)],
            records,
        );

        let analysis = analyze(&schedule, &RuleWeights::default(), 6);
        // Full-day request blocks both records
        assert_eq!(analysis.constraint(weights::DAY_OFF_OVERLAP).unwrap().match_count, 2);
        let fragments = analysis.constraint(weights::FRAGMENTED_BLOCKS).unwrap();
        assert_eq!(fragments.match_count, 1);
        assert_eq!(fragments.score, HardSoftScore::of_soft(-1));
        // Workload balance: one employee-day with 2 slots, 5 * 2^2
        assert_eq!(
            analysis.constraint(weights::WORKLOAD_BALANCE).unwrap().score,
            HardSoftScore::of_soft(-20)
        );
    }

    #[test]
    fn test_caps_and_consecutive_days() {
        let employee = Employee::new("E1", "S1")
            .with_skill(StationId(0), 3)
            .with_daily_cap(15)
            .with_period_cap(2);
        // Two slots on day 3 (one over the 15-minute cap), then days 4-6:
        // four distinct days against a period cap of 2, and with a
        // consecutive limit of 3 a run of 4 days is one day over.
        let records = vec![
            record(d(3), t(9, 0), 0, 0),
            record(d(3), t(9, 15), 0, 0),
            record(d(4), t(9, 0), 0, 0),
            record(d(5), t(9, 0), 0, 0),
            record(d(6), t(9, 0), 0, 0),
        ];
        let schedule = ShiftSchedule::with_records(
            vec![employee],
            vec![Station::new("S1", 1, "Register 1")],
            vec![],
            vec![],
            records,
        );

        let analysis = analyze(&schedule, &RuleWeights::default(), 3);
        assert_eq!(
            analysis.constraint(weights::DAILY_MINUTES_CAP).unwrap().score,
            HardSoftScore::of_hard(-1)
        );
        assert_eq!(
            analysis.constraint(weights::PERIOD_DAYS_CAP).unwrap().score,
            HardSoftScore::of_hard(-2)
        );
        assert_eq!(
            analysis.constraint(weights::CONSECUTIVE_DAYS_CAP).unwrap().score,
            HardSoftScore::of_hard(-1)
        );
    }

    #[test]
    fn test_hard_violation_never_trades_against_soft_gains() {
        // The extra record covers the open demand slot, a 100-point soft
        // gain, but lands on the employee's day off. Hard dominance must
        // rank it strictly worse anyway.
        let employee = Employee::new("E1", "S1").with_skill(StationId(0), 3);
        let stations = vec![Station::new("S1", 1, "Register 1")];
        let demand = vec![DemandSlot::new("S1", d(4), t(9, 0), 1)];
        let requests = vec![PreferenceRequest::new(EmployeeId(0), d(4), RequestKind::DayOff)];

        let baseline = ShiftSchedule::with_records(
            vec![employee.clone()],
            stations.clone(),
            demand.clone(),
            requests.clone(),
            vec![record(d(3), t(9, 0), 0, 0)],
        );
        let violating = ShiftSchedule::with_records(
            vec![employee],
            stations,
            demand,
            requests,
            vec![record(d(3), t(9, 0), 0, 0), record(d(4), t(9, 0), 0, 0)],
        );

        let base = analyze(&baseline, &RuleWeights::default(), 6);
        let worse = analyze(&violating, &RuleWeights::default(), 6);
        assert_eq!(base.score.hard(), 0);
        assert_eq!(worse.score.hard(), -1);
        assert!(worse.score.soft() > base.score.soft());
        assert!(worse.score < base.score);
    }

    #[test]
    fn test_unassigned_records_only_owe_demand() {
        let schedule = ShiftSchedule::new(
            vec![Employee::new("E1", "S1")],
            vec![Station::new("S1", 1, "Register 1")],
            vec![DemandSlot::new("S1", d(3), t(9, 0), 2)],
            vec![PreferenceRequest::new(EmployeeId(0), d(3), RequestKind::DayOff)],
        );

        let analysis = analyze(&schedule, &RuleWeights::default(), 6);
        assert_eq!(analysis.score.hard(), 0);
        assert_eq!(analysis.score, HardSoftScore::of_soft(-200));
    }
}
