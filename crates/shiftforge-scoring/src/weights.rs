//! Rule catalog names, default weights, and runtime overrides.

use std::collections::HashMap;

use shiftforge_core::HardSoftScore;
use tracing::debug;

/// Rule: no employee holds two records in the same timeslot.
pub const EMPLOYEE_SLOT_CONFLICT: &str = "employee_slot_conflict";
/// Rule: no station is claimed twice in the same timeslot.
pub const STATION_SLOT_CONFLICT: &str = "station_slot_conflict";
/// Rule: assigned employees need skill level 2+ at their station.
pub const SKILL_FLOOR: &str = "skill_floor";
/// Rule: assignments must not overlap a preference request.
pub const DAY_OFF_OVERLAP: &str = "day_off_overlap";
/// Rule: staffing below a demand slot's required units.
pub const UNMET_DEMAND: &str = "unmet_demand";
/// Rule: daily work minutes over the employee's cap.
pub const DAILY_MINUTES_CAP: &str = "daily_minutes_cap";
/// Rule: distinct work days over the employee's period cap.
pub const PERIOD_DAYS_CAP: &str = "period_days_cap";
/// Rule: runs of consecutive work days over the configured limit.
pub const CONSECUTIVE_DAYS_CAP: &str = "consecutive_days_cap";
/// Rule: quadratic per-day workload spread across employees.
pub const WORKLOAD_BALANCE: &str = "workload_balance";
/// Rule: gaps inside an employee's working day.
pub const FRAGMENTED_BLOCKS: &str = "fragmented_blocks";

/// All rule names, in catalog order.
pub const RULE_NAMES: [&str; 10] = [
    EMPLOYEE_SLOT_CONFLICT,
    STATION_SLOT_CONFLICT,
    SKILL_FLOOR,
    DAY_OFF_OVERLAP,
    UNMET_DEMAND,
    DAILY_MINUTES_CAP,
    PERIOD_DAYS_CAP,
    CONSECUTIVE_DAYS_CAP,
    WORKLOAD_BALANCE,
    FRAGMENTED_BLOCKS,
];

/// Effective per-match weights for every rule.
///
/// Each weight is the score charged per penalty unit; hard rules default to
/// one hard unit, unmet demand to 100 soft per missing unit, workload
/// balance to 5 soft, fragmentation to 1 soft. A zero weight disables a
/// rule's scoring without removing its bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleWeights {
    pub employee_slot_conflict: HardSoftScore,
    pub station_slot_conflict: HardSoftScore,
    pub skill_floor: HardSoftScore,
    pub day_off_overlap: HardSoftScore,
    pub unmet_demand: HardSoftScore,
    pub daily_minutes_cap: HardSoftScore,
    pub period_days_cap: HardSoftScore,
    pub consecutive_days_cap: HardSoftScore,
    pub workload_balance: HardSoftScore,
    pub fragmented_blocks: HardSoftScore,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            employee_slot_conflict: HardSoftScore::of_hard(1),
            station_slot_conflict: HardSoftScore::of_hard(1),
            skill_floor: HardSoftScore::of_hard(1),
            day_off_overlap: HardSoftScore::of_hard(1),
            unmet_demand: HardSoftScore::of_soft(100),
            daily_minutes_cap: HardSoftScore::of_hard(1),
            period_days_cap: HardSoftScore::of_hard(1),
            consecutive_days_cap: HardSoftScore::of_hard(1),
            workload_balance: HardSoftScore::of_soft(5),
            fragmented_blocks: HardSoftScore::of_soft(1),
        }
    }
}

impl RuleWeights {
    /// Default weights with overrides merged on top.
    ///
    /// Unknown override names are skipped with a debug log.
    pub fn with_overrides(overrides: &ConstraintWeightOverrides) -> Self {
        let mut weights = Self::default();
        for (name, weight) in overrides.iter() {
            match weights.get_mut(name) {
                Some(slot) => *slot = *weight,
                None => debug!(rule = name, "ignoring unknown constraint weight override"),
            }
        }
        weights
    }

    /// Looks a weight up by rule name.
    pub fn get(&self, name: &str) -> Option<HardSoftScore> {
        self.get_ref(name).copied()
    }

    fn get_ref(&self, name: &str) -> Option<&HardSoftScore> {
        match name {
            EMPLOYEE_SLOT_CONFLICT => Some(&self.employee_slot_conflict),
            STATION_SLOT_CONFLICT => Some(&self.station_slot_conflict),
            SKILL_FLOOR => Some(&self.skill_floor),
            DAY_OFF_OVERLAP => Some(&self.day_off_overlap),
            UNMET_DEMAND => Some(&self.unmet_demand),
            DAILY_MINUTES_CAP => Some(&self.daily_minutes_cap),
            PERIOD_DAYS_CAP => Some(&self.period_days_cap),
            CONSECUTIVE_DAYS_CAP => Some(&self.consecutive_days_cap),
            WORKLOAD_BALANCE => Some(&self.workload_balance),
            FRAGMENTED_BLOCKS => Some(&self.fragmented_blocks),
            _ => None,
        }
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut HardSoftScore> {
        match name {
            EMPLOYEE_SLOT_CONFLICT => Some(&mut self.employee_slot_conflict),
            STATION_SLOT_CONFLICT => Some(&mut self.station_slot_conflict),
            SKILL_FLOOR => Some(&mut self.skill_floor),
            DAY_OFF_OVERLAP => Some(&mut self.day_off_overlap),
            UNMET_DEMAND => Some(&mut self.unmet_demand),
            DAILY_MINUTES_CAP => Some(&mut self.daily_minutes_cap),
            PERIOD_DAYS_CAP => Some(&mut self.period_days_cap),
            CONSECUTIVE_DAYS_CAP => Some(&mut self.consecutive_days_cap),
            WORKLOAD_BALANCE => Some(&mut self.workload_balance),
            FRAGMENTED_BLOCKS => Some(&mut self.fragmented_blocks),
            _ => None,
        }
    }
}

/// Holds runtime overrides for rule weights.
///
/// Use this to adjust weights between solver runs without recompiling.
///
/// # Examples
///
/// ```
/// use shiftforge_core::HardSoftScore;
/// use shiftforge_scoring::{ConstraintWeightOverrides, RuleWeights, UNMET_DEMAND};
///
/// let mut overrides = ConstraintWeightOverrides::new();
/// overrides.put(UNMET_DEMAND, HardSoftScore::of_soft(250));
///
/// let weights = RuleWeights::with_overrides(&overrides);
/// assert_eq!(weights.unmet_demand, HardSoftScore::of_soft(250));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConstraintWeightOverrides {
    weights: HashMap<String, HardSoftScore>,
}

impl ConstraintWeightOverrides {
    /// Creates an empty overrides container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates overrides from an iterator of (name, weight) pairs.
    pub fn from_pairs<I, N>(iter: I) -> Self
    where
        I: IntoIterator<Item = (N, HardSoftScore)>,
        N: Into<String>,
    {
        let weights = iter.into_iter().map(|(n, w)| (n.into(), w)).collect();
        Self { weights }
    }

    /// Sets the weight for a rule.
    pub fn put<N: Into<String>>(&mut self, name: N, weight: HardSoftScore) {
        self.weights.insert(name.into(), weight);
    }

    /// Removes the override for a rule.
    pub fn remove(&mut self, name: &str) -> Option<HardSoftScore> {
        self.weights.remove(name)
    }

    /// Gets the overridden weight if present.
    pub fn get(&self, name: &str) -> Option<HardSoftScore> {
        self.weights.get(name).copied()
    }

    /// Gets the overridden weight, or the default if not overridden.
    pub fn get_or_default(&self, name: &str, default: HardSoftScore) -> HardSoftScore {
        self.get(name).unwrap_or(default)
    }

    /// Returns true if this rule has an override.
    pub fn contains(&self, name: &str) -> bool {
        self.weights.contains_key(name)
    }

    /// Iterates over all (name, weight) overrides.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HardSoftScore)> {
        self.weights.iter().map(|(n, w)| (n.as_str(), w))
    }

    /// Returns the number of overrides.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Returns true if there are no overrides.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
