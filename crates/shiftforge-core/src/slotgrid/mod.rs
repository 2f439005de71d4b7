//! Slot grid codec.
//!
//! Converts heterogeneous time-interval demand records into a uniform
//! fixed-granularity slot grid and back:
//!
//! - [`SlotGrid::split`] cuts one aligned interval into grid slots
//! - [`SlotGrid::aggregate`] splits many intervals and sums duplicate slots
//! - [`SlotGrid::merge`] compresses contiguous equal-demand slots back into
//!   intervals
//! - [`dedup_demand_rows`] resolves duplicate raw storage rows by
//!   max-reduction (a deliberately different policy, see below)
//!
//! # Examples
//!
//! ```
//! use chrono::{NaiveDate, NaiveTime};
//! use shiftforge_core::slotgrid::{DemandInterval, SlotGrid};
//!
//! let grid = SlotGrid::QUARTER_HOUR;
//! let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
//! let interval = DemandInterval::new(
//!     "S1",
//!     date,
//!     NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
//!     NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
//!     2,
//! );
//!
//! let slots = grid.split(&interval).unwrap();
//! assert_eq!(slots.len(), 4);
//!
//! let intervals = grid.merge(&slots);
//! assert_eq!(intervals, vec![interval]);
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::domain::DemandSlot;
use crate::error::{Result, ShiftForgeError};

/// Canonical grid granularity in minutes.
pub const GRID_MINUTES: u32 = 15;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Rounding policy for [`SlotGrid::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    Down,
    Up,
    Nearest,
}

/// Staffing demand over a contiguous time interval.
///
/// The raw shape demand arrives in; the codec converts it to
/// [`DemandSlot`]s and back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandInterval {
    pub location: String,
    #[serde(default)]
    pub sub_area: Option<String>,
    pub date: NaiveDate,
    pub from: NaiveTime,
    pub to: NaiveTime,
    pub required_units: u32,
    #[serde(default)]
    pub task: Option<String>,
}

impl DemandInterval {
    /// Creates an interval with no sub-area or task.
    pub fn new(
        location: impl Into<String>,
        date: NaiveDate,
        from: NaiveTime,
        to: NaiveTime,
        required_units: u32,
    ) -> Self {
        Self {
            location: location.into(),
            sub_area: None,
            date,
            from,
            to,
            required_units,
            task: None,
        }
    }

    /// Sets the sub-area.
    pub fn with_sub_area(mut self, sub_area: impl Into<String>) -> Self {
        self.sub_area = Some(sub_area.into());
        self
    }

    /// Sets the task code.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

/// A validated slot grid with a fixed granularity.
///
/// Granularity must divide a day evenly; [`SlotGrid::QUARTER_HOUR`] is the
/// canonical 15-minute grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrid {
    granularity: u32,
}

impl SlotGrid {
    /// The canonical 15-minute grid.
    pub const QUARTER_HOUR: SlotGrid = SlotGrid {
        granularity: GRID_MINUTES,
    };

    /// Creates a grid with the given granularity in minutes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGranularity` unless the granularity divides 24 hours
    /// evenly.
    pub fn new(granularity: u32) -> Result<Self> {
        if granularity == 0 || MINUTES_PER_DAY % granularity != 0 {
            return Err(ShiftForgeError::InvalidGranularity(granularity));
        }
        Ok(Self { granularity })
    }

    /// Grid granularity in minutes.
    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    /// Number of slots in one day.
    pub fn slots_per_day(&self) -> u32 {
        MINUTES_PER_DAY / self.granularity
    }

    /// Returns true if the time sits exactly on a slot boundary.
    pub fn is_aligned(&self, time: NaiveTime) -> bool {
        minute_of_day(time) % self.granularity == 0
            && time.second() == 0
            && time.nanosecond() == 0
    }

    /// Rounds a time onto the grid.
    ///
    /// Rounding near the end of the day caps at the last valid slot start
    /// (23:45 on the quarter-hour grid) rather than overflowing into the
    /// next day. `Nearest` rounds a remainder of at least half the
    /// granularity upward.
    pub fn normalize(&self, time: NaiveTime, rounding: Rounding) -> NaiveTime {
        let total = minute_of_day(time);
        let rem = total % self.granularity;
        if rem == 0 && time.second() == 0 && time.nanosecond() == 0 {
            return time;
        }

        let base = total - rem;
        let rounded = match rounding {
            Rounding::Down => base,
            Rounding::Up => base + self.granularity,
            Rounding::Nearest => {
                if rem * 2 >= self.granularity {
                    base + self.granularity
                } else {
                    base
                }
            }
        };
        let rounded = if rounded >= MINUTES_PER_DAY {
            MINUTES_PER_DAY - self.granularity
        } else {
            rounded
        };
        time_of_minute(rounded)
    }

    /// Converts an aligned time of day to its slot index in
    /// `[0, slots_per_day)`.
    ///
    /// # Errors
    ///
    /// Returns `Unaligned` if the time is not on a slot boundary.
    pub fn to_slot_index(&self, time: NaiveTime) -> Result<u32> {
        if !self.is_aligned(time) {
            return Err(ShiftForgeError::Unaligned {
                time,
                granularity: self.granularity,
            });
        }
        Ok(minute_of_day(time) / self.granularity)
    }

    /// Converts a slot index back to its start time.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for indices outside `[0, slots_per_day)`.
    pub fn from_slot_index(&self, index: u32) -> Result<NaiveTime> {
        let slots_per_day = self.slots_per_day();
        if index >= slots_per_day {
            return Err(ShiftForgeError::OutOfRange {
                index,
                slots_per_day,
            });
        }
        Ok(time_of_minute(index * self.granularity))
    }

    /// Splits one interval into grid slots over `[from, to)`, each
    /// inheriting the interval's demand count.
    ///
    /// # Errors
    ///
    /// Returns `Unaligned` if either bound is off the grid, `InvalidRange`
    /// unless `to > from`.
    pub fn split(&self, interval: &DemandInterval) -> Result<Vec<DemandSlot>> {
        if !self.is_aligned(interval.from) {
            return Err(ShiftForgeError::Unaligned {
                time: interval.from,
                granularity: self.granularity,
            });
        }
        if !self.is_aligned(interval.to) {
            return Err(ShiftForgeError::Unaligned {
                time: interval.to,
                granularity: self.granularity,
            });
        }
        if interval.to <= interval.from {
            return Err(ShiftForgeError::InvalidRange {
                from: interval.from,
                to: interval.to,
            });
        }

        let end = minute_of_day(interval.to);
        let start = minute_of_day(interval.from);
        let mut slots = Vec::with_capacity(((end - start) / self.granularity) as usize);
        let mut cur = start;
        while cur < end {
            slots.push(DemandSlot {
                location: interval.location.clone(),
                sub_area: interval.sub_area.clone(),
                date: interval.date,
                start: time_of_minute(cur),
                required_units: interval.required_units,
                task: interval.task.clone(),
            });
            cur += self.granularity;
        }
        Ok(slots)
    }

    /// Splits every interval and sums demand across duplicate slot keys.
    ///
    /// Slots are grouped by (location, sub-area, date, start, task) and
    /// demand counts are added (the additive policy; raw storage rows use
    /// the max-based [`dedup_demand_rows`] instead). The result is sorted
    /// by the same key with absent sub-area/task ordered as empty strings.
    pub fn aggregate(&self, intervals: &[DemandInterval]) -> Result<Vec<DemandSlot>> {
        let mut agg: HashMap<SlotKey, u32> = HashMap::new();
        for interval in intervals {
            for slot in self.split(interval)? {
                let key = (slot.location, slot.sub_area, slot.date, slot.start, slot.task);
                *agg.entry(key).or_insert(0) += slot.required_units;
            }
        }

        let mut slots: Vec<DemandSlot> = agg
            .into_iter()
            .map(
                |((location, sub_area, date, start, task), required_units)| DemandSlot {
                    location,
                    sub_area,
                    date,
                    start,
                    required_units,
                    task,
                },
            )
            .collect();
        slots.sort_by(|a, b| {
            (
                a.location.as_str(),
                a.sub_area.as_deref().unwrap_or(""),
                a.date,
                a.start,
                a.task.as_deref().unwrap_or(""),
            )
                .cmp(&(
                    b.location.as_str(),
                    b.sub_area.as_deref().unwrap_or(""),
                    b.date,
                    b.start,
                    b.task.as_deref().unwrap_or(""),
                ))
        });
        Ok(slots)
    }

    /// Compresses slots back into intervals, the inverse of [`split`].
    ///
    /// Slots are grouped by (location, sub-area, date, task, demand); each
    /// maximal run of consecutive slot starts (`next == prev + granularity`)
    /// becomes one interval. Output is sorted by (date, from, to).
    ///
    /// [`split`]: SlotGrid::split
    pub fn merge(&self, slots: &[DemandSlot]) -> Vec<DemandInterval> {
        let mut grouped: HashMap<MergeKey, Vec<NaiveTime>> = HashMap::new();
        for slot in slots {
            let key = (
                slot.location.clone(),
                slot.sub_area.clone(),
                slot.date,
                slot.task.clone(),
                slot.required_units,
            );
            grouped.entry(key).or_default().push(slot.start);
        }

        let mut intervals = Vec::new();
        for ((location, sub_area, date, task, required_units), mut starts) in grouped {
            starts.sort();
            let mut run_start = starts[0];
            let mut prev = starts[0];
            for &cur in &starts[1..] {
                if minute_of_day(cur) != minute_of_day(prev) + self.granularity {
                    intervals.push(DemandInterval {
                        location: location.clone(),
                        sub_area: sub_area.clone(),
                        date,
                        from: run_start,
                        to: self.slot_end(prev),
                        required_units,
                        task: task.clone(),
                    });
                    run_start = cur;
                }
                prev = cur;
            }
            intervals.push(DemandInterval {
                location,
                sub_area,
                date,
                from: run_start,
                to: self.slot_end(prev),
                required_units,
                task,
            });
        }

        intervals.sort_by(|a, b| (a.date, a.from, a.to).cmp(&(b.date, b.from, b.to)));
        intervals
    }

    /// End of the slot starting at `start`; wraps to 00:00 for the last
    /// slot of the day, matching the interval representation downstream.
    fn slot_end(&self, start: NaiveTime) -> NaiveTime {
        time_of_minute((minute_of_day(start) + self.granularity) % MINUTES_PER_DAY)
    }
}

/// Resolves duplicate raw demand rows by keeping the larger unit count.
///
/// Storage may hold several rows for the same (location, date, start) key;
/// the boundary policy keeps the row with the larger `required_units`
/// (max-reduction). This is intentionally different from the additive
/// [`SlotGrid::aggregate`]: raw rows describe the same requirement twice,
/// interval slots describe requirements that add up. Output is sorted by
/// (location, date, start).
pub fn dedup_demand_rows(rows: Vec<DemandSlot>) -> Vec<DemandSlot> {
    let mut best: HashMap<(String, NaiveDate, NaiveTime), DemandSlot> = HashMap::new();
    for row in rows {
        match best.entry((row.location.clone(), row.date, row.start)) {
            Entry::Occupied(mut entry) => {
                if row.required_units > entry.get().required_units {
                    entry.insert(row);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(row);
            }
        }
    }
    let mut rows: Vec<DemandSlot> = best.into_values().collect();
    rows.sort_by(|a, b| {
        (a.location.as_str(), a.date, a.start).cmp(&(b.location.as_str(), b.date, b.start))
    });
    rows
}

type SlotKey = (String, Option<String>, NaiveDate, NaiveTime, Option<String>);
type MergeKey = (String, Option<String>, NaiveDate, Option<String>, u32);

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn time_of_minute(minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn test_alignment() {
        let grid = SlotGrid::QUARTER_HOUR;
        assert!(grid.is_aligned(t(9, 0)));
        assert!(grid.is_aligned(t(23, 45)));
        assert!(!grid.is_aligned(t(9, 5)));
        assert!(!grid.is_aligned(NaiveTime::from_hms_opt(9, 0, 30).unwrap()));
    }

    #[test]
    fn test_invalid_granularity() {
        assert!(SlotGrid::new(0).is_err());
        assert!(SlotGrid::new(7).is_err());
        assert!(SlotGrid::new(60).is_ok());
    }

    #[test]
    fn test_normalize_down_up_nearest() {
        let grid = SlotGrid::QUARTER_HOUR;
        assert_eq!(grid.normalize(t(9, 5), Rounding::Down), t(9, 0));
        assert_eq!(grid.normalize(t(9, 5), Rounding::Up), t(9, 15));
        assert_eq!(grid.normalize(t(9, 7), Rounding::Nearest), t(9, 0));
        assert_eq!(grid.normalize(t(9, 8), Rounding::Nearest), t(9, 15));
        // Aligned times pass through untouched
        assert_eq!(grid.normalize(t(9, 15), Rounding::Up), t(9, 15));
        // Stray seconds on an aligned minute round up, not through
        let nine_and_change = NaiveTime::from_hms_opt(9, 0, 30).unwrap();
        assert_eq!(grid.normalize(nine_and_change, Rounding::Up), t(9, 15));
        assert_eq!(grid.normalize(nine_and_change, Rounding::Down), t(9, 0));
    }

    #[test]
    fn test_normalize_caps_at_last_slot() {
        let grid = SlotGrid::QUARTER_HOUR;
        // 23:50 up would be 24:00; cap at the last valid slot start instead
        assert_eq!(grid.normalize(t(23, 50), Rounding::Up), t(23, 45));
        assert_eq!(grid.normalize(t(23, 55), Rounding::Nearest), t(23, 45));
        assert_eq!(grid.normalize(t(23, 50), Rounding::Down), t(23, 45));
    }

    #[test]
    fn test_slot_index_bijection() {
        let grid = SlotGrid::QUARTER_HOUR;
        assert_eq!(grid.to_slot_index(t(0, 0)).unwrap(), 0);
        assert_eq!(grid.to_slot_index(t(9, 30)).unwrap(), 38);
        assert_eq!(grid.to_slot_index(t(23, 45)).unwrap(), 95);
        for index in 0..grid.slots_per_day() {
            let time = grid.from_slot_index(index).unwrap();
            assert_eq!(grid.to_slot_index(time).unwrap(), index);
        }
    }

    #[test]
    fn test_slot_index_errors() {
        let grid = SlotGrid::QUARTER_HOUR;
        assert!(matches!(
            grid.to_slot_index(t(9, 10)),
            Err(ShiftForgeError::Unaligned { .. })
        ));
        assert!(matches!(
            grid.from_slot_index(96),
            Err(ShiftForgeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_split_basic() {
        let grid = SlotGrid::QUARTER_HOUR;
        let interval = DemandInterval::new("S1", d(), t(9, 0), t(10, 0), 2);
        let slots = grid.split(&interval).unwrap();

        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].start, t(9, 0));
        assert_eq!(slots[3].start, t(9, 45));
        assert!(slots.iter().all(|s| s.required_units == 2));
    }

    #[test]
    fn test_split_rejects_bad_input() {
        let grid = SlotGrid::QUARTER_HOUR;
        let unaligned = DemandInterval::new("S1", d(), t(9, 5), t(10, 0), 1);
        assert!(matches!(
            grid.split(&unaligned),
            Err(ShiftForgeError::Unaligned { .. })
        ));

        let empty = DemandInterval::new("S1", d(), t(10, 0), t(10, 0), 1);
        assert!(matches!(
            grid.split(&empty),
            Err(ShiftForgeError::InvalidRange { .. })
        ));

        let inverted = DemandInterval::new("S1", d(), t(10, 0), t(9, 0), 1);
        assert!(matches!(
            grid.split(&inverted),
            Err(ShiftForgeError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_aggregate_sums_duplicates() {
        let grid = SlotGrid::QUARTER_HOUR;
        let intervals = vec![
            DemandInterval::new("S1", d(), t(9, 0), t(10, 0), 2),
            DemandInterval::new("S1", d(), t(9, 30), t(10, 30), 1),
        ];

        let slots = grid.aggregate(&intervals).unwrap();
        assert_eq!(slots.len(), 6);
        // Overlap at 09:30 and 09:45 sums to 3
        assert_eq!(slots[0].required_units, 2); // 09:00
        assert_eq!(slots[2].required_units, 3); // 09:30
        assert_eq!(slots[3].required_units, 3); // 09:45
        assert_eq!(slots[5].required_units, 1); // 10:15
    }

    #[test]
    fn test_aggregate_associativity() {
        let grid = SlotGrid::QUARTER_HOUR;
        let a = DemandInterval::new("S1", d(), t(9, 0), t(9, 30), 1);
        let b = DemandInterval::new("S1", d(), t(9, 15), t(9, 45), 2);
        let c = DemandInterval::new("S1", d(), t(9, 0), t(9, 15), 4);

        let direct = grid.aggregate(&[a.clone(), b.clone(), c.clone()]).unwrap();

        let partial = grid.aggregate(&[a, b]).unwrap();
        let partial_as_intervals = grid.merge(&partial);
        let mut unioned = partial_as_intervals;
        unioned.push(c);
        let rejoined = grid.aggregate(&unioned).unwrap();

        assert_eq!(direct, rejoined);
    }

    #[test]
    fn test_aggregate_sort_order() {
        let grid = SlotGrid::QUARTER_HOUR;
        let intervals = vec![
            DemandInterval::new("S1", d(), t(9, 0), t(9, 15), 1).with_task("restock"),
            DemandInterval::new("S1", d(), t(9, 0), t(9, 15), 1),
            DemandInterval::new("S1", d(), t(9, 0), t(9, 15), 1).with_sub_area("grocery"),
        ];

        let slots = grid.aggregate(&intervals).unwrap();
        // Absent sub-area sorts as empty string, before "grocery";
        // within it, absent task before "restock"
        assert_eq!(slots[0].sub_area, None);
        assert_eq!(slots[0].task, None);
        assert_eq!(slots[1].task.as_deref(), Some("restock"));
        assert_eq!(slots[2].sub_area.as_deref(), Some("grocery"));
    }

    #[test]
    fn test_merge_breaks_runs() {
        let grid = SlotGrid::QUARTER_HOUR;
        let slots = vec![
            DemandSlot::new("S1", d(), t(9, 0), 1),
            DemandSlot::new("S1", d(), t(9, 15), 1),
            // gap at 09:30
            DemandSlot::new("S1", d(), t(9, 45), 1),
        ];

        let intervals = grid.merge(&slots);
        assert_eq!(intervals.len(), 2);
        assert_eq!((intervals[0].from, intervals[0].to), (t(9, 0), t(9, 30)));
        assert_eq!((intervals[1].from, intervals[1].to), (t(9, 45), t(10, 0)));
    }

    #[test]
    fn test_merge_separates_demand_levels() {
        let grid = SlotGrid::QUARTER_HOUR;
        let slots = vec![
            DemandSlot::new("S1", d(), t(9, 0), 1),
            DemandSlot::new("S1", d(), t(9, 15), 2),
        ];

        let intervals = grid.merge(&slots);
        // Different demand counts never merge into one interval
        assert_eq!(intervals.len(), 2);
    }

    #[test]
    fn test_split_merge_round_trip() {
        let grid = SlotGrid::QUARTER_HOUR;
        let interval = DemandInterval::new("S1", d(), t(8, 15), t(12, 0), 3)
            .with_sub_area("grocery")
            .with_task("checkout");

        let slots = grid.split(&interval).unwrap();
        let merged = grid.merge(&slots);

        assert_eq!(merged, vec![interval]);
    }

    #[test]
    fn test_dedup_takes_max() {
        let rows = vec![
            DemandSlot::new("S1", d(), t(9, 0), 2),
            DemandSlot::new("S1", d(), t(9, 0), 5),
            DemandSlot::new("S1", d(), t(9, 0), 3),
            DemandSlot::new("S1", d(), t(9, 15), 1),
        ];

        let deduped = dedup_demand_rows(rows);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].required_units, 5);
        assert_eq!(deduped[1].required_units, 1);
    }
}
