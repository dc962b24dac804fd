//! Daily slot grid.
//!
//! The grid is the finite list of bookable start times for a day: the opening
//! time, then every `interval` minutes up to and including the last-start time.
//! Everything here is pure; no clock or storage access.

use crate::errors::{Error, Result};
use chrono::{NaiveTime, Timelike};

const SECONDS_PER_MINUTE: u32 = 60;

/// Operating parameters that define the daily slot grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrid {
    open: NaiveTime,
    last_start: NaiveTime,
    interval_minutes: u32,
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            last_start: NaiveTime::from_hms_opt(18, 15, 0).unwrap_or_default(),
            interval_minutes: 45,
        }
    }
}

impl SlotGrid {
    /// Builds a grid.
    ///
    /// An opening time after the last-start time is allowed and yields an
    /// empty grid.
    ///
    /// # Errors
    /// Returns `Error::Config` if `interval_minutes` is zero.
    pub fn new(open: NaiveTime, last_start: NaiveTime, interval_minutes: u32) -> Result<Self> {
        if interval_minutes == 0 {
            return Err(Error::Config {
                message: "slot interval must be at least one minute".to_string(),
            });
        }
        Ok(Self {
            open,
            last_start,
            interval_minutes,
        })
    }

    /// First bookable start time.
    #[must_use]
    pub const fn open(&self) -> NaiveTime {
        self.open
    }

    /// Last bookable start time.
    #[must_use]
    pub const fn last_start(&self) -> NaiveTime {
        self.last_start
    }

    /// Distance between consecutive slots, in minutes.
    #[must_use]
    pub const fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    const fn interval_seconds(&self) -> u32 {
        self.interval_minutes * SECONDS_PER_MINUTE
    }

    /// All slot start times, ascending.
    #[must_use]
    pub fn generate_slots(&self) -> Vec<NaiveTime> {
        let start = self.open.num_seconds_from_midnight();
        let end = self.last_start.num_seconds_from_midnight();
        if start > end {
            return Vec::new();
        }

        (start..=end)
            .step_by(self.interval_seconds() as usize)
            .filter_map(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
            .collect()
    }

    /// Slot labels formatted as `HH:MM`.
    #[must_use]
    pub fn slot_labels(&self) -> Vec<String> {
        self.generate_slots()
            .into_iter()
            .map(format_time_of_day)
            .collect()
    }

    /// Whether `time` is exactly one of the generated slots.
    #[must_use]
    pub fn is_on_grid(&self, time: NaiveTime) -> bool {
        if time.nanosecond() != 0 {
            return false;
        }
        let secs = time.num_seconds_from_midnight();
        let start = self.open.num_seconds_from_midnight();
        let end = self.last_start.num_seconds_from_midnight();
        secs >= start && secs <= end && (secs - start) % self.interval_seconds() == 0
    }

    /// Smallest grid step at or after `seconds_from_midnight`.
    ///
    /// Steps are counted from the opening time; anything before opening
    /// rounds up to the opening time. The result may lie past `last_start`,
    /// in which case no slot of the day satisfies it.
    #[must_use]
    pub fn ceil_to_step(&self, seconds_from_midnight: i64) -> i64 {
        let start = i64::from(self.open.num_seconds_from_midnight());
        let step = i64::from(self.interval_seconds());
        let elapsed = (seconds_from_midnight - start).max(0);
        let steps = (elapsed + step - 1) / step;
        start + steps * step
    }
}

/// Parses an `HH:MM` (or `HH:MM:SS`) time of day.
///
/// # Errors
/// Returns `Error::InvalidTime` if the value is not a valid time.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| Error::InvalidTime {
            value: value.to_string(),
        })
}

/// Formats a time of day as `HH:MM`.
#[must_use]
pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn t(value: &str) -> NaiveTime {
        parse_time_of_day(value).unwrap()
    }

    fn shop_grid() -> SlotGrid {
        SlotGrid::new(t("08:00"), t("18:15"), 45).unwrap()
    }

    #[test]
    fn test_generate_slots_shop_defaults() {
        let labels = shop_grid().slot_labels();
        assert_eq!(
            labels,
            vec![
                "08:00", "08:45", "09:30", "10:15", "11:00", "11:45", "12:30", "13:15", "14:00",
                "14:45", "15:30", "16:15", "17:00", "17:45"
            ]
        );
    }

    #[test]
    fn test_generate_slots_includes_last_start_when_on_step() {
        let grid = SlotGrid::new(t("09:00"), t("10:30"), 30).unwrap();
        assert_eq!(grid.slot_labels(), vec!["09:00", "09:30", "10:00", "10:30"]);
    }

    #[test]
    fn test_open_after_last_start_is_empty() {
        let grid = SlotGrid::new(t("19:00"), t("18:15"), 45).unwrap();
        assert!(grid.generate_slots().is_empty());
    }

    #[test]
    fn test_open_equal_last_start_yields_single_slot() {
        let grid = SlotGrid::new(t("10:00"), t("10:00"), 45).unwrap();
        assert_eq!(grid.slot_labels(), vec!["10:00"]);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(SlotGrid::new(t("08:00"), t("18:15"), 0).is_err());
    }

    #[test]
    fn test_is_on_grid_agrees_with_generate() {
        let grid = shop_grid();
        let slots = grid.generate_slots();
        for minute in 0..(24 * 60) {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(minute * 60, 0).unwrap();
            assert_eq!(
                grid.is_on_grid(time),
                slots.contains(&time),
                "disagreement at {time}"
            );
        }
    }

    #[test]
    fn test_is_on_grid_rejects_seconds_and_out_of_range() {
        let grid = shop_grid();
        assert!(!grid.is_on_grid(t("08:00:30")));
        assert!(!grid.is_on_grid(t("18:30")));
        assert!(!grid.is_on_grid(t("07:15")));
        assert!(grid.is_on_grid(t("17:45")));
    }

    #[test]
    fn test_ceil_to_step() {
        let grid = shop_grid();
        let secs = |v: &str| i64::from(t(v).num_seconds_from_midnight());

        // Before opening rounds up to opening
        assert_eq!(grid.ceil_to_step(secs("07:00")), secs("08:00"));
        // Exactly on a step stays
        assert_eq!(grid.ceil_to_step(secs("09:30")), secs("09:30"));
        // Between steps rounds up, never down
        assert_eq!(grid.ceil_to_step(secs("09:31")), secs("10:15"));
        assert_eq!(grid.ceil_to_step(secs("09:30") + 1), secs("10:15"));
    }

    #[test]
    fn test_parse_time_of_day_rejects_garbage() {
        assert!(matches!(
            parse_time_of_day("25:00"),
            Err(Error::InvalidTime { .. })
        ));
        assert!(matches!(
            parse_time_of_day("noon"),
            Err(Error::InvalidTime { .. })
        ));
    }
}
