//! Time-of-day slots used to contextualise baselines.
//!
//! A day is split into four fixed slots. History is only compared against
//! readings from the same slot, so a resting night-time heart rate is not
//! judged against an afternoon walk.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four daily periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSlot {
    /// [00:00, 06:00)
    Night,
    /// [06:00, 12:00)
    Morning,
    /// [12:00, 18:00)
    Afternoon,
    /// [18:00, 24:00)
    Evening,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 4] = [
        TimeSlot::Night,
        TimeSlot::Morning,
        TimeSlot::Afternoon,
        TimeSlot::Evening,
    ];

    /// Classify an hour of the day. Hours above 23 fall into `Evening`.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => TimeSlot::Night,
            6..=11 => TimeSlot::Morning,
            12..=17 => TimeSlot::Afternoon,
            _ => TimeSlot::Evening,
        }
    }

    /// Classify an instant in the given timezone.
    pub fn of<T: TimeZone>(instant: &DateTime<T>) -> Self {
        Self::from_hour(instant.hour())
    }

    /// Classify a UTC instant after converting it to `tz`.
    pub fn at(instant: DateTime<Utc>, tz: Tz) -> Self {
        Self::of(&instant.with_timezone(&tz))
    }

    /// Classify an epoch-millisecond timestamp.
    ///
    /// Returns `None` when the timestamp is outside chrono's range.
    pub fn from_millis(timestamp_ms: i64, tz: Tz) -> Option<Self> {
        DateTime::from_timestamp_millis(timestamp_ms).map(|instant| Self::at(instant, tz))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeSlot::Night => "Night",
            TimeSlot::Morning => "Morning",
            TimeSlot::Afternoon => "Afternoon",
            TimeSlot::Evening => "Evening",
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_boundaries() {
        assert_eq!(TimeSlot::from_hour(0), TimeSlot::Night);
        assert_eq!(TimeSlot::from_hour(5), TimeSlot::Night);
        assert_eq!(TimeSlot::from_hour(6), TimeSlot::Morning);
        assert_eq!(TimeSlot::from_hour(11), TimeSlot::Morning);
        assert_eq!(TimeSlot::from_hour(12), TimeSlot::Afternoon);
        assert_eq!(TimeSlot::from_hour(17), TimeSlot::Afternoon);
        assert_eq!(TimeSlot::from_hour(18), TimeSlot::Evening);
        assert_eq!(TimeSlot::from_hour(23), TimeSlot::Evening);
    }

    #[test]
    fn test_every_hour_maps_to_one_slot() {
        let mut counts = [0usize; 4];
        for hour in 0..24 {
            let slot = TimeSlot::from_hour(hour);
            let idx = TimeSlot::ALL.iter().position(|s| *s == slot).unwrap();
            counts[idx] += 1;
        }
        assert_eq!(counts, [6, 6, 6, 6]);
    }

    #[test]
    fn test_timezone_conversion() {
        // 2024-01-01T03:00:00Z is 04:00 in Paris and 22:00 the previous day in New York
        let ts = 1_704_078_000_000;
        assert_eq!(TimeSlot::from_millis(ts, Tz::UTC), Some(TimeSlot::Night));
        assert_eq!(
            TimeSlot::from_millis(ts, chrono_tz::Europe::Paris),
            Some(TimeSlot::Night)
        );
        assert_eq!(
            TimeSlot::from_millis(ts, chrono_tz::America::New_York),
            Some(TimeSlot::Evening)
        );
    }

    #[test]
    fn test_out_of_range_timestamp() {
        assert_eq!(TimeSlot::from_millis(i64::MAX, Tz::UTC), None);
    }
}
