//! Per-slot baseline statistics learned from recent history.
//!
//! The baseline for a reading is built only from history in the same
//! time-of-day slot. When that slice is too thin, selection is retried
//! restricted to the last two days of the same slot before the data
//! sufficiency gate is applied.

use crate::core::stats::{mean, std_dev, z_score};
use crate::core::timeslot::TimeSlot;
use crate::reading::{Channel, HistoryEntry};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Minimum number of bpm and hrv samples required to build a baseline.
pub const MIN_DATA_POINTS: usize = 10;

/// Look-back used by the fallback selection (2 days).
pub const FALLBACK_WINDOW_MS: i64 = 2 * 24 * 60 * 60 * 1000;

/// Mean and population standard deviation of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

impl ChannelStats {
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            mean: mean(values),
            std: std_dev(values),
            count: values.len(),
        }
    }

    /// Standard score of `value`, or `None` when the baseline has no spread.
    pub fn z_score(&self, value: f64) -> Option<f64> {
        z_score(value, self.mean, self.std)
    }
}

/// Baseline for the current slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub slot: TimeSlot,
    pub bpm: ChannelStats,
    pub hrv: ChannelStats,
    /// `None` when no SpO2 values were recorded in the slot
    pub spo2: Option<ChannelStats>,
    /// Whether the two-day fallback selection was used
    pub used_fallback: bool,
}

/// Not enough same-slot history to build a baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientData {
    pub slot: TimeSlot,
    pub bpm_count: usize,
    pub hrv_count: usize,
    pub used_fallback: bool,
}

impl InsufficientData {
    /// Informational message for the caller.
    pub fn message(&self) -> String {
        format!(
            "Not enough data (need {MIN_DATA_POINTS} readings, have {} bpm / {} hrv) to learn the {} time-slot pattern",
            self.bpm_count, self.hrv_count, self.slot
        )
    }
}

impl std::fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Select the history entries that belong to `slot`.
///
/// Entries without a usable timestamp are skipped. Returns the selection
/// and whether the two-day fallback was applied.
pub fn select_slot_history<'a>(
    history: &'a [HistoryEntry],
    slot: TimeSlot,
    now: DateTime<Utc>,
    tz: Tz,
) -> (Vec<&'a HistoryEntry>, bool) {
    let in_slot = |entry: &HistoryEntry| -> Option<i64> {
        let ts = entry.timestamp?;
        (TimeSlot::from_millis(ts, tz)? == slot).then_some(ts)
    };

    let selected: Vec<&HistoryEntry> = history.iter().filter(|e| in_slot(e).is_some()).collect();
    if selected.len() >= MIN_DATA_POINTS {
        return (selected, false);
    }

    let cutoff = now.timestamp_millis() - FALLBACK_WINDOW_MS;
    let recent = history
        .iter()
        .filter(|e| in_slot(e).is_some_and(|ts| ts >= cutoff))
        .collect();
    (recent, true)
}

fn channel_values(entries: &[&HistoryEntry], channel: Channel) -> Vec<f64> {
    entries.iter().filter_map(|e| e.channel(channel)).collect()
}

/// Build the baseline for `slot`, or report why there is not enough data.
pub fn compute_baseline(
    history: &[HistoryEntry],
    slot: TimeSlot,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<Baseline, InsufficientData> {
    let (entries, used_fallback) = select_slot_history(history, slot, now, tz);

    let bpm = channel_values(&entries, Channel::Bpm);
    let hrv = channel_values(&entries, Channel::Hrv);

    if bpm.len() < MIN_DATA_POINTS || hrv.len() < MIN_DATA_POINTS {
        return Err(InsufficientData {
            slot,
            bpm_count: bpm.len(),
            hrv_count: hrv.len(),
            used_fallback,
        });
    }

    let spo2 = channel_values(&entries, Channel::SpO2);

    Ok(Baseline {
        slot,
        bpm: ChannelStats::from_values(&bpm),
        hrv: ChannelStats::from_values(&hrv),
        spo2: (!spo2.is_empty()).then(|| ChannelStats::from_values(&spo2)),
        used_fallback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Reading;

    // 2024-01-01T03:00:00Z
    const NOW_MS: i64 = 1_704_078_000_000;
    const MINUTE_MS: i64 = 60_000;
    const DAY_MS: i64 = 24 * 60 * MINUTE_MS;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(NOW_MS).unwrap()
    }

    fn night_entry(offset_ms: i64, bpm: f64, hrv: f64) -> HistoryEntry {
        Reading::new().at(NOW_MS - offset_ms).with_bpm(bpm).with_hrv(hrv)
    }

    #[test]
    fn test_baseline_from_same_slot() {
        let mut history: Vec<HistoryEntry> = (0..12)
            .map(|i| {
                let bpm = if i % 2 == 0 { 65.0 } else { 75.0 };
                night_entry(i * 5 * MINUTE_MS, bpm, 50.0)
            })
            .collect();
        // Afternoon readings must not leak into the night baseline
        let afternoon = Reading::new()
            .at(NOW_MS + 10 * 60 * MINUTE_MS)
            .with_bpm(150.0)
            .with_hrv(10.0);
        history.push(afternoon);

        let baseline = compute_baseline(&history, TimeSlot::Night, now(), Tz::UTC).unwrap();

        assert_eq!(baseline.slot, TimeSlot::Night);
        assert_eq!(baseline.bpm.count, 12);
        assert!((baseline.bpm.mean - 70.0).abs() < 1e-9);
        assert!((baseline.bpm.std - 5.0).abs() < 1e-9);
        assert_eq!(baseline.hrv.std, 0.0);
        assert!(baseline.spo2.is_none());
        assert!(!baseline.used_fallback);
    }

    #[test]
    fn test_insufficient_data() {
        let history: Vec<HistoryEntry> = (0..9)
            .map(|i| night_entry(i * MINUTE_MS, 70.0, 50.0))
            .collect();

        let err = compute_baseline(&history, TimeSlot::Night, now(), Tz::UTC).unwrap_err();
        assert_eq!(err.bpm_count, 9);
        assert!(err.used_fallback);
        assert!(err.message().contains("Night"));
        assert!(err.message().contains("10"));
    }

    #[test]
    fn test_missing_hrv_counts_against_sufficiency() {
        let history: Vec<HistoryEntry> = (0..15)
            .map(|i| {
                let mut e = night_entry(i * MINUTE_MS, 70.0, 50.0);
                if i >= 8 {
                    e.hrv = None;
                }
                e
            })
            .collect();

        let err = compute_baseline(&history, TimeSlot::Night, now(), Tz::UTC).unwrap_err();
        assert_eq!(err.bpm_count, 15);
        assert_eq!(err.hrv_count, 8);
    }

    #[test]
    fn test_entries_without_timestamp_are_skipped() {
        let mut history: Vec<HistoryEntry> = (0..10)
            .map(|i| night_entry(i * MINUTE_MS, 70.0, 50.0))
            .collect();
        history[3].timestamp = None;

        let (selected, used_fallback) =
            select_slot_history(&history, TimeSlot::Night, now(), Tz::UTC);
        assert_eq!(selected.len(), 9);
        assert!(used_fallback);
    }

    #[test]
    fn test_fallback_keeps_only_recent_days() {
        // 6 old night readings plus 5 from last night
        let mut history: Vec<HistoryEntry> = (0..6)
            .map(|i| night_entry(5 * DAY_MS + i * MINUTE_MS, 70.0, 50.0))
            .collect();
        history.extend((0..5).map(|i| night_entry(DAY_MS + i * MINUTE_MS, 70.0, 50.0)));

        let (selected, used_fallback) =
            select_slot_history(&history[..9], TimeSlot::Night, now(), Tz::UTC);
        assert!(used_fallback);
        assert_eq!(selected.len(), 3);

        let (selected, used_fallback) =
            select_slot_history(&history, TimeSlot::Night, now(), Tz::UTC);
        assert!(!used_fallback);
        assert_eq!(selected.len(), 11);
    }

    #[test]
    fn test_fallback_window_is_inclusive() {
        let history = vec![
            night_entry(FALLBACK_WINDOW_MS, 70.0, 50.0),
            night_entry(FALLBACK_WINDOW_MS + 1, 71.0, 50.0),
        ];

        let (selected, used_fallback) =
            select_slot_history(&history, TimeSlot::Night, now(), Tz::UTC);
        assert!(used_fallback);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].timestamp, Some(NOW_MS - FALLBACK_WINDOW_MS));
    }

    #[test]
    fn test_spo2_mean_when_present() {
        let history: Vec<HistoryEntry> = (0..10)
            .map(|i| {
                let e = night_entry(i * MINUTE_MS, 70.0, 50.0);
                if i < 4 {
                    e.with_spo2(96.0)
                } else {
                    e
                }
            })
            .collect();

        let baseline = compute_baseline(&history, TimeSlot::Night, now(), Tz::UTC).unwrap();
        let spo2 = baseline.spo2.unwrap();
        assert_eq!(spo2.count, 4);
        assert!((spo2.mean - 96.0).abs() < 1e-9);
    }
}
