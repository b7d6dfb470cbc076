//! Age- and condition-adapted alert thresholds.

use crate::reading::{Profile, UnderlyingConditions};
use serde::{Deserialize, Serialize};

/// Blood-oxygen floor, identical for every age band.
pub const SPO2_LOW: f64 = 94.0;

/// Alert thresholds for one person.
///
/// Derived fresh from the profile on every analysis and never shared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ThresholdSet {
    pub bpm_high: f64,
    pub bpm_low: f64,
    /// Magnitude of the negative HRV z-score considered critical
    pub hrv_critical: f64,
    pub temp_high: f64,
    pub spo2_low: f64,
}

impl ThresholdSet {
    /// Derive thresholds from the profile's age band and conditions.
    pub fn for_profile(profile: &Profile) -> Self {
        Self::for_age(profile.age, &profile.underlying_conditions)
    }

    pub fn for_age(age: u32, conditions: &UnderlyingConditions) -> Self {
        let (bpm_high, bpm_low, hrv_critical, temp_high) = match age {
            0..=12 => (120.0, 70.0, 2.0, 38.0),
            13..=18 => (110.0, 60.0, 2.2, 38.0),
            19..=40 => (100.0, 50.0, 2.5, 38.5),
            41..=60 => (100.0, 50.0, 2.5, 38.5),
            _ => (95.0, 55.0, 2.5, 38.5),
        };

        let mut thresholds = Self {
            bpm_high,
            bpm_low,
            hrv_critical,
            temp_high,
            spo2_low: SPO2_LOW,
        };

        if conditions.heart_disease {
            thresholds.bpm_high -= 5.0;
            thresholds.hrv_critical = 2.0;
        }
        if conditions.hypertension {
            thresholds.bpm_high += 5.0;
        }

        thresholds
    }

    /// Whether a heart rate lies outside `[bpm_low, bpm_high]`.
    pub fn is_bpm_abnormal(&self, bpm: f64) -> bool {
        bpm > self.bpm_high || bpm < self.bpm_low
    }
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self::for_profile(&Profile::default())
    }
}
