//! Absolute safety limits checked before any personalised analysis.
//!
//! These limits need no history and no profile. A reading that breaks one
//! is treated as critical straight away.

use crate::reading::Reading;
use serde::{Deserialize, Serialize};

pub const MAX_BPM: f64 = 150.0;
pub const MIN_BPM: f64 = 40.0;
pub const MAX_TEMP: f64 = 40.0;
pub const MIN_TEMP: f64 = 35.0;

/// Risk assigned to any physical-limit violation.
pub const PHYSICAL_RISK: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhysicalMetric {
    #[serde(rename = "BPM")]
    Bpm,
    Temperature,
}

/// One broken limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalViolation {
    pub metric: PhysicalMetric,
    pub value: f64,
    /// The limit that was crossed, e.g. `"> 150"`
    pub limit: String,
    pub message: String,
}

/// Result of a failed physical check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalAlert {
    pub risk: u8,
    pub violations: Vec<PhysicalViolation>,
}

impl PhysicalAlert {
    /// Alert messages in detection order.
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.message.clone()).collect()
    }
}

/// Check a reading against the fixed limits.
///
/// A channel reading exactly 0 is treated as not reported.
pub fn check_physical_limits(reading: &Reading) -> Option<PhysicalAlert> {
    let mut violations = Vec::new();

    if let Some(bpm) = reading.bpm.filter(|v| *v != 0.0) {
        if bpm > MAX_BPM {
            violations.push(PhysicalViolation {
                metric: PhysicalMetric::Bpm,
                value: bpm,
                limit: format!("> {MAX_BPM}"),
                message: format!("Heart rate ({bpm} bpm) is above the safe limit"),
            });
        } else if bpm < MIN_BPM {
            violations.push(PhysicalViolation {
                metric: PhysicalMetric::Bpm,
                value: bpm,
                limit: format!("< {MIN_BPM}"),
                message: format!("Heart rate ({bpm} bpm) is below the safe limit"),
            });
        }
    }

    if let Some(temp) = reading.temp.filter(|v| *v != 0.0) {
        if temp > MAX_TEMP {
            violations.push(PhysicalViolation {
                metric: PhysicalMetric::Temperature,
                value: temp,
                limit: format!("> {MAX_TEMP:.1}°C"),
                message: format!("Body temperature ({temp}°C) indicates a dangerous fever"),
            });
        } else if temp < MIN_TEMP {
            violations.push(PhysicalViolation {
                metric: PhysicalMetric::Temperature,
                value: temp,
                limit: format!("< {MIN_TEMP:.1}°C"),
                message: format!("Body temperature ({temp}°C) indicates hypothermia"),
            });
        }
    }

    if violations.is_empty() {
        None
    } else {
        Some(PhysicalAlert {
            risk: PHYSICAL_RISK,
            violations,
        })
    }
}
