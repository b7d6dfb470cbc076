//! Multi-channel anomaly scoring against a personal baseline.
//!
//! Seven independent rules are evaluated against the current reading.
//! Each rule that fires appends an alert message and adds its weight to
//! the risk score; the total is clamped to 100.

use crate::core::baseline::{compute_baseline, Baseline, InsufficientData};
use crate::core::stats::round1;
use crate::core::thresholds::ThresholdSet;
use crate::core::timeslot::TimeSlot;
use crate::reading::{Channel, HistoryEntry, Profile, Reading};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// |z| above which a heart rate is anomalous on its own.
pub const Z_SCORE_BPM_CRITICAL: f64 = 3.0;

/// Relative bpm jump that counts as a sudden spike.
pub const ROC_BPM_CRITICAL: f64 = 0.35;

/// Acceleration above which a fall/impact is assumed, and below which the wearer is resting.
pub const ACC_FALL_THRESHOLD: f64 = 12.0;

/// |z| of the heart rate that, together with fever, is considered abnormal.
pub const Z_SCORE_FEVER_BPM: f64 = 2.0;

/// Risk reported while the baseline is still being learned.
pub const INSUFFICIENT_DATA_RISK: u8 = 5;

/// Upper bound of the risk score.
pub const MAX_RISK: u32 = 100;

/// Human-readable risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Need more data")]
    NeedMoreData,
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Abnormal change")]
    AbnormalChange,
    #[serde(rename = "Needs close monitoring")]
    NeedsCloseMonitoring,
    #[serde(rename = "High risk")]
    HighRisk,
    #[serde(rename = "Emergency")]
    Emergency,
}

impl RiskLevel {
    /// Classify an accumulated risk score. The highest matching band wins.
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            RiskLevel::Emergency
        } else if score >= 60 {
            RiskLevel::HighRisk
        } else if score >= 40 {
            RiskLevel::NeedsCloseMonitoring
        } else if score > INSUFFICIENT_DATA_RISK as u32 {
            RiskLevel::AbnormalChange
        } else {
            RiskLevel::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::NeedMoreData => "Need more data",
            RiskLevel::Normal => "Normal",
            RiskLevel::AbnormalChange => "Abnormal change",
            RiskLevel::NeedsCloseMonitoring => "Needs close monitoring",
            RiskLevel::HighRisk => "High risk",
            RiskLevel::Emergency => "Emergency",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The anomaly rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRule {
    HighHeartRate,
    LowHeartRate,
    LowHrv,
    RestingSpike,
    FeverWithAbnormalHeartRate,
    LowSpO2,
    Fall,
}

impl RiskRule {
    /// Risk points added when the rule fires.
    pub fn weight(&self) -> u32 {
        match self {
            RiskRule::HighHeartRate => 40,
            RiskRule::LowHeartRate => 40,
            RiskRule::LowHrv => 50,
            RiskRule::RestingSpike => 60,
            RiskRule::FeverWithAbnormalHeartRate => 70,
            RiskRule::LowSpO2 => 60,
            RiskRule::Fall => 80,
        }
    }
}

/// Summary of the baseline the reading was judged against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub current_slot: TimeSlot,
    pub bpm_mean: f64,
    pub bpm_std: f64,
    pub hrv_mean: f64,
    pub hrv_std: f64,
    #[serde(rename = "spO2Mean")]
    pub spo2_mean: Option<f64>,
    pub count_abnormal_recent: usize,
}

impl Pattern {
    fn new(baseline: &Baseline, count_abnormal_recent: usize) -> Self {
        Self {
            current_slot: baseline.slot,
            bpm_mean: round1(baseline.bpm.mean),
            bpm_std: round1(baseline.bpm.std),
            hrv_mean: round1(baseline.hrv.mean),
            hrv_std: round1(baseline.hrv.std),
            spo2_mean: baseline.spo2.map(|s| round1(s.mean)),
            count_abnormal_recent,
        }
    }
}

/// Outcome of analysing one reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Alert messages in detection order
    pub alerts: Vec<String>,
    /// Risk score in [0, 100]
    pub risk: u8,
    pub risk_text: RiskLevel,
    /// Present only when a baseline could be built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    /// Present only when there was not enough history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl AnalysisResult {
    /// The sentinel result returned while the baseline is still being learned.
    pub fn insufficient(reason: &InsufficientData) -> Self {
        Self {
            alerts: Vec::new(),
            risk: INSUFFICIENT_DATA_RISK,
            risk_text: RiskLevel::NeedMoreData,
            pattern: None,
            info: Some(reason.message()),
        }
    }

    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }

    pub fn is_insufficient(&self) -> bool {
        self.risk_text == RiskLevel::NeedMoreData
    }
}

/// Relative change of `channel` against the most recent history entry.
///
/// Returns 0 when history is empty or either value is missing or zero.
pub fn rate_of_change(reading: &Reading, history: &[HistoryEntry], channel: Channel) -> f64 {
    let Some(previous) = history.last().and_then(|e| e.channel(channel)) else {
        return 0.0;
    };
    match reading.channel(channel) {
        Some(current) if current != 0.0 && previous != 0.0 => (current - previous) / previous,
        _ => 0.0,
    }
}

/// Whether the wearer is at rest, by explicit flag or by low acceleration.
pub fn is_resting(reading: &Reading) -> bool {
    reading.is_resting == Some(true)
        || reading
            .total_acc
            .is_some_and(|acc| acc < ACC_FALL_THRESHOLD)
}

/// Abnormal heart rates among the last two history entries and the current reading.
pub fn count_abnormal_recent(
    reading: &Reading,
    history: &[HistoryEntry],
    thresholds: &ThresholdSet,
) -> usize {
    let tail = &history[history.len().saturating_sub(2)..];
    tail.iter()
        .filter_map(|e| e.bpm)
        .chain(reading.bpm)
        .filter(|bpm| thresholds.is_bpm_abnormal(*bpm))
        .count()
}

/// Running tally of fired rules.
#[derive(Default)]
struct Tally {
    alerts: Vec<String>,
    score: u32,
}

impl Tally {
    fn fire(&mut self, rule: RiskRule, message: String) {
        self.alerts.push(message);
        self.score += rule.weight();
    }
}

/// Evaluates readings against a personal baseline.
#[derive(Debug, Clone, Copy)]
pub struct RiskEngine {
    timezone: Tz,
}

impl RiskEngine {
    /// Create an engine that classifies time slots in `timezone`.
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Analyse a reading. "Now" is the reading's timestamp, or the wall clock if it has none.
    pub fn analyze(
        &self,
        reading: &Reading,
        history: &[HistoryEntry],
        profile: &Profile,
    ) -> AnalysisResult {
        let now = reading.observed_at().unwrap_or_else(Utc::now);
        self.analyze_at(reading, history, profile, now)
    }

    /// Analyse a reading as of `now`.
    pub fn analyze_at(
        &self,
        reading: &Reading,
        history: &[HistoryEntry],
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> AnalysisResult {
        let slot = TimeSlot::at(now, self.timezone);

        let baseline = match compute_baseline(history, slot, now, self.timezone) {
            Ok(baseline) => baseline,
            Err(insufficient) => return AnalysisResult::insufficient(&insufficient),
        };

        let thresholds = ThresholdSet::for_profile(profile);
        let roc_bpm = rate_of_change(reading, history, Channel::Bpm);
        let resting = is_resting(reading);
        let abnormal_recent = count_abnormal_recent(reading, history, &thresholds);

        let mut tally = Tally::default();
        let bpm_z = reading.bpm.and_then(|bpm| baseline.bpm.z_score(bpm));

        // Heart rate
        if let (Some(bpm), Some(z)) = (reading.bpm, bpm_z) {
            if z > Z_SCORE_BPM_CRITICAL || bpm > thresholds.bpm_high {
                tally.fire(
                    RiskRule::HighHeartRate,
                    format!("High heart rate: {bpm} bpm (z={z:.1})"),
                );
            }
            if z < -Z_SCORE_BPM_CRITICAL || bpm < thresholds.bpm_low {
                tally.fire(
                    RiskRule::LowHeartRate,
                    format!("Low heart rate: {bpm} bpm (z={z:.1})"),
                );
            }
        }

        // HRV
        if let Some(hrv) = reading.hrv {
            if let Some(z) = baseline.hrv.z_score(hrv) {
                if z < -thresholds.hrv_critical {
                    tally.fire(
                        RiskRule::LowHrv,
                        format!("Critically low HRV: {hrv} (z={z:.1}), acute stress risk"),
                    );
                }
            }
        }

        // Sudden spike at rest
        if roc_bpm > ROC_BPM_CRITICAL
            && resting
            && reading.bpm.is_some_and(|bpm| bpm > thresholds.bpm_high)
        {
            tally.fire(
                RiskRule::RestingSpike,
                format!(
                    "Sudden heart-rate spike of {:.0}% while resting",
                    roc_bpm * 100.0
                ),
            );
        }

        // Fever with abnormal heart rate
        if let (Some(temp), Some(z)) = (reading.temp, bpm_z) {
            if temp > thresholds.temp_high && z.abs() > Z_SCORE_FEVER_BPM {
                tally.fire(
                    RiskRule::FeverWithAbnormalHeartRate,
                    format!("Fever of {temp}°C combined with abnormal heart rate"),
                );
            }
        }

        // Blood oxygen
        if let Some(spo2) = reading.spo2 {
            if spo2 < thresholds.spo2_low {
                tally.fire(
                    RiskRule::LowSpO2,
                    format!("Low blood oxygen: SpO2 {spo2}%, risk of hypoxia"),
                );
            }
        }

        // Fall or strong impact
        if let Some(fall) = &reading.fall {
            let strong_impact = fall.total_acc.is_some_and(|acc| acc > ACC_FALL_THRESHOLD);
            if strong_impact || fall.is_reported_fall() {
                tally.fire(
                    RiskRule::Fall,
                    "Fall or strong impact detected".to_string(),
                );
            }
        }

        AnalysisResult {
            alerts: tally.alerts,
            risk: tally.score.min(MAX_RISK) as u8,
            risk_text: RiskLevel::from_score(tally.score),
            pattern: Some(Pattern::new(&baseline, abnormal_recent)),
            info: None,
        }
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

/// Analyse a reading with slots classified in UTC.
pub fn analyze(reading: &Reading, history: &[HistoryEntry], profile: &Profile) -> AnalysisResult {
    RiskEngine::default().analyze(reading, history, profile)
}
