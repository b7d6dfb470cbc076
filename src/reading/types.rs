//! Reading, history and profile types shared by the analysis core and the pipeline.
//!
//! Every sensor channel is optional. A missing channel never fails
//! deserialization; it only disables the rules that need it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status string the fall sensor reports when it has detected a fall.
pub const FALL_DETECTED_STATUS: &str = "fall-detected";

/// Fall/impact indicator reported by the motion sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallInfo {
    /// Free-form status reported by the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Peak acceleration magnitude of the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_acc: Option<f64>,
}

impl FallInfo {
    /// Whether the device itself classified the event as a fall.
    pub fn is_reported_fall(&self) -> bool {
        self.status.as_deref() == Some(FALL_DETECTED_STATUS)
    }
}

/// A single physiological reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Heart rate in beats per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    /// Heart-rate variability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hrv: Option<f64>,
    /// Body temperature in °C
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    /// Blood-oxygen saturation in percent
    #[serde(rename = "spO2", default, skip_serializing_if = "Option::is_none")]
    pub spo2: Option<f64>,
    /// Total acceleration magnitude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_acc: Option<f64>,
    /// Fall indicator, absent when the motion sensor reported nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fall: Option<FallInfo>,
    /// Explicit resting flag from the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_resting: Option<bool>,
    /// Epoch milliseconds; accepts integers, floats and numeric strings
    #[serde(
        default,
        with = "timestamp_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,
}

/// A stored reading. The timestamp key lives on the reading itself.
pub type HistoryEntry = Reading;

impl Reading {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp = Some(timestamp_ms);
        self
    }

    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = Some(bpm);
        self
    }

    pub fn with_hrv(mut self, hrv: f64) -> Self {
        self.hrv = Some(hrv);
        self
    }

    pub fn with_temp(mut self, temp: f64) -> Self {
        self.temp = Some(temp);
        self
    }

    pub fn with_spo2(mut self, spo2: f64) -> Self {
        self.spo2 = Some(spo2);
        self
    }

    pub fn with_total_acc(mut self, total_acc: f64) -> Self {
        self.total_acc = Some(total_acc);
        self
    }

    pub fn with_fall(mut self, fall: FallInfo) -> Self {
        self.fall = Some(fall);
        self
    }

    pub fn resting(mut self, is_resting: bool) -> Self {
        self.is_resting = Some(is_resting);
        self
    }

    /// Value of a single channel, if present.
    pub fn channel(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Bpm => self.bpm,
            Channel::Hrv => self.hrv,
            Channel::Temp => self.temp,
            Channel::SpO2 => self.spo2,
            Channel::TotalAcc => self.total_acc,
        }
    }

    /// The reading's timestamp as a UTC instant.
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(DateTime::from_timestamp_millis)
    }
}

/// Numeric sensor channels that can be baselined or forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "bpm")]
    Bpm,
    #[serde(rename = "hrv")]
    Hrv,
    #[serde(rename = "temp")]
    Temp,
    #[serde(rename = "spO2")]
    SpO2,
    #[serde(rename = "totalAcc")]
    TotalAcc,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Bpm => "bpm",
            Channel::Hrv => "hrv",
            Channel::Temp => "temp",
            Channel::SpO2 => "spO2",
            Channel::TotalAcc => "totalAcc",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised channel name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChannel(pub String);

impl fmt::Display for UnknownChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown channel '{}' (expected bpm, hrv, temp, spO2 or totalAcc)",
            self.0
        )
    }
}

impl std::error::Error for UnknownChannel {}

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bpm" => Ok(Channel::Bpm),
            "hrv" => Ok(Channel::Hrv),
            "temp" => Ok(Channel::Temp),
            "spO2" | "spo2" => Ok(Channel::SpO2),
            "totalAcc" | "total_acc" => Ok(Channel::TotalAcc),
            other => Err(UnknownChannel(other.to_string())),
        }
    }
}

/// Known health conditions that shift alert thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UnderlyingConditions {
    pub heart_disease: bool,
    pub hypertension: bool,
}

/// Default age used when a profile does not provide one.
pub const DEFAULT_AGE: u32 = 30;

fn default_age() -> u32 {
    DEFAULT_AGE
}

/// Per-person profile used to adapt thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default = "default_age")]
    pub age: u32,
    #[serde(default)]
    pub underlying_conditions: UnderlyingConditions,
}

impl Profile {
    pub fn new(age: u32, underlying_conditions: UnderlyingConditions) -> Self {
        Self {
            age,
            underlying_conditions,
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new(DEFAULT_AGE, UnderlyingConditions::default())
    }
}

/// Lenient serde support for epoch-millisecond timestamps.
///
/// Unparseable values become `None` instead of failing the whole payload.
mod timestamp_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(timestamp: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        timestamp.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(parse(&value))
    }

    fn parse(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
            }
            _ => None,
        }
    }
}
