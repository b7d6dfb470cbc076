//! Storage abstraction used by the pipeline.

use crate::core::{AnalysisResult, PhysicalAlert};
use crate::reading::{HistoryEntry, Profile, Reading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a reading was judged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assessment {
    /// Personalised analysis against the baseline
    Analysis(AnalysisResult),
    /// A fixed physical limit was broken; no personalised analysis was run
    Physical(PhysicalAlert),
}

impl Assessment {
    pub fn risk(&self) -> u8 {
        match self {
            Assessment::Analysis(result) => result.risk,
            Assessment::Physical(alert) => alert.risk,
        }
    }

    pub fn alerts(&self) -> Vec<String> {
        match self {
            Assessment::Analysis(result) => result.alerts.clone(),
            Assessment::Physical(alert) => alert.messages(),
        }
    }

    pub fn is_physical(&self) -> bool {
        matches!(self, Assessment::Physical(_))
    }
}

/// Short-horizon forecasts computed from the history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub bpm: Option<f64>,
    pub temp: Option<f64>,
}

/// Stored outcome of processing one reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    /// Epoch milliseconds the record is keyed by
    pub timestamp: i64,
    pub reading: Reading,
    pub assessment: Assessment,
    /// `None` when the personalised analysis was skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Forecast>,
}

impl AnalysisRecord {
    pub fn new(now: DateTime<Utc>, reading: Reading, assessment: Assessment) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now.timestamp_millis(),
            reading,
            assessment,
            forecast: None,
        }
    }

    pub fn with_forecast(mut self, forecast: Forecast) -> Self {
        self.forecast = Some(forecast);
        self
    }
}

/// Storage errors.
#[derive(Debug)]
pub enum StoreError {
    /// Filesystem error
    Io(String),
    /// JSON (de)serialization error
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "Store IO error: {msg}"),
            StoreError::Serialization(msg) => write!(f, "Store serialization error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Per-device history, profile and record storage.
pub trait Repository: Send {
    /// The last `limit` history entries for a device, oldest first.
    fn recent_history(&self, device_id: &str, limit: usize)
        -> Result<Vec<HistoryEntry>, StoreError>;

    /// Append an entry and apply the retention policy relative to `now`.
    ///
    /// Entries without a timestamp are stamped with `now`. Returns the
    /// number of evicted entries.
    fn append_history(
        &mut self,
        device_id: &str,
        entry: HistoryEntry,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    fn profile(&self, device_id: &str) -> Result<Option<Profile>, StoreError>;

    fn save_record(&mut self, device_id: &str, record: AnalysisRecord) -> Result<(), StoreError>;
}
