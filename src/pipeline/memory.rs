//! In-memory repository with optional JSON persistence.

use super::store::{AnalysisRecord, Repository, StoreError};
use crate::reading::{HistoryEntry, Profile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default history retention (7 days).
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    histories: HashMap<String, Vec<HistoryEntry>>,
    profiles: HashMap<String, Profile>,
    records: HashMap<String, Vec<AnalysisRecord>>,
}

/// Repository that keeps everything in process memory.
#[derive(Debug)]
pub struct MemoryRepository {
    data: StoreData,
    retention: Duration,
    persist_path: Option<PathBuf>,
}

impl MemoryRepository {
    pub fn new(retention: Duration) -> Self {
        Self {
            data: StoreData::default(),
            retention,
            persist_path: None,
        }
    }

    /// Create a repository that loads from and saves to `path`.
    pub fn with_persistence(path: PathBuf, retention: Duration) -> Self {
        let mut repo = Self::new(retention);
        repo.persist_path = Some(path);

        if let Err(e) = repo.load() {
            tracing::warn!(error = %e, "could not load previous store contents");
        }

        repo
    }

    pub fn set_profile(&mut self, device_id: &str, profile: Profile) {
        self.data.profiles.insert(device_id.to_string(), profile);
    }

    /// Full stored history of a device, oldest first.
    pub fn history(&self, device_id: &str) -> &[HistoryEntry] {
        self.data
            .histories
            .get(device_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn records(&self, device_id: &str) -> &[AnalysisRecord] {
        self.data
            .records
            .get(device_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Devices that have any history, sorted.
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.data.histories.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Save contents to disk.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }

            let json = serde_json::to_string_pretty(&self.data)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            std::fs::write(path, json).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        Ok(())
    }

    /// Timestamps at or before this instant are past retention.
    fn cutoff(&self, now_ms: i64) -> i64 {
        let retention_ms = i64::try_from(self.retention.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(retention_ms)
    }

    fn load(&mut self) -> Result<(), StoreError> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content =
                    std::fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
                self.data = serde_json::from_str(&content)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl Repository for MemoryRepository {
    fn recent_history(
        &self,
        device_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let history = self.history(device_id);
        Ok(history[history.len().saturating_sub(limit)..].to_vec())
    }

    fn append_history(
        &mut self,
        device_id: &str,
        mut entry: HistoryEntry,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let now_ms = now.timestamp_millis();
        if entry.timestamp.is_none() {
            entry.timestamp = Some(now_ms);
        }

        let cutoff = self.cutoff(now_ms);

        let history = self.data.histories.entry(device_id.to_string()).or_default();
        history.push(entry);

        let before = history.len();
        history.retain(|e| e.timestamp.is_some_and(|ts| ts > cutoff));
        Ok(before - history.len())
    }

    fn profile(&self, device_id: &str) -> Result<Option<Profile>, StoreError> {
        Ok(self.data.profiles.get(device_id).cloned())
    }

    fn save_record(&mut self, device_id: &str, record: AnalysisRecord) -> Result<(), StoreError> {
        let cutoff = self.cutoff(record.timestamp);

        let records = self.data.records.entry(device_id.to_string()).or_default();
        records.push(record);
        records.retain(|r| r.timestamp > cutoff);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::store::Assessment;
    use crate::reading::{Reading, UnderlyingConditions};

    const NOW_MS: i64 = 1_704_078_000_000;
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(NOW_MS).unwrap()
    }

    fn record_at(ts: i64) -> AnalysisRecord {
        let at = DateTime::from_timestamp_millis(ts).unwrap();
        let result = crate::core::analyze(&Reading::new(), &[], &Profile::default());
        AnalysisRecord::new(at, Reading::new(), Assessment::Analysis(result))
    }

    #[test]
    fn test_recent_history_limit() {
        let mut repo = MemoryRepository::default();
        for i in 0..10 {
            let entry = Reading::new().at(NOW_MS - (10 - i) * 1000).with_bpm(60.0 + i as f64);
            repo.append_history("d1", entry, now()).unwrap();
        }

        let recent = repo.recent_history("d1", 3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].bpm, Some(67.0));
        assert_eq!(recent[2].bpm, Some(69.0));

        assert_eq!(repo.recent_history("d1", 50).unwrap().len(), 10);
        assert!(repo.recent_history("unknown", 50).unwrap().is_empty());
    }

    #[test]
    fn test_retention_evicts_old_entries() {
        let mut repo = MemoryRepository::default();
        // Exactly at the cutoff is evicted too
        repo.append_history("d1", Reading::new().at(NOW_MS - 7 * DAY_MS), now())
            .unwrap();
        repo.append_history("d1", Reading::new().at(NOW_MS - 8 * DAY_MS), now())
            .unwrap();
        repo.data
            .histories
            .get_mut("d1")
            .unwrap()
            .push(Reading::new().at(NOW_MS - 6 * DAY_MS));

        let evicted = repo.append_history("d1", Reading::new().at(NOW_MS), now()).unwrap();
        assert_eq!(evicted, 0);
        assert_eq!(repo.history("d1").len(), 2);
    }

    #[test]
    fn test_retention_evicts_old_records() {
        let mut repo = MemoryRepository::default();
        repo.save_record("d1", record_at(NOW_MS - 8 * DAY_MS)).unwrap();
        repo.save_record("d1", record_at(NOW_MS - 7 * DAY_MS)).unwrap();
        repo.save_record("d1", record_at(NOW_MS - 6 * DAY_MS)).unwrap();
        assert_eq!(repo.records("d1").len(), 3);

        repo.save_record("d1", record_at(NOW_MS)).unwrap();
        let kept: Vec<i64> = repo.records("d1").iter().map(|r| r.timestamp).collect();
        assert_eq!(kept, vec![NOW_MS - 6 * DAY_MS, NOW_MS]);
    }

    #[test]
    fn test_records_stay_bounded_over_a_month() {
        let mut repo = MemoryRepository::default();
        let hour_ms = DAY_MS / 24;
        for i in 0..720 {
            let ts = NOW_MS + i * hour_ms;
            let at = DateTime::from_timestamp_millis(ts).unwrap();
            repo.append_history("d1", Reading::new().at(ts), at).unwrap();
            repo.save_record("d1", record_at(ts)).unwrap();
        }

        assert_eq!(repo.history("d1").len(), 168);
        assert_eq!(repo.records("d1").len(), 168);
    }

    #[test]
    fn test_append_reports_evicted_count() {
        let mut repo = MemoryRepository::new(Duration::from_secs(60));
        let start = now();
        repo.append_history("d1", Reading::new().at(NOW_MS), start).unwrap();
        repo.append_history("d1", Reading::new().at(NOW_MS + 1000), start).unwrap();

        let later = DateTime::from_timestamp_millis(NOW_MS + 120_000).unwrap();
        let evicted = repo.append_history("d1", Reading::new(), later).unwrap();
        assert_eq!(evicted, 2);
        assert_eq!(repo.history("d1")[0].timestamp, Some(NOW_MS + 120_000));
    }

    #[test]
    fn test_profiles() {
        let mut repo = MemoryRepository::default();
        assert_eq!(repo.profile("d1").unwrap(), None);

        let profile = Profile::new(
            70,
            UnderlyingConditions {
                heart_disease: true,
                hypertension: false,
            },
        );
        repo.set_profile("d1", profile.clone());
        assert_eq!(repo.profile("d1").unwrap(), Some(profile));
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("vitalwatch-store-{}.json", uuid::Uuid::new_v4()));

        let mut repo = MemoryRepository::with_persistence(path.clone(), DEFAULT_RETENTION);
        repo.append_history("d1", Reading::new().at(NOW_MS).with_bpm(72.0), now())
            .unwrap();
        repo.save_record("d1", record_at(NOW_MS)).unwrap();
        repo.save().unwrap();

        let reloaded = MemoryRepository::with_persistence(path.clone(), DEFAULT_RETENTION);
        assert_eq!(reloaded.history("d1").len(), 1);
        assert_eq!(reloaded.history("d1")[0].bpm, Some(72.0));
        assert_eq!(reloaded.records("d1").len(), 1);
        assert_eq!(reloaded.device_ids(), vec!["d1".to_string()]);

        let _ = std::fs::remove_file(&path);
    }
}
