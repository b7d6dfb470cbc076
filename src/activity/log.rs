//! Counters describing what the pipeline has done.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Activity statistics for the current session.
#[derive(Debug)]
pub struct ActivityLog {
    /// Number of readings taken through the pipeline
    readings_processed: AtomicU64,
    /// Number of analyses that ended with "Need more data"
    insufficient_data: AtomicU64,
    /// Number of individual alert messages raised
    alerts_raised: AtomicU64,
    /// Number of notifications delivered to a sink
    notifications_sent: AtomicU64,
    /// Number of notifications a sink failed to deliver
    notification_failures: AtomicU64,
    /// Number of readings that broke a physical limit
    physical_alerts: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ActivityLog {
    /// Create a new activity log.
    pub fn new() -> Self {
        Self {
            readings_processed: AtomicU64::new(0),
            insufficient_data: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notification_failures: AtomicU64::new(0),
            physical_alerts: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an activity log that loads from and saves to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "could not load previous activity stats");
        }

        log
    }

    pub fn record_reading(&self) {
        self.readings_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insufficient_data(&self) {
        self.insufficient_data.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` alert messages.
    pub fn record_alerts(&self, count: u64) {
        self.alerts_raised.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification_failure(&self) {
        self.notification_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_physical_alert(&self) {
        self.physical_alerts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            readings_processed: self.readings_processed.load(Ordering::Relaxed),
            insufficient_data: self.insufficient_data.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            physical_alerts: self.physical_alerts.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Readings processed: {}\n\
             - Waiting for more data: {}\n\
             - Alerts raised: {}\n\
             - Physical-limit alerts: {}\n\
             - Notifications sent: {}\n\
             - Notification failures: {}\n\
             - Session duration: {} seconds",
            stats.readings_processed,
            stats.insufficient_data,
            stats.alerts_raised,
            stats.physical_alerts,
            stats.notifications_sent,
            stats.notification_failures,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                readings_processed: stats.readings_processed,
                insufficient_data: stats.insufficient_data,
                alerts_raised: stats.alerts_raised,
                notifications_sent: stats.notifications_sent,
                notification_failures: stats.notification_failures,
                physical_alerts: stats.physical_alerts,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.readings_processed
                    .store(persisted.readings_processed, Ordering::Relaxed);
                self.insufficient_data
                    .store(persisted.insufficient_data, Ordering::Relaxed);
                self.alerts_raised
                    .store(persisted.alerts_raised, Ordering::Relaxed);
                self.notifications_sent
                    .store(persisted.notifications_sent, Ordering::Relaxed);
                self.notification_failures
                    .store(persisted.notification_failures, Ordering::Relaxed);
                self.physical_alerts
                    .store(persisted.physical_alerts, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of activity statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStats {
    pub readings_processed: u64,
    pub insufficient_data: u64,
    pub alerts_raised: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
    pub physical_alerts: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    readings_processed: u64,
    insufficient_data: u64,
    alerts_raised: u64,
    notifications_sent: u64,
    notification_failures: u64,
    physical_alerts: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared activity log.
pub type SharedActivityLog = Arc<ActivityLog>;

pub fn create_shared_log() -> SharedActivityLog {
    Arc::new(ActivityLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedActivityLog {
    Arc::new(ActivityLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_log_counting() {
        let log = ActivityLog::new();

        log.record_reading();
        log.record_reading();
        log.record_alerts(3);
        log.record_notification_failure();

        let stats = log.stats();
        assert_eq!(stats.readings_processed, 2);
        assert_eq!(stats.alerts_raised, 3);
        assert_eq!(stats.notification_failures, 1);
        assert_eq!(stats.notifications_sent, 0);
    }

    #[test]
    fn test_summary_format() {
        let log = ActivityLog::new();
        let summary = log.summary();

        assert!(summary.contains("Readings processed"));
        assert!(summary.contains("Alerts raised"));
        assert!(summary.contains("Notification failures"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("vitalwatch-activity-{}.json", uuid::Uuid::new_v4()));

        let log = ActivityLog::with_persistence(path.clone());
        log.record_reading();
        log.record_insufficient_data();
        log.save().unwrap();

        let reloaded = ActivityLog::with_persistence(path.clone());
        let stats = reloaded.stats();
        assert_eq!(stats.readings_processed, 1);
        assert_eq!(stats.insufficient_data, 1);

        let _ = std::fs::remove_file(&path);
    }
}
