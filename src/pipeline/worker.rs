//! Single-consumer loop that drives analysis for incoming readings.

use super::store::{AnalysisRecord, Assessment, Forecast, Repository, StoreError};
use crate::activity::{create_shared_log, SharedActivityLog};
use crate::config::Config;
use crate::core::{check_physical_limits, predict_next, RiskEngine};
use crate::notify::{AlertNotification, NotificationSink};
use crate::reading::{Channel, Reading, DEFAULT_WINDOW_SIZE};
use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A reading tagged with the device that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingReading {
    pub device_id: String,
    pub reading: Reading,
}

impl IncomingReading {
    pub fn new(device_id: impl Into<String>, reading: Reading) -> Self {
        Self {
            device_id: device_id.into(),
            reading,
        }
    }
}

/// Tunables for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// History entries fetched per analysis
    pub history_limit: usize,
    /// Values averaged by the forecaster
    pub forecast_window: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            history_limit: 50,
            forecast_window: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            history_limit: config.history_limit,
            forecast_window: config.forecast_window,
        }
    }
}

/// What happened to one reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub device_id: String,
    pub record: AnalysisRecord,
    /// History entries dropped by the retention policy
    pub evicted: usize,
    pub notifications_sent: usize,
    pub notification_failures: usize,
}

/// Drives readings through the physical check, the risk engine and the sinks.
pub struct Pipeline<R: Repository> {
    repository: R,
    sinks: Vec<Box<dyn NotificationSink>>,
    engine: RiskEngine,
    activity: SharedActivityLog,
    options: PipelineOptions,
}

impl<R: Repository> Pipeline<R> {
    pub fn new(repository: R, engine: RiskEngine) -> Self {
        Self {
            repository,
            sinks: Vec::new(),
            engine,
            activity: create_shared_log(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_activity_log(mut self, activity: SharedActivityLog) -> Self {
        self.activity = activity;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn activity(&self) -> &SharedActivityLog {
        &self.activity
    }

    /// Process one reading end to end.
    pub fn process(&mut self, incoming: IncomingReading) -> Result<ProcessOutcome, StoreError> {
        let IncomingReading { device_id, reading } = incoming;
        let now = reading.observed_at().unwrap_or_else(Utc::now);

        // History is read before the new reading is stored
        let history = self
            .repository
            .recent_history(&device_id, self.options.history_limit)?;
        let evicted = self
            .repository
            .append_history(&device_id, reading.clone(), now)?;
        if evicted > 0 {
            tracing::debug!(device = %device_id, evicted, "evicted expired history");
        }
        self.activity.record_reading();

        if let Some(physical) = check_physical_limits(&reading) {
            tracing::warn!(
                device = %device_id,
                violations = physical.violations.len(),
                "physical limit exceeded"
            );
            self.activity.record_physical_alert();
            self.activity.record_alerts(physical.violations.len() as u64);

            let notification = AlertNotification::from_physical(&device_id, &reading, &physical);
            let record = AnalysisRecord::new(now, reading, Assessment::Physical(physical));
            self.repository.save_record(&device_id, record.clone())?;

            let (sent, failed) = self.dispatch(&notification);
            return Ok(ProcessOutcome {
                device_id,
                record,
                evicted,
                notifications_sent: sent,
                notification_failures: failed,
            });
        }

        let profile = self.repository.profile(&device_id)?.unwrap_or_default();
        let result = self.engine.analyze_at(&reading, &history, &profile, now);
        if result.is_insufficient() {
            self.activity.record_insufficient_data();
        }

        // The forecast looks ahead of the reading that just arrived
        let mut forecast_input = history;
        forecast_input.push(reading.clone());
        let forecast = Forecast {
            bpm: predict_next(&forecast_input, Channel::Bpm, self.options.forecast_window),
            temp: predict_next(&forecast_input, Channel::Temp, self.options.forecast_window),
        };

        tracing::info!(
            device = %device_id,
            risk = result.risk,
            risk_text = %result.risk_text,
            alerts = result.alerts.len(),
            next_bpm = ?forecast.bpm,
            next_temp = ?forecast.temp,
            "analysed reading"
        );

        let notification = result
            .has_alerts()
            .then(|| AlertNotification::from_analysis(&device_id, &reading, &result));
        let alert_count = result.alerts.len() as u64;

        let record = AnalysisRecord::new(now, reading, Assessment::Analysis(result))
            .with_forecast(forecast);
        self.repository.save_record(&device_id, record.clone())?;

        let (sent, failed) = match notification {
            Some(notification) => {
                self.activity.record_alerts(alert_count);
                self.dispatch(&notification)
            }
            None => (0, 0),
        };

        Ok(ProcessOutcome {
            device_id,
            record,
            evicted,
            notifications_sent: sent,
            notification_failures: failed,
        })
    }

    /// Consume readings until the channel disconnects or `running` is cleared.
    ///
    /// Returns the number of readings processed successfully.
    pub fn run(&mut self, receiver: &Receiver<IncomingReading>, running: &Arc<AtomicBool>) -> u64 {
        let mut processed = 0;

        while running.load(Ordering::SeqCst) {
            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(incoming) => {
                    let device_id = incoming.device_id.clone();
                    match self.process(incoming) {
                        Ok(_) => processed += 1,
                        Err(e) => {
                            tracing::error!(device = %device_id, error = %e, "skipping reading");
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("reading channel disconnected");
                    break;
                }
            }
        }

        processed
    }

    fn dispatch(&self, notification: &AlertNotification) -> (usize, usize) {
        let mut sent = 0;
        let mut failed = 0;

        for sink in &self.sinks {
            match sink.notify(notification) {
                Ok(()) => {
                    sent += 1;
                    self.activity.record_notification_sent();
                }
                Err(e) => {
                    failed += 1;
                    self.activity.record_notification_failure();
                    tracing::warn!(
                        sink = sink.name(),
                        id = %notification.id,
                        error = %e,
                        "notification failed"
                    );
                }
            }
        }

        (sent, failed)
    }
}
