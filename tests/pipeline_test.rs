//! Integration tests for the ingestion pipeline

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;
use vitalwatch_agent::core::RiskEngine;
use vitalwatch_agent::pipeline::{
    Assessment, IncomingReading, MemoryRepository, Pipeline, Repository,
};
use vitalwatch_agent::{AlertNotification, NotificationSink, NotifyError, Reading};

// 2024-01-01T03:00:00Z
const NOW_MS: i64 = 1_704_078_000_000;
const MINUTE_MS: i64 = 60_000;
const DAY_MS: i64 = 24 * 60 * MINUTE_MS;

#[derive(Clone, Default)]
struct Collector {
    received: Arc<Mutex<Vec<AlertNotification>>>,
}

impl NotificationSink for Collector {
    fn name(&self) -> &str {
        "collector"
    }

    fn notify(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        self.received.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

fn night_reading(offset_ms: i64, bpm: f64, hrv: f64) -> Reading {
    Reading::new().at(NOW_MS - offset_ms).with_bpm(bpm).with_hrv(hrv)
}

#[test]
fn test_threaded_replay() {
    let collector = Collector::default();
    let mut pipeline = Pipeline::new(MemoryRepository::default(), RiskEngine::default())
        .with_sink(collector.clone());

    let (sender, receiver) = crossbeam_channel::bounded(16);
    let producer = thread::spawn(move || {
        for i in (1..=20).rev() {
            let (bpm, hrv) = if i % 2 == 0 { (65.0, 45.0) } else { (75.0, 55.0) };
            sender
                .send(IncomingReading::new("wrist-1", night_reading(i * MINUTE_MS, bpm, hrv)))
                .unwrap();
        }
        // Fall event at the end
        let fall = night_reading(0, 70.0, 50.0).with_fall(vitalwatch_agent::reading::FallInfo {
            status: Some("fall-detected".to_string()),
            total_acc: Some(25.0),
        });
        sender.send(IncomingReading::new("wrist-1", fall)).unwrap();
    });

    let running = Arc::new(AtomicBool::new(true));
    let processed = pipeline.run(&receiver, &running);
    producer.join().unwrap();

    assert_eq!(processed, 21);

    let received = collector.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].risk, 80);
    assert_eq!(received[0].alerts, vec!["Fall or strong impact detected"]);

    let stats = pipeline.activity().stats();
    assert_eq!(stats.readings_processed, 21);
    assert_eq!(stats.insufficient_data, 10);
    assert_eq!(stats.notifications_sent, 1);
}

#[test]
fn test_retention_over_a_week() {
    let mut pipeline = Pipeline::new(MemoryRepository::default(), RiskEngine::default());

    for day in (0..=9).rev() {
        let reading = Reading::new().at(NOW_MS - day * DAY_MS).with_bpm(70.0);
        pipeline.process(IncomingReading::new("d1", reading)).unwrap();
    }

    // Entries at 7, 8 and 9 days old are gone
    let history = pipeline.repository().history("d1");
    assert_eq!(history.len(), 7);
    assert!(history.iter().all(|e| e.timestamp.unwrap() > NOW_MS - 7 * DAY_MS));
}

#[test]
fn test_devices_are_isolated() {
    let mut pipeline = Pipeline::new(MemoryRepository::default(), RiskEngine::default());

    for i in (1..=12).rev() {
        let (bpm, hrv) = if i % 2 == 0 { (65.0, 45.0) } else { (75.0, 55.0) };
        pipeline
            .process(IncomingReading::new("a", night_reading(i * MINUTE_MS, bpm, hrv)))
            .unwrap();
    }

    let outcome = pipeline
        .process(IncomingReading::new("b", night_reading(0, 70.0, 50.0)))
        .unwrap();
    match &outcome.record.assessment {
        Assessment::Analysis(result) => assert!(result.is_insufficient()),
        other => panic!("unexpected assessment {other:?}"),
    }

    assert_eq!(pipeline.repository().recent_history("a", 50).unwrap().len(), 12);
    assert_eq!(pipeline.repository().recent_history("b", 50).unwrap().len(), 1);
}
