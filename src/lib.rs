//! VitalWatch Agent - personalised risk scoring for wearable vital signs.
//!
//! This library scores a wearable reading (heart rate, HRV, temperature,
//! SpO2, acceleration) against the wearer's own time-of-day baseline and
//! produces a bounded risk score with human-readable alerts, plus a
//! short-horizon forecast of upcoming values.
//!
//! # Guarantees
//!
//! - **Personal baselines**: readings are compared only with history from the same time-of-day slot
//! - **Pure core**: analysis does no I/O and holds no state between calls
//! - **Bounded output**: risk is always an integer in `[0, 100]`
//! - **Never silent about thin data**: too little history yields an explicit "Need more data" result
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        VitalWatch Agent                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐   │
//! │  │ Physical  │──▶│ TimeSlot  │──▶│ Baseline  │──▶│   Risk    │   │
//! │  │  limits   │   │ classify  │   │  (stats)  │   │  engine   │   │
//! │  └───────────┘   └───────────┘   └───────────┘   └───────────┘   │
//! │        │                              ▲               │          │
//! │        │         ┌───────────┐        │               ▼          │
//! │        │         │ Thresholds│────────┘        ┌───────────┐     │
//! │        │         │ (profile) │                 │  Notify   │     │
//! │        │         └───────────┘                 │  sinks    │     │
//! │        └──────────────────────────────────────▶└───────────┘     │
//! │                                                                  │
//! │  ┌───────────┐   ┌───────────┐   ┌───────────┐                   │
//! │  │ Forecast  │   │ Repository│   │ Activity  │                   │
//! │  │  (WMA)    │   │ (history) │   │   log     │                   │
//! │  └───────────┘   └───────────┘   └───────────┘                   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use vitalwatch_agent::{core, reading::{Profile, Reading}};
//!
//! let reading = Reading::new().with_bpm(72.0).with_hrv(48.0);
//! let result = core::analyze(&reading, &[], &Profile::default());
//!
//! // Without history the engine asks for more data instead of guessing
//! assert_eq!(result.risk, 5);
//! ```

pub mod activity;
pub mod config;
pub mod core;
pub mod notify;
pub mod pipeline;
pub mod reading;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use activity::{ActivityLog, ActivityStats, SharedActivityLog};
pub use config::{Config, ConfigError, WebhookConfig};
pub use core::{analyze, predict_next, AnalysisResult, RiskEngine, RiskLevel, TimeSlot};
pub use notify::{AlertNotification, LogNotifier, NotificationSink, NotifyError, Severity};
pub use pipeline::{IncomingReading, MemoryRepository, Pipeline, Repository, StoreError};
pub use reading::{Channel, HistoryEntry, InputError, Profile, Reading};

#[cfg(feature = "webhook")]
pub use notify::WebhookNotifier;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Disclaimer that can be displayed to users.
pub const MEDICAL_DISCLAIMER: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              VITALWATCH AGENT - MEDICAL DISCLAIMER               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent flags unusual changes in wearable sensor data.       ║
║                                                                  ║
║  ✓ WHAT IT DOES:                                                 ║
║    • Learns your usual values for each time of day               ║
║    • Scores new readings against that personal pattern           ║
║    • Raises alerts for large deviations, low SpO2 and falls      ║
║                                                                  ║
║  ✗ WHAT IT IS NOT:                                               ║
║    • A medical device or a diagnosis                             ║
║    • A replacement for emergency services                        ║
║    • Reliable before enough history has been collected           ║
║                                                                  ║
║  If you feel unwell, contact a medical professional or your      ║
║  local emergency number regardless of what this tool reports.    ║
║                                                                  ║
║  You can view processing statistics anytime with:                ║
║    vitalwatch status                                             ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
