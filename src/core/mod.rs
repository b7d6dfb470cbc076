//! Core analytics for the VitalWatch agent.
//!
//! This module contains:
//! - Time-of-day slot classification
//! - Per-slot baseline statistics and adaptive thresholds
//! - Multi-channel risk scoring and short-horizon forecasting
//! - Fixed physical-limit checks
//!
//! Everything here is pure: no I/O and no shared state.

pub mod baseline;
pub mod forecast;
pub mod physical;
pub mod risk;
pub mod stats;
pub mod thresholds;
pub mod timeslot;

// Re-export commonly used types
pub use baseline::{compute_baseline, Baseline, ChannelStats, InsufficientData, MIN_DATA_POINTS};
pub use forecast::predict_next;
pub use physical::{check_physical_limits, PhysicalAlert, PhysicalMetric, PhysicalViolation};
pub use risk::{analyze, AnalysisResult, Pattern, RiskEngine, RiskLevel, RiskRule};
pub use thresholds::ThresholdSet;
pub use timeslot::TimeSlot;
