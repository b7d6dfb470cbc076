//! Physiological reading types for the VitalWatch agent.
//!
//! This module contains the typed data model consumed by the analysis
//! core, plus validation for payloads that arrive as untyped JSON.

pub mod input;
pub mod types;

// Re-export commonly used types
pub use input::{AnalyzeRequest, InputError, PredictRequest, DEFAULT_WINDOW_SIZE};
pub use types::{
    Channel, FallInfo, HistoryEntry, Profile, Reading, UnderlyingConditions, UnknownChannel,
    DEFAULT_AGE, FALL_DETECTED_STATUS,
};
