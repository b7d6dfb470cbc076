//! Validation of untyped JSON payloads at the crate boundary.
//!
//! The analysis core only accepts typed values. Anything arriving as raw
//! JSON (HTTP bodies, CLI input files) goes through here first so that a
//! malformed payload fails fast instead of producing a meaningless result.

use crate::reading::types::{
    Channel, HistoryEntry, Profile, Reading, UnderlyingConditions, UnknownChannel, DEFAULT_AGE,
};
use serde_json::{Map, Value};

/// Default forecast window.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Contract violations in caller-supplied input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    /// The payload itself is not a JSON object
    NotAnObject,
    /// A required field is missing
    MissingField(&'static str),
    /// `history` is present but is not an array
    HistoryNotSequence,
    /// A history element is not a reading object
    InvalidHistoryEntry { index: usize, reason: String },
    /// A field has the wrong type or an invalid value
    InvalidField { field: &'static str, reason: String },
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::NotAnObject => write!(f, "Request body must be a JSON object"),
            InputError::MissingField(field) => write!(f, "Missing required field '{field}'"),
            InputError::HistoryNotSequence => write!(f, "'history' must be an array of readings"),
            InputError::InvalidHistoryEntry { index, reason } => {
                write!(f, "Invalid history entry at index {index}: {reason}")
            }
            InputError::InvalidField { field, reason } => {
                write!(f, "Invalid field '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for InputError {}

/// A validated analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeRequest {
    pub reading: Reading,
    pub history: Vec<HistoryEntry>,
    pub profile: Profile,
}

impl AnalyzeRequest {
    /// Validate a request of the form
    /// `{data|reading, history, age?, underlyingConditions?}`.
    pub fn from_value(value: &Value) -> Result<Self, InputError> {
        let body = value.as_object().ok_or(InputError::NotAnObject)?;

        let reading_value = body
            .get("data")
            .or_else(|| body.get("reading"))
            .ok_or(InputError::MissingField("data"))?;
        let reading = parse_reading(reading_value)?;
        let history = parse_history(body.get("history"))?;
        let profile = parse_profile(body)?;

        Ok(Self {
            reading,
            history,
            profile,
        })
    }
}

/// A validated forecast request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub history: Vec<HistoryEntry>,
    pub channel: Channel,
    pub window_size: usize,
}

impl PredictRequest {
    /// Validate a request of the form `{history, key?, windowSize?}`.
    pub fn from_value(value: &Value) -> Result<Self, InputError> {
        let body = value.as_object().ok_or(InputError::NotAnObject)?;
        let history = parse_history(body.get("history"))?;

        let channel = match body.get("key") {
            None | Some(Value::Null) => Channel::Bpm,
            Some(Value::String(key)) => key.parse().map_err(|e: UnknownChannel| {
                InputError::InvalidField {
                    field: "key",
                    reason: e.to_string(),
                }
            })?,
            Some(_) => {
                return Err(InputError::InvalidField {
                    field: "key",
                    reason: "expected a channel name".to_string(),
                })
            }
        };

        let window_size = match body.get("windowSize") {
            None | Some(Value::Null) => DEFAULT_WINDOW_SIZE,
            Some(v) => v.as_u64().ok_or_else(|| InputError::InvalidField {
                field: "windowSize",
                reason: "expected a non-negative integer".to_string(),
            })? as usize,
        };

        Ok(Self {
            history,
            channel,
            window_size,
        })
    }
}

/// Parse a single reading object.
pub fn parse_reading(value: &Value) -> Result<Reading, InputError> {
    if !value.is_object() {
        return Err(InputError::InvalidField {
            field: "data",
            reason: "expected a reading object".to_string(),
        });
    }
    serde_json::from_value(value.clone()).map_err(|e| InputError::InvalidField {
        field: "data",
        reason: e.to_string(),
    })
}

/// Parse the `history` field. It must be present and must be an array.
pub fn parse_history(value: Option<&Value>) -> Result<Vec<HistoryEntry>, InputError> {
    let items = match value {
        None => return Err(InputError::MissingField("history")),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(InputError::HistoryNotSequence),
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(InputError::InvalidHistoryEntry {
                    index,
                    reason: "expected a reading object".to_string(),
                });
            }
            serde_json::from_value(item.clone()).map_err(|e| InputError::InvalidHistoryEntry {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

fn parse_profile(body: &Map<String, Value>) -> Result<Profile, InputError> {
    let age = match body.get("age") {
        None | Some(Value::Null) => DEFAULT_AGE,
        Some(v) => {
            let age = v
                .as_u64()
                .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .ok_or_else(|| InputError::InvalidField {
                    field: "age",
                    reason: "expected a non-negative number".to_string(),
                })?;
            // Zero is treated as "unknown"
            if age == 0 {
                DEFAULT_AGE
            } else {
                u32::try_from(age).map_err(|_| InputError::InvalidField {
                    field: "age",
                    reason: "out of range".to_string(),
                })?
            }
        }
    };

    let underlying_conditions = match body.get("underlyingConditions") {
        None | Some(Value::Null) => UnderlyingConditions::default(),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| InputError::InvalidField {
            field: "underlyingConditions",
            reason: e.to_string(),
        })?,
    };

    Ok(Profile::new(age, underlying_conditions))
}
