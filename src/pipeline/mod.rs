//! Ingestion pipeline for the VitalWatch agent.
//!
//! This module contains:
//! - The storage abstraction and the records it keeps
//! - An in-memory repository with a retention policy
//! - The single-consumer worker that drives analysis and notifications

pub mod memory;
pub mod store;
pub mod worker;

// Re-export commonly used types
pub use memory::{MemoryRepository, DEFAULT_RETENTION};
pub use store::{AnalysisRecord, Assessment, Forecast, Repository, StoreError};
pub use worker::{IncomingReading, Pipeline, PipelineOptions, ProcessOutcome};
