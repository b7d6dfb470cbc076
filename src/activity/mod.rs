//! Activity accounting for the VitalWatch agent.
//!
//! Tracks how many readings were analysed and how many alerts and
//! notifications they produced, without retaining any vital-sign values.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, ActivityLog, ActivityStats,
    SharedActivityLog,
};
