//! Confidence-based alerting
//!
//! This module provides:
//! - The alert policy (pure threshold decision per prediction)
//! - The append-only alert log (best-effort audit trail)
//! - The retrain signal capability (stub that only reports intent)

mod alert_log;
mod policy;
mod retrain;

pub use alert_log::{AlertEvent, AlertLog, ALERT_TIMESTAMP_FORMAT};
pub use policy::{
    AlertDecision, AlertPolicy, AlertSeverity, DEFAULT_LOW_CONFIDENCE_THRESHOLD,
    DEFAULT_RETRAIN_THRESHOLD,
};
pub use retrain::{LoggingRetrainSignal, RetrainSignal, RetrainTrigger};
