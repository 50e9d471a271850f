//! Retrain signal capability
//!
//! The shipped implementation only records intent. Swapping in a real
//! training dispatcher means implementing `RetrainSignal`; neither the policy
//! nor the service changes.

use tracing::info;

use crate::models::RetrainStatus;

/// Why a retrain was requested
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetrainTrigger {
    /// Raised by the alert policy for a single low-confidence prediction
    Automatic { confidence: f64 },
    /// Raised by an operator
    Manual,
}

impl RetrainTrigger {
    pub fn source(&self) -> &'static str {
        match self {
            RetrainTrigger::Automatic { .. } => "automatic",
            RetrainTrigger::Manual => "manual",
        }
    }
}

pub trait RetrainSignal: Send + Sync {
    /// Request a retrain and report the resulting status
    fn request(&self, trigger: RetrainTrigger) -> RetrainStatus;
}

/// Logs the request and reports "Retraining started"; starts no job
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRetrainSignal;

impl RetrainSignal for LoggingRetrainSignal {
    fn request(&self, trigger: RetrainTrigger) -> RetrainStatus {
        match trigger {
            RetrainTrigger::Automatic { confidence } => info!(
                event = "retrain_requested",
                source = trigger.source(),
                confidence = confidence,
                "Automatic retraining triggered"
            ),
            RetrainTrigger::Manual => info!(
                event = "retrain_requested",
                source = trigger.source(),
                "Manual retraining triggered"
            ),
        }

        RetrainStatus::started()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RETRAIN_STARTED;

    #[test]
    fn test_stub_always_reports_started() {
        let signal = LoggingRetrainSignal;

        assert_eq!(signal.request(RetrainTrigger::Manual).status, RETRAIN_STARTED);
        assert_eq!(
            signal
                .request(RetrainTrigger::Automatic { confidence: 0.12 })
                .status,
            RETRAIN_STARTED
        );
    }

    #[test]
    fn test_trigger_source_labels() {
        assert_eq!(RetrainTrigger::Manual.source(), "manual");
        assert_eq!(RetrainTrigger::Automatic { confidence: 0.3 }.source(), "automatic");
    }
}
