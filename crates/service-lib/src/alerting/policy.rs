//! Threshold policy over prediction confidence

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Confidence below which a low-confidence alert fires
pub const DEFAULT_LOW_CONFIDENCE_THRESHOLD: f64 = 0.50;

/// Confidence below which a retrain trigger fires
pub const DEFAULT_RETRAIN_THRESHOLD: f64 = 0.40;

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    LowConfidence,
    RetrainTrigger,
}

impl AlertSeverity {
    /// Tag used in the alert log
    pub fn tag(&self) -> &'static str {
        match self {
            AlertSeverity::LowConfidence => "ALERT",
            AlertSeverity::RetrainTrigger => "AUTO-RETRAIN",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::LowConfidence => write!(f, "low_confidence"),
            AlertSeverity::RetrainTrigger => write!(f, "retrain_trigger"),
        }
    }
}

/// What the policy decided for one confidence value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertDecision {
    pub alert_triggered: bool,
    pub retrain_triggered: bool,
}

impl AlertDecision {
    /// Severities that fired, in evaluation order
    pub fn severities(&self) -> Vec<AlertSeverity> {
        let mut fired = Vec::with_capacity(2);
        if self.alert_triggered {
            fired.push(AlertSeverity::LowConfidence);
        }
        if self.retrain_triggered {
            fired.push(AlertSeverity::RetrainTrigger);
        }
        fired
    }
}

/// Two nested thresholds: every retrain trigger is also a low-confidence alert
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    low_confidence_threshold: f64,
    retrain_threshold: f64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            low_confidence_threshold: DEFAULT_LOW_CONFIDENCE_THRESHOLD,
            retrain_threshold: DEFAULT_RETRAIN_THRESHOLD,
        }
    }
}

impl AlertPolicy {
    /// Create a policy; requires `0 <= retrain <= low <= 1`
    pub fn new(low_confidence_threshold: f64, retrain_threshold: f64) -> Result<Self> {
        let in_range = |t: f64| (0.0..=1.0).contains(&t);
        if !in_range(low_confidence_threshold) || !in_range(retrain_threshold) {
            return Err(ServiceError::validation(format!(
                "thresholds must lie in [0, 1] (low={}, retrain={})",
                low_confidence_threshold, retrain_threshold
            )));
        }
        if retrain_threshold > low_confidence_threshold {
            return Err(ServiceError::validation(format!(
                "retrain threshold {} exceeds low-confidence threshold {}",
                retrain_threshold, low_confidence_threshold
            )));
        }

        Ok(Self {
            low_confidence_threshold,
            retrain_threshold,
        })
    }

    pub fn low_confidence_threshold(&self) -> f64 {
        self.low_confidence_threshold
    }

    pub fn retrain_threshold(&self) -> f64 {
        self.retrain_threshold
    }

    /// Evaluate one confidence value (strict `<` on both thresholds)
    pub fn evaluate(&self, confidence: f64) -> AlertDecision {
        let alert_triggered = confidence < self.low_confidence_threshold;
        AlertDecision {
            alert_triggered,
            retrain_triggered: alert_triggered && confidence < self.retrain_threshold,
        }
    }
}
