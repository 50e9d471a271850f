//! Core data models for the classification service

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Status payload returned whenever a retrain is requested
pub const RETRAIN_STARTED: &str = "Retraining started";

/// One served prediction, as persisted in the metrics log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEvent {
    pub timestamp: DateTime<Utc>,
    pub label: u32,
    pub confidence: f64,
    pub input_length: usize,
}

impl PredictionEvent {
    /// Build an event for `text` stamped with the current time
    pub fn new(label: u32, confidence: f64, text: &str) -> Result<Self> {
        Self::at(Utc::now(), label, confidence, text.chars().count())
    }

    /// Build an event with an explicit timestamp (truncated to whole seconds)
    pub fn at(
        timestamp: DateTime<Utc>,
        label: u32,
        confidence: f64,
        input_length: usize,
    ) -> Result<Self> {
        validate_confidence(confidence)?;
        Ok(Self {
            timestamp: timestamp.trunc_subsecs(0),
            label,
            confidence,
            input_length,
        })
    }
}

/// Reject NaN and values outside [0, 1]
pub fn validate_confidence(confidence: f64) -> Result<()> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(ServiceError::validation(format!(
            "confidence {} is outside [0, 1]",
            confidence
        )))
    }
}

/// Aggregate view over the full metrics log
///
/// Only `total_predictions` is populated when there is no data yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_predictions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_confidence_count: Option<u64>,
}

impl MetricsSummary {
    pub fn empty() -> Self {
        Self {
            total_predictions: 0,
            avg_confidence: None,
            min_confidence: None,
            low_confidence_count: None,
        }
    }

    /// Aggregate a sequence of confidences against the low-confidence threshold
    pub fn from_confidences<I>(confidences: I, low_confidence_threshold: f64) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut count = 0u64;
        let mut sum = 0.0f64;
        let mut min = f64::INFINITY;
        let mut low = 0u64;

        for c in confidences {
            count += 1;
            sum += c;
            min = min.min(c);
            if c < low_confidence_threshold {
                low += 1;
            }
        }

        if count == 0 {
            return Self::empty();
        }

        Self {
            total_predictions: count,
            avg_confidence: Some(sum / count as f64),
            min_confidence: Some(min),
            low_confidence_count: Some(low),
        }
    }
}

/// Label and confidence produced by the inference gateway
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: u32,
    pub confidence: f64,
}

/// Status returned by a retrain request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrainStatus {
    pub status: String,
}

impl RetrainStatus {
    pub fn started() -> Self {
        Self {
            status: RETRAIN_STARTED.to_string(),
        }
    }
}

/// Result of one end-to-end classification request
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationOutcome {
    pub label: u32,
    pub confidence: f64,
    pub alert_triggered: bool,
    pub retrain_triggered: bool,
    pub retrain_status: Option<RetrainStatus>,
}
