//! Observability infrastructure for the classification service
//!
//! Provides:
//! - Prometheus metrics (prediction volume, alert counts, inference latency, confidence)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::alerting::{AlertEvent, AlertSeverity};

/// Histogram buckets for inference latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Histogram buckets for prediction confidence
const CONFIDENCE_BUCKETS: &[f64] = &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    predictions: IntCounter,
    low_confidence_alerts: IntCounter,
    retrain_triggers: IntCounterVec,
    inference_errors: IntCounter,
    persistence_errors: IntCounter,
    alert_log_errors: IntCounter,
    inference_latency_seconds: Histogram,
    prediction_confidence: Histogram,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            predictions: register_int_counter!(
                "classifier_predictions_total",
                "Total number of predictions served"
            )
            .expect("Failed to register predictions_total"),

            low_confidence_alerts: register_int_counter!(
                "classifier_low_confidence_alerts_total",
                "Total number of low-confidence alerts raised"
            )
            .expect("Failed to register low_confidence_alerts_total"),

            retrain_triggers: register_int_counter_vec!(
                "classifier_retrain_triggers_total",
                "Total number of retrain requests by source",
                &["source"]
            )
            .expect("Failed to register retrain_triggers_total"),

            inference_errors: register_int_counter!(
                "classifier_inference_errors_total",
                "Total number of failed inference calls"
            )
            .expect("Failed to register inference_errors_total"),

            persistence_errors: register_int_counter!(
                "classifier_persistence_errors_total",
                "Total number of metrics log write failures"
            )
            .expect("Failed to register persistence_errors_total"),

            alert_log_errors: register_int_counter!(
                "classifier_alert_log_errors_total",
                "Total number of alert log write failures"
            )
            .expect("Failed to register alert_log_errors_total"),

            inference_latency_seconds: register_histogram!(
                "classifier_inference_latency_seconds",
                "Time spent running model inference",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            prediction_confidence: register_histogram!(
                "classifier_prediction_confidence",
                "Distribution of prediction confidence",
                CONFIDENCE_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_confidence"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_inference_latency(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
    }

    /// Count a served prediction and record its confidence
    pub fn observe_prediction(&self, confidence: f64) {
        self.inner().predictions.inc();
        self.inner().prediction_confidence.observe(confidence);
    }

    pub fn inc_low_confidence_alerts(&self) {
        self.inner().low_confidence_alerts.inc();
    }

    pub fn inc_retrain_triggers(&self, source: &str) {
        self.inner()
            .retrain_triggers
            .with_label_values(&[source])
            .inc();
    }

    pub fn inc_inference_errors(&self) {
        self.inner().inference_errors.inc();
    }

    pub fn inc_persistence_errors(&self) {
        self.inner().persistence_errors.inc();
    }

    pub fn inc_alert_log_errors(&self) {
        self.inner().alert_log_errors.inc();
    }
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a served prediction
    pub fn log_prediction(
        &self,
        label: u32,
        confidence: f64,
        input_length: usize,
        alert_triggered: bool,
        retrain_triggered: bool,
        model_version: &str,
    ) {
        info!(
            event = "prediction_served",
            instance = %self.instance,
            prediction = label,
            confidence = confidence,
            input_length = input_length,
            alert_triggered = alert_triggered,
            retrain_triggered = retrain_triggered,
            model_version = %model_version,
            "Logged metrics: pred={}, conf={:.3}", label, confidence
        );
    }

    /// Log an alert notification
    pub fn log_alert(&self, alert: &AlertEvent) {
        let event = match alert.severity {
            AlertSeverity::LowConfidence => "low_confidence_alert",
            AlertSeverity::RetrainTrigger => "auto_retrain_triggered",
        };

        warn!(
            event = event,
            instance = %self.instance,
            severity = %alert.severity,
            confidence = alert.confidence,
            "{}", alert.message()
        );
    }

    /// Log a failed alert log write (the request itself continues)
    pub fn log_alert_log_failure(&self, severity: AlertSeverity, error: &str) {
        warn!(
            event = "alert_log_write_failed",
            instance = %self.instance,
            severity = %severity,
            error = %error,
            "Failed to append to alert log, continuing"
        );
    }

    pub fn log_startup(&self, version: &str, model_version: &str) {
        info!(
            event = "service_started",
            instance = %self.instance,
            service_version = %version,
            model_version = %model_version,
            "Classification service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Classification service shutting down"
        );
    }
}
