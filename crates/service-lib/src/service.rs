//! Request orchestration
//!
//! One classification request runs: inference, then a mandatory metrics
//! append, then the alert policy with its best-effort side effects.

use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use crate::alerting::{
    AlertEvent, AlertLog, AlertPolicy, LoggingRetrainSignal, RetrainSignal, RetrainTrigger,
};
use crate::error::{Result, ServiceError};
use crate::health::{components, HealthRegistry};
use crate::inference::InferenceGateway;
use crate::metrics_store::MetricsStore;
use crate::models::{ClassificationOutcome, MetricsSummary, PredictionEvent, RetrainStatus};
use crate::observability::{ServiceMetrics, StructuredLogger};

/// Composes inference, metrics persistence and alerting per request
pub struct ClassificationService {
    gateway: InferenceGateway,
    store: Arc<dyn MetricsStore>,
    policy: AlertPolicy,
    alert_log: AlertLog,
    retrain: Arc<dyn RetrainSignal>,
    health: HealthRegistry,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl ClassificationService {
    pub fn new(
        gateway: InferenceGateway,
        store: Arc<dyn MetricsStore>,
        policy: AlertPolicy,
        alert_log: AlertLog,
        health: HealthRegistry,
    ) -> Self {
        Self {
            gateway,
            store,
            policy,
            alert_log,
            retrain: Arc::new(LoggingRetrainSignal),
            health,
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::new("classifier"),
        }
    }

    /// Replace the retrain capability (defaults to the logging stub)
    pub fn with_retrain_signal(mut self, retrain: Arc<dyn RetrainSignal>) -> Self {
        self.retrain = retrain;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Classify `text` end to end
    ///
    /// Inference and metrics recording failures fail the request. Alert log
    /// failures are logged and counted but never returned.
    pub async fn classify_request(&self, text: &str) -> Result<ClassificationOutcome> {
        let start = Instant::now();
        let gateway = self.gateway.clone();
        let input = text.to_string();

        let classification = tokio::task::spawn_blocking(move || gateway.classify(&input))
            .await
            .map_err(|e| ServiceError::inference(format!("inference task failed: {}", e)))
            .and_then(|r| r);

        let classification = match classification {
            Ok(c) => {
                self.health.set_healthy(components::MODEL).await;
                c
            }
            Err(e) => {
                self.metrics.inc_inference_errors();
                self.health
                    .set_degraded(components::MODEL, e.to_string())
                    .await;
                warn!(error = %e, "Inference failed");
                return Err(e);
            }
        };
        self.metrics
            .observe_inference_latency(start.elapsed().as_secs_f64());

        let event = PredictionEvent::new(classification.label, classification.confidence, text)?;
        if let Err(e) = self.store.record(&event).await {
            self.metrics.inc_persistence_errors();
            self.health
                .set_unhealthy(components::METRICS_STORE, e.to_string())
                .await;
            warn!(error = %e, "Failed to record prediction event");
            return Err(e);
        }
        self.health.set_healthy(components::METRICS_STORE).await;

        let decision = self.policy.evaluate(event.confidence);
        for severity in decision.severities() {
            let alert = AlertEvent::new(severity, event.confidence);
            self.logger.log_alert(&alert);

            match self.alert_log.append(&alert).await {
                Ok(()) => self.health.set_healthy(components::ALERT_LOG).await,
                Err(e) => {
                    self.metrics.inc_alert_log_errors();
                    self.logger.log_alert_log_failure(severity, &e.to_string());
                    self.health
                        .set_degraded(components::ALERT_LOG, e.to_string())
                        .await;
                }
            }
        }

        if decision.alert_triggered {
            self.metrics.inc_low_confidence_alerts();
        }

        let retrain_status = if decision.retrain_triggered {
            let trigger = RetrainTrigger::Automatic {
                confidence: event.confidence,
            };
            self.metrics.inc_retrain_triggers(trigger.source());
            Some(self.retrain.request(trigger))
        } else {
            None
        };

        self.metrics.observe_prediction(event.confidence);
        self.logger.log_prediction(
            event.label,
            event.confidence,
            event.input_length,
            decision.alert_triggered,
            decision.retrain_triggered,
            self.gateway.model_version(),
        );

        Ok(ClassificationOutcome {
            label: event.label,
            confidence: event.confidence,
            alert_triggered: decision.alert_triggered,
            retrain_triggered: decision.retrain_triggered,
            retrain_status,
        })
    }

    /// Aggregate the metrics log
    pub async fn get_metrics(&self) -> Result<MetricsSummary> {
        self.store.summarize().await.map_err(|e| {
            warn!(error = %e, "Failed to summarize metrics log");
            e
        })
    }

    /// Operator-initiated retrain; never looks at any confidence
    pub fn trigger_retrain_manual(&self) -> RetrainStatus {
        let trigger = RetrainTrigger::Manual;
        self.metrics.inc_retrain_triggers(trigger.source());
        self.retrain.request(trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use crate::inference::ModelBackend;
    use crate::metrics_store::CsvMetricsStore;
    use crate::models::RETRAIN_STARTED;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Four-class backend whose winning class (index 2) has the given softmax probability
    struct FixedConfidence(f64);

    impl ModelBackend for FixedConfidence {
        fn logits(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            let winner = (self.0 * 3.0 / (1.0 - self.0)).ln() as f32;
            Ok(vec![0.0, 0.0, winner, 0.0])
        }

        fn model_version(&self) -> &str {
            "fixed"
        }
    }

    struct Broken;

    impl ModelBackend for Broken {
        fn logits(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("collaborator unavailable")
        }

        fn model_version(&self) -> &str {
            "broken"
        }
    }

    #[derive(Default)]
    struct CountingSignal(AtomicUsize);

    impl RetrainSignal for CountingSignal {
        fn request(&self, _trigger: RetrainTrigger) -> RetrainStatus {
            self.0.fetch_add(1, Ordering::SeqCst);
            RetrainStatus::started()
        }
    }

    fn service(dir: &TempDir, backend: impl ModelBackend + 'static) -> ClassificationService {
        let store = CsvMetricsStore::new(dir.path().join("metrics.csv"), 0.5);
        ClassificationService::new(
            InferenceGateway::new(Arc::new(backend)),
            Arc::new(store),
            AlertPolicy::default(),
            AlertLog::new(dir.path().join("alerts.log")),
            HealthRegistry::new(),
        )
    }

    #[tokio::test]
    async fn test_very_low_confidence_alerts_and_triggers_retrain() {
        let dir = TempDir::new().unwrap();
        let signal = Arc::new(CountingSignal::default());
        let svc = service(&dir, FixedConfidence(0.35)).with_retrain_signal(signal.clone());

        let outcome = svc.classify_request("ambiguous clause").await.unwrap();

        assert_eq!(outcome.label, 2);
        assert!((outcome.confidence - 0.35).abs() < 1e-6);
        assert!(outcome.alert_triggered);
        assert!(outcome.retrain_triggered);
        assert_eq!(outcome.retrain_status.unwrap().status, RETRAIN_STARTED);
        assert_eq!(signal.0.load(Ordering::SeqCst), 1);

        let alerts = std::fs::read_to_string(dir.path().join("alerts.log")).unwrap();
        let lines: Vec<&str> = alerts.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ALERT: Low confidence 0.350"));
        assert!(lines[1].contains("AUTO-RETRAIN triggered at confidence 0.350"));
    }

    #[tokio::test]
    async fn test_confident_prediction_fires_nothing() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedConfidence(0.80));

        let outcome = svc.classify_request("The tenant must pay rent.").await.unwrap();

        assert!(!outcome.alert_triggered);
        assert!(!outcome.retrain_triggered);
        assert!(outcome.retrain_status.is_none());
        assert!(!dir.path().join("alerts.log").exists());
    }

    #[tokio::test]
    async fn test_low_confidence_alerts_without_retrain() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedConfidence(0.45));

        let outcome = svc.classify_request("text").await.unwrap();

        assert!(outcome.alert_triggered);
        assert!(!outcome.retrain_triggered);
        let alerts = std::fs::read_to_string(dir.path().join("alerts.log")).unwrap();
        assert_eq!(alerts.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_every_request_is_recorded() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedConfidence(0.9));

        for text in ["a", "", "ümlaut"] {
            svc.classify_request(text).await.unwrap();
        }

        let summary = svc.get_metrics().await.unwrap();
        assert_eq!(summary.total_predictions, 3);
        assert_eq!(summary.low_confidence_count, Some(0));

        let events = svc.store.events().await.unwrap();
        let lengths: Vec<usize> = events.iter().map(|e| e.input_length).collect();
        assert_eq!(lengths, vec![1, 0, 6]);
    }

    #[tokio::test]
    async fn test_metrics_without_log_report_zero() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedConfidence(0.9));

        assert_eq!(svc.get_metrics().await.unwrap(), MetricsSummary::empty());
    }

    #[tokio::test]
    async fn test_manual_retrain_always_started() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Broken);

        assert_eq!(svc.trigger_retrain_manual().status, RETRAIN_STARTED);
        assert_eq!(svc.trigger_retrain_manual().status, RETRAIN_STARTED);
    }

    #[tokio::test]
    async fn test_inference_failure_records_nothing() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Broken);

        let err = svc.classify_request("text").await.unwrap_err();

        assert!(matches!(err, ServiceError::Inference(_)));
        assert!(!dir.path().join("metrics.csv").exists());
        assert_eq!(
            svc.health().status_of(components::MODEL).await,
            Some(ComponentStatus::Degraded)
        );
    }

    #[tokio::test]
    async fn test_persistence_failure_fails_request() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let svc = ClassificationService::new(
            InferenceGateway::new(Arc::new(FixedConfidence(0.3))),
            Arc::new(CsvMetricsStore::new(blocker.join("metrics.csv"), 0.5)),
            AlertPolicy::default(),
            AlertLog::new(dir.path().join("alerts.log")),
            HealthRegistry::new(),
        );

        let err = svc.classify_request("text").await.unwrap_err();

        assert!(matches!(err, ServiceError::Persistence(_)));
        assert!(!dir.path().join("alerts.log").exists());
        assert_eq!(
            svc.health().status_of(components::METRICS_STORE).await,
            Some(ComponentStatus::Unhealthy)
        );
    }

    #[tokio::test]
    async fn test_alert_log_failure_does_not_fail_request() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let svc = ClassificationService::new(
            InferenceGateway::new(Arc::new(FixedConfidence(0.3))),
            Arc::new(CsvMetricsStore::new(dir.path().join("metrics.csv"), 0.5)),
            AlertPolicy::default(),
            AlertLog::new(blocker.join("alerts.log")),
            HealthRegistry::new(),
        );

        let outcome = svc.classify_request("text").await.unwrap();

        assert!(outcome.alert_triggered);
        assert!(outcome.retrain_triggered);
        assert_eq!(svc.get_metrics().await.unwrap().total_predictions, 1);
        assert_eq!(
            svc.health().status_of(components::ALERT_LOG).await,
            Some(ComponentStatus::Degraded)
        );
    }
}
