//! Integration tests for the classifier API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use service_lib::{
    alerting::{AlertLog, AlertPolicy},
    api::{create_router, AppState},
    health::{components, HealthRegistry},
    inference::{InferenceGateway, ModelBackend},
    metrics_store::CsvMetricsStore,
    service::ClassificationService,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Three-class model whose winner (class 1) has the given softmax probability
struct FixedConfidence(f64);

impl ModelBackend for FixedConfidence {
    fn logits(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        let winner = (self.0 * 2.0 / (1.0 - self.0)).ln() as f32;
        Ok(vec![0.0, winner, 0.0])
    }

    fn model_version(&self) -> &str {
        "fixed"
    }
}

struct Unavailable;

impl ModelBackend for Unavailable {
    fn logits(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("session closed")
    }

    fn model_version(&self) -> &str {
        "unavailable"
    }
}

async fn app_with(
    backend: impl ModelBackend + 'static,
    monitor_dir: &Path,
) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::MODEL).await;
    health_registry.register(components::METRICS_STORE).await;
    health_registry.register(components::ALERT_LOG).await;

    let service = ClassificationService::new(
        InferenceGateway::new(Arc::new(backend)),
        Arc::new(CsvMetricsStore::new(monitor_dir.join("metrics.csv"), 0.5)),
        AlertPolicy::default(),
        AlertLog::new(monitor_dir.join("alerts.log")),
        health_registry,
    );

    let state = Arc::new(AppState::new(service));
    (create_router(state.clone()), state)
}

async fn setup_test_app(confidence: f64) -> (Router, Arc<AppState>, TempDir) {
    let dir = TempDir::new().unwrap();
    let (router, state) = app_with(FixedConfidence(confidence), &dir.path().join("monitor_logs")).await;
    (router, state, dir)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_home_reports_running() {
    let (app, _state, _dir) = setup_test_app(0.9).await;

    let response = app.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"API is running!");
}

#[tokio::test]
async fn test_predict_confident_text() {
    let (app, _state, dir) = setup_test_app(0.80).await;

    let response = app
        .oneshot(post_json("/predict", r#"{"text": "The tenant must pay rent."}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["prediction"], 1);
    assert!((body["confidence"].as_f64().unwrap() - 0.80).abs() < 1e-6);
    assert_eq!(body["alert_triggered"], false);
    assert_eq!(body["retrain_triggered"], false);
    assert!(!dir.path().join("monitor_logs/alerts.log").exists());
}

#[tokio::test]
async fn test_predict_very_low_confidence_triggers_retrain() {
    let (app, _state, dir) = setup_test_app(0.35).await;

    let response = app
        .oneshot(post_json("/predict", r#"{"text": "unclear"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["alert_triggered"], true);
    assert_eq!(body["retrain_triggered"], true);

    let alerts = std::fs::read_to_string(dir.path().join("monitor_logs/alerts.log")).unwrap();
    assert!(alerts.contains("ALERT: Low confidence 0.350"));
    assert!(alerts.contains("AUTO-RETRAIN triggered at confidence 0.350"));
}

#[tokio::test]
async fn test_predict_without_text_classifies_empty_input() {
    let (app, _state, dir) = setup_test_app(0.9).await;

    let response = app.oneshot(post_json("/predict", "{}")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let csv = std::fs::read_to_string(dir.path().join("monitor_logs/metrics.csv")).unwrap();
    let row = csv.lines().nth(1).unwrap();
    assert!(row.ends_with(",0"));
}

#[tokio::test]
async fn test_predict_rejects_malformed_json() {
    let (app, _state, dir) = setup_test_app(0.9).await;

    let response = app
        .oneshot(post_json("/predict", "{\"text\": "))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert!(!dir.path().join("monitor_logs/metrics.csv").exists());
}

#[tokio::test]
async fn test_predict_inference_failure_returns_503() {
    let dir = TempDir::new().unwrap();
    let (app, _state) = app_with(Unavailable, dir.path()).await;

    let response = app
        .oneshot(post_json("/predict", r#"{"text": "hello"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("session closed"));
    assert!(body.get("prediction").is_none());
    assert!(!dir.path().join("metrics.csv").exists());
}

#[tokio::test]
async fn test_predict_persistence_failure_returns_500() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let (app, state) = app_with(FixedConfidence(0.9), &blocker).await;

    let response = app
        .clone()
        .oneshot(post_json("/predict", r#"{"text": "hello"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body.get("prediction").is_none());
    assert!(body["error"].is_string());

    // The failed store now fails the health check
    state.health_registry.set_ready(true).await;
    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_without_log_reports_zero() {
    let (app, _state, _dir) = setup_test_app(0.9).await;

    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({"total_predictions": 0})
    );
}

#[tokio::test]
async fn test_metrics_summarize_served_predictions() {
    let (app, _state, _dir) = setup_test_app(0.45).await;

    for text in ["one", "two"] {
        let body = format!(r#"{{"text": "{}"}}"#, text);
        let response = app.clone().oneshot(post_json("/predict", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/metrics")).await.unwrap();
    let body = json_body(response).await;

    assert_eq!(body["total_predictions"], 2);
    assert_eq!(body["low_confidence_count"], 2);
    assert!((body["avg_confidence"].as_f64().unwrap() - 0.45).abs() < 1e-6);
    assert!((body["min_confidence"].as_f64().unwrap() - 0.45).abs() < 1e-6);
}

#[tokio::test]
async fn test_metrics_corrupt_log_returns_500() {
    let (app, _state, dir) = setup_test_app(0.9).await;
    let monitor_dir = dir.path().join("monitor_logs");
    std::fs::create_dir_all(&monitor_dir).unwrap();
    std::fs::write(
        monitor_dir.join("metrics.csv"),
        "timestamp,prediction,confidence,input_length\nyesterday,one,high,many\n",
    )
    .unwrap();

    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_trigger_retrain_always_started() {
    let (app, _state, _dir) = setup_test_app(0.9).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/trigger_retrain")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"status": "Retraining started"})
        );
    }
}

#[tokio::test]
async fn test_demo_serves_html() {
    let (app, _state, _dir) = setup_test_app(0.9).await;

    let response = app.oneshot(get("/demo")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(body.to_vec()).unwrap();
    assert!(page.contains("<textarea"));
    assert!(page.contains("/predict"));
}

#[tokio::test]
async fn test_readyz_follows_initialization() {
    let (app, state, _dir) = setup_test_app(0.9).await;

    let response = app.clone().oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["ready"], false);

    state.health_registry.set_ready(true).await;

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["ready"], true);
}

#[tokio::test]
async fn test_healthz_stays_ok_when_alert_log_degraded() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let health_registry = HealthRegistry::new();
    health_registry.register(components::ALERT_LOG).await;
    let service = ClassificationService::new(
        InferenceGateway::new(Arc::new(FixedConfidence(0.35))),
        Arc::new(CsvMetricsStore::new(dir.path().join("metrics.csv"), 0.5)),
        AlertPolicy::default(),
        AlertLog::new(blocker.join("alerts.log")),
        health_registry,
    );
    let app = create_router(Arc::new(AppState::new(service)));

    let response = app
        .clone()
        .oneshot(post_json("/predict", r#"{"text": "hello"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["retrain_triggered"], true);

    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health = json_body(response).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["alert_log"]["status"], "degraded");
}

#[tokio::test]
async fn test_prometheus_exposition() {
    let (app, _state, _dir) = setup_test_app(0.9).await;

    let response = app
        .clone()
        .oneshot(post_json("/predict", r#"{"text": "hello"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/metrics/prometheus")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("classifier_predictions_total"));
    assert!(text.contains("classifier_inference_latency_seconds"));
}
