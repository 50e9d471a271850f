//! HTTP surface: classification endpoints, health checks and Prometheus exposition

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ServiceError;
use crate::health::{ComponentStatus, HealthRegistry};
use crate::models::{MetricsSummary, RetrainStatus};
use crate::service::ClassificationService;

const DEMO_PAGE: &str = include_str!("demo.html");

/// Shared application state
pub struct AppState {
    pub service: ClassificationService,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(service: ClassificationService) -> Self {
        let health_registry = service.health().clone();
        Self {
            service,
            health_registry,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// Absent `text` classifies the empty string
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: u32,
    pub confidence: f64,
    pub alert_triggered: bool,
    pub retrain_triggered: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Service error rendered as `{"error": ...}`
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::Inference(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn home() -> &'static str {
    "API is running!"
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let outcome = state.service.classify_request(&request.text).await?;

    Ok(Json(PredictResponse {
        prediction: outcome.label,
        confidence: outcome.confidence,
        alert_triggered: outcome.alert_triggered,
        retrain_triggered: outcome.retrain_triggered,
    }))
}

async fn trigger_retrain(State(state): State<Arc<AppState>>) -> Json<RetrainStatus> {
    Json(state.service.trigger_retrain_manual())
}

async fn metrics_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MetricsSummary>, ApiError> {
    Ok(Json(state.service.get_metrics().await?))
}

async fn demo() -> Html<&'static str> {
    Html(DEMO_PAGE)
}

/// 200 while healthy or degraded, 503 once any component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn prometheus_metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode Prometheus metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .route("/trigger_retrain", post(trigger_retrain))
        .route("/metrics", get(metrics_summary))
        .route("/demo", get(demo))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics/prometheus", get(prometheus_metrics))
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Starting API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
