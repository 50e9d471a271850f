//! Classifier service - text classification API with confidence monitoring
//!
//! Loads the model once, then serves predictions while logging every one
//! to the metrics log and raising alerts on low confidence.

use std::sync::Arc;

use anyhow::{Context, Result};
use service_lib::{
    alerting::{AlertLog, AlertPolicy},
    api::{self, AppState},
    health::{components, HealthRegistry},
    inference::{InferenceGateway, OnnxClassifier},
    metrics_store::CsvMetricsStore,
    observability::StructuredLogger,
    service::ClassificationService,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::{LogFormat, ServiceConfig};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

async fn shutdown_signal(logger: StructuredLogger) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    logger.log_shutdown("SIGINT received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::load()?;
    init_tracing(config.log_format);

    info!(
        model_dir = %config.model_dir.display(),
        monitor_dir = %config.monitor_dir.display(),
        "Starting classifier-service"
    );

    let policy = AlertPolicy::new(config.low_confidence_threshold, config.retrain_threshold)
        .context("Invalid alert thresholds")?;
    info!(
        low_confidence_threshold = policy.low_confidence_threshold(),
        retrain_threshold = policy.retrain_threshold(),
        "Alert policy configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::METRICS_STORE).await;
    health_registry.register(components::ALERT_LOG).await;

    let classifier = OnnxClassifier::load(&config.model_dir, config.model_sha256.as_deref())
        .with_context(|| format!("Failed to load model from {}", config.model_dir.display()))?;
    health_registry.register(components::MODEL).await;

    let gateway = InferenceGateway::new(Arc::new(classifier));
    let store = CsvMetricsStore::new(config.metrics_path(), policy.low_confidence_threshold());
    let alert_log = AlertLog::new(config.alerts_path());

    let logger = StructuredLogger::new(config.bind_addr());
    logger.log_startup(SERVICE_VERSION, gateway.model_version());

    let service = ClassificationService::new(
        gateway,
        Arc::new(store),
        policy,
        alert_log,
        health_registry.clone(),
    )
    .with_logger(logger.clone());

    let app_state = Arc::new(AppState::new(service));

    // Mark service as ready after initialization
    health_registry.set_ready(true).await;

    api::serve(&config.bind_addr(), app_state, shutdown_signal(logger)).await?;
    info!("Shut down");

    Ok(())
}
