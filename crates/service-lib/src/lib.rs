//! Text classification service library
//!
//! This crate provides the core functionality for:
//! - Model inference (argmax label + softmax confidence)
//! - Append-only prediction metrics log and its summary
//! - Low-confidence alerting and retrain triggering
//! - The HTTP API, health checks and observability

pub mod alerting;
pub mod api;
pub mod error;
pub mod health;
pub mod inference;
pub mod metrics_store;
pub mod models;
pub mod observability;
pub mod service;

pub use alerting::{AlertLog, AlertPolicy, LoggingRetrainSignal, RetrainSignal};
pub use error::{Result, ServiceError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use inference::{InferenceGateway, ModelBackend, OnnxClassifier};
pub use metrics_store::{CsvMetricsStore, MetricsStore};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use service::ClassificationService;
