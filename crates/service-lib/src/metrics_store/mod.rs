//! Durable prediction log
//!
//! Every served prediction is appended to an append-only log. Summaries are
//! recomputed from the full log on each query, so they are never stale.

mod csv_log;

pub use csv_log::{CsvMetricsStore, METRICS_HEADER};

use crate::error::Result;
use crate::models::{MetricsSummary, PredictionEvent};
use async_trait::async_trait;

/// Timestamp layout used in the metrics log (UTC, second precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage backend for prediction events
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Append one event. Fails with `ServiceError::Persistence`.
    async fn record(&self, event: &PredictionEvent) -> Result<()>;

    /// Aggregate the full log. Fails with `ServiceError::DataIntegrity`.
    async fn summarize(&self) -> Result<MetricsSummary>;

    /// Every recorded event in arrival order
    async fn events(&self) -> Result<Vec<PredictionEvent>>;
}
