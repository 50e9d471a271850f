//! Error taxonomy for the classification service
//!
//! Errors on the mandatory path (inference, metrics recording) fail the
//! request. Alert log failures are recovered inside the service and only
//! surface in logs and metrics.

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The model collaborator failed or produced unusable output
    #[error("inference failed: {0}")]
    Inference(String),

    /// The metrics log could not be written
    #[error("failed to persist prediction event: {0}")]
    Persistence(String),

    /// The metrics log could not be read back or is corrupt
    #[error("metrics log is unreadable or corrupt: {0}")]
    DataIntegrity(String),

    /// The alert log could not be written
    #[error("failed to write alert log: {0}")]
    AlertLog(String),

    /// A value failed validation before reaching storage
    #[error("validation error: {0}")]
    Validation(String),
}

impl ServiceError {
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn data_integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
