//! Append-only alert log
//!
//! Line format:
//! `[2024-01-01 12:00:00.123456] ALERT: Low confidence 0.350`
//! `[2024-01-01 12:00:00.123456] AUTO-RETRAIN triggered at confidence 0.350`

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AlertSeverity;
use crate::error::{Result, ServiceError};

/// Timestamp layout of alert log lines (UTC, microseconds)
pub const ALERT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A single alert notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub timestamp: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub confidence: f64,
}

impl AlertEvent {
    pub fn new(severity: AlertSeverity, confidence: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            confidence,
        }
    }

    /// Human-readable message without the timestamp prefix
    pub fn message(&self) -> String {
        match self.severity {
            AlertSeverity::LowConfidence => {
                format!("{}: Low confidence {:.3}", self.severity.tag(), self.confidence)
            }
            AlertSeverity::RetrainTrigger => format!(
                "{} triggered at confidence {:.3}",
                self.severity.tag(),
                self.confidence
            ),
        }
    }

    /// Full log line, newline excluded
    pub fn line(&self) -> String {
        format!(
            "[{}] {}",
            self.timestamp.format(ALERT_TIMESTAMP_FORMAT),
            self.message()
        )
    }
}

/// Write-only audit trail of alert notifications
#[derive(Debug, Clone)]
pub struct AlertLog {
    path: PathBuf,
    writer_lock: Arc<Mutex<()>>,
}

impl AlertLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line. Callers treat failures as non-fatal.
    pub async fn append(&self, event: &AlertEvent) -> Result<()> {
        let line = format!("{}\n", event.line());
        let path = self.path.clone();
        let lock = Arc::clone(&self.writer_lock);

        tokio::task::spawn_blocking(move || Self::append_line(&path, &lock, &line))
            .await
            .map_err(|e| ServiceError::AlertLog(format!("append task failed: {}", e)))?
    }

    fn append_line(path: &Path, lock: &Mutex<()>, line: &str) -> Result<()> {
        let _guard = lock
            .lock()
            .map_err(|e| ServiceError::AlertLog(format!("writer lock poisoned: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ServiceError::AlertLog(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|e| ServiceError::AlertLog(format!("{}: {}", path.display(), e)))
    }
}
