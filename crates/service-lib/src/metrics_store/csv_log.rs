//! CSV-backed metrics log
//!
//! Layout: a header row followed by one row per prediction:
//! `timestamp,prediction,confidence,input_length`.
//!
//! Each append serializes the row (and the header, for an empty file) into a
//! single buffer and writes it with one call on an `O_APPEND` handle while
//! holding the writer lock. A failed write is truncated away, and a trailing
//! partial row found before an append is discarded. Readers never take the
//! lock; they drop a trailing partial line left by an append that is still in
//! flight.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{MetricsStore, TIMESTAMP_FORMAT};
use crate::error::{Result, ServiceError};
use crate::models::{MetricsSummary, PredictionEvent};

/// Header written when the log is created
pub const METRICS_HEADER: [&str; 4] = ["timestamp", "prediction", "confidence", "input_length"];

#[derive(Debug, Serialize, Deserialize)]
struct MetricsRow {
    timestamp: String,
    prediction: u32,
    confidence: f64,
    input_length: usize,
}

impl From<&PredictionEvent> for MetricsRow {
    fn from(event: &PredictionEvent) -> Self {
        Self {
            timestamp: event.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            prediction: event.label,
            confidence: event.confidence,
            input_length: event.input_length,
        }
    }
}

impl MetricsRow {
    fn into_event(self, line: u64) -> Result<PredictionEvent> {
        let timestamp = NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| {
                ServiceError::data_integrity(format!(
                    "line {}: bad timestamp {:?}: {}",
                    line, self.timestamp, e
                ))
            })?
            .and_utc();

        PredictionEvent::at(timestamp, self.prediction, self.confidence, self.input_length)
            .map_err(|e| ServiceError::data_integrity(format!("line {}: {}", line, e)))
    }
}

/// Metrics store writing to a single CSV file
#[derive(Debug, Clone)]
pub struct CsvMetricsStore {
    path: PathBuf,
    low_confidence_threshold: f64,
    writer_lock: Arc<Mutex<()>>,
}

impl CsvMetricsStore {
    pub fn new(path: impl Into<PathBuf>, low_confidence_threshold: f64) -> Self {
        Self {
            path: path.into(),
            low_confidence_threshold,
            writer_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_row(path: &Path, lock: &Mutex<()>, row: &MetricsRow) -> Result<()> {
        let _guard = lock
            .lock()
            .map_err(|e| ServiceError::persistence(format!("writer lock poisoned: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ServiceError::persistence(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                ServiceError::persistence(format!("cannot open {}: {}", path.display(), e))
            })?;
        let io_err = |e: std::io::Error| {
            ServiceError::persistence(format!("cannot append to {}: {}", path.display(), e))
        };

        let len = file.metadata().map_err(io_err)?.len();
        let intact_len = complete_prefix_len(&mut file, len).map_err(io_err)?;
        if intact_len < len {
            warn!(
                path = %path.display(),
                dropped_bytes = len - intact_len,
                "Discarding partial row left by an interrupted append"
            );
            file.set_len(intact_len).map_err(io_err)?;
        }
        let is_new = intact_len == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::with_capacity(64));
        if is_new {
            writer
                .write_record(METRICS_HEADER)
                .map_err(|e| ServiceError::persistence(e.to_string()))?;
        }
        writer
            .serialize(row)
            .map_err(|e| ServiceError::persistence(e.to_string()))?;
        let bytes = writer
            .into_inner()
            .map_err(|e| ServiceError::persistence(e.error().to_string()))?;

        if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_data()) {
            // Roll back so no partial row or headerless file is left behind
            if let Err(rollback) = file.set_len(intact_len) {
                warn!(path = %path.display(), error = %rollback, "Failed to roll back metrics log");
            }
            return Err(io_err(e));
        }

        if is_new {
            debug!(path = %path.display(), "Created metrics log");
        }
        Ok(())
    }

    fn read_events(path: &Path) -> Result<Option<Vec<PredictionEvent>>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ServiceError::data_integrity(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        // Only complete lines are visible to readers
        let complete = match bytes.iter().rposition(|&b| b == b'\n') {
            Some(end) => &bytes[..=end],
            None => return Ok(Some(Vec::new())),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(complete);

        let headers = reader
            .headers()
            .map_err(|e| ServiceError::data_integrity(e.to_string()))?;
        if !headers.iter().eq(METRICS_HEADER.iter().copied()) {
            return Err(ServiceError::data_integrity(format!(
                "unexpected header {:?}",
                headers.iter().collect::<Vec<_>>()
            )));
        }

        let mut events = Vec::new();
        for (i, row) in reader.deserialize::<MetricsRow>().enumerate() {
            let line = i as u64 + 2;
            let row = row
                .map_err(|e| ServiceError::data_integrity(format!("line {}: {}", line, e)))?;
            events.push(row.into_event(line)?);
        }

        Ok(Some(events))
    }
}

/// Length of the prefix of `file` that ends in a newline (0 if none)
fn complete_prefix_len(file: &mut File, len: u64) -> std::io::Result<u64> {
    const CHUNK: u64 = 4096;
    let mut buf = vec![0u8; CHUNK as usize];
    let mut end = len;

    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }

    Ok(0)
}

#[async_trait]
impl MetricsStore for CsvMetricsStore {
    async fn record(&self, event: &PredictionEvent) -> Result<()> {
        let row = MetricsRow::from(event);
        let path = self.path.clone();
        let lock = Arc::clone(&self.writer_lock);

        tokio::task::spawn_blocking(move || Self::append_row(&path, &lock, &row))
            .await
            .map_err(|e| ServiceError::persistence(format!("append task failed: {}", e)))?
    }

    async fn summarize(&self) -> Result<MetricsSummary> {
        let threshold = self.low_confidence_threshold;
        let events = self.read_blocking().await?;

        Ok(match events {
            Some(events) => {
                MetricsSummary::from_confidences(events.iter().map(|e| e.confidence), threshold)
            }
            None => MetricsSummary::empty(),
        })
    }

    async fn events(&self) -> Result<Vec<PredictionEvent>> {
        Ok(self.read_blocking().await?.unwrap_or_default())
    }
}

impl CsvMetricsStore {
    async fn read_blocking(&self) -> Result<Option<Vec<PredictionEvent>>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::read_events(&path))
            .await
            .map_err(|e| ServiceError::data_integrity(format!("read task failed: {}", e)))?
    }
}
