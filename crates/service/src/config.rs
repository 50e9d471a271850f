//! Service configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Interface the HTTP server binds to
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding `model.onnx` and `tokenizer.json`
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Expected SHA-256 of `model.onnx`, checked at load when set
    #[serde(default)]
    pub model_sha256: Option<String>,

    /// Directory holding `metrics.csv` and `alerts.log`
    #[serde(default = "default_monitor_dir")]
    pub monitor_dir: PathBuf,

    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,

    #[serde(default = "default_retrain_threshold")]
    pub retrain_threshold: f64,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("saved_model")
}

fn default_monitor_dir() -> PathBuf {
    PathBuf::from("monitor_logs")
}

fn default_low_confidence_threshold() -> f64 {
    service_lib::alerting::DEFAULT_LOW_CONFIDENCE_THRESHOLD
}

fn default_retrain_threshold() -> f64 {
    service_lib::alerting::DEFAULT_RETRAIN_THRESHOLD
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

impl ServiceConfig {
    /// Load configuration from `classifier.toml` (optional) and `CLASSIFIER_*` variables
    pub fn load() -> Result<Self> {
        Self::from_sources(config::File::with_name("classifier").required(false))
    }

    fn from_sources(file: config::File<config::FileSourceFile, config::FileFormat>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("CLASSIFIER"))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid service configuration")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.api_port)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.monitor_dir.join("metrics.csv")
    }

    pub fn alerts_path(&self) -> PathBuf {
        self.monitor_dir.join("alerts.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_sources() {
        let dir = TempDir::new().unwrap();
        let config =
            ServiceConfig::from_sources(config::File::from(dir.path().join("absent")).required(false))
                .unwrap();

        assert_eq!(config.api_port, 5000);
        assert_eq!(config.model_dir, PathBuf::from("saved_model"));
        assert_eq!(config.metrics_path(), PathBuf::from("monitor_logs/metrics.csv"));
        assert_eq!(config.alerts_path(), PathBuf::from("monitor_logs/alerts.log"));
        assert_eq!(config.low_confidence_threshold, 0.50);
        assert_eq!(config.retrain_threshold, 0.40);
        assert!(config.model_sha256.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("classifier.toml");
        std::fs::write(
            &path,
            "api_port = 8080\nmonitor_dir = \"/var/lib/classifier\"\nlog_format = \"pretty\"\n",
        )
        .unwrap();

        let config = ServiceConfig::from_sources(config::File::from(path)).unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.metrics_path(), PathBuf::from("/var/lib/classifier/metrics.csv"));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_malformed_value_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("classifier.toml");
        std::fs::write(&path, "api_port = \"not a port\"\n").unwrap();

        assert!(ServiceConfig::from_sources(config::File::from(path)).is_err());
    }
}
