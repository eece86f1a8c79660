//! Configuration for the PowerDNS exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use powerdns_common::{ApiConfig, LoggingConfig, load_config, parse_config};

use crate::mapping::is_valid_metric_name;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading, parsing or API settings.
    #[error(transparent)]
    Load(#[from] powerdns_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Routes the HTTP server always serves besides the metrics path.
const RESERVED_PATHS: &[&str] = &["/health", "/ready"];

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// PowerDNS HTTP API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Metric filtering settings.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:9120").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Metric namespace (default: "powerdns"). Names become `{namespace}_{role}_{metric}`.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_listen() -> String {
    "0.0.0.0:9120".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_namespace() -> String {
    "powerdns".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            namespace: default_namespace(),
        }
    }
}

/// Metric filtering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns for metric names to include (empty = all).
    #[serde(default)]
    pub include_metrics: Vec<String>,

    /// Glob patterns for metric names to exclude.
    #[serde(default)]
    pub exclude_metrics: Vec<String>,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ExporterConfig = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;

        // Validate listen address format
        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        // Validate path starts with /
        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if RESERVED_PATHS.contains(&self.prometheus.path.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Metrics path {} is already served by the exporter",
                self.prometheus.path
            )));
        }

        if !is_valid_metric_name(&self.prometheus.namespace) {
            return Err(ConfigError::Validation(format!(
                "Invalid metric namespace: {}",
                self.prometheus.namespace
            )));
        }

        for pattern in self
            .filters
            .include_metrics
            .iter()
            .chain(&self.filters.exclude_metrics)
        {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(ConfigError::Validation(format!(
                    "Invalid metric filter '{}': {}",
                    pattern, e
                )));
            }
        }

        Ok(())
    }
}
