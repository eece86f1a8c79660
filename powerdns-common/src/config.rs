use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};
use crate::server_info::DaemonType;

/// Connection settings for the PowerDNS HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API, including the version path (e.g. `http://127.0.0.1:8081/api/v1`).
    #[serde(default = "default_api_url")]
    pub url: Url,

    /// Value sent in the `X-API-Key` header.
    #[serde(default)]
    pub key: String,

    /// Server id in `/servers/{id}` (PowerDNS only knows "localhost").
    #[serde(default = "default_server_id")]
    pub server_id: String,

    /// Daemon role. When unset it is taken from the server metadata.
    #[serde(default)]
    pub daemon_type: Option<DaemonType>,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_url() -> Url {
    Url::parse("http://127.0.0.1:8081/api/v1").expect("static URL is valid")
}

fn default_server_id() -> String {
    "localhost".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            key: String::new(),
            server_id: default_server_id(),
            daemon_type: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check the settings that the client cannot work without.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "API URL must use http or https, got '{}'",
                self.url.scheme()
            )));
        }
        if self.url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "API URL '{}' cannot be used as a base URL",
                self.url
            )));
        }
        if self.server_id.is_empty() {
            return Err(Error::Config("server_id must not be empty".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Load a configuration file in JSON5 format.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    json5::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_config() {
        let json5 = r#"
        {
            url: "https://ns1.example.net:8081/api/v1",
            key: "changeme",
            daemon_type: "authoritative",
            timeout_ms: 2500,
        }
        "#;

        let config: ApiConfig = parse_config(json5).unwrap();

        assert_eq!(config.url.as_str(), "https://ns1.example.net:8081/api/v1");
        assert_eq!(config.key, "changeme");
        assert_eq!(config.server_id, "localhost");
        assert_eq!(config.daemon_type, Some(DaemonType::Authoritative));
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_api_config() {
        let config: ApiConfig = parse_config("{}").unwrap();

        assert_eq!(config.url.as_str(), "http://127.0.0.1:8081/api/v1");
        assert!(config.key.is_empty());
        assert_eq!(config.daemon_type, None);
        assert_eq!(config.timeout_ms, 5000);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result: Result<ApiConfig> = parse_config(r#"{ url: "not a url" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let config: ApiConfig = parse_config(r#"{ url: "mailto:dns@example.net" }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ApiConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_logging_format() {
        let json5 = r#"{ level: "debug", format: "json" }"#;

        let config: LoggingConfig = parse_config(json5).unwrap();

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
    }
}
