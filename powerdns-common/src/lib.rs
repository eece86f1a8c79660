//! PowerDNS Common Library
//!
//! Shared building blocks for talking to the PowerDNS HTTP API:
//!
//! - [`client`] - HTTP client (`PdnsClient`) for the statistics and server endpoints
//! - [`stats`] - Statistics payload model and decoder
//! - [`server_info`] - Server metadata (`ServerInfo`) and daemon role (`DaemonType`)
//! - [`config`] - API and logging configuration, JSON5 loading
//! - [`error`] - Error types

pub mod client;
pub mod config;
pub mod error;
pub mod server_info;
pub mod stats;

// Re-export commonly used types at the crate root
pub use client::{API_KEY_HEADER, PdnsClient};
pub use config::{ApiConfig, LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use server_info::{DaemonType, ServerInfo};
pub use stats::{MapEntry, StatEntry, StatValue, decode_statistics};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over `config.level` when set.
///
/// # Example
///
/// ```ignore
/// use powerdns_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
