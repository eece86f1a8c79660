use thiserror::Error;

/// Common error type for the PowerDNS exporter components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failure, timeout or non-success HTTP status.
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Malformed JSON or a payload with an unexpected shape.
    #[error("Failed to parse PowerDNS response: {0}")]
    Parse(String),

    #[error("Unsupported PowerDNS daemon type: '{0}'")]
    UnsupportedDaemon(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from decoding a response body.
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse(_))
    }

    /// Whether this error came from the transport layer.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
