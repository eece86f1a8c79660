use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identity of a PowerDNS server as reported by `GET /servers/{id}`.
///
/// Every field is kept as the raw string the API returned; the URL templates
/// (`config_url`, `zones_url`) are not expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Object kind, always "Server". The API names this field `type`.
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    pub id: String,
    pub url: String,
    pub daemon_type: String,
    pub version: String,
    pub config_url: String,
    pub zones_url: String,
}

impl ServerInfo {
    /// Decode a server object from a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// The daemon role this server reports.
    pub fn daemon(&self) -> Result<DaemonType> {
        self.daemon_type.parse()
    }
}

/// PowerDNS daemon role, which selects the metric table.
///
/// Parsing is case-insensitive, from both text and config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum DaemonType {
    Authoritative,
    Recursor,
}

impl DaemonType {
    /// The name used by the API and in metric names.
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonType::Authoritative => "authoritative",
            DaemonType::Recursor => "recursor",
        }
    }
}

impl fmt::Display for DaemonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DaemonType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "authoritative" => Ok(DaemonType::Authoritative),
            "recursor" => Ok(DaemonType::Recursor),
            _ => Err(Error::UnsupportedDaemon(s.to_string())),
        }
    }
}

impl TryFrom<String> for DaemonType {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}
