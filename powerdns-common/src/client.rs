//! HTTP client for the PowerDNS API.

use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, trace};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::server_info::ServerInfo;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Client bound to one PowerDNS server.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct PdnsClient {
    http: reqwest::Client,
    base: Url,
    server_id: String,
}

impl PdnsClient {
    /// Build a client from API settings.
    ///
    /// The configured timeout bounds every request end to end.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(&config.key)
            .map_err(|e| Error::Config(format!("Invalid API key: {}", e)))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .user_agent(concat!("powerdns-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base: config.url.clone(),
            server_id: config.server_id.clone(),
        })
    }

    /// URL of `/servers/{id}` followed by `path` segments.
    pub fn endpoint(&self, path: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("API URL '{}' cannot be a base", self.base)))?
            .pop_if_empty()
            .push("servers")
            .push(&self.server_id)
            .extend(path);
        Ok(url)
    }

    /// Fetch the raw statistics list.
    pub async fn fetch_statistics(&self) -> Result<Vec<u8>> {
        let url = self.endpoint(&["statistics"])?;
        self.get(url).await
    }

    /// Fetch and decode the server metadata object.
    pub async fn fetch_server_info(&self) -> Result<ServerInfo> {
        let url = self.endpoint(&[])?;
        let body = self.get(url).await?;
        ServerInfo::from_slice(&body)
    }

    async fn get(&self, url: Url) -> Result<Vec<u8>> {
        debug!(url = %url, "Requesting PowerDNS API");

        let response = self.http.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;

        trace!(bytes = body.len(), "Received PowerDNS API response");
        Ok(body.to_vec())
    }
}
