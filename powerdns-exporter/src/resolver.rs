//! Lazily fetched, cached server metadata.

use std::sync::Arc;

use powerdns_common::{DaemonType, PdnsClient, Result, ServerInfo};
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Resolves [`ServerInfo`] once and caches the result.
///
/// Concurrent callers share a single in-flight request. Failures are not
/// cached, so the next call tries again.
pub struct ServerInfoResolver {
    client: PdnsClient,
    cell: OnceCell<Arc<ServerInfo>>,
}

impl ServerInfoResolver {
    pub fn new(client: PdnsClient) -> Self {
        Self {
            client,
            cell: OnceCell::new(),
        }
    }

    /// Return the cached metadata, fetching it first if needed.
    pub async fn resolve(&self) -> Result<Arc<ServerInfo>> {
        let info = self
            .cell
            .get_or_try_init(|| async {
                let info = self.client.fetch_server_info().await?;
                info!(
                    id = %info.id,
                    daemon_type = %info.daemon_type,
                    version = %info.version,
                    "Resolved PowerDNS server"
                );
                Ok::<_, powerdns_common::Error>(Arc::new(info))
            })
            .await?;
        Ok(Arc::clone(info))
    }

    /// The metadata if it has been resolved, without fetching.
    pub fn cached(&self) -> Option<Arc<ServerInfo>> {
        self.cell.get().cloned()
    }
}

/// Pick the daemon role to export.
///
/// Makes one attempt to resolve the server metadata. An explicit setting wins;
/// otherwise the role is taken from the metadata, falling back to the recursor
/// when it cannot be determined.
pub async fn select_daemon_type(
    configured: Option<DaemonType>,
    resolver: &ServerInfoResolver,
) -> DaemonType {
    let resolved = resolver.resolve().await;

    if let Some(daemon) = configured {
        if let Err(e) = resolved {
            warn!(error = %e, "PowerDNS API not reachable yet, continuing");
        }
        return daemon;
    }

    match resolved {
        Ok(info) => match info.daemon() {
            Ok(daemon) => daemon,
            Err(e) => {
                warn!(error = %e, "Unsupported daemon type, assuming recursor");
                DaemonType::Recursor
            }
        },
        Err(e) => {
            warn!(error = %e, "Could not detect daemon type, assuming recursor");
            DaemonType::Recursor
        }
    }
}
