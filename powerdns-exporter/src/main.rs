//! Prometheus exporter for PowerDNS.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use powerdns_common::{DaemonType, PdnsClient, init_tracing};
use tokio::sync::watch;
use tracing::{error, info, warn};
use url::Url;

use powerdns_exporter::{
    Exporter, ExporterConfig, HttpServer, MetricTable, ServerInfoResolver, select_daemon_type,
};

/// Prometheus exporter for PowerDNS.
#[derive(Parser, Debug)]
#[command(name = "powerdns-exporter")]
#[command(about = "Export PowerDNS statistics as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Base URL of the PowerDNS API, e.g. http://127.0.0.1:8081/api/v1 (overrides config).
    #[arg(long)]
    api_url: Option<Url>,

    /// PowerDNS API key (overrides config).
    #[arg(long, env = "PDNS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Server id in the API path (overrides config).
    #[arg(long)]
    server_id: Option<String>,

    /// Daemon role: authoritative or recursor (overrides config and detection).
    #[arg(long)]
    daemon_type: Option<DaemonType>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ExporterConfig) {
        if let Some(listen) = self.listen {
            config.prometheus.listen = listen;
        }
        if let Some(url) = self.api_url {
            config.api.url = url;
        }
        if let Some(key) = self.api_key {
            config.api.key = key;
        }
        if let Some(server_id) = self.server_id {
            config.api.server_id = server_id;
        }
        if let Some(daemon_type) = self.daemon_type {
            config.api.daemon_type = Some(daemon_type);
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => ExporterConfig::load_from_file(path)?,
        None => ExporterConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    init_tracing(&config.logging)?;

    info!(
        api = %config.api.url,
        server_id = %config.api.server_id,
        "Starting PowerDNS exporter"
    );

    let client = PdnsClient::new(&config.api)?;
    let resolver = Arc::new(ServerInfoResolver::new(client.clone()));

    let daemon = select_daemon_type(config.api.daemon_type, &resolver).await;
    info!(daemon_type = %daemon, "Using metric table");

    let table = MetricTable::new(daemon, &config.prometheus.namespace);
    let exporter = Arc::new(Exporter::new(client, table, resolver, &config.filters));

    let listen_addr: SocketAddr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(
        exporter.clone(),
        listen_addr,
        config.prometheus.path.clone(),
    );
    let mut http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = &mut http_task => {
            anyhow::bail!("HTTP server exited unexpectedly");
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    let stats = exporter.stats();
    info!(
        scrapes_total = stats.scrapes_total,
        json_parse_failures = stats.json_parse_failures,
        up = stats.up,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

async fn terminate() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
