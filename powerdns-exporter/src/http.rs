//! HTTP server for the Prometheus metrics endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::collector::SharedExporter;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    exporter: SharedExporter,
    metrics_path: String,
}

/// Create the HTTP router.
fn create_router(exporter: SharedExporter, metrics_path: &str) -> Router {
    let state = AppState {
        exporter,
        metrics_path: metrics_path.to_string(),
    };

    let mut router = Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler));

    if metrics_path != "/" {
        router = router.route("/", get(index_handler));
    }

    router.layer(CorsLayer::permissive()).with_state(state)
}

/// Handler for the metrics endpoint. Every request runs one scrape.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let scrape = state.exporter.scrape().await;
    debug!(up = scrape.is_up(), "Serving scrape");

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        scrape.render(),
    )
        .into_response()
}

/// Landing page linking to the metrics endpoint.
async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>PowerDNS Exporter</title></head>\n<body>\n\
         <h1>PowerDNS Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n</html>\n",
        path = state.metrics_path
    ))
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Handler for the /ready endpoint.
///
/// Ready once the server metadata has been resolved; each request retries.
async fn ready_handler(State(state): State<AppState>) -> Response {
    match state.exporter.resolver().resolve().await {
        Ok(_) => (StatusCode::OK, "ready\n").into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("not ready - PowerDNS API unreachable: {}\n", e),
        )
            .into_response(),
    }
}

/// HTTP server configuration.
pub struct HttpServer {
    exporter: SharedExporter,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(exporter: SharedExporter, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            exporter,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.exporter, &self.metrics_path);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
