//! Scrape endpoint for the motion metrics.
//!
//! Serves `/metrics` in the Prometheus text format and a `/health`
//! liveness check. The exporter shares the monitor's [`StopSignal`], so
//! an interrupted run also shuts the endpoint down.

use crate::config::OutputConfig;
use crate::detection::StopSignal;
use crate::metrics::MetricsRegistry;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// How often the shutdown watcher polls the stop signal.
const STOP_POLL: Duration = Duration::from_millis(200);

/// Errors raised while serving metrics.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind metrics endpoint: {0}")]
    Bind(#[from] std::io::Error),

    #[error("metrics endpoint failed: {0}")]
    Server(String),
}

/// Where the exporter listens.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::from_output(&OutputConfig::default())
    }
}

impl MetricsServerConfig {
    /// Listens on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }

    /// Uses the `[output]` metrics port.
    pub fn from_output(output: &OutputConfig) -> Self {
        Self::with_port(output.metrics_port)
    }
}

/// Prometheus exporter for a running monitor.
///
/// Holds a clone of the registry; the monitor keeps updating its own
/// clone and every scrape sees the shared values.
pub struct MetricsServer {
    config: MetricsServerConfig,
    registry: Arc<MetricsRegistry>,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(scrape_handler))
            .route("/health", get(|| async { (StatusCode::OK, "OK") }))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.registry))
    }

    /// Serves scrapes until `stop` is raised.
    pub async fn serve_until(self, stop: StopSignal) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Metrics endpoint listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                while !stop.is_stopped() {
                    tokio::time::sleep(STOP_POLL).await;
                }
            })
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        tracing::info!("Metrics endpoint stopped");
        Ok(())
    }
}

/// Status, content type and body for one scrape.
fn scrape(registry: &MetricsRegistry) -> (StatusCode, &'static str, String) {
    match registry.encode() {
        Ok(body) => (StatusCode::OK, prometheus::TEXT_FORMAT, body),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics scrape failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain; charset=utf-8",
                format!("failed to encode metrics: {}", e),
            )
        }
    }
}

async fn scrape_handler(State(registry): State<Arc<MetricsRegistry>>) -> impl IntoResponse {
    let (status, content_type, body) = scrape(&registry);
    (status, [("content-type", content_type)], body)
}
