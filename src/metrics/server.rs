//! HTTP server for the Prometheus metrics endpoint.

use super::{MetricsRegistry, MetricsSnapshot};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// Registry plus the latest snapshot, shared with the handlers.
pub struct MetricsState {
    registry: MetricsRegistry,
    latest: Option<MetricsSnapshot>,
}

impl MetricsState {
    pub fn update(&mut self, snapshot: MetricsSnapshot) {
        self.registry.update(&snapshot);
        self.latest = Some(snapshot);
    }
}

pub type SharedMetricsState = Arc<RwLock<MetricsState>>;

/// HTTP server exposing `/metrics` and `/health`.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: SharedMetricsState,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(MetricsState {
                registry,
                latest: None,
            })),
        }
    }

    /// Shared state the scanner side pushes snapshots into.
    pub fn state(&self) -> SharedMetricsState {
        Arc::clone(&self.state)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Serves until the task is dropped or the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(addr = %self.config.bind_addr, "Metrics server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler(State(state): State<SharedMetricsState>) -> impl IntoResponse {
    let state = state.read().await;

    match state.registry.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

/// 200 once a camera is reachable, 503 while permission is denied or no
/// device was found.
async fn health_handler(State(state): State<SharedMetricsState>) -> impl IntoResponse {
    let state = state.read().await;
    match &state.latest {
        Some(snapshot) if snapshot.is_healthy() => (StatusCode::OK, "OK"),
        Some(_) => (StatusCode::SERVICE_UNAVAILABLE, "NO_CAMERA"),
        None => (StatusCode::OK, "STARTING"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Permission;

    #[test]
    fn test_config_default() {
        let config = MetricsServerConfig::default();
        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_config_with_port() {
        let config = MetricsServerConfig::with_port(8080);
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[tokio::test]
    async fn test_state_keeps_latest_snapshot() {
        let server = MetricsServer::new(MetricsServerConfig::default(), MetricsRegistry::new().unwrap());
        let state = server.state();

        let snapshot = MetricsSnapshot {
            permission: Permission::Denied,
            device_count: 1,
            ..MetricsSnapshot::default()
        };
        state.write().await.update(snapshot.clone());

        let guard = state.read().await;
        assert_eq!(guard.latest, Some(snapshot));
        assert!(guard.registry.encode().unwrap().contains("camera_scanner_permission 0"));
    }
}
