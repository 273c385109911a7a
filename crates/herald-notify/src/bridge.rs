//! Remote-callable delivery entry point.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info};

use herald_config::NotifyConfig;
use herald_server::ConnectionRegistry;

use crate::error::NotifyError;
use crate::registry::CoordinationRegistry;

/// Remote notify request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyRequest {
    pub channel: String,
    pub message: String,
}

/// Remote notify response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyResponse {
    pub delivered: bool,
}

/// Publishes the server's reachable address into the coordination registry
/// and serves `notify` calls from external processes.
///
/// The coordination registry handle is process-scoped state passed in at
/// construction; the bridge never reaches for ambient globals.
pub struct NotifyBridge {
    connections: Arc<ConnectionRegistry>,
    coordination: Arc<dyn CoordinationRegistry>,
    config: NotifyConfig,
}

impl NotifyBridge {
    pub fn new(
        connections: Arc<ConnectionRegistry>,
        coordination: Arc<dyn CoordinationRegistry>,
        config: NotifyConfig,
    ) -> Self {
        Self {
            connections,
            coordination,
            config,
        }
    }

    /// Deliver `message` to the connection on `channel`.
    ///
    /// A bare channel name addresses the connection registered under path
    /// `/<name>`; a name already carrying a slash is used as-is. An absent
    /// target is an expected, non-exceptional outcome: false.
    pub async fn notify(&self, channel: &str, message: &str) -> bool {
        let path = if channel.starts_with('/') {
            channel.to_string()
        } else {
            format!("/{channel}")
        };
        let delivered = self.connections.deliver(&path, message).await;
        debug!(%path, delivered, "notify");
        delivered
    }

    /// Number of currently connected channels.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Bind the bridge endpoint, publish its base URL under the
    /// well-known key, and serve until the process exits.
    pub async fn serve(self: Arc<Self>) -> Result<(), NotifyError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await.map_err(NotifyError::Bind)?;
        let local = listener.local_addr().map_err(NotifyError::Bind)?;

        let reference = format!("http://{}:{}", self.config.host, local.port());
        self.coordination
            .publish(&self.config.registry_key, &reference)
            .await?;
        info!(%reference, key = %self.config.registry_key, "notify bridge published");

        let router = Self::router(Arc::clone(&self));
        axum::serve(listener, router)
            .await
            .map_err(NotifyError::Serve)?;
        Ok(())
    }

    /// The bridge's HTTP surface.
    pub fn router(bridge: Arc<Self>) -> Router {
        Router::new()
            .route("/notify", post(notify_handler))
            .route("/health", get(health_handler))
            .with_state(bridge)
    }
}

async fn notify_handler(
    State(bridge): State<Arc<NotifyBridge>>,
    Json(request): Json<NotifyRequest>,
) -> Json<NotifyResponse> {
    let delivered = bridge.notify(&request.channel, &request.message).await;
    Json(NotifyResponse { delivered })
}

async fn health_handler(State(bridge): State<Arc<NotifyBridge>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "connections": bridge.connection_count(),
    }))
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
