//! Polling driver for the producer side of the notification flow.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::bridge::{NotifyRequest, NotifyResponse};
use crate::error::NotifyError;
use crate::registry::CoordinationRegistry;

/// Defaults mirroring the reference driver: ten notifications, three
/// seconds apart.
pub const DEFAULT_COUNT: u32 = 10;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

/// Resolves the published server reference and issues `notify` calls.
pub struct NotifyClient {
    coordination: Arc<dyn CoordinationRegistry>,
    registry_key: String,
    http: reqwest::Client,
}

impl NotifyClient {
    pub fn new(
        coordination: Arc<dyn CoordinationRegistry>,
        registry_key: impl Into<String>,
    ) -> Self {
        Self {
            coordination,
            registry_key: registry_key.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Resolve the server reference and deliver one notification.
    ///
    /// An absent registry key and a stale reference (server restarted or
    /// gone) both fail here as retryable errors, never as a silent
    /// false-success.
    pub async fn notify(&self, channel: &str, message: &str) -> Result<bool, NotifyError> {
        let reference = self
            .coordination
            .resolve(&self.registry_key)
            .await?
            .ok_or_else(|| NotifyError::NotPublished(self.registry_key.clone()))?;

        let response: NotifyResponse = self
            .http
            .post(format!("{reference}/notify"))
            .json(&NotifyRequest {
                channel: channel.to_string(),
                message: message.to_string(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.delivered)
    }

    /// Fixed-interval polling loop: `count` notifications, one per
    /// `interval`. Failures are logged and retried on the next tick; the
    /// driver never crashes on a missing or stale reference.
    pub async fn run(&self, channel: &str, message: &str, count: u32, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        for attempt in 1..=count {
            ticker.tick().await;
            match self.notify(channel, message).await {
                Ok(true) => info!(attempt, %channel, "notification delivered"),
                Ok(false) => info!(attempt, %channel, "target not connected"),
                Err(err) if err.is_retryable() => {
                    warn!(attempt, "notify failed (will retry): {err}");
                }
                Err(err) => {
                    warn!(attempt, "notify failed: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
