//! Notify-layer errors.

use thiserror::Error;

/// Coordination registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry connection failed: {0}")]
    Connection(String),

    #[error("Registry query failed: {0}")]
    Query(String),
}

/// Notify bridge and client errors.
///
/// Target-not-connected is not represented here: it is an expected
/// outcome, reported as a boolean by `notify`.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("No server reference published under key: {0}")]
    NotPublished(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to bind notify listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Notify server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl NotifyError {
    /// Whether the caller should retry later: the reference is missing or
    /// stale (pointing at a server that no longer answers).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NotifyError::NotPublished(_) | NotifyError::Request(_) | NotifyError::Registry(_)
        )
    }
}
