//! Top-level connection error type.

use thiserror::Error;

use super::{HandshakeError, ProtocolError, UsageError};

/// Everything that can end (or reject an operation on) a connection.
///
/// Transport and handshake failures stay contained in the owning
/// connection task; application errors pass through the error hook before
/// the forced close and re-raise when no hook is registered.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Peer disconnected")]
    PeerDisconnected,

    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Application error: {0}")]
    Application(String),

    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Connection closed")]
    Closed,
}

impl ConnectionError {
    /// Whether this error represents an expected peer departure rather
    /// than a fault.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ConnectionError::PeerDisconnected => true,
            ConnectionError::Transport(e) => {
                matches!(
                    e.kind(),
                    std::io::ErrorKind::UnexpectedEof
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::BrokenPipe
                )
            }
            _ => false,
        }
    }
}
