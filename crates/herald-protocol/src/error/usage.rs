//! Caller usage errors.

use thiserror::Error;

/// An operation invoked outside the protocol state that allows it, or with
/// arguments the protocol reserves. Rejected synchronously, before any
/// bytes reach the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("Cannot send before the handshake completes")]
    SendBeforeOpen,

    #[error("Cannot send after close")]
    SendAfterClose,

    #[error("Application close codes must be in 4000-4999, got {0}")]
    CloseCodeOutOfRange(u16),
}
