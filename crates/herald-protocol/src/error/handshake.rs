//! Handshake errors.

use thiserror::Error;

/// A malformed upgrade request. Handshake errors abort the transport
/// without sending a close frame; the peer never reached framed mode.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("Malformed request line: {0}")]
    MalformedRequest(String),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("Request is not a websocket upgrade")]
    NotAnUpgrade,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_request_error() {
        let err = HandshakeError::MalformedRequest("GARBAGE".to_string());
        let display = err.to_string();
        assert!(display.contains("Malformed request"));
        assert!(display.contains("GARBAGE"));
    }

    #[test]
    fn test_unsupported_method_error() {
        let err = HandshakeError::UnsupportedMethod("POST".to_string());
        assert!(err.to_string().contains("POST"));
    }

    #[test]
    fn test_missing_header_error() {
        let err = HandshakeError::MissingHeader("Sec-WebSocket-Key");
        let display = err.to_string();
        assert!(display.contains("Missing required header"));
        assert!(display.contains("Sec-WebSocket-Key"));
    }

    #[test]
    fn test_not_an_upgrade_error() {
        let err = HandshakeError::NotAnUpgrade;
        assert!(err.to_string().contains("not a websocket upgrade"));
    }

    #[test]
    fn test_error_debug() {
        let err = HandshakeError::NotAnUpgrade;
        let debug = format!("{:?}", err);
        assert!(debug.contains("NotAnUpgrade"));
    }
}
