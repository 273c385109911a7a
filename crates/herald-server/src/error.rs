//! Server errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Accept failed: {0}")]
    Accept(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err = ServerError::Bind(io_err);
        assert!(err.to_string().contains("Failed to bind"));
        assert!(err.to_string().contains("in use"));
    }

    #[test]
    fn test_accept_error_display() {
        let io_err = std::io::Error::other("boom");
        let err = ServerError::Accept(io_err);
        assert!(err.to_string().contains("Accept failed"));
    }
}
