//! Error types for the WebSocket server

#![allow(missing_docs)]

use echosock_core::error::{ConfigError, Error};
use http::StatusCode;
use std::net::SocketAddr;
use std::time::Duration;

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: Error,
    },

    /// Accepting a connection failed
    #[error("Accept error: {0}")]
    Accept(#[source] Error),

    /// Handshake error
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] Error),
}

impl ServerError {
    /// Whether the failure belongs to a single connection rather than the
    /// server as a whole
    pub fn is_connection_scoped(&self) -> bool {
        matches!(self, ServerError::Handshake(_) | ServerError::Core(_))
    }
}

/// Reasons an upgrade handshake did not complete
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The client did not finish its request in time
    #[error("Handshake timed out after {0:?}")]
    Timeout(Duration),

    /// The client closed the connection before finishing its request
    #[error("Connection closed during handshake")]
    ConnectionClosed,

    /// The request was not an acceptable WebSocket upgrade
    #[error("Rejected with {status}: {source}")]
    Rejected {
        status: StatusCode,
        #[source]
        source: Error,
    },

    /// Reading or writing the handshake failed
    #[error("I/O error during handshake: {0}")]
    Io(#[source] Error),
}

impl HandshakeError {
    /// Reject a request that failed validation with `error`
    pub fn rejected(error: Error) -> Self {
        HandshakeError::Rejected {
            status: echosock_core::handshake::rejection_status(&error),
            source: error,
        }
    }

    /// HTTP status sent back to the client, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HandshakeError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echosock_core::error::ProtocolError;

    #[test]
    fn test_rejection_status() {
        let err = HandshakeError::rejected(ProtocolError::UnsupportedVersion("8".into()).into());
        assert_eq!(err.status(), Some(StatusCode::UPGRADE_REQUIRED));

        let err = HandshakeError::rejected(ProtocolError::MissingHeader("Upgrade".into()).into());
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert!(err.to_string().contains("400"));

        assert_eq!(HandshakeError::ConnectionClosed.status(), None);
    }

    #[test]
    fn test_error_scope() {
        let bind = ServerError::Bind {
            addr: "127.0.0.1:1".parse().unwrap(),
            source: Error::Other("in use".into()),
        };
        assert!(!bind.is_connection_scoped());
        assert!(bind.to_string().starts_with("Failed to bind 127.0.0.1:1"));
        assert!(ServerError::from(HandshakeError::ConnectionClosed).is_connection_scoped());
    }
}
