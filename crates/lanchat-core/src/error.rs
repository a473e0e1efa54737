//! Error types for the LAN chat node

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Main error type for node operations
#[derive(Error, Debug)]
pub enum NodeError {
    /// No non-loopback IPv4 address is available, so the node cannot be discovered
    #[error("No usable local IPv4 address found")]
    NoLocalAddress,

    /// Identity is empty or contains the datagram separator
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// A socket could not be bound at startup
    #[error("Failed to bind {what} on {addr}: {source}")]
    Bind {
        /// Which socket failed ("sync server", "discovery listener", ...)
        what: &'static str,
        /// Address we tried to bind
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket transport error on the sync channel
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A network round trip exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Peer closed or misbehaved on the sync channel
    #[error("Network error: {0}")]
    Network(String),
}

/// Result type alias using NodeError
pub type NodeResult<T> = Result<T, NodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NodeError::InvalidIdentity("a:b".to_string());
        assert_eq!(format!("{}", err), "Invalid identity: a:b");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err: NodeError = io_err.into();
        assert!(matches!(err, NodeError::Io(_)));
    }

    #[test]
    fn test_bind_error_mentions_socket() {
        let err = NodeError::Bind {
            what: "sync server",
            addr: "0.0.0.0:12345".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        let text = err.to_string();
        assert!(text.contains("sync server"));
        assert!(text.contains("0.0.0.0:12345"));
    }
}
