//! Error types
//!
//! Crate-wide error type for the transport layer. Malformed client frames
//! ([`ProtocolError`](crate::protocol::ProtocolError)) and chat store failures
//! ([`StoreError`](crate::chat::StoreError)) never end a connection, so they
//! are logged where they occur instead of being converted here.

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for server and connection operations
#[derive(Debug)]
pub enum Error {
    /// Socket bind/accept failure
    Io(std::io::Error),
    /// WebSocket handshake or framing failure on a single connection
    WebSocket(tokio_tungstenite::tungstenite::Error),
    /// WebSocket upgrade did not complete in time
    HandshakeTimeout,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::HandshakeTimeout => write!(f, "WebSocket handshake timed out"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::WebSocket(e) => Some(e),
            Error::HandshakeTimeout => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(err)
    }
}
