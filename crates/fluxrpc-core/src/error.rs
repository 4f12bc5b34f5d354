//! Transport error types.

use thiserror::Error;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur while resolving, connecting, or running
/// a session.
///
/// The type is cheap to clone so that a single failure can be fanned out to
/// every waiter affected by it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The operation was cancelled before it could complete.
    #[error("operation aborted")]
    Aborted,

    /// A connection attempt was abandoned by a close request.
    #[error("connection aborted")]
    ConnectionAborted,

    /// The session is not connected.
    #[error("not connected")]
    NotConnected,

    /// A waiter was installed while another wait was already in flight.
    #[error("a wait is already in progress")]
    WaitInProgress,

    /// The peer closed the stream.
    #[error("stream closed")]
    Closed,

    /// Name resolution failed.
    #[error("resolve failed: {0}")]
    Resolve(String),

    /// Failed to establish a connection.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    Tls(String),

    /// The WebSocket upgrade failed.
    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    /// Failed to send a frame.
    #[error("send failed: {0}")]
    Send(String),

    /// Failed to receive a frame.
    #[error("receive failed: {0}")]
    Receive(String),

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
