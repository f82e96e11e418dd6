//! Network error types

use std::io;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A whole frame arrived but its payload did not decode; the stream
    /// itself is still aligned on frame boundaries
    #[error("Malformed payload: {0}")]
    Decode(String),

    #[error("Connection rejected: {0}")]
    Rejected(String),

    #[error("Session required before connecting")]
    SessionRequired,

    #[error("Not connected")]
    NotConnected,
}
