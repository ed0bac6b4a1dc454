//! Error types
//!
//! None of these reach a [`SyncAgent`](crate::agent::SyncAgent) consumer;
//! they surface from the relay server, the client connections and the
//! gateway implementations, and are logged where they are swallowed.

use std::io;

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("operation timed out")]
    Timeout,

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("not connected")]
    NotConnected,
}

impl Error {
    /// Whether a connection can continue after this error
    ///
    /// Only a malformed frame qualifies: the frame has already been consumed
    /// and the stream is still aligned on a frame boundary.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Codec(codec) if codec.is_recoverable())
    }
}

/// Wire framing errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// Length prefix exceeds the configured maximum; the stream cannot be resynchronized
    #[error("frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    /// Frame was consumed but its body is not a valid event
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl CodecError {
    /// Whether the connection can keep reading after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CodecError::Malformed(_))
    }
}

/// Snapshot payload errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// State gateway errors
///
/// "Not found" is not an error: gateways report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("invalid snapshot from gateway: {0}")]
    Snapshot(#[from] SnapshotError),
}
