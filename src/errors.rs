//! Error taxonomy for the transport-and-fan-out pipeline.
//!
//! Transport failures are local to the call that produced them and never tear
//! down the client. Per-subscriber hub failures are absorbed inside the hub
//! and only show up in diagnostics. Nothing here terminates the process.

use std::time::Duration;

use thiserror::Error;

/// Failures produced by the QUIC transport client.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The retry budget was exhausted while establishing the backend
    /// connection. Terminal for that call only; the caller may connect again.
    #[error("failed to connect after {attempts} attempts: {last}")]
    ConnectFailed { attempts: u32, last: String },

    /// Operation attempted with no healthy session and no successful inline
    /// reconnect.
    #[error("not connected")]
    NotConnected,

    /// A single dial attempt failed before the connection was established.
    #[error("dial failed: {0}")]
    Dial(String),

    /// Failure opening, writing or reading a logical stream on an otherwise
    /// healthy connection. Never retried implicitly.
    #[error("stream error: {0}")]
    Stream(String),

    /// A per-call deadline expired and the in-flight I/O was aborted.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("tls setup failed: {0}")]
    Tls(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures translating backend data into a [`StatusRecord`].
///
/// Propagated to point-query callers; a bad broadcast frame is logged and
/// dropped without crashing the dispatch loop.
///
/// [`StatusRecord`]: crate::status::StatusRecord
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode status payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("backend fault: {0}")]
    Backend(String),
}

/// Failures loading the construction-time configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid listen address {addr}: {source}")]
    BindAddr {
        addr: String,
        source: std::net::AddrParseError,
    },
}
