//! Error types for the client transport core
//!
//! Transient transport faults never propagate to producers; they are
//! absorbed into the connection state machine and surfaced through the
//! [`crate::observer::ClientObserver`] hooks, carrying one of these values.

use std::io;

use thiserror::Error;

/// Errors surfaced by the transport core
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP/socket connect failed
    #[error("connection failed to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Connect + handshake exceeded the configured deadline
    #[error("connect to {target} timed out after {timeout_ms} ms")]
    ConnectTimeout { target: String, timeout_ms: u64 },

    /// Peer closed the stream before finishing the banner exchange
    #[error("connection closed during handshake")]
    HandshakeEof,

    /// Server banner never terminated within the read limit
    #[error("server banner exceeded {limit} bytes without a line break")]
    BannerTooLong { limit: usize },

    /// Write to an established connection failed
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Peer closed an established connection
    #[error("connection closed by peer")]
    PeerClosed,
}
