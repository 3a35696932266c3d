//! Transport layer error types.
//!
//! This module provides error types for transport operations using thiserror
//! for ergonomic error handling. Every variant here is an expected, transient
//! condition for a best-effort transport: callers log and move on, and the
//! next exchange round retries naturally.

use std::net::SocketAddr;

use spora_types::NodeId;
use thiserror::Error;

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The neighbor id has no entry in the address table.
    #[error("no address known for node {node}")]
    UnknownPeer {
        /// The node id that could not be resolved.
        node: NodeId,
    },

    /// Failed to hand a frame to a destination.
    #[error("send failed to {addr}: {source}")]
    SendFailed {
        /// The destination address.
        addr: SocketAddr,
        /// The underlying error.
        #[source]
        source: anyhow::Error,
    },

    /// Failed to receive a frame from the transport.
    #[error("receive failed: {source}")]
    ReceiveFailed {
        /// The underlying error.
        #[source]
        source: anyhow::Error,
    },

    /// Transport is closed.
    #[error("transport is closed")]
    Closed,
}

impl TransportError {
    /// Whether this error means the transport will never yield again.
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}
