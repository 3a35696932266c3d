#![warn(missing_docs)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Best-effort datagram transport seam for Spora nodes
//!
//! The [`Transport`] trait is the boundary between the dissemination core
//! and whatever carries frames between nodes: one text frame per datagram,
//! no retries, no acknowledgments, no ordering guarantee. Real socket
//! wrappers live outside this workspace; embedders implement the trait.
//!
//! The crate ships one implementation, [`MemoryNetwork`] /
//! [`MemoryTransport`]: an in-process datagram hub with deterministic,
//! seedable packet loss, used by the simulator and by tests.
//!
//! A [`FrameCounter`] is shared by every endpoint of one run, so a
//! simulation can measure total message volume without any process-wide
//! state.

mod error;
mod memory;

pub use error::{TransportError, TransportResult};
pub use memory::{MemoryNetwork, MemoryNetworkBuilder, MemoryTransport};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;

/// Datagram transport for one node endpoint.
///
/// `recv` blocks until a frame arrives or the transport closes; `send` is
/// fire-and-forget and may silently lose frames in transit, exactly like
/// the UDP-equivalent transport it stands in for.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Address this endpoint receives on.
    fn local_addr(&self) -> SocketAddr;

    /// Send one frame to a destination address, best-effort.
    async fn send(&self, dest: SocketAddr, frame: Bytes) -> TransportResult<()>;

    /// Receive the next inbound frame, blocking until one arrives.
    async fn recv(&self) -> TransportResult<Bytes>;

    /// Close the endpoint; subsequent `recv` calls drain and then fail
    /// with [`TransportError::Closed`].
    async fn close(&self);
}

/// Shared frame counter, scoped to one simulation run.
///
/// Handed to every transport endpoint of the run at construction instead
/// of living in a process-wide static, so concurrent runs never share
/// counts.
#[derive(Clone, Debug, Default)]
pub struct FrameCounter(Arc<AtomicU64>);

impl FrameCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sent frame.
    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Total frames recorded so far.
    pub fn total(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_counter_is_shared_per_clone() {
        let counter = FrameCounter::new();
        let other = counter.clone();

        counter.record();
        other.record();

        assert_eq!(counter.total(), 2);
        assert_eq!(other.total(), 2);
    }

    #[test]
    fn test_separate_counters_do_not_interfere() {
        let a = FrameCounter::new();
        let b = FrameCounter::new();
        a.record();

        assert_eq!(a.total(), 1);
        assert_eq!(b.total(), 0, "each run owns its own counter");
    }
}
