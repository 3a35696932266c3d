//! In-process datagram network
//!
//! A [`MemoryNetwork`] is a hub of mailboxes keyed by socket address; each
//! [`MemoryTransport`] endpoint registers one mailbox. Frames hop between
//! endpoints through unbounded channels, preserving per-sender order the
//! way a loopback UDP socket would, while still being allowed to drop
//! frames when a loss rate is configured. Loss is driven by a seeded
//! `Pcg64` so simulations stay reproducible.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::{FrameCounter, Transport, TransportError, TransportResult};

/// Shared in-process datagram hub for one simulation run.
pub struct MemoryNetwork {
    mailboxes: DashMap<SocketAddr, UnboundedSender<Bytes>>,
    counter: FrameCounter,
    loss_rate: f64,
    rng: Mutex<Pcg64>,
}

impl MemoryNetwork {
    /// Create a lossless network with its own frame counter.
    pub fn new() -> Arc<Self> {
        Self::builder().build()
    }

    /// Start configuring a network.
    pub fn builder() -> MemoryNetworkBuilder {
        MemoryNetworkBuilder::default()
    }

    /// Counter shared by every endpoint of this network.
    pub fn counter(&self) -> FrameCounter {
        self.counter.clone()
    }

    /// Total frames offered to the network so far.
    pub fn frames_sent(&self) -> u64 {
        self.counter.total()
    }

    /// Register an endpoint receiving on `addr`.
    ///
    /// A later registration for the same address replaces the earlier
    /// mailbox, which then only drains what it already holds.
    pub fn endpoint(self: &Arc<Self>, addr: SocketAddr) -> MemoryTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        self.mailboxes.insert(addr, tx);
        MemoryTransport {
            network: Arc::clone(self),
            addr,
            inbox: Mutex::new(rx),
            closed: AtomicBool::new(false),
        }
    }

    async fn transmit(&self, from: SocketAddr, dest: SocketAddr, frame: Bytes) -> TransportResult<()> {
        self.counter.record();

        if self.loss_rate > 0.0 {
            let roll: f64 = self.rng.lock().await.gen();
            if roll < self.loss_rate {
                trace!(%from, %dest, "memory net: frame lost in transit");
                return Ok(());
            }
        }

        let Some(mailbox) = self.mailboxes.get(&dest).map(|m| m.value().clone()) else {
            return Err(TransportError::SendFailed {
                addr: dest,
                source: anyhow::anyhow!("no endpoint bound"),
            });
        };
        mailbox.send(frame).map_err(|_| TransportError::SendFailed {
            addr: dest,
            source: anyhow::anyhow!("endpoint hung up"),
        })
    }
}

/// Builder for [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryNetworkBuilder {
    counter: FrameCounter,
    loss_rate: f64,
    seed: u64,
}

impl Default for MemoryNetworkBuilder {
    fn default() -> Self {
        Self {
            counter: FrameCounter::new(),
            loss_rate: 0.0,
            seed: 42,
        }
    }
}

impl MemoryNetworkBuilder {
    /// Share an externally owned frame counter.
    pub fn with_counter(mut self, counter: FrameCounter) -> Self {
        self.counter = counter;
        self
    }

    /// Drop each frame in transit with this probability (0.0 to 1.0).
    pub fn with_loss_rate(mut self, rate: f64) -> Self {
        self.loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Seed for the loss RNG, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the network.
    pub fn build(self) -> Arc<MemoryNetwork> {
        Arc::new(MemoryNetwork {
            mailboxes: DashMap::new(),
            counter: self.counter,
            loss_rate: self.loss_rate,
            rng: Mutex::new(Pcg64::seed_from_u64(self.seed)),
        })
    }
}

/// One node's endpoint on a [`MemoryNetwork`].
pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
    addr: SocketAddr,
    inbox: Mutex<UnboundedReceiver<Bytes>>,
    closed: AtomicBool,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn send(&self, dest: SocketAddr, frame: Bytes) -> TransportResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.network.transmit(self.addr, dest, frame).await
    }

    async fn recv(&self) -> TransportResult<Bytes> {
        let mut inbox = self.inbox.lock().await;
        inbox.recv().await.ok_or(TransportError::Closed)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropping the mailbox sender lets a blocked recv observe Closed
        // once the queue drains.
        self.network.mailboxes.remove(&self.addr);
        debug!(addr = %self.addr, "memory transport closed");
    }
}
