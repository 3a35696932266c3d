#![warn(missing_docs)]

//! Per-node epidemic dissemination engine
//!
//! A spawned node runs three concurrent tasks over one transport endpoint:
//!
//! - **Listener**: one blocking receive per iteration, into the raw queue
//! - **Dispatcher**: classifies raw frames into typed queues
//! - **Worker**: ticks the exchange and reply state machines, performs the
//!   sends, and owns every store and removed-set write
//!
//! plus a notifier task that forwards store events to the supervisor hook.
//! Stopping is cooperative: each task checks a shared flag every iteration
//! and the worker exits at its next tick boundary.
//!
//! The exchange model (push, pull, push-pull) and the termination policy
//! (anti-entropy, blind coin, feedback coin) are picked per node in
//! [`NodeConfig`]; everything else is common machinery.

mod config;
mod context;
mod dispatcher;
mod gossip;
mod listener;
mod supervisor;
mod worker;

pub use config::{
    NodeConfig, ProtocolKind, SourceAssignment, TerminationPolicy, DEFAULT_TICK,
};
pub use context::NodeContext;
pub use gossip::CoinToss;
pub use supervisor::{ChannelSupervisor, NoopSupervisor, SupervisorHook};
pub use worker::{
    ExchangeAction, ExchangeInputs, ExchangeState, ReplyAction, ReplyInputs, ReplyState,
};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use bytes::Bytes;
use spora_store::{MessageStore, RemovedSet};
use spora_transport::{Transport, TransportResult};
use spora_types::{MessageId, NodeId, Role, SpreadMessage, Topic};
use tokio::sync::mpsc;
use tracing::debug;

use worker::{Worker, WorkerQueues};

/// A running dissemination node.
pub struct Node;

impl Node {
    /// Spawn a node's tasks over `transport`, reporting store mutations to
    /// `hook`.
    ///
    /// If the config assigns a source subject, the initial version is
    /// stored (timestamp 0) before any task starts, so the very first
    /// round can already propagate it.
    pub fn spawn(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
        hook: Arc<dyn SupervisorHook>,
    ) -> Result<NodeHandle> {
        if config.tick.is_zero() {
            bail!("tick interval must be non-zero");
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let store = Arc::new(MessageStore::with_events(config.id, events_tx.clone()));
        let removed = Arc::new(RemovedSet::with_events(config.id, events_tx));

        let source_subject = config.source.as_ref().map(|s| s.subject.clone());
        if let Some(source) = &config.source {
            let id = MessageId::new(Topic::new(source.subject.clone(), config.id), 0);
            store.put(
                SpreadMessage::new(id, config.id, source.payload.clone()),
                Role::Source,
                config.id,
            );
        }

        let ctx = Arc::new(NodeContext::new(
            config.id,
            config.neighbors.clone(),
            config.addresses.clone(),
            config.subscriptions.clone(),
        ));

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (triggers_tx, triggers_rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));

        tokio::spawn(supervisor::run_notifier(events_rx, hook));
        tokio::spawn(listener::run(
            Arc::clone(&transport),
            raw_tx,
            Arc::clone(&stop),
        ));
        tokio::spawn(dispatcher::run(
            raw_rx,
            dispatcher::TypedQueues {
                requests: requests_tx,
                updates: updates_tx,
                triggers: triggers_tx,
            },
            Arc::clone(&stop),
        ));
        let worker = Worker::new(
            Arc::clone(&ctx),
            Arc::clone(&store),
            Arc::clone(&removed),
            Arc::clone(&transport),
            config.protocol,
            config.policy,
            WorkerQueues {
                requests: requests_rx,
                updates: updates_rx,
                triggers: triggers_rx,
            },
            config.tick,
            config.seed,
            Arc::clone(&stop),
        );
        tokio::spawn(worker.run());

        debug!(node = config.id, protocol = ?config.protocol, policy = ?config.policy, "node spawned");
        Ok(NodeHandle {
            ctx,
            store,
            removed,
            transport,
            bind_addr: config.bind_addr,
            source_subject,
            stop,
        })
    }
}

/// Handle to a running node: shared read views, the source publish
/// operation, round triggering, and cooperative stop.
pub struct NodeHandle {
    ctx: Arc<NodeContext>,
    store: Arc<MessageStore>,
    removed: Arc<RemovedSet>,
    transport: Arc<dyn Transport>,
    bind_addr: SocketAddr,
    source_subject: Option<String>,
    stop: Arc<AtomicBool>,
}

impl NodeHandle {
    /// This node's id.
    pub fn id(&self) -> NodeId {
        self.ctx.id()
    }

    /// Shared view of the message store, safe to read while the worker
    /// writes.
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Shared view of the removed set.
    pub fn removed(&self) -> &RemovedSet {
        &self.removed
    }

    /// Publish a new version of this node's source subject.
    ///
    /// The timestamp continues the strictly increasing sequence: one past
    /// the currently stored version, or 0 for a fresh subject. Returns the
    /// id of the published version.
    pub fn publish(&self, payload: impl Into<String>) -> Result<MessageId> {
        let subject = self
            .source_subject
            .as_deref()
            .context("node is not a source")?;
        let topic = Topic::new(subject, self.ctx.id());
        let next = self
            .store
            .freshest(&topic)
            .map(|entry| entry.message.id.timestamp + 1)
            .unwrap_or(0);
        let id = MessageId::new(topic, next);
        self.store.put(
            SpreadMessage::new(id.clone(), self.ctx.id(), payload),
            Role::Source,
            self.ctx.id(),
        );
        Ok(id)
    }

    /// Edge-trigger one exchange round by sending the control frame to
    /// this node's own endpoint, the same path a supervisor would use.
    pub async fn trigger_round(&self) -> TransportResult<()> {
        self.transport
            .send(self.bind_addr, Bytes::from_static(spora_wire::START_ROUND_FRAME.as_bytes()))
            .await
    }

    /// Raise the stop flag and close the transport. The listener and
    /// dispatcher exit their loops; the worker exits at its next tick.
    pub async fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.transport.close().await;
    }

    /// Whether stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}
