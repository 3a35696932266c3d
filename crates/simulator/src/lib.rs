#![warn(missing_docs)]

//! Multi-node simulation harness for Spora dissemination runs
//!
//! Builds a set of nodes over one in-memory datagram network, wires their
//! neighbor tables from a [`Topology`], drives externally triggered rounds,
//! and aggregates infection and remotion notifications so a run can be
//! measured: how many nodes hold a topic, whether the network has
//! converged, and how many frames the protocol cost.
//!
//! Every random decision in a run (neighbor picks, coin tosses, simulated
//! loss) derives from the builder's seed, so a simulation replays
//! identically.
//!
//! # Example
//!
//! ```rust,no_run
//! use spora_simulator::{SimulationBuilder, Topology};
//! use spora_node::{ProtocolKind, TerminationPolicy};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let sim = SimulationBuilder::new(8)
//!     .with_topology(Topology::Ring)
//!     .with_protocol(ProtocolKind::PushPull)
//!     .with_policy(TerminationPolicy::BlindCoin { k: 3 })
//!     .with_source(1, "temp", "21.5")
//!     .build()?;
//!
//! for _ in 0..16 {
//!     sim.run_round().await;
//! }
//! println!("spread to {} nodes", sim.infected(&sim.source_topic(1, "temp")));
//! sim.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod stats;
mod topology;

pub use stats::{RoundReport, RunReport};
pub use topology::Topology;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Result};
use bytes::Bytes;
use spora_node::{
    ChannelSupervisor, Node, NodeConfig, NodeHandle, ProtocolKind, SourceAssignment,
    TerminationPolicy,
};
use spora_store::StoreEvent;
use spora_transport::{FrameCounter, MemoryNetwork, MemoryTransport, Transport};
use spora_types::{MessageId, NodeId, Topic};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, warn};

/// Default worker tick used by simulations; short enough that a settle
/// window of a few dozen milliseconds spans several ticks.
pub const SIM_TICK: Duration = Duration::from_millis(5);

/// Default settle window after each triggered round.
pub const SIM_SETTLE: Duration = Duration::from_millis(100);

const BASE_PORT: u16 = 41_000;
const DRIVER_PORT: u16 = 40_999;

/// Builder for a [`Simulation`].
#[derive(Clone, Debug)]
pub struct SimulationBuilder {
    nodes: usize,
    topology: Topology,
    protocol: ProtocolKind,
    policy: TerminationPolicy,
    tick: Duration,
    settle: Duration,
    seed: u64,
    loss_rate: f64,
    sources: Vec<(NodeId, SourceAssignment)>,
}

impl SimulationBuilder {
    /// Start a simulation of `nodes` nodes (ids 1 through `nodes`), mesh
    /// topology, push exchange, anti-entropy.
    pub fn new(nodes: usize) -> Self {
        Self {
            nodes,
            topology: Topology::Mesh,
            protocol: ProtocolKind::Push,
            policy: TerminationPolicy::AntiEntropy,
            tick: SIM_TICK,
            settle: SIM_SETTLE,
            seed: 42,
            loss_rate: 0.0,
            sources: Vec::new(),
        }
    }

    /// Set the neighbor graph.
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the exchange model for every node.
    pub fn with_protocol(mut self, protocol: ProtocolKind) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the termination policy for every node.
    pub fn with_policy(mut self, policy: TerminationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the worker tick interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Set the settle window used by [`Simulation::run_round`].
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Set the master seed for the run.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Drop each frame in transit with this probability.
    pub fn with_loss_rate(mut self, rate: f64) -> Self {
        self.loss_rate = rate;
        self
    }

    /// Assign `node` as the source of `subject`. Every node in the run is
    /// subscribed to every source topic.
    pub fn with_source(
        mut self,
        node: NodeId,
        subject: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        self.sources.push((node, SourceAssignment::new(subject, payload)));
        self
    }

    /// Spawn every node and return the running simulation.
    pub fn build(self) -> Result<Simulation> {
        if self.nodes == 0 {
            bail!("a simulation needs at least one node");
        }
        let ids: Vec<NodeId> = (1..=self.nodes as NodeId).collect();
        for (node, source) in &self.sources {
            if !ids.contains(node) {
                bail!("source node {node} for {:?} is not in the run", source.subject);
            }
        }

        let addresses: HashMap<NodeId, SocketAddr> =
            ids.iter().map(|id| (*id, node_addr(*id))).collect();
        let subscriptions: Vec<Topic> = self
            .sources
            .iter()
            .map(|(node, source)| Topic::new(source.subject.clone(), *node))
            .collect();
        let neighbors = self.topology.neighbors(&ids);

        let counter = FrameCounter::new();
        let network = MemoryNetwork::builder()
            .with_counter(counter.clone())
            .with_loss_rate(self.loss_rate)
            .with_seed(self.seed)
            .build();
        let driver = network.endpoint(driver_addr());
        let (hook, events) = ChannelSupervisor::channel();

        let mut handles = HashMap::new();
        for id in &ids {
            let mut config = NodeConfig::new(*id, node_addr(*id))
                .with_neighbors(neighbors.get(id).cloned().unwrap_or_default())
                .with_addresses(addresses.clone())
                .with_subscriptions(subscriptions.clone())
                .with_protocol(self.protocol)
                .with_policy(self.policy)
                .with_tick(self.tick)
                .with_seed(self.seed.wrapping_add(*id as u64));
            if let Some((_, source)) = self.sources.iter().find(|(node, _)| node == id) {
                config = config.with_source(source.clone());
            }
            let transport = Arc::new(network.endpoint(node_addr(*id)));
            let handle = Node::spawn(config, transport, Arc::clone(&hook) as _)?;
            handles.insert(*id, handle);
        }

        debug!(nodes = self.nodes, topology = ?self.topology, "simulation built");
        Ok(Simulation {
            ids,
            handles,
            driver,
            events: Mutex::new(events),
            counter,
            settle: self.settle,
        })
    }
}

/// A running set of nodes plus the instruments to measure them.
pub struct Simulation {
    ids: Vec<NodeId>,
    handles: HashMap<NodeId, NodeHandle>,
    driver: MemoryTransport,
    events: Mutex<UnboundedReceiver<StoreEvent>>,
    counter: FrameCounter,
    settle: Duration,
}

impl Simulation {
    /// Node ids of the run, ascending.
    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    /// Handle of one node.
    ///
    /// # Panics
    /// Never panics for ids returned by [`Simulation::ids`].
    pub fn node(&self, id: NodeId) -> &NodeHandle {
        match self.handles.get(&id) {
            Some(handle) => handle,
            None => unreachable!("simulation ids are fixed at build time"),
        }
    }

    /// The topic `node` sources under `subject`.
    pub fn source_topic(&self, node: NodeId, subject: &str) -> Topic {
        Topic::new(subject, node)
    }

    /// Edge-trigger one exchange round on every node, then wait for the
    /// settle window.
    pub async fn run_round(&self) {
        self.trigger_all().await;
        time::sleep(self.settle).await;
    }

    /// Edge-trigger one exchange round on every node without settling.
    pub async fn trigger_all(&self) {
        for id in &self.ids {
            if let Err(err) = self.node(*id).trigger_round().await {
                warn!(node = id, %err, "round trigger not delivered");
            }
        }
    }

    /// Give in-flight frames and ticks time to complete.
    pub async fn settle(&self) {
        time::sleep(self.settle).await;
    }

    /// Deliver a raw frame to one node, as an external supervisor would.
    pub async fn inject(&self, to: NodeId, frame: &str) {
        if let Err(err) = self
            .driver
            .send(node_addr(to), Bytes::copy_from_slice(frame.as_bytes()))
            .await
        {
            warn!(node = to, %err, "injected frame not delivered");
        }
    }

    /// Number of nodes holding any version of `topic`.
    pub fn infected(&self, topic: &Topic) -> usize {
        self.ids
            .iter()
            .filter(|id| self.node(**id).store().contains(topic))
            .count()
    }

    /// Number of nodes holding exactly `timestamp` of `topic`.
    pub fn holding(&self, topic: &Topic, timestamp: u64) -> usize {
        self.ids
            .iter()
            .filter(|id| {
                self.node(**id)
                    .store()
                    .freshest(topic)
                    .is_some_and(|entry| entry.message.id.timestamp == timestamp)
            })
            .count()
    }

    /// Whether every node holds `topic` at exactly `timestamp`.
    pub fn converged(&self, topic: &Topic, timestamp: u64) -> bool {
        self.holding(topic, timestamp) == self.ids.len()
    }

    /// Total frames sent by every node so far.
    pub fn frames_sent(&self) -> u64 {
        self.counter.total()
    }

    /// Drain every notification received since the last call.
    pub async fn drain_events(&self) -> Vec<StoreEvent> {
        let mut events = self.events.lock().await;
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Drain and keep only infection notifications, as
    /// `(id, updated, infecting)` triples.
    pub async fn drain_infections(&self) -> Vec<(MessageId, NodeId, NodeId)> {
        self.drain_events()
            .await
            .into_iter()
            .filter_map(|event| match event {
                StoreEvent::Infection {
                    id,
                    updated,
                    infecting,
                } => Some((id, updated, infecting)),
                StoreEvent::Remotion { .. } => None,
            })
            .collect()
    }

    /// Drain and keep only remotion notifications, as `(id, updated)`
    /// pairs.
    pub async fn drain_remotions(&self) -> Vec<(MessageId, NodeId)> {
        self.drain_events()
            .await
            .into_iter()
            .filter_map(|event| match event {
                StoreEvent::Remotion { id, updated } => Some((id, updated)),
                StoreEvent::Infection { .. } => None,
            })
            .collect()
    }

    /// Stop every node cooperatively.
    pub async fn shutdown(&self) {
        for id in &self.ids {
            self.node(*id).stop().await;
        }
    }
}

fn node_addr(id: NodeId) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], BASE_PORT.wrapping_add(id as u16)))
}

fn driver_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], DRIVER_PORT))
}
