//! Node and topology context
//!
//! The static slice of the topology a node can see: its neighbors, how to
//! reach them, and what it subscribes to.

use std::collections::HashMap;
use std::net::SocketAddr;

use rand::seq::SliceRandom;
use rand::Rng;
use spora_types::{NodeId, Topic};

/// Immutable per-node view of the topology and subscriptions.
#[derive(Clone, Debug)]
pub struct NodeContext {
    id: NodeId,
    neighbors: Vec<NodeId>,
    addresses: HashMap<NodeId, SocketAddr>,
    subscriptions: Vec<Topic>,
}

impl NodeContext {
    /// Build a context.
    pub fn new(
        id: NodeId,
        neighbors: Vec<NodeId>,
        addresses: HashMap<NodeId, SocketAddr>,
        subscriptions: Vec<Topic>,
    ) -> Self {
        Self {
            id,
            neighbors,
            addresses,
            subscriptions,
        }
    }

    /// This node's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Directly reachable neighbor ids.
    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    /// Topics this node is interested in.
    pub fn subscriptions(&self) -> &[Topic] {
        &self.subscriptions
    }

    /// Whether this node subscribes to `topic`.
    pub fn subscribed(&self, topic: &Topic) -> bool {
        self.subscriptions.iter().any(|t| t == topic)
    }

    /// Resolve a node id to its address, if known.
    pub fn resolve(&self, node: NodeId) -> Option<SocketAddr> {
        self.addresses.get(&node).copied()
    }

    /// Pick one neighbor uniformly at random.
    pub fn random_neighbor<R: Rng>(&self, rng: &mut R) -> Option<NodeId> {
        self.neighbors.choose(rng).copied()
    }
}
