//! Node construction parameters
//!
//! Everything the supervisor decides for a node lives here: identity,
//! topology slice, subscriptions, the exchange model, and the termination
//! policy. The config is plain data with builder-style setters; the node
//! itself never mutates it after spawn.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use spora_types::{NodeId, Topic};

/// Default worker tick interval. A tunable, not a protocol invariant.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Which exchange model a node runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolKind {
    /// Send own entries unconditionally to one random neighbor per round
    Push,
    /// Request newer versions from one random neighbor per round
    Pull,
    /// Offer own version and request newer in one combined message
    PushPull,
}

/// How a node decides to stop propagating a version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Never stop; keep exchanging forever
    AntiEntropy,
    /// Toss a `1/k` coin after every send that carried a concrete version
    BlindCoin {
        /// Inverse success probability; 0 disables the coin entirely
        k: u32,
    },
    /// Toss a `1/k` coin only once redundancy is confirmed by the peer
    FeedbackCoin {
        /// Inverse success probability; 0 disables the coin entirely
        k: u32,
    },
}

impl TerminationPolicy {
    /// Whether this policy ever removes versions.
    pub const fn is_gossip(self) -> bool {
        !matches!(self, TerminationPolicy::AntiEntropy)
    }

    /// The `k` parameter, if this is a coin policy.
    pub const fn k(self) -> Option<u32> {
        match self {
            TerminationPolicy::AntiEntropy => None,
            TerminationPolicy::BlindCoin { k } | TerminationPolicy::FeedbackCoin { k } => Some(k),
        }
    }
}

/// Assignment of a node as the source of one subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceAssignment {
    /// Subject this node originates
    pub subject: String,
    /// Payload of the initial version (timestamp 0)
    pub payload: String,
}

impl SourceAssignment {
    /// Create a source assignment.
    pub fn new(subject: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
        }
    }
}

/// Construction parameters for one node.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// This node's id
    pub id: NodeId,
    /// Address this node receives on
    pub bind_addr: SocketAddr,
    /// Ids of directly reachable neighbors; fixed for the run
    pub neighbors: Vec<NodeId>,
    /// Id to address resolution table
    pub addresses: HashMap<NodeId, SocketAddr>,
    /// Topics this node stores and requests
    pub subscriptions: Vec<Topic>,
    /// Optional role as the source of one subject
    pub source: Option<SourceAssignment>,
    /// Exchange model
    pub protocol: ProtocolKind,
    /// Termination policy
    pub policy: TerminationPolicy,
    /// Worker tick interval
    pub tick: Duration,
    /// Seed for neighbor selection and coin tosses
    pub seed: u64,
}

impl NodeConfig {
    /// Create a config with required fields and sensible defaults:
    /// push exchange, anti-entropy, 50 ms tick.
    pub fn new(id: NodeId, bind_addr: SocketAddr) -> Self {
        Self {
            id,
            bind_addr,
            neighbors: Vec::new(),
            addresses: HashMap::new(),
            subscriptions: Vec::new(),
            source: None,
            protocol: ProtocolKind::Push,
            policy: TerminationPolicy::AntiEntropy,
            tick: DEFAULT_TICK,
            seed: 42,
        }
    }

    /// Set the neighbor id list.
    pub fn with_neighbors(mut self, neighbors: Vec<NodeId>) -> Self {
        self.neighbors = neighbors;
        self
    }

    /// Set the id to address table.
    pub fn with_addresses(mut self, addresses: HashMap<NodeId, SocketAddr>) -> Self {
        self.addresses = addresses;
        self
    }

    /// Set the subscribed topic list.
    pub fn with_subscriptions(mut self, subscriptions: Vec<Topic>) -> Self {
        self.subscriptions = subscriptions;
        self
    }

    /// Assign this node as the source of a subject.
    pub fn with_source(mut self, source: SourceAssignment) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the exchange model.
    pub fn with_protocol(mut self, protocol: ProtocolKind) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the termination policy.
    pub fn with_policy(mut self, policy: TerminationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the worker tick interval.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Set the RNG seed for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::new(3, "127.0.0.1:0".parse().expect("valid addr"));

        assert_eq!(config.protocol, ProtocolKind::Push);
        assert_eq!(config.policy, TerminationPolicy::AntiEntropy);
        assert_eq!(config.tick, DEFAULT_TICK);
        assert!(config.source.is_none());
    }

    #[test]
    fn test_policy_k() {
        assert_eq!(TerminationPolicy::AntiEntropy.k(), None);
        assert_eq!(TerminationPolicy::BlindCoin { k: 3 }.k(), Some(3));
        assert!(TerminationPolicy::FeedbackCoin { k: 1 }.is_gossip());
        assert!(!TerminationPolicy::AntiEntropy.is_gossip());
    }
}
