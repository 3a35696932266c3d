#![warn(missing_docs)]

//! Core types for the Spora epidemic dissemination toolkit
//!
//! This crate provides the fundamental types used throughout the node
//! pipeline and the simulator:
//! - `Topic`: a logical data stream and the node it originates from
//! - `MessageId`: a topic plus its logical version, the unit of freshness
//! - `SpreadMessage`: one versioned datum travelling between nodes
//! - `Role`: whether a node is the source of a topic or a forwarder

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a node participating in a dissemination run.
pub type NodeId = u32;

/// A logical data stream: a subject string plus the node it originates from.
///
/// Two topics are the same stream only if both the subject and the source
/// node match; the same subject published by two different sources is two
/// independent streams.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    /// Human-readable subject of the stream
    pub subject: String,
    /// Node that originates versions of this stream
    pub source: NodeId,
}

impl Topic {
    /// Create a new topic
    pub fn new(subject: impl Into<String>, source: NodeId) -> Self {
        Self {
            subject: subject.into(),
            source,
        }
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({}@{})", self.subject, self.source)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.subject, self.source)
    }
}

/// A topic pinned to one logical version.
///
/// The timestamp is a strictly increasing counter controlled by the topic's
/// source node, starting at 0 for self-generated data. It is the sole
/// staleness comparator: within a topic, a greater timestamp is fresher.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId {
    /// The stream this version belongs to
    pub topic: Topic,
    /// Logical version counter assigned by the source
    pub timestamp: u64,
}

impl MessageId {
    /// Create a new message id
    pub fn new(topic: Topic, timestamp: u64) -> Self {
        Self { topic, timestamp }
    }

    /// Whether this id is a strictly fresher version of the same topic.
    pub fn supersedes(&self, other: &MessageId) -> bool {
        self.topic == other.topic && self.timestamp > other.timestamp
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({}#{})", self.topic, self.timestamp)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.topic, self.timestamp)
    }
}

/// One versioned datum travelling between nodes.
///
/// `origin` is the immediate sender of this copy and is rewritten at every
/// hop; it is not necessarily the topic's source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadMessage {
    /// Identity and version of the datum
    pub id: MessageId,
    /// Immediate sender of this copy
    pub origin: NodeId,
    /// Opaque payload
    pub payload: String,
}

impl SpreadMessage {
    /// Create a new spread message
    pub fn new(id: MessageId, origin: NodeId, payload: impl Into<String>) -> Self {
        Self {
            id,
            origin,
            payload: payload.into(),
        }
    }

    /// Copy of this message with the origin rewritten to the forwarding node.
    pub fn forwarded_by(&self, origin: NodeId) -> Self {
        Self {
            id: self.id.clone(),
            origin,
            payload: self.payload.clone(),
        }
    }
}

/// How a node holds a topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// This node originates versions of the topic
    Source,
    /// This node only relays versions received from elsewhere
    Forwarder,
}

impl Role {
    /// Whether this role is [`Role::Source`].
    pub const fn is_source(self) -> bool {
        matches!(self, Role::Source)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Source => write!(f, "source"),
            Role::Forwarder => write!(f, "forwarder"),
        }
    }
}
