#![warn(missing_docs)]

//! Per-node versioned message store and removal bookkeeping
//!
//! A [`MessageStore`] maps each topic to the single freshest version a node
//! knows, with role bookkeeping. A [`RemovedSet`] records the exact versions
//! a gossiping node has decided to stop propagating. Both are written only
//! by their owning node's worker but stay readable from status and
//! convergence checkers while the worker runs, so they sit on `dashmap`
//! rather than an externally locked map.
//!
//! Successful mutations emit [`StoreEvent`]s over an unbounded channel;
//! delivery problems are swallowed so that a node's own dissemination state
//! is never blocked by notification delivery.

use dashmap::{DashMap, DashSet};
use spora_types::{MessageId, NodeId, Role, SpreadMessage, Topic};
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

/// Notification of a store or removed-set mutation, consumed by the
/// supervisor hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    /// A node stored a fresher version of a topic
    Infection {
        /// Version that was stored
        id: MessageId,
        /// Node whose store changed
        updated: NodeId,
        /// Node the data came from (the updated node itself for sources)
        infecting: NodeId,
    },
    /// A node decided to stop propagating an exact version
    Remotion {
        /// Version that was removed
        id: MessageId,
        /// Node whose removed set changed
        updated: NodeId,
    },
}

/// Result of offering a message to [`MessageStore::accept_if_fresher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The message was fresher and is now stored
    Accepted,
    /// The message was stale, a duplicate, or blocked by role stickiness
    Ignored,
}

impl AcceptOutcome {
    /// Whether the message was stored.
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// A stored topic entry: the freshest known message plus how it is held.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry {
    /// Freshest known message for the topic
    pub message: SpreadMessage,
    /// Whether this node originates or merely relays the topic
    pub role: Role,
}

/// Map from topic to the single freshest known version.
///
/// Invariant: at most one entry per topic; storing a fresher version
/// atomically discards the previous one. Entries are superseded, never
/// deleted.
pub struct MessageStore {
    node: NodeId,
    entries: DashMap<Topic, StoredEntry>,
    events: Option<UnboundedSender<StoreEvent>>,
}

impl MessageStore {
    /// Create a store with no event channel.
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            entries: DashMap::new(),
            events: None,
        }
    }

    /// Create a store that reports mutations on `events`.
    pub fn with_events(node: NodeId, events: UnboundedSender<StoreEvent>) -> Self {
        Self {
            node,
            entries: DashMap::new(),
            events: Some(events),
        }
    }

    /// Node owning this store.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Store `message` unconditionally, replacing any existing entry for
    /// its topic, and report the infection as coming from `infecting`.
    ///
    /// Role stickiness still applies: an entry held as [`Role::Source`] is
    /// never displaced by a [`Role::Forwarder`] message.
    pub fn put(&self, message: SpreadMessage, role: Role, infecting: NodeId) -> AcceptOutcome {
        let topic = message.id.topic.clone();
        if role == Role::Forwarder {
            if let Some(existing) = self.entries.get(&topic) {
                if existing.role.is_source() {
                    trace!(topic = %topic, "store: source entry shielded from forwarder put");
                    return AcceptOutcome::Ignored;
                }
            }
        }

        let id = message.id.clone();
        self.entries.insert(topic, StoredEntry { message, role });
        self.emit(StoreEvent::Infection {
            id,
            updated: self.node,
            infecting,
        });
        AcceptOutcome::Accepted
    }

    /// Main ingestion entry point: store `message` iff no entry exists for
    /// its topic or the incoming timestamp is strictly greater than the
    /// stored one.
    ///
    /// Equal or older timestamps are ignored, which makes duplicate
    /// delivery a no-op. The strict-greater-than rule is the single source
    /// of truth for convergence.
    pub fn accept_if_fresher(&self, message: SpreadMessage, role: Role) -> AcceptOutcome {
        if let Some(existing) = self.entries.get(&message.id.topic) {
            if !message.id.supersedes(&existing.message.id) {
                return AcceptOutcome::Ignored;
            }
        }
        let infecting = if role.is_source() {
            self.node
        } else {
            message.origin
        };
        self.put(message, role, infecting)
    }

    /// Freshest known entry for `topic`, if any.
    pub fn freshest(&self, topic: &Topic) -> Option<StoredEntry> {
        self.entries.get(topic).map(|e| e.value().clone())
    }

    /// Freshest entry for `subject` across all sources, if any.
    pub fn freshest_by_subject(&self, subject: &str) -> Option<StoredEntry> {
        self.entries
            .iter()
            .filter(|e| e.key().subject == subject)
            .max_by_key(|e| e.value().message.id.timestamp)
            .map(|e| e.value().clone())
    }

    /// Whether any version of `topic` is stored.
    pub fn contains(&self, topic: &Topic) -> bool {
        self.entries.contains_key(topic)
    }

    /// Snapshot of every stored entry.
    pub fn entries(&self) -> Vec<StoredEntry> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    /// Number of topics stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn emit(&self, event: StoreEvent) {
        if let Some(events) = &self.events {
            // Notification delivery never gates store state.
            let _ = events.send(event);
        }
    }
}

/// Exact versions a node has decided to stop propagating.
///
/// Keyed by the full [`MessageId`], so a strictly newer version of the same
/// topic is a different key and remains eligible to propagate. Entries are
/// never removed; superseded versions simply become irrelevant.
pub struct RemovedSet {
    node: NodeId,
    removed: DashSet<MessageId>,
    events: Option<UnboundedSender<StoreEvent>>,
}

impl RemovedSet {
    /// Create a removed set with no event channel.
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            removed: DashSet::new(),
            events: None,
        }
    }

    /// Create a removed set that reports insertions on `events`.
    pub fn with_events(node: NodeId, events: UnboundedSender<StoreEvent>) -> Self {
        Self {
            node,
            removed: DashSet::new(),
            events: Some(events),
        }
    }

    /// Stop propagating `id`. Returns `false` if it was already removed.
    pub fn insert(&self, id: MessageId) -> bool {
        if !self.removed.insert(id.clone()) {
            return false;
        }
        trace!(id = %id, "removed set: version retired");
        if let Some(events) = &self.events {
            let _ = events.send(StoreEvent::Remotion {
                id,
                updated: self.node,
            });
        }
        true
    }

    /// Whether this exact version has been removed.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.removed.contains(id)
    }

    /// Number of removed versions.
    pub fn len(&self) -> usize {
        self.removed.len()
    }

    /// Whether nothing has been removed.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    /// Snapshot of every removed version.
    pub fn ids(&self) -> Vec<MessageId> {
        self.removed.iter().map(|id| id.key().clone()).collect()
    }
}
