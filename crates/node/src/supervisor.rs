//! Supervisor notification hooks
//!
//! Store mutations surface to the external supervisor through the
//! [`SupervisorHook`] trait. Delivery is asynchronous and best-effort: a
//! forwarder task drains the node's store event channel and calls the
//! hook, and nothing the hook does can block or fail the node's own
//! dissemination state.

use std::sync::Arc;

use spora_store::StoreEvent;
use spora_types::{MessageId, NodeId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// Consumer of a node's infection and remotion notifications.
pub trait SupervisorHook: Send + Sync {
    /// A node stored a fresher version of a topic.
    fn infection_update(&self, id: &MessageId, updated: NodeId, infecting: NodeId);

    /// A node inserted a version into its removed set.
    fn remotion_update(&self, id: &MessageId, updated: NodeId);
}

/// Hook that discards every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSupervisor;

impl SupervisorHook for NoopSupervisor {
    fn infection_update(&self, _id: &MessageId, _updated: NodeId, _infecting: NodeId) {}

    fn remotion_update(&self, _id: &MessageId, _updated: NodeId) {}
}

/// Hook that forwards every notification onto an unbounded channel, for
/// aggregation by a supervisor or a test harness.
pub struct ChannelSupervisor {
    tx: UnboundedSender<StoreEvent>,
}

impl ChannelSupervisor {
    /// Create the hook and the receiving half of its channel.
    pub fn channel() -> (Arc<Self>, UnboundedReceiver<StoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl SupervisorHook for ChannelSupervisor {
    fn infection_update(&self, id: &MessageId, updated: NodeId, infecting: NodeId) {
        let _ = self.tx.send(StoreEvent::Infection {
            id: id.clone(),
            updated,
            infecting,
        });
    }

    fn remotion_update(&self, id: &MessageId, updated: NodeId) {
        let _ = self.tx.send(StoreEvent::Remotion {
            id: id.clone(),
            updated,
        });
    }
}

/// Drain store events into the hook until every sender is gone.
pub(crate) async fn run_notifier(
    mut events: UnboundedReceiver<StoreEvent>,
    hook: Arc<dyn SupervisorHook>,
) {
    while let Some(event) = events.recv().await {
        trace!(?event, "supervisor notification");
        match event {
            StoreEvent::Infection {
                id,
                updated,
                infecting,
            } => hook.infection_update(&id, updated, infecting),
            StoreEvent::Remotion { id, updated } => hook.remotion_update(&id, updated),
        }
    }
}
