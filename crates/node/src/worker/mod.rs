//! Exchange worker
//!
//! One worker task per node, ticked at a fixed interval. Each tick advances
//! the exchange machine and the reply machine by one step and executes the
//! actions they return: active-exchange sends, updates-queue ingestion, and
//! request answering. All store and removed-set writes of a node happen
//! here (and only here), so the rest of the system may read both freely.

mod exchange;
mod reply;

pub use exchange::{ExchangeAction, ExchangeInputs, ExchangeState};
pub use reply::{ReplyAction, ReplyInputs, ReplyState};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use spora_store::{MessageStore, RemovedSet, StoredEntry};
use spora_transport::Transport;
use spora_types::{MessageId, NodeId, Role, SpreadMessage, Topic};
use spora_wire::{self as wire, NodeMessage};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time;
use tracing::{debug, trace, warn};

use crate::config::{ProtocolKind, TerminationPolicy};
use crate::context::NodeContext;
use crate::gossip::CoinToss;

/// Receiving halves of the typed queues the dispatcher feeds.
pub(crate) struct WorkerQueues {
    pub requests: UnboundedReceiver<String>,
    pub updates: UnboundedReceiver<String>,
    pub triggers: UnboundedReceiver<()>,
}

pub(crate) struct Worker {
    ctx: Arc<NodeContext>,
    store: Arc<MessageStore>,
    removed: Arc<RemovedSet>,
    transport: Arc<dyn Transport>,
    protocol: ProtocolKind,
    policy: TerminationPolicy,
    coin: CoinToss,
    rng: Pcg64,
    queues: WorkerQueues,
    exchange_state: ExchangeState,
    reply_state: ReplyState,
    tick: Duration,
    stop: Arc<AtomicBool>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ctx: Arc<NodeContext>,
        store: Arc<MessageStore>,
        removed: Arc<RemovedSet>,
        transport: Arc<dyn Transport>,
        protocol: ProtocolKind,
        policy: TerminationPolicy,
        queues: WorkerQueues,
        tick: Duration,
        seed: u64,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let k = policy.k().unwrap_or(0);
        Self {
            ctx,
            store,
            removed,
            transport,
            protocol,
            policy,
            // Distinct streams for neighbor picks and coin tosses so one
            // cannot perturb the other between runs.
            coin: CoinToss::new(k, seed.wrapping_add(1)),
            rng: Pcg64::seed_from_u64(seed),
            queues,
            exchange_state: ExchangeState::Idle,
            reply_state: ReplyState::Idle,
            tick,
            stop,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut ticker = time::interval(self.tick);
        loop {
            ticker.tick().await;
            if self.stop.load(Ordering::Acquire) {
                break;
            }
            self.tick_once().await;
        }
        debug!(node = self.ctx.id(), "worker: stopped");
    }

    /// One worker iteration: step both machines, execute their actions.
    async fn tick_once(&mut self) {
        let trigger = matches!(self.exchange_state, ExchangeState::Idle)
            && self.queues.triggers.try_recv().is_ok();
        let inputs = ExchangeInputs {
            trigger,
            updates_pending: !self.queues.updates.is_empty(),
        };
        let (state, action) = exchange::step(self.protocol, self.exchange_state, inputs);
        self.exchange_state = state;
        match action {
            ExchangeAction::StartExchange => self.run_exchange().await,
            ExchangeAction::DrainUpdates => self.drain_updates(),
            ExchangeAction::None => {}
        }

        let inputs = ReplyInputs {
            requests_pending: !self.queues.requests.is_empty(),
        };
        let (state, action) = reply::step(self.reply_state, inputs);
        self.reply_state = state;
        if action == ReplyAction::DrainRequests {
            self.drain_requests().await;
        }
    }

    /// The active-exchange action: one uniform-random neighbor, then the
    /// protocol variant's sends for this round.
    async fn run_exchange(&mut self) {
        let Some(neighbor) = self.ctx.random_neighbor(&mut self.rng) else {
            debug!(node = self.ctx.id(), "exchange: no neighbors");
            return;
        };
        trace!(node = self.ctx.id(), neighbor, "exchange: round start");

        match self.protocol {
            ProtocolKind::Push => {
                for entry in self.store.entries() {
                    let id = entry.message.id.clone();
                    if self.removed.contains(&id) {
                        continue;
                    }
                    let msg = NodeMessage::Spread(entry.message.forwarded_by(self.ctx.id()));
                    self.send_message(neighbor, &msg).await;
                    self.after_active_send(id);
                }
            }
            ProtocolKind::Pull => {
                for topic in self.ctx.subscriptions().to_vec() {
                    match self.local_entry(&topic) {
                        Some(entry) => {
                            let id = entry.message.id.clone();
                            let msg = NodeMessage::Request {
                                id: id.clone(),
                                origin: self.ctx.id(),
                            };
                            self.send_message(neighbor, &msg).await;
                            self.after_active_send(id);
                        }
                        None => {
                            let msg = NodeMessage::InitialRequest {
                                origin: self.ctx.id(),
                            };
                            self.send_message(neighbor, &msg).await;
                        }
                    }
                }
            }
            ProtocolKind::PushPull => {
                for topic in self.ctx.subscriptions().to_vec() {
                    match self.local_entry(&topic) {
                        Some(entry) => {
                            let id = entry.message.id.clone();
                            let msg = NodeMessage::RequestAndSpread(
                                entry.message.forwarded_by(self.ctx.id()),
                            );
                            self.send_message(neighbor, &msg).await;
                            self.after_active_send(id);
                        }
                        None => {
                            let msg = NodeMessage::InitialRequest {
                                origin: self.ctx.id(),
                            };
                            self.send_message(neighbor, &msg).await;
                        }
                    }
                }
            }
        }
    }

    /// Blind coin: every active send that carried a concrete version is a
    /// removal candidate, immediately.
    fn after_active_send(&mut self, id: MessageId) {
        if matches!(self.policy, TerminationPolicy::BlindCoin { .. }) && self.coin.toss() {
            self.removed.insert(id);
        }
    }

    /// Drain the updates queue, ingesting spreads and feedback.
    fn drain_updates(&mut self) {
        while let Ok(frame) = self.queues.updates.try_recv() {
            match wire::decode(&frame) {
                Ok(NodeMessage::Spread(msg)) => self.ingest_spread(msg),
                Ok(NodeMessage::Feedback { id }) => self.handle_feedback(id),
                Ok(other) => {
                    debug!(kind = ?other.kind(), "worker: unexpected kind on updates queue")
                }
                Err(err) => warn!(%err, "worker: malformed update discarded"),
            }
        }
    }

    fn ingest_spread(&mut self, msg: SpreadMessage) {
        if !self.ctx.subscribed(&msg.id.topic) {
            trace!(node = self.ctx.id(), topic = %msg.id.topic, "update for unsubscribed topic dropped");
            return;
        }
        if self.policy.is_gossip() && self.removed.contains(&msg.id) {
            trace!(node = self.ctx.id(), id = %msg.id, "update for removed version dropped");
            return;
        }
        let id = msg.id.clone();
        if self
            .store
            .accept_if_fresher(msg, Role::Forwarder)
            .is_accepted()
        {
            debug!(node = self.ctx.id(), id = %id, "update accepted");
        } else {
            debug!(node = self.ctx.id(), id = %id, "stale update ignored");
        }
    }

    /// Feedback coin: a peer confirmed it already holds this exact
    /// version, so redundancy is proven and the deferred toss runs.
    fn handle_feedback(&mut self, id: MessageId) {
        if !matches!(self.policy, TerminationPolicy::FeedbackCoin { .. }) {
            trace!(node = self.ctx.id(), id = %id, "feedback ignored under this policy");
            return;
        }
        let held = self
            .store
            .freshest(&id.topic)
            .is_some_and(|entry| entry.message.id == id);
        if held && !self.removed.contains(&id) && self.coin.toss() {
            self.removed.insert(id);
        }
    }

    /// Drain the pending-requests queue and answer each request.
    async fn drain_requests(&mut self) {
        while let Ok(frame) = self.queues.requests.try_recv() {
            match wire::decode(&frame) {
                Ok(NodeMessage::Request { id, origin }) => self.answer_request(id, origin).await,
                Ok(NodeMessage::RequestAndSpread(msg)) => {
                    // The spread half was already routed to the updates
                    // queue; only the request half is answered here.
                    self.answer_request(msg.id, msg.origin).await;
                }
                Ok(NodeMessage::InitialRequest { origin }) => self.answer_initial(origin).await,
                Ok(other) => {
                    debug!(kind = ?other.kind(), "worker: unexpected kind on requests queue")
                }
                Err(err) => warn!(%err, "worker: malformed request discarded"),
            }
        }
    }

    async fn answer_request(&mut self, declared: MessageId, requester: NodeId) {
        match self.local_entry(&declared.topic) {
            Some(entry) => {
                let stored = entry.message.id.clone();
                if stored.timestamp > declared.timestamp {
                    let msg = NodeMessage::Spread(entry.message.forwarded_by(self.ctx.id()));
                    self.send_message(requester, &msg).await;
                } else if stored.timestamp == declared.timestamp {
                    if matches!(self.policy, TerminationPolicy::FeedbackCoin { .. }) {
                        let msg = NodeMessage::Feedback { id: stored.clone() };
                        self.send_message(requester, &msg).await;
                        // The equal-version request is itself confirmation
                        // of redundancy for the answering side.
                        if self.coin.toss() {
                            self.removed.insert(stored);
                        }
                    }
                } else {
                    trace!(node = self.ctx.id(), id = %declared, "requester is ahead, nothing to send");
                }
            }
            None => {
                if matches!(self.policy, TerminationPolicy::BlindCoin { .. }) {
                    let msg = NodeMessage::InitialRequest {
                        origin: self.ctx.id(),
                    };
                    self.send_message(requester, &msg).await;
                }
            }
        }
    }

    async fn answer_initial(&mut self, requester: NodeId) {
        for entry in self.store.entries() {
            if self.removed.contains(&entry.message.id) {
                continue;
            }
            let msg = NodeMessage::Spread(entry.message.forwarded_by(self.ctx.id()));
            self.send_message(requester, &msg).await;
        }
    }

    /// Stored entry for `topic`, with removed versions treated as absent.
    fn local_entry(&self, topic: &Topic) -> Option<StoredEntry> {
        self.store
            .freshest(topic)
            .filter(|entry| !self.removed.contains(&entry.message.id))
    }

    /// Resolve and send, degrading unknown peers and transport failures to
    /// log lines; the next round retries naturally.
    async fn send_message(&self, dest: NodeId, msg: &NodeMessage) {
        let Some(addr) = self.ctx.resolve(dest) else {
            warn!(node = self.ctx.id(), dest, "send skipped: peer not in address table");
            return;
        };
        let frame = wire::encode(msg);
        if let Err(err) = self.transport.send(addr, Bytes::from(frame)).await {
            debug!(node = self.ctx.id(), dest, %err, "send failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use spora_transport::{MemoryNetwork, MemoryTransport};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use tokio::sync::mpsc::{self, UnboundedSender};

    const NODE: NodeId = 1;
    const PEER: NodeId = 2;

    fn addr(node: NodeId) -> SocketAddr {
        format!("127.0.0.1:{}", 9000 + node)
            .parse()
            .expect("valid addr")
    }

    struct Harness {
        worker: Worker,
        peer: MemoryTransport,
        requests: UnboundedSender<String>,
        updates: UnboundedSender<String>,
        triggers: UnboundedSender<()>,
    }

    impl Harness {
        fn new(protocol: ProtocolKind, policy: TerminationPolicy, subscriptions: Vec<Topic>) -> Self {
            let network = MemoryNetwork::new();
            let transport = Arc::new(network.endpoint(addr(NODE)));
            let peer = network.endpoint(addr(PEER));

            let (req_tx, req_rx) = mpsc::unbounded_channel();
            let (upd_tx, upd_rx) = mpsc::unbounded_channel();
            let (trg_tx, trg_rx) = mpsc::unbounded_channel();
            let ctx = Arc::new(NodeContext::new(
                NODE,
                vec![PEER],
                HashMap::from([(NODE, addr(NODE)), (PEER, addr(PEER))]),
                subscriptions,
            ));
            let worker = Worker::new(
                ctx,
                Arc::new(MessageStore::new(NODE)),
                Arc::new(RemovedSet::new(NODE)),
                transport,
                protocol,
                policy,
                WorkerQueues {
                    requests: req_rx,
                    updates: upd_rx,
                    triggers: trg_rx,
                },
                Duration::from_millis(50),
                7,
                Arc::new(AtomicBool::new(false)),
            );
            Self {
                worker,
                peer,
                requests: req_tx,
                updates: upd_tx,
                triggers: trg_tx,
            }
        }

        fn hold(&self, subject: &str, source: NodeId, timestamp: u64, role: Role) -> MessageId {
            let id = MessageId::new(Topic::new(subject, source), timestamp);
            self.worker.store.put(
                SpreadMessage::new(id.clone(), source, "payload"),
                role,
                source,
            );
            id
        }

        async fn peer_frame(&self) -> String {
            let bytes = self.peer.recv().await.expect("peer receives");
            String::from_utf8(bytes.to_vec()).expect("text frame")
        }

        /// Sends happen inline during ticks, so a briefly empty mailbox
        /// means nothing was addressed to the peer.
        async fn peer_silent(&self) -> bool {
            time::timeout(Duration::from_millis(20), self.peer.recv())
                .await
                .is_err()
        }
    }

    fn topic() -> Topic {
        Topic::new("temp", NODE)
    }

    #[tokio::test]
    async fn test_push_round_sends_entries_with_rewritten_origin() {
        let mut h = Harness::new(ProtocolKind::Push, TerminationPolicy::AntiEntropy, vec![]);
        h.hold("temp", NODE, 0, Role::Source);
        h.triggers.send(()).expect("trigger");

        h.worker.tick_once().await;

        assert_eq!(h.peer_frame().await, "node_to_node;spread;temp;0;1;1;payload");
    }

    #[tokio::test]
    async fn test_push_without_trigger_stays_idle() {
        let mut h = Harness::new(ProtocolKind::Push, TerminationPolicy::AntiEntropy, vec![]);
        h.hold("temp", NODE, 0, Role::Source);

        h.worker.tick_once().await;

        assert!(h.peer_silent().await, "no trigger, no round");
        assert_eq!(h.worker.exchange_state, ExchangeState::Idle);
    }

    #[tokio::test]
    async fn test_one_trigger_yields_one_exchange() {
        let mut h = Harness::new(ProtocolKind::Push, TerminationPolicy::AntiEntropy, vec![]);
        h.hold("temp", NODE, 0, Role::Source);
        h.triggers.send(()).expect("trigger");

        h.worker.tick_once().await; // Exchanging: sends
        h.worker.tick_once().await; // back to Idle
        h.worker.tick_once().await; // stays Idle

        let _ = h.peer_frame().await;
        assert!(h.peer_silent().await, "the trigger edge was consumed");
    }

    #[tokio::test]
    async fn test_pull_round_requests_or_asks_for_everything() {
        let held = Topic::new("temp", NODE);
        let missing = Topic::new("humidity", PEER);
        let mut h = Harness::new(
            ProtocolKind::Pull,
            TerminationPolicy::AntiEntropy,
            vec![held, missing],
        );
        h.hold("temp", NODE, 3, Role::Forwarder);
        h.triggers.send(()).expect("trigger");

        h.worker.tick_once().await;

        assert_eq!(h.peer_frame().await, "node_to_node;request;temp;3;1;1");
        assert_eq!(h.peer_frame().await, "node_to_node;initial_request;1");
    }

    #[tokio::test]
    async fn test_pushpull_round_offers_and_requests_in_one_frame() {
        let mut h = Harness::new(
            ProtocolKind::PushPull,
            TerminationPolicy::AntiEntropy,
            vec![topic()],
        );
        h.hold("temp", NODE, 2, Role::Source);
        h.triggers.send(()).expect("trigger");

        h.worker.tick_once().await;

        assert_eq!(
            h.peer_frame().await,
            "node_to_node;request_and_spread;temp;2;1;1;payload"
        );
    }

    #[tokio::test]
    async fn test_updates_accepted_then_duplicates_ignored() {
        let mut h = Harness::new(ProtocolKind::Pull, TerminationPolicy::AntiEntropy, vec![topic()]);
        h.updates
            .send("node_to_node;spread;temp;5;1;2;v5".into())
            .expect("queue");

        h.worker.tick_once().await;

        let entry = h.worker.store.freshest(&topic()).expect("stored");
        assert_eq!(entry.message.id.timestamp, 5);
        assert_eq!(entry.role, Role::Forwarder);

        h.updates
            .send("node_to_node;spread;temp;3;1;2;v3".into())
            .expect("queue");
        h.worker.tick_once().await;
        h.worker.tick_once().await;

        let entry = h.worker.store.freshest(&topic()).expect("stored");
        assert_eq!(entry.message.id.timestamp, 5, "stale update left store unchanged");
    }

    #[tokio::test]
    async fn test_unsubscribed_updates_are_not_stored() {
        let mut h = Harness::new(ProtocolKind::Pull, TerminationPolicy::AntiEntropy, vec![]);
        h.updates
            .send("node_to_node;spread;temp;5;1;2;v5".into())
            .expect("queue");

        h.worker.tick_once().await;

        assert!(h.worker.store.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_update_skipped_rest_processed() {
        let mut h = Harness::new(ProtocolKind::Pull, TerminationPolicy::AntiEntropy, vec![topic()]);
        h.updates.send("node_to_node;spread;temp;NaN;1;2;x".into()).expect("queue");
        h.updates.send("node_to_node;spread;temp;1;1;2;ok".into()).expect("queue");

        h.worker.tick_once().await;

        let entry = h.worker.store.freshest(&topic()).expect("good frame stored");
        assert_eq!(entry.message.payload, "ok");
    }

    #[tokio::test]
    async fn test_reply_sends_spread_only_when_strictly_newer() {
        let mut h = Harness::new(ProtocolKind::Pull, TerminationPolicy::AntiEntropy, vec![]);
        h.hold("temp", NODE, 5, Role::Source);

        h.requests.send("node_to_node;request;temp;3;1;2".into()).expect("queue");
        h.worker.tick_once().await;
        assert_eq!(h.peer_frame().await, "node_to_node;spread;temp;5;1;1;payload");

        h.requests.send("node_to_node;request;temp;5;1;2".into()).expect("queue");
        h.worker.tick_once().await;
        h.worker.tick_once().await;
        assert!(h.peer_silent().await, "equal version draws no anti-entropy reply");

        h.requests.send("node_to_node;request;temp;9;1;2".into()).expect("queue");
        h.worker.tick_once().await;
        h.worker.tick_once().await;
        assert!(h.peer_silent().await, "a requester that is ahead draws nothing");
    }

    #[tokio::test]
    async fn test_initial_request_reply_returns_all_non_removed_entries() {
        let mut h = Harness::new(ProtocolKind::Pull, TerminationPolicy::BlindCoin { k: 0 }, vec![]);
        h.hold("temp", NODE, 1, Role::Source);
        let retired = h.hold("humidity", NODE, 4, Role::Source);
        h.worker.removed.insert(retired);

        h.requests.send("node_to_node;initial_request;2".into()).expect("queue");
        h.worker.tick_once().await;

        assert_eq!(h.peer_frame().await, "node_to_node;spread;temp;1;1;1;payload");
        assert!(h.peer_silent().await, "removed entries are withheld");
    }

    #[tokio::test]
    async fn test_blind_coin_k1_removes_after_active_send() {
        let mut h = Harness::new(ProtocolKind::Push, TerminationPolicy::BlindCoin { k: 1 }, vec![]);
        let id = h.hold("temp", NODE, 0, Role::Source);
        h.triggers.send(()).expect("trigger");

        h.worker.tick_once().await;
        assert_eq!(h.peer_frame().await, "node_to_node;spread;temp;0;1;1;payload");
        assert!(h.worker.removed.contains(&id), "k=1 removal is deterministic");

        h.worker.tick_once().await; // Exchanging -> Idle
        h.triggers.send(()).expect("trigger");
        h.worker.tick_once().await;
        h.worker.tick_once().await;
        assert!(h.peer_silent().await, "the removed version is never pushed again");
    }

    #[tokio::test]
    async fn test_blind_coin_k0_behaves_like_anti_entropy() {
        let mut h = Harness::new(ProtocolKind::Push, TerminationPolicy::BlindCoin { k: 0 }, vec![]);
        h.hold("temp", NODE, 0, Role::Source);
        h.triggers.send(()).expect("trigger");

        h.worker.tick_once().await;

        let _ = h.peer_frame().await;
        assert!(h.worker.removed.is_empty(), "probability zero never removes");
    }

    #[tokio::test]
    async fn test_blind_reply_for_removed_version_falls_back_to_initial_request() {
        let mut h = Harness::new(ProtocolKind::Pull, TerminationPolicy::BlindCoin { k: 0 }, vec![]);
        let id = h.hold("temp", NODE, 4, Role::Source);
        h.worker.removed.insert(id);

        h.requests.send("node_to_node;request;temp;4;1;2".into()).expect("queue");
        h.worker.tick_once().await;

        assert_eq!(
            h.peer_frame().await,
            "node_to_node;initial_request;1",
            "a removed holding answers as if it held nothing"
        );
    }

    #[tokio::test]
    async fn test_anti_entropy_reply_for_missing_topic_is_silence() {
        let mut h = Harness::new(ProtocolKind::Pull, TerminationPolicy::AntiEntropy, vec![]);

        h.requests.send("node_to_node;request;temp;4;1;2".into()).expect("queue");
        h.worker.tick_once().await;
        h.worker.tick_once().await;

        assert!(h.peer_silent().await);
    }

    #[tokio::test]
    async fn test_feedback_reply_on_equal_version_and_own_toss() {
        let mut h = Harness::new(
            ProtocolKind::Pull,
            TerminationPolicy::FeedbackCoin { k: 1 },
            vec![],
        );
        let id = h.hold("temp", NODE, 4, Role::Source);

        h.requests.send("node_to_node;request;temp;4;1;2".into()).expect("queue");
        h.worker.tick_once().await;

        assert_eq!(h.peer_frame().await, "node_to_node;feedback;temp;4;1");
        assert!(
            h.worker.removed.contains(&id),
            "the equal request confirmed redundancy; k=1 retires the version"
        );
    }

    #[tokio::test]
    async fn test_feedback_frame_triggers_deferred_toss_on_holder() {
        let mut h = Harness::new(
            ProtocolKind::PushPull,
            TerminationPolicy::FeedbackCoin { k: 1 },
            vec![topic()],
        );
        let id = h.hold("temp", NODE, 4, Role::Source);

        h.updates.send("node_to_node;feedback;temp;4;1".into()).expect("queue");
        h.worker.tick_once().await;

        assert!(h.worker.removed.contains(&id));
    }

    #[tokio::test]
    async fn test_feedback_for_superseded_version_is_ignored() {
        let mut h = Harness::new(
            ProtocolKind::PushPull,
            TerminationPolicy::FeedbackCoin { k: 1 },
            vec![topic()],
        );
        h.hold("temp", NODE, 9, Role::Source);

        h.updates.send("node_to_node;feedback;temp;4;1".into()).expect("queue");
        h.worker.tick_once().await;

        assert!(
            h.worker.removed.is_empty(),
            "feedback names a version no longer held"
        );
    }

    #[tokio::test]
    async fn test_removed_version_is_not_reingested_but_newer_is() {
        let mut h = Harness::new(ProtocolKind::Pull, TerminationPolicy::BlindCoin { k: 0 }, vec![topic()]);
        h.worker
            .removed
            .insert(MessageId::new(topic(), 0));

        h.updates.send("node_to_node;spread;temp;0;1;2;v0".into()).expect("queue");
        h.worker.tick_once().await;
        assert!(h.worker.store.is_empty(), "the retired version stays out");

        h.updates.send("node_to_node;spread;temp;1;1;2;v1".into()).expect("queue");
        h.worker.tick_once().await;
        h.worker.tick_once().await;
        let entry = h.worker.store.freshest(&topic()).expect("newer version flows");
        assert_eq!(entry.message.id.timestamp, 1);
    }

    #[tokio::test]
    async fn test_exchange_skips_removed_and_issues_initial_request() {
        let mut h = Harness::new(ProtocolKind::Pull, TerminationPolicy::BlindCoin { k: 0 }, vec![topic()]);
        let id = h.hold("temp", NODE, 0, Role::Source);
        h.worker.removed.insert(id);
        h.triggers.send(()).expect("trigger");

        h.worker.tick_once().await;

        assert_eq!(
            h.peer_frame().await,
            "node_to_node;initial_request;1",
            "a removed holding is requested from scratch"
        );
    }
}
