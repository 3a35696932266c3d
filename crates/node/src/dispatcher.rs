//! Dispatcher task
//!
//! Classifies each raw inbound frame by its direction and kind fields
//! alone and appends it, unmodified, to exactly one typed queue. The one
//! exception is `request_and_spread`: the whole frame goes to the
//! pending-requests queue *and* its embedded spread half is synthesized
//! onto the updates queue, so a single wire message serves both the
//! "answer me" and "update your store" roles. Unrecognized frames are
//! dropped and logged, never propagated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spora_wire::{classify, spread_half, FrameClass, MessageKind};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Sending halves of the worker's typed queues.
pub(crate) struct TypedQueues {
    pub requests: UnboundedSender<String>,
    pub updates: UnboundedSender<String>,
    pub triggers: UnboundedSender<()>,
}

/// Route one raw frame to its queue. Returns `false` only when a needed
/// queue receiver is gone, i.e. the node is shutting down.
pub(crate) fn route(frame: String, queues: &TypedQueues) -> bool {
    match classify(&frame) {
        Ok(FrameClass::StartRound) => queues.triggers.send(()).is_ok(),
        Ok(FrameClass::Node(kind)) => match kind {
            MessageKind::Request | MessageKind::InitialRequest => {
                queues.requests.send(frame).is_ok()
            }
            MessageKind::Spread | MessageKind::Feedback => queues.updates.send(frame).is_ok(),
            MessageKind::RequestAndSpread => {
                match spread_half(&frame) {
                    Ok(half) => {
                        if queues.updates.send(half).is_err() {
                            return false;
                        }
                    }
                    Err(err) => warn!(%err, "dispatcher: request_and_spread half rejected"),
                }
                queues.requests.send(frame).is_ok()
            }
        },
        Err(err) => {
            debug!(%err, frame = %frame, "dispatcher: dropping unrecognized frame");
            true
        }
    }
}

pub(crate) async fn run(
    mut raw_rx: UnboundedReceiver<String>,
    queues: TypedQueues,
    stop: Arc<AtomicBool>,
) {
    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        match raw_rx.recv().await {
            Some(frame) => {
                if !route(frame, &queues) {
                    break;
                }
            }
            None => break,
        }
    }
    debug!("dispatcher: stopped");
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use spora_wire::START_ROUND_FRAME;
    use tokio::sync::mpsc;

    struct Harness {
        queues: TypedQueues,
        requests: UnboundedReceiver<String>,
        updates: UnboundedReceiver<String>,
        triggers: UnboundedReceiver<()>,
    }

    fn harness() -> Harness {
        let (req_tx, requests) = mpsc::unbounded_channel();
        let (upd_tx, updates) = mpsc::unbounded_channel();
        let (trg_tx, triggers) = mpsc::unbounded_channel();
        Harness {
            queues: TypedQueues {
                requests: req_tx,
                updates: upd_tx,
                triggers: trg_tx,
            },
            requests,
            updates,
            triggers,
        }
    }

    #[test]
    fn test_requests_route_to_request_queue() {
        let mut h = harness();
        assert!(route("node_to_node;request;temp;4;1;7".into(), &h.queues));
        assert!(route("node_to_node;initial_request;7".into(), &h.queues));

        assert_eq!(h.requests.try_recv().expect("request"), "node_to_node;request;temp;4;1;7");
        assert_eq!(h.requests.try_recv().expect("initial"), "node_to_node;initial_request;7");
        assert!(h.updates.try_recv().is_err());
    }

    #[test]
    fn test_spread_and_feedback_route_to_updates_queue() {
        let mut h = harness();
        assert!(route("node_to_node;spread;temp;4;1;7;21.5".into(), &h.queues));
        assert!(route("node_to_node;feedback;temp;4;1".into(), &h.queues));

        assert_eq!(h.updates.try_recv().expect("spread"), "node_to_node;spread;temp;4;1;7;21.5");
        assert_eq!(h.updates.try_recv().expect("feedback"), "node_to_node;feedback;temp;4;1");
        assert!(h.requests.try_recv().is_err());
    }

    #[test]
    fn test_request_and_spread_lands_in_both_queues() {
        let mut h = harness();
        let frame = "node_to_node;request_and_spread;temp;4;1;7;21.5";
        assert!(route(frame.into(), &h.queues));

        assert_eq!(h.requests.try_recv().expect("whole frame"), frame);
        assert_eq!(
            h.updates.try_recv().expect("synthesized half"),
            "node_to_node;spread;temp;4;1;7;21.5"
        );
    }

    #[test]
    fn test_start_round_bypasses_protocol_queues() {
        let mut h = harness();
        assert!(route(START_ROUND_FRAME.into(), &h.queues));

        h.triggers.try_recv().expect("trigger queued");
        assert!(h.requests.try_recv().is_err());
        assert!(h.updates.try_recv().is_err());
    }

    #[test]
    fn test_unrecognized_frames_are_dropped_silently() {
        let mut h = harness();
        assert!(route("garbage".into(), &h.queues));
        assert!(route("node_to_node;mystery;x".into(), &h.queues));

        assert!(h.requests.try_recv().is_err());
        assert!(h.updates.try_recv().is_err());
        assert!(h.triggers.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatcher_task_preserves_sender_order() {
        let h = harness();
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let mut updates = h.updates;
        tokio::spawn(run(raw_rx, h.queues, stop));

        raw_tx.send("node_to_node;spread;temp;1;1;7;a".into()).expect("send");
        raw_tx.send("node_to_node;spread;temp;2;1;7;b".into()).expect("send");

        assert!(updates.recv().await.expect("first").ends_with(";a"));
        assert!(updates.recv().await.expect("second").ends_with(";b"));
    }
}
