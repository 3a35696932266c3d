//! Listener task
//!
//! Drains the transport, one blocking receive per iteration, into the raw
//! inbound queue. Transport hiccups are transient by contract and only
//! logged; the task exits when the stop flag is raised or the transport
//! closes for good.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spora_transport::Transport;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

pub(crate) async fn run(
    transport: Arc<dyn Transport>,
    raw_tx: UnboundedSender<String>,
    stop: Arc<AtomicBool>,
) {
    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        match transport.recv().await {
            Ok(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(frame) => {
                    if raw_tx.send(frame).is_err() {
                        break;
                    }
                }
                Err(_) => warn!("listener: non-text frame discarded"),
            },
            Err(err) if err.is_closed() => break,
            Err(err) => debug!(%err, "listener: receive failed"),
        }
    }
    debug!("listener: stopped");
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use spora_transport::MemoryNetwork;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().expect("valid addr")
    }

    #[tokio::test]
    async fn test_frames_reach_raw_queue_in_order() {
        let network = MemoryNetwork::new();
        let node = Arc::new(network.endpoint(addr(1)));
        let peer = network.endpoint(addr(2));
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        tokio::spawn(run(node, raw_tx, stop));

        peer.send(addr(1), Bytes::from_static(b"one")).await.expect("send");
        peer.send(addr(1), Bytes::from_static(b"two")).await.expect("send");

        assert_eq!(raw_rx.recv().await.expect("frame"), "one");
        assert_eq!(raw_rx.recv().await.expect("frame"), "two");
    }

    #[tokio::test]
    async fn test_non_utf8_frame_is_dropped_not_fatal() {
        let network = MemoryNetwork::new();
        let node = Arc::new(network.endpoint(addr(1)));
        let peer = network.endpoint(addr(2));
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        tokio::spawn(run(node, raw_tx, stop));

        peer.send(addr(1), Bytes::from_static(&[0xff, 0xfe])).await.expect("send");
        peer.send(addr(1), Bytes::from_static(b"after")).await.expect("send");

        assert_eq!(raw_rx.recv().await.expect("frame"), "after");
    }

    #[tokio::test]
    async fn test_transport_close_stops_listener() {
        let network = MemoryNetwork::new();
        let endpoint = Arc::new(network.endpoint(addr(1)));
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run(Arc::clone(&endpoint) as Arc<dyn Transport>, raw_tx, stop));

        endpoint.close().await;
        task.await.expect("listener exits");
        assert!(raw_rx.recv().await.is_none(), "raw queue sender dropped");
    }
}
