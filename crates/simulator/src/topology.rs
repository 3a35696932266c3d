//! Network topology configuration
//!
//! Builds the static neighbor lists handed to nodes at construction. The
//! topology never changes for the lifetime of a run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use spora_types::NodeId;

/// Shape of the neighbor graph for a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Topology {
    /// Fully connected mesh (every node connects to every other)
    Mesh,
    /// Star topology (central hub with spokes)
    Star {
        /// Central node ID that acts as the hub
        center: NodeId,
    },
    /// Ring topology (circular connections)
    Ring,
    /// Line topology (a ring with one link removed)
    Line,
    /// Custom topology with explicit bidirectional connections
    Custom {
        /// List of explicit connections between nodes
        links: Vec<(NodeId, NodeId)>,
    },
}

impl Topology {
    /// Neighbor list per node over the given node ids.
    ///
    /// Links are always bidirectional; self-links and links naming unknown
    /// ids are ignored.
    pub fn neighbors(&self, ids: &[NodeId]) -> HashMap<NodeId, Vec<NodeId>> {
        let mut map: HashMap<NodeId, Vec<NodeId>> =
            ids.iter().map(|id| (*id, Vec::new())).collect();
        let mut connect = |map: &mut HashMap<NodeId, Vec<NodeId>>, a: NodeId, b: NodeId| {
            if a == b || !map.contains_key(&a) || !map.contains_key(&b) {
                return;
            }
            let peers = map.entry(a).or_default();
            if !peers.contains(&b) {
                peers.push(b);
            }
            let peers = map.entry(b).or_default();
            if !peers.contains(&a) {
                peers.push(a);
            }
        };

        match self {
            Topology::Mesh => {
                for (i, a) in ids.iter().enumerate() {
                    for b in &ids[i + 1..] {
                        connect(&mut map, *a, *b);
                    }
                }
            }
            Topology::Star { center } => {
                for id in ids {
                    connect(&mut map, *center, *id);
                }
            }
            Topology::Ring => {
                for window in ids.windows(2) {
                    connect(&mut map, window[0], window[1]);
                }
                if ids.len() > 2 {
                    if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
                        connect(&mut map, *first, *last);
                    }
                }
            }
            Topology::Line => {
                for window in ids.windows(2) {
                    connect(&mut map, window[0], window[1]);
                }
            }
            Topology::Custom { links } => {
                for (a, b) in links {
                    connect(&mut map, *a, *b);
                }
            }
        }
        map
    }
}
