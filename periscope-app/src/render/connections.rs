//! Incoming/outgoing connection summaries for a node.
//!
//! Endpoint resolution needs the full node set because peers may live in a
//! different topology than the queried node. Edges whose peer cannot be
//! resolved are dropped, not errors.

use std::collections::BTreeMap;

use serde::Serialize;

use periscope_report::{Node, Nodes};

use super::summary::Column;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn id(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming-connections",
            Direction::Outgoing => "outgoing-connections",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Incoming => "Inbound",
            Direction::Outgoing => "Outbound",
        }
    }
}

/// One aggregated connection peer row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub node_id: String,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionsSummary {
    pub id: String,
    pub label: String,
    pub topology_id: String,
    pub columns: Vec<Column>,
    pub connections: Vec<Connection>,
}

impl ConnectionsSummary {
    /// Summarize one direction of a node's edges against the full node
    /// set, aggregating repeated edges to the same peer.
    pub fn from_adjacency(
        direction: Direction,
        topology_id: &str,
        node: &Node,
        nodes: &Nodes,
    ) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        match direction {
            Direction::Outgoing => {
                for peer_id in &node.adjacency {
                    if let Some(peer) = nodes.get(peer_id) {
                        *counts.entry(peer.id.as_str()).or_default() += 1;
                    }
                }
            }
            Direction::Incoming => {
                for peer in nodes.values() {
                    if peer.id != node.id && peer.adjacency.iter().any(|id| *id == node.id) {
                        *counts.entry(peer.id.as_str()).or_default() += 1;
                    }
                }
            }
        }

        let connections = counts
            .into_iter()
            .map(|(peer_id, count)| Connection {
                id: format!("{}-{peer_id}", direction.id()),
                node_id: peer_id.to_string(),
                label: peer_id.to_string(),
                count,
            })
            .collect();

        Self {
            id: direction.id().to_string(),
            label: direction.label().to_string(),
            topology_id: topology_id.to_string(),
            columns: vec![
                Column::new("label", "Peer"),
                Column::new("count", "Count").datatype("number"),
            ],
            connections,
        }
    }
}
