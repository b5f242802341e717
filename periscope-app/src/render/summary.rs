//! UI-facing node projections and the summarization seam.
//!
//! Summaries are built fresh on every render and never cached; the
//! full-product summarizer (topology-aware labels, metric math) plugs in
//! behind [`NodeSummarizer`].

use std::collections::BTreeMap;

use serde::Serialize;

use periscope_report::report::attrs;
use periscope_report::{Node, Nodes, Report};

use super::connections::{ConnectionsSummary, Direction};

/// Display summary of one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub id: String,
    pub label: String,
    /// Latest attribute values; group columns read from here.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Numeric gauges for the node's own detail panel.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

impl NodeSummary {
    /// Bare summary used when summarization of the target node fails;
    /// the rest of the detail view is still rendered.
    pub fn minimal(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            ..Default::default()
        }
    }

    /// Reduced form for group rows: the gauge map duplicates metadata
    /// values, so child rows drop it to keep group payloads small.
    pub fn summarize_metrics(mut self) -> Self {
        self.metrics.clear();
        self
    }
}

/// Extra display column attached to a summary group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub default_sort: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Column {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            ..Default::default()
        }
    }

    pub fn datatype(mut self, datatype: &str) -> Self {
        self.datatype = Some(datatype.to_string());
        self
    }

    pub fn default_sort(mut self) -> Self {
        self.default_sort = true;
        self
    }
}

/// One ordered group of summarized children.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummaryGroup {
    pub label: String,
    pub topology_id: String,
    pub columns: Vec<Column>,
    pub nodes: Vec<NodeSummary>,
}

/// Summarization collaborator. Rendering treats both methods as pure
/// lookups: `None` means "omit", never "abort". A `None` from
/// `connections` for either direction omits the connections section
/// entirely.
pub trait NodeSummarizer {
    fn summarize(&self, report: &Report, node: &Node) -> Option<NodeSummary>;

    fn connections(
        &self,
        direction: Direction,
        topology_id: &str,
        report: &Report,
        node: &Node,
        nodes: &Nodes,
    ) -> Option<ConnectionsSummary>;
}

/// Attribute-driven summarizer: label from the name attribute, metadata
/// from the latest map, gauges from whatever parses as a number.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicSummarizer;

impl NodeSummarizer for BasicSummarizer {
    fn summarize(&self, _report: &Report, node: &Node) -> Option<NodeSummary> {
        if node.id.is_empty() {
            return None;
        }
        let mut metadata = BTreeMap::new();
        let mut metrics = BTreeMap::new();
        for (key, entry) in &node.latest {
            metadata.insert(key.clone(), entry.value.clone());
            if let Ok(value) = entry.value.parse::<f64>() {
                metrics.insert(key.clone(), value);
            }
        }
        let label = node
            .latest_value(attrs::NAME)
            .or_else(|| node.latest_value(attrs::HOST_NAME))
            .unwrap_or(&node.id)
            .to_string();
        Some(NodeSummary {
            id: node.id.clone(),
            label,
            metadata,
            metrics,
        })
    }

    fn connections(
        &self,
        direction: Direction,
        topology_id: &str,
        _report: &Report,
        node: &Node,
        nodes: &Nodes,
    ) -> Option<ConnectionsSummary> {
        Some(ConnectionsSummary::from_adjacency(
            direction,
            topology_id,
            node,
            nodes,
        ))
    }
}
