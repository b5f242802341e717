//! Mergeable topology snapshot model.
//!
//! A probe produces a [`Report`] per publish cycle; the collector merges
//! reports from many probes into one queryable snapshot. Reports are never
//! mutated after publication - the app only merges newer ones on top.
//!
//! All collections are `BTreeMap`/sorted vectors so encoding and traversal
//! order are deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

/// Well-known topology IDs. A report may carry others; these are the ones
/// the renderer has presentation rules for.
pub mod topologies {
    pub const HOST: &str = "host";
    pub const SERVICE: &str = "service";
    pub const PROCESS: &str = "process";
    pub const CONTAINER: &str = "container";
    pub const CONTAINER_IMAGE: &str = "container_image";
    pub const POD: &str = "pod";
    pub const REPLICA_SET: &str = "replica_set";
    pub const ECS_TASK: &str = "ecs_task";
}

/// Well-known latest-attribute keys.
pub mod attrs {
    /// ID of the probe that can execute controls on a node.
    pub const CONTROL_PROBE_ID: &str = "control_probe_id";
    /// Human-readable display name, when a reporter supplies one.
    pub const NAME: &str = "name";
    pub const HOST_NAME: &str = "host_name";
    pub const OS: &str = "os";
    pub const UPTIME_SECONDS: &str = "uptime_seconds";
    pub const KUBERNETES_STATE: &str = "kubernetes_state";
    pub const KUBERNETES_IP: &str = "kubernetes_ip";
    pub const KUBERNETES_OBSERVED_GENERATION: &str = "kubernetes_observed_generation";
    pub const ECS_CREATED_AT: &str = "ecs_created_at";
    pub const DOCKER_CPU_TOTAL_USAGE: &str = "docker_cpu_total_usage";
    pub const DOCKER_MEMORY_USAGE: &str = "docker_memory_usage";
    pub const PROCESS_PID: &str = "pid";
    pub const PROCESS_CPU_USAGE: &str = "process_cpu_usage";
    pub const PROCESS_MEMORY_USAGE: &str = "process_memory_usage";
    pub const COUNT_PODS: &str = "count_pods";
    pub const COUNT_CONTAINERS: &str = "count_containers";
}

/// Flat node set keyed by node ID, used to resolve connection endpoints
/// that live outside the queried topology.
pub type Nodes = BTreeMap<String, Node>;

/// A full snapshot of observed topology at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub topologies: BTreeMap<String, Topology>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topologies: BTreeMap::new(),
        }
    }

    pub fn topology(&self, id: &str) -> Option<&Topology> {
        self.topologies.get(id)
    }

    pub fn topology_mut(&mut self, id: &str) -> &mut Topology {
        self.topologies.entry(id.to_string()).or_default()
    }

    /// Merge another report into this one. Nodes and controls present in
    /// both are merged with latest-write-wins semantics; everything else is
    /// a union. The merged-in report's ID is discarded.
    pub fn merge(&mut self, other: Report) {
        for (id, topology) in other.topologies {
            match self.topologies.get_mut(&id) {
                Some(existing) => existing.merge(topology),
                None => {
                    self.topologies.insert(id, topology);
                }
            }
        }
    }

    /// All nodes across all topologies, keyed by node ID.
    pub fn all_nodes(&self) -> Nodes {
        let mut nodes = Nodes::new();
        for topology in self.topologies.values() {
            for node in topology.nodes.values() {
                nodes.insert(node.id.clone(), node.clone());
            }
        }
        nodes
    }
}

/// A named category of nodes plus its control registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub label: String,
    pub label_plural: String,
    pub nodes: BTreeMap<String, Node>,
    pub controls: BTreeMap<String, Control>,
}

impl Topology {
    pub fn new(label: &str, label_plural: &str) -> Self {
        Self {
            label: label.to_string(),
            label_plural: label_plural.to_string(),
            nodes: BTreeMap::new(),
            controls: BTreeMap::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) {
        match self.nodes.get_mut(&node.id) {
            Some(existing) => existing.merge(node),
            None => {
                self.nodes.insert(node.id.clone(), node);
            }
        }
    }

    pub fn add_control(&mut self, control: Control) {
        self.controls.insert(control.id.clone(), control);
    }

    fn merge(&mut self, other: Topology) {
        if self.label.is_empty() {
            self.label = other.label;
        }
        if self.label_plural.is_empty() {
            self.label_plural = other.label_plural;
        }
        for (_, node) in other.nodes {
            self.add_node(node);
        }
        for (id, control) in other.controls {
            self.controls.insert(id, control);
        }
    }
}

/// One observed entity: a process, container, pod and so on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    /// Topology the node belongs to.
    pub topology: String,
    /// Latest-write-wins scalar attributes, keyed by attribute name.
    pub latest: BTreeMap<String, LatestEntry>,
    /// Control activations observed on this node.
    pub latest_controls: BTreeMap<String, ControlActivation>,
    /// Child nodes, possibly from other topologies.
    pub children: Vec<Node>,
    /// IDs of nodes this node has outgoing edges to.
    pub adjacency: Vec<String>,
}

impl Node {
    pub fn new(id: &str, topology: &str) -> Self {
        Self {
            id: id.to_string(),
            topology: topology.to_string(),
            ..Default::default()
        }
    }

    pub fn with_latest(mut self, key: &str, timestamp: OffsetDateTime, value: &str) -> Self {
        self.latest.insert(
            key.to_string(),
            LatestEntry { timestamp, value: value.to_string() },
        );
        self
    }

    pub fn with_control_activation(
        mut self,
        control_id: &str,
        timestamp: OffsetDateTime,
        dead: bool,
    ) -> Self {
        self.latest_controls
            .insert(control_id.to_string(), ControlActivation { timestamp, dead });
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self.children.sort_by(|a, b| {
            (a.topology.as_str(), a.id.as_str()).cmp(&(b.topology.as_str(), b.id.as_str()))
        });
        self
    }

    pub fn with_adjacency(mut self, id: &str) -> Self {
        self.adjacency.push(id.to_string());
        self.adjacency.sort();
        self.adjacency.dedup();
        self
    }

    pub fn latest_value(&self, key: &str) -> Option<&str> {
        self.latest.get(key).map(|e| e.value.as_str())
    }

    fn merge(&mut self, other: Node) {
        for (key, entry) in other.latest {
            match self.latest.get(&key) {
                Some(existing) if existing.timestamp >= entry.timestamp => {}
                _ => {
                    self.latest.insert(key, entry);
                }
            }
        }
        for (id, activation) in other.latest_controls {
            match self.latest_controls.get(&id) {
                Some(existing) if existing.timestamp >= activation.timestamp => {}
                _ => {
                    self.latest_controls.insert(id, activation);
                }
            }
        }
        for child in other.children {
            match self
                .children
                .iter_mut()
                .find(|c| c.id == child.id && c.topology == child.topology)
            {
                Some(existing) => existing.merge(child),
                None => self.children.push(child),
            }
        }
        self.children.sort_by(|a, b| {
            (a.topology.as_str(), a.id.as_str()).cmp(&(b.topology.as_str(), b.id.as_str()))
        });
        self.adjacency.extend(other.adjacency);
        self.adjacency.sort();
        self.adjacency.dedup();
    }
}

/// A timestamped scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestEntry {
    pub timestamp: OffsetDateTime,
    pub value: String,
}

/// A control activation record on a node. `dead` activations are kept for
/// merge stability but never rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlActivation {
    pub timestamp: OffsetDateTime,
    pub dead: bool,
}

/// An invocable remote action registered at the topology level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub id: String,
    pub human: String,
    pub icon: String,
    pub rank: i32,
}
