//! Node detail rendering.
//!
//! `make_node` is a pure function of (report, node set, node): it never
//! blocks, never mutates its inputs, and is safe to call concurrently for
//! different nodes against the same merged report. Lookup misses (unknown
//! control, missing probe ID, unmapped topology, failed child summary)
//! reduce the output, they never abort it.

pub mod connections;
pub mod summary;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use periscope_report::report::{attrs, topologies};
use periscope_report::{Control, Node, Nodes, Report, Topology};

use connections::{ConnectionsSummary, Direction};
use summary::{Column, NodeSummarizer, NodeSummary, NodeSummaryGroup};

/// Deep detail view of one node, shipped to a querying client and then
/// discarded - nothing here is retained server side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailNode {
    #[serde(flatten)]
    pub summary: NodeSummary,
    pub controls: Vec<ControlInstance>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSummaryGroup>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<ConnectionsSummary>,
}

/// A control bound to the specific probe and node able to execute it.
/// Built fresh per render; the wire shape is the flat
/// `{probeId, nodeId, id, human, icon, rank}` DTO below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireControlInstance", into = "WireControlInstance")]
pub struct ControlInstance {
    pub probe_id: String,
    pub node_id: String,
    pub control: Control,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireControlInstance {
    probe_id: String,
    node_id: String,
    id: String,
    human: String,
    icon: String,
    rank: i32,
}

impl From<ControlInstance> for WireControlInstance {
    fn from(instance: ControlInstance) -> Self {
        Self {
            probe_id: instance.probe_id,
            node_id: instance.node_id,
            id: instance.control.id,
            human: instance.control.human,
            icon: instance.control.icon,
            rank: instance.control.rank,
        }
    }
}

impl From<WireControlInstance> for ControlInstance {
    fn from(wire: WireControlInstance) -> Self {
        Self {
            probe_id: wire.probe_id,
            node_id: wire.node_id,
            control: Control {
                id: wire.id,
                human: wire.human,
                icon: wire.icon,
                rank: wire.rank,
            },
        }
    }
}

/// Render the full detail view for one node.
pub fn make_node(
    topology_id: &str,
    report: &Report,
    nodes: &Nodes,
    node: &Node,
    summarizer: &dyn NodeSummarizer,
) -> DetailNode {
    let summary = summarizer
        .summarize(report, node)
        .unwrap_or_else(|| NodeSummary::minimal(&node.id));
    // The section is either the full (incoming, outgoing) pair or absent;
    // a collaborator opting out of one direction drops both.
    let connections = match (
        summarizer.connections(Direction::Incoming, topology_id, report, node, nodes),
        summarizer.connections(Direction::Outgoing, topology_id, report, node, nodes),
    ) {
        (Some(incoming), Some(outgoing)) => vec![incoming, outgoing],
        _ => Vec::new(),
    };
    DetailNode {
        summary,
        controls: controls(report, node),
        children: children(report, node, summarizer),
        connections,
    }
}

fn controls(report: &Report, node: &Node) -> Vec<ControlInstance> {
    match report.topology(&node.topology) {
        Some(topology) => controls_for(topology, &node.id),
        None => Vec::new(),
    }
}

fn controls_for(topology: &Topology, node_id: &str) -> Vec<ControlInstance> {
    let Some(node) = topology.nodes.get(node_id) else {
        return Vec::new();
    };
    let Some(probe_id) = node.latest_value(attrs::CONTROL_PROBE_ID) else {
        return Vec::new();
    };
    let mut result = Vec::new();
    for (control_id, activation) in &node.latest_controls {
        if activation.dead {
            continue;
        }
        if let Some(control) = topology.controls.get(control_id) {
            result.push(ControlInstance {
                probe_id: probe_id.to_string(),
                node_id: node_id.to_string(),
                control: control.clone(),
            });
        }
    }
    result
}

struct GroupSpec {
    topology_id: &'static str,
    label: &'static str,
    columns: Vec<Column>,
}

/// Presentation rules for topologies whose nodes appear as children of
/// other nodes. Declaration order is emission order.
static GROUP_SPECS: LazyLock<Vec<GroupSpec>> = LazyLock::new(|| {
    vec![
        GroupSpec {
            topology_id: topologies::REPLICA_SET,
            label: "Replica Sets",
            columns: vec![
                Column::new(attrs::COUNT_PODS, "# Pods").datatype("number"),
                Column::new(attrs::KUBERNETES_OBSERVED_GENERATION, "Observed Gen.")
                    .datatype("number"),
            ],
        },
        GroupSpec {
            topology_id: topologies::POD,
            label: "Pods",
            columns: vec![
                Column::new(attrs::KUBERNETES_STATE, "State"),
                Column::new(attrs::COUNT_CONTAINERS, "# Containers").datatype("number"),
                Column::new(attrs::KUBERNETES_IP, "IP").datatype("ip"),
            ],
        },
        GroupSpec {
            topology_id: topologies::ECS_TASK,
            label: "Tasks",
            columns: vec![Column::new(attrs::ECS_CREATED_AT, "Created At").datatype("datetime")],
        },
        GroupSpec {
            topology_id: topologies::CONTAINER,
            label: "Containers",
            columns: vec![
                Column::new(attrs::DOCKER_CPU_TOTAL_USAGE, "CPU").datatype("number"),
                Column::new(attrs::DOCKER_MEMORY_USAGE, "Memory").datatype("number"),
            ],
        },
        GroupSpec {
            topology_id: topologies::PROCESS,
            label: "Processes",
            columns: vec![
                Column::new(attrs::PROCESS_PID, "PID").datatype("number"),
                Column::new(attrs::PROCESS_CPU_USAGE, "CPU").datatype("number"),
                Column::new(attrs::PROCESS_MEMORY_USAGE, "Memory").datatype("number"),
            ],
        },
        GroupSpec {
            topology_id: topologies::CONTAINER_IMAGE,
            label: "Container Images",
            columns: vec![Column::new(attrs::COUNT_CONTAINERS, "# Containers")
                .datatype("number")
                .default_sort()],
        },
    ]
});

/// External "API topology" a topology's children are browsed under.
/// Topologies without a mapping never produce a group.
fn primary_api_topology(topology_id: &str) -> Option<&'static str> {
    match topology_id {
        topologies::HOST => Some("hosts"),
        topologies::SERVICE => Some("services"),
        topologies::PROCESS => Some("processes"),
        topologies::CONTAINER => Some("containers"),
        topologies::CONTAINER_IMAGE => Some("containers-by-image"),
        topologies::POD => Some("pods"),
        topologies::REPLICA_SET => Some("replica-sets"),
        topologies::ECS_TASK => Some("tasks"),
        _ => None,
    }
}

fn children(
    report: &Report,
    node: &Node,
    summarizer: &dyn NodeSummarizer,
) -> Vec<NodeSummaryGroup> {
    let mut buckets: BTreeMap<String, Vec<NodeSummary>> = BTreeMap::new();
    for child in &node.children {
        // Guard against self-referential children the merge layer could
        // in theory produce.
        if child.id == node.id {
            continue;
        }
        let Some(child_summary) = summarizer.summarize(report, child) else {
            continue;
        };
        buckets
            .entry(child.topology.clone())
            .or_default()
            .push(child_summary.summarize_metrics());
    }

    let mut groups = Vec::new();

    // Spec-covered groups first, in declaration order.
    for spec in GROUP_SPECS.iter() {
        if buckets.get(spec.topology_id).map_or(true, Vec::is_empty) {
            continue;
        }
        let Some(api_topology) = primary_api_topology(spec.topology_id) else {
            continue;
        };
        let mut summaries = buckets.remove(spec.topology_id).unwrap_or_default();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        groups.push(NodeSummaryGroup {
            label: spec.label.to_string(),
            topology_id: api_topology.to_string(),
            columns: spec.columns.clone(),
            nodes: summaries,
        });
    }

    // Fallback tier for topologies with no spec, in lexicographic
    // topology-ID order (buckets is a BTreeMap).
    for (topology_id, mut summaries) in buckets {
        if summaries.is_empty() {
            continue;
        }
        let Some(topology) = report.topology(&topology_id) else {
            continue;
        };
        let Some(api_topology) = primary_api_topology(&topology_id) else {
            continue;
        };
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        groups.push(NodeSummaryGroup {
            label: topology.label_plural.clone(),
            topology_id: api_topology.to_string(),
            columns: Vec::new(),
            nodes: summaries,
        });
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::summary::BasicSummarizer;
    use super::*;
    use time::macros::datetime;

    const TS: time::OffsetDateTime = datetime!(2024-03-01 12:00 UTC);

    fn report_with_controls() -> Report {
        let mut report = Report::new();
        let containers = report.topology_mut(topologies::CONTAINER);
        containers.label = "Container".to_string();
        containers.label_plural = "Containers".to_string();
        containers.add_control(Control {
            id: "docker_restart".to_string(),
            human: "Restart".to_string(),
            icon: "fa-repeat".to_string(),
            rank: 1,
        });
        containers.add_control(Control {
            id: "docker_stop".to_string(),
            human: "Stop".to_string(),
            icon: "fa-stop".to_string(),
            rank: 2,
        });
        report
    }

    fn render(report: &Report, node: &Node) -> DetailNode {
        let nodes = report.all_nodes();
        make_node(&node.topology, report, &nodes, node, &BasicSummarizer)
    }

    #[test]
    fn live_controls_are_bound_to_probe_and_node() {
        let mut report = report_with_controls();
        report.topology_mut(topologies::CONTAINER).add_node(
            Node::new("c1", topologies::CONTAINER)
                .with_latest(attrs::CONTROL_PROBE_ID, TS, "probe-7")
                .with_control_activation("docker_restart", TS, false)
                .with_control_activation("docker_stop", TS, true),
        );

        let node = report.topology(topologies::CONTAINER).unwrap().nodes["c1"].clone();
        let detail = render(&report, &node);

        assert_eq!(detail.controls.len(), 1);
        let instance = &detail.controls[0];
        assert_eq!(instance.probe_id, "probe-7");
        assert_eq!(instance.node_id, "c1");
        assert_eq!(instance.control.id, "docker_restart");
    }

    #[test]
    fn node_without_probe_id_yields_no_controls() {
        let mut report = report_with_controls();
        report.topology_mut(topologies::CONTAINER).add_node(
            Node::new("c1", topologies::CONTAINER)
                .with_control_activation("docker_restart", TS, false),
        );

        let node = report.topology(topologies::CONTAINER).unwrap().nodes["c1"].clone();
        assert!(render(&report, &node).controls.is_empty());
    }

    #[test]
    fn unknown_control_ids_are_silently_dropped() {
        let mut report = report_with_controls();
        report.topology_mut(topologies::CONTAINER).add_node(
            Node::new("c1", topologies::CONTAINER)
                .with_latest(attrs::CONTROL_PROBE_ID, TS, "probe-7")
                .with_control_activation("not_registered", TS, false),
        );

        let node = report.topology(topologies::CONTAINER).unwrap().nodes["c1"].clone();
        assert!(render(&report, &node).controls.is_empty());
    }

    #[test]
    fn control_instance_wire_shape() {
        let instance = ControlInstance {
            probe_id: "probe-7".to_string(),
            node_id: "c1".to_string(),
            control: Control {
                id: "docker_restart".to_string(),
                human: "Restart".to_string(),
                icon: "fa-repeat".to_string(),
                rank: 1,
            },
        };
        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "probeId": "probe-7",
                "nodeId": "c1",
                "id": "docker_restart",
                "human": "Restart",
                "icon": "fa-repeat",
                "rank": 1,
            })
        );
        let back: ControlInstance = serde_json::from_value(json).unwrap();
        assert_eq!(back, instance);
    }

    #[test]
    fn spec_group_collects_and_sorts_children_dropping_unmapped_topologies() {
        // Children {A: pod, B: pod, C: unregistered-topology}: one pod
        // group with [A, B]; C's topology has no API mapping and is dropped.
        let mut report = Report::new();
        let pods = report.topology_mut(topologies::POD);
        pods.label_plural = "Pods".to_string();
        report.topology_mut("unregistered-topology").label_plural = "Mysteries".to_string();

        let parent = Node::new("parent", topologies::HOST)
            .with_child(Node::new("B", topologies::POD))
            .with_child(Node::new("A", topologies::POD))
            .with_child(Node::new("C", "unregistered-topology"));
        report.topology_mut(topologies::HOST).add_node(parent.clone());

        let detail = render(&report, &parent);
        assert_eq!(detail.children.len(), 1);
        let group = &detail.children[0];
        assert_eq!(group.label, "Pods");
        assert_eq!(group.topology_id, "pods");
        let ids: Vec<_> = group.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn spec_groups_precede_fallback_groups() {
        let mut report = Report::new();
        report.topology_mut(topologies::POD).label_plural = "Pods".to_string();
        report.topology_mut(topologies::HOST).label_plural = "Hosts".to_string();

        // "host" has an API mapping but no group spec, so it lands in the
        // fallback tier after the spec-covered pod group.
        let parent = Node::new("parent", topologies::SERVICE)
            .with_child(Node::new("h1", topologies::HOST))
            .with_child(Node::new("p1", topologies::POD));
        report.topology_mut(topologies::SERVICE).add_node(parent.clone());

        let detail = render(&report, &parent);
        let labels: Vec<_> = detail.children.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Pods", "Hosts"]);
        assert!(detail.children[1].columns.is_empty());
    }

    #[test]
    fn fallback_groups_sorted_lexicographically_by_topology() {
        let mut report = Report::new();
        report.topology_mut(topologies::SERVICE).label_plural = "Services".to_string();
        report.topology_mut(topologies::HOST).label_plural = "Hosts".to_string();

        let parent = Node::new("parent", topologies::POD)
            .with_child(Node::new("s1", topologies::SERVICE))
            .with_child(Node::new("h1", topologies::HOST));
        report.topology_mut(topologies::POD).add_node(parent.clone());

        let detail = render(&report, &parent);
        let labels: Vec<_> = detail.children.iter().map(|g| g.label.as_str()).collect();
        // "host" < "service"
        assert_eq!(labels, vec!["Hosts", "Services"]);
    }

    #[test]
    fn self_referential_child_is_skipped() {
        let mut report = Report::new();
        report.topology_mut(topologies::POD).label_plural = "Pods".to_string();

        let parent = Node::new("parent", topologies::POD)
            .with_child(Node::new("parent", topologies::POD))
            .with_child(Node::new("other", topologies::POD));
        report.topology_mut(topologies::POD).add_node(parent.clone());

        let detail = render(&report, &parent);
        assert_eq!(detail.children.len(), 1);
        let ids: Vec<_> = detail.children[0].nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["other"]);
    }

    #[test]
    fn failed_child_summary_is_skipped_not_fatal() {
        // BasicSummarizer refuses nodes with an empty ID.
        let mut report = Report::new();
        report.topology_mut(topologies::POD).label_plural = "Pods".to_string();

        let parent = Node::new("parent", topologies::HOST)
            .with_child(Node::new("", topologies::POD))
            .with_child(Node::new("p1", topologies::POD));
        report.topology_mut(topologies::HOST).add_node(parent.clone());

        let detail = render(&report, &parent);
        assert_eq!(detail.children.len(), 1);
        assert_eq!(detail.children[0].nodes.len(), 1);
    }

    #[test]
    fn failed_target_summary_degrades_to_minimal() {
        // BasicSummarizer refuses empty-ID nodes; the detail view is
        // still assembled around an id-only summary.
        let mut report = Report::new();
        report.topology_mut(topologies::POD).label_plural = "Pods".to_string();
        report
            .topology_mut(topologies::POD)
            .add_node(Node::new("peer", topologies::POD));

        let target = Node::new("", topologies::HOST)
            .with_child(Node::new("p1", topologies::POD))
            .with_adjacency("peer");

        let detail = render(&report, &target);
        assert_eq!(detail.summary, NodeSummary::minimal(""));
        assert_eq!(detail.children.len(), 1);
        assert_eq!(detail.children[0].nodes[0].id, "p1");
        assert_eq!(detail.connections.len(), 2);
    }

    struct HalfConnected;

    impl NodeSummarizer for HalfConnected {
        fn summarize(&self, report: &Report, node: &Node) -> Option<NodeSummary> {
            BasicSummarizer.summarize(report, node)
        }

        fn connections(
            &self,
            direction: Direction,
            topology_id: &str,
            report: &Report,
            node: &Node,
            nodes: &Nodes,
        ) -> Option<ConnectionsSummary> {
            match direction {
                Direction::Incoming => None,
                Direction::Outgoing => {
                    BasicSummarizer.connections(direction, topology_id, report, node, nodes)
                }
            }
        }
    }

    #[test]
    fn partial_connections_collaborator_omits_the_section() {
        let mut report = Report::new();
        let pods = report.topology_mut(topologies::POD);
        pods.add_node(Node::new("target", topologies::POD).with_adjacency("peer"));
        pods.add_node(Node::new("peer", topologies::POD));

        let node = report.topology(topologies::POD).unwrap().nodes["target"].clone();
        let nodes = report.all_nodes();
        let detail = make_node(topologies::POD, &report, &nodes, &node, &HalfConnected);
        assert!(detail.connections.is_empty());
    }

    #[test]
    fn connections_cover_both_directions() {
        let mut report = Report::new();
        let pods = report.topology_mut(topologies::POD);
        pods.add_node(Node::new("target", topologies::POD).with_adjacency("out-peer"));
        pods.add_node(Node::new("out-peer", topologies::POD));
        pods.add_node(Node::new("in-peer", topologies::POD).with_adjacency("target"));

        let node = report.topology(topologies::POD).unwrap().nodes["target"].clone();
        let detail = render(&report, &node);

        assert_eq!(detail.connections.len(), 2);
        let incoming = &detail.connections[0];
        let outgoing = &detail.connections[1];
        assert_eq!(incoming.id, "incoming-connections");
        assert_eq!(incoming.connections[0].node_id, "in-peer");
        assert_eq!(outgoing.id, "outgoing-connections");
        assert_eq!(outgoing.connections[0].node_id, "out-peer");
    }

    #[test]
    fn detail_json_omits_empty_children_and_flattens_summary() {
        let mut report = Report::new();
        report
            .topology_mut(topologies::HOST)
            .add_node(Node::new("lonely", topologies::HOST));
        let node = report.topology(topologies::HOST).unwrap().nodes["lonely"].clone();

        let detail = render(&report, &node);
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], "lonely");
        assert!(json.get("children").is_none());
        assert_eq!(json["controls"], serde_json::json!([]));
    }

    #[test]
    fn render_does_not_mutate_inputs() {
        let mut report = report_with_controls();
        report.topology_mut(topologies::CONTAINER).add_node(
            Node::new("c1", topologies::CONTAINER)
                .with_latest(attrs::CONTROL_PROBE_ID, TS, "probe-7")
                .with_control_activation("docker_restart", TS, false),
        );
        let before = report.clone();
        let node = report.topology(topologies::CONTAINER).unwrap().nodes["c1"].clone();
        let _ = render(&report, &node);
        assert_eq!(report, before);
    }
}
