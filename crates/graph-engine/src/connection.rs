//! Per-edge connection gating
//!
//! Every edge the canvas proposes goes through [`validate`] before it is
//! committed to the graph model. Checks run in order and short-circuit on
//! the first failure: self-loop, port existence/directionality, fan-in
//! occupancy, type compatibility, and a reachability check that rejects
//! edges which would close a cycle. Rejection never mutates the graph.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::compat::compatible;
use crate::model::GraphModel;
use crate::types::{NodeId, PortId, PortType};

/// An edge the canvas wants to create, before it has an id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedEdge {
    pub source: NodeId,
    pub source_port: PortId,
    pub target: NodeId,
    pub target_port: PortId,
}

impl ProposedEdge {
    pub fn new(
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_port: source_port.into(),
            target: target.into(),
            target_port: target_port.into(),
        }
    }
}

/// Caller-supplied options for a connection attempt
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectOptions {
    /// Allow replacing the existing edge on a single-connection target port.
    /// Ports declared `multiple` accept fan-in regardless of this flag.
    pub replace_existing: bool,
}

/// Why a proposed connection was rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RejectReason {
    /// Source and target are the same node
    SelfLoop,
    /// A referenced node does not exist
    #[serde(rename_all = "camelCase")]
    UnknownNode { node_id: NodeId },
    /// A referenced port does not exist on its node
    #[serde(rename_all = "camelCase")]
    UnknownPort { node_id: NodeId, port_id: PortId },
    /// The port exists but with the wrong direction (output as target, etc.)
    #[serde(rename_all = "camelCase")]
    WrongDirection { node_id: NodeId, port_id: PortId },
    /// The target port already has a connection and is not `multiple`
    #[serde(rename_all = "camelCase")]
    PortOccupied { port_id: PortId },
    /// The port types do not satisfy the compatibility lattice
    #[serde(rename_all = "camelCase")]
    IncompatibleTypes {
        source_type: PortType,
        target_type: PortType,
    },
    /// The edge would close a cycle through the listed node
    #[serde(rename_all = "camelCase")]
    WouldCreateCycle { via: NodeId },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfLoop => write!(f, "A node cannot connect to itself"),
            Self::UnknownNode { node_id } => write!(f, "Node '{}' does not exist", node_id),
            Self::UnknownPort { node_id, port_id } => {
                write!(f, "Port '{}' does not exist on node '{}'", port_id, node_id)
            }
            Self::WrongDirection { node_id, port_id } => write!(
                f,
                "Port '{}' on node '{}' has the wrong direction for this connection",
                port_id, node_id
            ),
            Self::PortOccupied { port_id } => {
                write!(f, "Port '{}' is already connected", port_id)
            }
            Self::IncompatibleTypes {
                source_type,
                target_type,
            } => write!(
                f,
                "Cannot connect {:?} output to {:?} input",
                source_type, target_type
            ),
            Self::WouldCreateCycle { via } => write!(
                f,
                "Connection would create a cycle through node '{}'",
                via
            ),
        }
    }
}

/// The outcome of a connection attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionVerdict {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl ConnectionVerdict {
    fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    fn rejected(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
        }
    }
}

/// Gate a proposed edge against the current graph.
///
/// Returns a verdict; never mutates the graph. On acceptance the caller is
/// responsible for invoking `GraphModel::add_edge` (removing the displaced
/// edge first when `replace_existing` applied).
pub fn validate(
    graph: &GraphModel,
    proposed: &ProposedEdge,
    options: &ConnectOptions,
) -> ConnectionVerdict {
    // 1. No self-loops
    if proposed.source == proposed.target {
        return ConnectionVerdict::rejected(RejectReason::SelfLoop);
    }

    // 2. Both ports exist with the right directionality
    let source_node = match graph.node(&proposed.source) {
        Some(node) => node,
        None => {
            return ConnectionVerdict::rejected(RejectReason::UnknownNode {
                node_id: proposed.source.clone(),
            })
        }
    };
    let source_port = match source_node.output(&proposed.source_port) {
        Some(port) => port,
        None => {
            let reason = if source_node.input(&proposed.source_port).is_some() {
                RejectReason::WrongDirection {
                    node_id: proposed.source.clone(),
                    port_id: proposed.source_port.clone(),
                }
            } else {
                RejectReason::UnknownPort {
                    node_id: proposed.source.clone(),
                    port_id: proposed.source_port.clone(),
                }
            };
            return ConnectionVerdict::rejected(reason);
        }
    };

    let target_node = match graph.node(&proposed.target) {
        Some(node) => node,
        None => {
            return ConnectionVerdict::rejected(RejectReason::UnknownNode {
                node_id: proposed.target.clone(),
            })
        }
    };
    let target_port = match target_node.input(&proposed.target_port) {
        Some(port) => port,
        None => {
            let reason = if target_node.output(&proposed.target_port).is_some() {
                RejectReason::WrongDirection {
                    node_id: proposed.target.clone(),
                    port_id: proposed.target_port.clone(),
                }
            } else {
                RejectReason::UnknownPort {
                    node_id: proposed.target.clone(),
                    port_id: proposed.target_port.clone(),
                }
            };
            return ConnectionVerdict::rejected(reason);
        }
    };

    // 3. Fan-in: single-connection ports reject a second edge unless the
    //    caller asked to replace. The port's own `multiple` flag wins.
    if !target_port.multiple {
        let occupied = graph
            .incoming_edges(&proposed.target)
            .any(|e| e.target_port == proposed.target_port);
        if occupied && !options.replace_existing {
            return ConnectionVerdict::rejected(RejectReason::PortOccupied {
                port_id: proposed.target_port.clone(),
            });
        }
    }

    // 4. Type compatibility
    if !compatible(source_port.port_type, target_port.port_type) {
        return ConnectionVerdict::rejected(RejectReason::IncompatibleTypes {
            source_type: source_port.port_type,
            target_type: target_port.port_type,
        });
    }

    // 5. Cycle check: if the source is reachable from the target in the
    //    current graph, the new edge would close a cycle.
    if reachable(graph, &proposed.target, &proposed.source) {
        return ConnectionVerdict::rejected(RejectReason::WouldCreateCycle {
            via: proposed.target.clone(),
        });
    }

    ConnectionVerdict::accepted()
}

/// Depth-first reachability: can `to` be reached from `from`?
fn reachable(graph: &GraphModel, from: &str, to: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![from];

    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        for edge in graph.outgoing_edges(current) {
            stack.push(&edge.target);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GraphEdge, GraphNode, NodeCategory, PortSpec};

    fn chain_graph() -> GraphModel {
        // a -> b -> c, all text ports
        let mut graph = GraphModel::new("g1", "Test");
        for id in ["a", "b", "c"] {
            graph
                .add_node(
                    GraphNode::new(id, "text-prompt", NodeCategory::Processing)
                        .with_input(PortSpec::optional("in", "In", PortType::Text))
                        .with_output(PortSpec::optional("out", "Out", PortType::Text)),
                )
                .unwrap();
        }
        graph
            .add_edge(GraphEdge::new("e1", "a", "out", "b", "in"))
            .unwrap();
        graph
            .add_edge(GraphEdge::new("e2", "b", "out", "c", "in"))
            .unwrap();
        graph
    }

    #[test]
    fn test_accepts_valid_connection() {
        let mut graph = chain_graph();
        graph
            .add_node(
                GraphNode::new("d", "text-prompt", NodeCategory::Processing)
                    .with_input(PortSpec::optional("in", "In", PortType::Text)),
            )
            .unwrap();

        let verdict = validate(
            &graph,
            &ProposedEdge::new("c", "out", "d", "in"),
            &ConnectOptions::default(),
        );
        assert!(verdict.accepted);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn test_rejects_self_loop() {
        let graph = chain_graph();
        let verdict = validate(
            &graph,
            &ProposedEdge::new("a", "out", "a", "in"),
            &ConnectOptions::default(),
        );
        assert_eq!(verdict.reason, Some(RejectReason::SelfLoop));
    }

    #[test]
    fn test_rejects_unknown_node_and_port() {
        let graph = chain_graph();

        let verdict = validate(
            &graph,
            &ProposedEdge::new("missing", "out", "b", "in"),
            &ConnectOptions::default(),
        );
        assert!(matches!(
            verdict.reason,
            Some(RejectReason::UnknownNode { .. })
        ));

        let verdict = validate(
            &graph,
            &ProposedEdge::new("a", "nope", "b", "in"),
            &ConnectOptions::default(),
        );
        assert!(matches!(
            verdict.reason,
            Some(RejectReason::UnknownPort { .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_direction() {
        let graph = chain_graph();
        // "in" exists on node a, but as an input — cannot be a source
        let verdict = validate(
            &graph,
            &ProposedEdge::new("a", "in", "b", "in"),
            &ConnectOptions::default(),
        );
        assert!(matches!(
            verdict.reason,
            Some(RejectReason::WrongDirection { .. })
        ));
    }

    #[test]
    fn test_rejects_occupied_port_unless_replacing() {
        let graph = chain_graph();
        // b.in is already fed by a
        let proposed = ProposedEdge::new("c", "out", "b", "in");

        let verdict = validate(&graph, &proposed, &ConnectOptions::default());
        // c -> b would also be a cycle, but occupancy is checked first
        assert!(matches!(
            verdict.reason,
            Some(RejectReason::PortOccupied { .. })
        ));
    }

    #[test]
    fn test_multiple_port_accepts_fan_in() {
        let mut graph = chain_graph();
        graph
            .add_node(
                GraphNode::new("merge", "compositor", NodeCategory::Composite).with_input(
                    PortSpec::required("layers", "Layers", PortType::Text).multiple(),
                ),
            )
            .unwrap();
        graph
            .add_edge(GraphEdge::new("e3", "a", "out", "merge", "layers"))
            .unwrap();

        // Second connection into the same multiple port is fine even
        // without replace_existing
        let verdict = validate(
            &graph,
            &ProposedEdge::new("c", "out", "merge", "layers"),
            &ConnectOptions::default(),
        );
        assert!(verdict.accepted);
    }

    #[test]
    fn test_replace_existing_allows_single_port_swap() {
        let mut graph = chain_graph();
        graph
            .add_node(
                GraphNode::new("d", "text-prompt", NodeCategory::Processing)
                    .with_output(PortSpec::optional("out", "Out", PortType::Text)),
            )
            .unwrap();

        let verdict = validate(
            &graph,
            &ProposedEdge::new("d", "out", "b", "in"),
            &ConnectOptions {
                replace_existing: true,
            },
        );
        assert!(verdict.accepted);
    }

    #[test]
    fn test_rejects_incompatible_types() {
        let mut graph = chain_graph();
        graph
            .add_node(
                GraphNode::new("img", "image-generation", NodeCategory::Processing)
                    .with_output(PortSpec::optional("image", "Image", PortType::Image)),
            )
            .unwrap();
        graph
            .add_node(
                GraphNode::new("audio", "audio-mixer", NodeCategory::Processing)
                    .with_input(PortSpec::optional("audio", "Audio", PortType::Audio)),
            )
            .unwrap();

        let verdict = validate(
            &graph,
            &ProposedEdge::new("img", "image", "audio", "audio"),
            &ConnectOptions::default(),
        );
        assert_eq!(
            verdict.reason,
            Some(RejectReason::IncompatibleTypes {
                source_type: PortType::Image,
                target_type: PortType::Audio,
            })
        );
    }

    #[test]
    fn test_rejects_cycle_to_ancestor_and_leaves_graph_unchanged() {
        let graph = chain_graph();
        let version = graph.version();
        let edges = graph.edges().len();

        // c -> a would close the cycle a -> b -> c -> a
        let verdict = validate(
            &graph,
            &ProposedEdge::new("c", "out", "a", "in"),
            &ConnectOptions::default(),
        );
        assert!(!verdict.accepted);
        assert!(matches!(
            verdict.reason,
            Some(RejectReason::WouldCreateCycle { .. })
        ));
        assert_eq!(graph.version(), version);
        assert_eq!(graph.edges().len(), edges);
    }

    #[test]
    fn test_reject_reasons_have_messages() {
        let reason = RejectReason::WouldCreateCycle {
            via: "b".to_string(),
        };
        assert!(reason.to_string().contains("cycle"));
    }
}
