//! Whole-graph static validation
//!
//! A single pass over the graph before a run, independent of the per-edge
//! connection gate: cycles, unconnected required inputs, port-type drift on
//! existing edges, unused outputs, isolated nodes, and missing required
//! parameters. Issues carry a severity; only `Error` blocks execution.
//!
//! The cycle check here deliberately duplicates the connection gate's
//! reachability test — snapshot loads bypass the gate, so this pass stays
//! authoritative for anything about to execute.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::compat::compatible;
use crate::model::GraphModel;
use crate::planner;
use crate::registry::NodeTypeRegistry;
use crate::types::{NodeCategory, NodeId, PortId};

/// Kind of finding produced by graph validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    CycleDetected,
    MissingRequiredInput,
    PortIncompatible,
    UnusedOutput,
    IsolatedNode,
    MissingParameter,
}

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks execution
    Error,
    /// Worth surfacing, does not block
    Warning,
    /// Informational
    Info,
}

/// A structured finding from static graph analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<PortId>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    fn new(code: IssueCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            node_id: None,
            port_id: None,
            message: message.into(),
            suggestion: None,
        }
    }

    fn on_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    fn on_port(mut self, port_id: impl Into<String>) -> Self {
        self.port_id = Some(port_id.into());
        self
    }

    fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Summary statistics for a validated graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total_nodes: usize,
    pub connected_nodes: usize,
    pub isolated_nodes: usize,
    /// Present only when the graph is valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_order: Option<Vec<NodeId>>,
    /// Present only when the graph is valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_groups: Option<Vec<Vec<NodeId>>>,
}

/// The result of whole-graph validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphValidationResult {
    /// True iff no issue has `Error` severity
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub stats: GraphStats,
}

/// Validate the whole graph.
///
/// The registry resolves declared-required parameters; node types absent
/// from the registry simply have no parameter declarations to check.
pub fn validate(graph: &GraphModel, registry: &NodeTypeRegistry) -> GraphValidationResult {
    let mut issues = Vec::new();

    detect_cycles(graph, &mut issues);
    check_required_inputs(graph, &mut issues);
    check_edge_compatibility(graph, &mut issues);
    check_unused_outputs(graph, &mut issues);
    let isolated = check_isolated_nodes(graph, &mut issues);
    check_required_parameters(graph, registry, &mut issues);

    let valid = !issues.iter().any(|i| i.severity == Severity::Error);

    let total_nodes = graph.nodes().len();
    let mut stats = GraphStats {
        total_nodes,
        connected_nodes: total_nodes - isolated,
        isolated_nodes: isolated,
        execution_order: None,
        parallel_groups: None,
    };

    if valid {
        let plan = planner::plan(graph);
        stats.execution_order = Some(plan.order);
        stats.parallel_groups = Some(plan.parallel_groups);
    }

    GraphValidationResult {
        valid,
        issues,
        stats,
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// DFS with recursion-stack coloring; a gray-to-gray edge is a back edge.
/// The issue names the nodes on the cycle.
fn detect_cycles(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    let mut colors: HashMap<&str, Color> = graph
        .nodes()
        .iter()
        .map(|n| (n.id.as_str(), Color::White))
        .collect();

    for node in graph.nodes() {
        if colors[node.id.as_str()] == Color::White {
            let mut stack: Vec<NodeId> = Vec::new();
            if let Some(cycle) = visit(graph, &node.id, &mut colors, &mut stack) {
                issues.push(
                    ValidationIssue::new(
                        IssueCode::CycleDetected,
                        Severity::Error,
                        format!("Cycle detected through nodes: {}", cycle.join(" -> ")),
                    )
                    .on_node(cycle[0].clone())
                    .suggest("Remove one of the connections on the cycle"),
                );
                // One cycle report is enough to block the run
                return;
            }
        }
    }
}

fn visit<'a>(
    graph: &'a GraphModel,
    node_id: &'a str,
    colors: &mut HashMap<&'a str, Color>,
    stack: &mut Vec<NodeId>,
) -> Option<Vec<NodeId>> {
    colors.insert(node_id, Color::Gray);
    stack.push(node_id.to_string());

    for edge in graph.outgoing_edges(node_id) {
        match colors.get(edge.target.as_str()) {
            Some(Color::Gray) => {
                // Back edge: the cycle is the stack suffix from the target
                let start = stack
                    .iter()
                    .position(|id| id == &edge.target)
                    .unwrap_or(0);
                return Some(stack[start..].to_vec());
            }
            Some(Color::White) => {
                if let Some(target) = graph.node(&edge.target) {
                    if let Some(cycle) = visit(graph, &target.id, colors, stack) {
                        return Some(cycle);
                    }
                }
            }
            _ => {}
        }
    }

    stack.pop();
    colors.insert(node_id, Color::Black);
    None
}

/// Every required input port needs an incoming edge
fn check_required_inputs(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    let connected: HashSet<(&str, &str)> = graph
        .edges()
        .iter()
        .map(|e| (e.target.as_str(), e.target_port.as_str()))
        .collect();

    for node in graph.nodes() {
        for port in &node.inputs {
            if port.required && !connected.contains(&(node.id.as_str(), port.id.as_str())) {
                issues.push(
                    ValidationIssue::new(
                        IssueCode::MissingRequiredInput,
                        Severity::Error,
                        format!(
                            "Required input '{}' on node '{}' is not connected",
                            port.label, node.id
                        ),
                    )
                    .on_node(node.id.clone())
                    .on_port(port.id.clone())
                    .suggest(format!("Connect a {:?} source to this input", port.port_type)),
                );
            }
        }
    }
}

/// Re-check every edge against the lattice; drift is a warning, not expected
/// in normal operation
fn check_edge_compatibility(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    for edge in graph.edges() {
        let (source, target) = match (graph.source_port(edge), graph.target_port(edge)) {
            (Some(s), Some(t)) => (s, t),
            // Structurally broken edges cannot occur through GraphModel's
            // own contract; skip rather than double-report
            _ => continue,
        };
        if !compatible(source.port_type, target.port_type) {
            issues.push(
                ValidationIssue::new(
                    IssueCode::PortIncompatible,
                    Severity::Warning,
                    format!(
                        "Edge '{}' connects {:?} to {:?}, which the type table no longer allows",
                        edge.id, source.port_type, target.port_type
                    ),
                )
                .on_node(edge.target.clone())
                .on_port(edge.target_port.clone()),
            );
        }
    }
}

/// Output ports with no outgoing edge, on nodes that are not terminal
fn check_unused_outputs(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) {
    let used: HashSet<(&str, &str)> = graph
        .edges()
        .iter()
        .map(|e| (e.source.as_str(), e.source_port.as_str()))
        .collect();

    for node in graph.nodes() {
        if node.category == NodeCategory::Output {
            continue;
        }
        for port in &node.outputs {
            if !used.contains(&(node.id.as_str(), port.id.as_str())) {
                issues.push(
                    ValidationIssue::new(
                        IssueCode::UnusedOutput,
                        Severity::Info,
                        format!("Output '{}' on node '{}' is not used", port.label, node.id),
                    )
                    .on_node(node.id.clone())
                    .on_port(port.id.clone()),
                );
            }
        }
    }
}

/// Nodes with no incident edges at all; returns how many were found
fn check_isolated_nodes(graph: &GraphModel, issues: &mut Vec<ValidationIssue>) -> usize {
    let mut touched: HashSet<&str> = HashSet::new();
    for edge in graph.edges() {
        touched.insert(edge.source.as_str());
        touched.insert(edge.target.as_str());
    }

    let mut isolated = 0;
    for node in graph.nodes() {
        if !touched.contains(node.id.as_str()) {
            isolated += 1;
            issues.push(
                ValidationIssue::new(
                    IssueCode::IsolatedNode,
                    Severity::Warning,
                    format!("Node '{}' has no connections", node.id),
                )
                .on_node(node.id.clone()),
            );
        }
    }
    isolated
}

/// Declared-required parameters must have a value (or a declared default)
fn check_required_parameters(
    graph: &GraphModel,
    registry: &NodeTypeRegistry,
    issues: &mut Vec<ValidationIssue>,
) {
    for node in graph.nodes() {
        let metadata = match registry.get(&node.node_type) {
            Some(m) => m,
            None => continue,
        };
        for spec in &metadata.parameters {
            if !spec.required || spec.default.is_some() {
                continue;
            }
            let missing = match node.parameters.get(&spec.key) {
                None => true,
                Some(serde_json::Value::Null) => true,
                Some(_) => false,
            };
            if missing {
                issues.push(
                    ValidationIssue::new(
                        IssueCode::MissingParameter,
                        Severity::Error,
                        format!(
                            "Node '{}' is missing required parameter '{}'",
                            node.id, spec.key
                        ),
                    )
                    .on_node(node.id.clone())
                    .suggest(format!("Set '{}' in the node's settings", spec.label)),
                );
            }
        }
    }
}
