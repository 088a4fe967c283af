//! Topological execution planning
//!
//! Turns a validated graph into an [`ExecutionPlan`]: a topological order
//! plus a partition into parallel waves. Kahn's algorithm produces the
//! order (ties broken by node insertion order for determinism); waves are
//! computed by layering, so every node lands one group after its deepest
//! dependency and nodes within a group share no dependency relationship.
//!
//! Cyclic graphs never get a partial order: the plan comes back with
//! `has_cycles = true` and empty order/groups.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::model::GraphModel;
use crate::types::NodeId;

/// A topological order plus parallel-wave partition for one graph version
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// A valid topological ordering of all nodes
    pub order: Vec<NodeId>,
    /// Nodes grouped into waves safe to execute concurrently
    pub parallel_groups: Vec<Vec<NodeId>>,
    /// Set when the graph contains a cycle; order/groups are empty then
    pub has_cycles: bool,
    /// The graph version this plan was computed against
    pub graph_version: u64,
}

impl ExecutionPlan {
    /// The wave index a node was assigned to, if it is in the plan
    pub fn group_of(&self, node_id: &str) -> Option<usize> {
        self.parallel_groups
            .iter()
            .position(|group| group.iter().any(|id| id == node_id))
    }
}

/// Compute an execution plan for the graph.
///
/// Callers should run `validation::validate` first; a cycle here yields
/// `has_cycles = true` rather than an error.
pub fn plan(graph: &GraphModel) -> ExecutionPlan {
    let node_count = graph.nodes().len();

    // In-degree per node, nodes kept in insertion order
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(node_count);
    for node in graph.nodes() {
        in_degree.insert(&node.id, 0);
    }
    for edge in graph.edges() {
        if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
            *deg += 1;
        }
    }

    // Seed the queue in insertion order for deterministic tie-breaking
    let mut queue: VecDeque<&str> = graph
        .nodes()
        .iter()
        .filter(|n| in_degree[n.id.as_str()] == 0)
        .map(|n| n.id.as_str())
        .collect();

    let mut order: Vec<NodeId> = Vec::with_capacity(node_count);
    while let Some(node_id) = queue.pop_front() {
        order.push(node_id.to_string());
        for edge in graph.outgoing_edges(node_id) {
            if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(&edge.target);
                }
            }
        }
    }

    if order.len() < node_count {
        log::debug!(
            "planner: cycle detected ({} of {} nodes ordered)",
            order.len(),
            node_count
        );
        return ExecutionPlan {
            order: Vec::new(),
            parallel_groups: Vec::new(),
            has_cycles: true,
            graph_version: graph.version(),
        };
    }

    // Layering: level(n) = 1 + max(level of dependencies), roots at 0.
    // Processing in topological order guarantees dependencies are leveled
    // before their dependents.
    let mut level: HashMap<&str, usize> = HashMap::with_capacity(node_count);
    let mut depth = 0;
    for node_id in &order {
        let node_level = graph
            .incoming_edges(node_id)
            .filter_map(|e| level.get(e.source.as_str()))
            .map(|l| l + 1)
            .max()
            .unwrap_or(0);
        depth = depth.max(node_level);
        // order contains each node once, so this insert never collides
        if let Some(node) = graph.node(node_id) {
            level.insert(&node.id, node_level);
        }
    }

    let mut parallel_groups: Vec<Vec<NodeId>> = if order.is_empty() {
        Vec::new()
    } else {
        vec![Vec::new(); depth + 1]
    };
    for node_id in &order {
        if let Some(l) = level.get(node_id.as_str()) {
            parallel_groups[*l].push(node_id.clone());
        }
    }

    ExecutionPlan {
        order,
        parallel_groups,
        has_cycles: false,
        graph_version: graph.version(),
    }
}
