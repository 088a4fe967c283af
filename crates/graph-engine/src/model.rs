//! The graph model — node/edge ownership and versioned mutations
//!
//! `GraphModel` owns the node and edge collections for one canvas graph.
//! Topology and parameter mutations bump the `version` counter (used to
//! invalidate stale execution plans); status and output writes do not,
//! because the run coordinator is the only writer of those fields and must
//! not invalidate its own in-flight plan.
//!
//! `add_edge` only enforces structural well-formedness (referenced nodes
//! and ports exist with the right directionality). Compatibility, fan-in,
//! and cycle gating happen in [`crate::connection`] before an edge reaches
//! the model.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use generation::NodeOutput;

use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventSink, NullEventSink};
use crate::types::{GraphEdge, GraphNode, NodeId, NodeStatus, PortSpec};

/// A graph shared between the editing layer and a running coordinator
pub type SharedGraph = Arc<tokio::sync::RwLock<GraphModel>>;

/// Serializable shape of a graph, for load/save round-trips
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    /// Unique identifier for this graph
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Nodes in insertion order
    pub nodes: Vec<GraphNode>,
    /// Edges in insertion order
    pub edges: Vec<GraphEdge>,
    /// Topology/parameter version at snapshot time
    #[serde(default)]
    pub version: u64,
}

/// A canvas graph: nodes, edges, and a mutation version counter
pub struct GraphModel {
    id: String,
    name: String,
    // Insertion order is load-bearing: the planner breaks topological ties
    // by node insertion order for determinism.
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    version: u64,
    events: Arc<dyn EventSink>,
}

impl GraphModel {
    /// Create a new empty graph
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            version: 0,
            events: Arc::new(NullEventSink),
        }
    }

    /// Attach an event sink for change notifications
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Replace the event sink
    pub fn set_event_sink(&mut self, events: Arc<dyn EventSink>) {
        self.events = events;
    }

    /// Graph identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Graph name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current topology/parameter version
    pub fn version(&self) -> u64 {
        self.version
    }

    /// All nodes, in insertion order
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// All edges, in insertion order
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Find a node by ID
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find an edge by ID
    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    // ─── TOPOLOGY MUTATIONS (bump version) ──────────────────────────

    /// Add a node to the graph
    pub fn add_node(&mut self, node: GraphNode) -> Result<()> {
        if self.node(&node.id).is_some() {
            return Err(EngineError::DuplicateNode(node.id));
        }
        self.nodes.push(node);
        self.bump_topology();
        Ok(())
    }

    /// Remove a node, cascading removal of its incident edges
    pub fn remove_node(&mut self, id: &str) -> Option<GraphNode> {
        let pos = self.nodes.iter().position(|n| n.id == id)?;
        let node = self.nodes.remove(pos);
        self.edges.retain(|e| e.source != id && e.target != id);
        self.bump_topology();
        Some(node)
    }

    /// Add an edge referencing existing nodes and ports.
    ///
    /// Only structural well-formedness is checked here; callers must gate
    /// the edge through `connection::validate` first.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<()> {
        if self.edge(&edge.id).is_some() {
            return Err(EngineError::DuplicateEdge(edge.id));
        }
        let source = self
            .node(&edge.source)
            .ok_or_else(|| EngineError::UnknownNode(edge.source.clone()))?;
        if source.output(&edge.source_port).is_none() {
            return Err(EngineError::unknown_port(&edge.source, &edge.source_port));
        }
        let target = self
            .node(&edge.target)
            .ok_or_else(|| EngineError::UnknownNode(edge.target.clone()))?;
        if target.input(&edge.target_port).is_none() {
            return Err(EngineError::unknown_port(&edge.target, &edge.target_port));
        }
        self.edges.push(edge);
        self.bump_topology();
        Ok(())
    }

    /// Remove an edge by ID
    pub fn remove_edge(&mut self, id: &str) -> Option<GraphEdge> {
        let pos = self.edges.iter().position(|e| e.id == id)?;
        let edge = self.edges.remove(pos);
        self.bump_topology();
        Some(edge)
    }

    // ─── PARAMETER MUTATIONS (bump version) ─────────────────────────

    /// Set one parameter value on a node
    pub fn set_parameter(
        &mut self,
        node_id: &str,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<()> {
        let node = self.node_mut(node_id)?;
        node.parameters.insert(key.into(), value);
        self.bump_parameters(node_id);
        Ok(())
    }

    /// Merge a set of parameter values into a node
    pub fn update_parameters(
        &mut self,
        node_id: &str,
        parameters: impl IntoIterator<Item = (String, serde_json::Value)>,
    ) -> Result<()> {
        let node = self.node_mut(node_id)?;
        node.parameters.extend(parameters);
        self.bump_parameters(node_id);
        Ok(())
    }

    // ─── RUN-STATE MUTATIONS (no version bump) ──────────────────────

    /// Set a node's execution status
    pub fn set_status(&mut self, node_id: &str, status: NodeStatus) -> Result<()> {
        let node = self.node_mut(node_id)?;
        let from = node.status;
        node.status = status;
        let _ = self.events.send(EngineEvent::NodeStatusChanged {
            node_id: node_id.to_string(),
            from,
            to: status,
        });
        Ok(())
    }

    /// Store a node's generation output, clearing any previous error
    pub fn set_output(&mut self, node_id: &str, output: NodeOutput) -> Result<()> {
        let node = self.node_mut(node_id)?;
        node.cached_output = Some(output);
        node.error = None;
        Ok(())
    }

    /// Store a node's error message
    pub fn set_error(&mut self, node_id: &str, error: impl Into<String>) -> Result<()> {
        let node = self.node_mut(node_id)?;
        node.error = Some(error.into());
        Ok(())
    }

    /// Reset every node to `Idle`, clearing outputs and errors.
    ///
    /// Called before a fresh run; not a topology change.
    pub fn clear_run_state(&mut self) {
        for node in &mut self.nodes {
            node.status = NodeStatus::Idle;
            node.cached_output = None;
            node.error = None;
        }
    }

    // ─── ADJACENCY ──────────────────────────────────────────────────

    /// Edges coming into a node
    pub fn incoming_edges<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Edges going out of a node
    pub fn outgoing_edges<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// IDs of nodes this node depends on (upstream)
    pub fn dependencies(&self, node_id: &str) -> Vec<NodeId> {
        self.incoming_edges(node_id)
            .map(|e| e.source.clone())
            .collect()
    }

    /// IDs of nodes that depend on this node (downstream)
    pub fn dependents(&self, node_id: &str) -> Vec<NodeId> {
        self.outgoing_edges(node_id)
            .map(|e| e.target.clone())
            .collect()
    }

    /// All direct and transitive dependents of a node (BFS, deduplicated)
    pub fn transitive_dependents(&self, node_id: &str) -> Vec<NodeId> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        queue.push_back(node_id.to_string());

        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            for edge in self.outgoing_edges(&current) {
                if seen.insert(edge.target.clone()) {
                    result.push(edge.target.clone());
                    queue.push_back(edge.target.clone());
                }
            }
        }
        result
    }

    /// Resolve the output port spec an edge leaves from
    pub fn source_port(&self, edge: &GraphEdge) -> Option<&PortSpec> {
        self.node(&edge.source)?.output(&edge.source_port)
    }

    /// Resolve the input port spec an edge arrives at
    pub fn target_port(&self, edge: &GraphEdge) -> Option<&PortSpec> {
        self.node(&edge.target)?.input(&edge.target_port)
    }

    // ─── SNAPSHOTS ──────────────────────────────────────────────────

    /// Capture the graph's serializable state
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            version: self.version,
        }
    }

    /// Reconstruct a graph from a snapshot
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name,
            nodes: snapshot.nodes,
            edges: snapshot.edges,
            version: snapshot.version,
            events: Arc::new(NullEventSink),
        }
    }

    // ─── INTERNAL ───────────────────────────────────────────────────

    fn node_mut(&mut self, id: &str) -> Result<&mut GraphNode> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| EngineError::UnknownNode(id.to_string()))
    }

    fn bump_topology(&mut self) {
        self.version += 1;
        let _ = self.events.send(EngineEvent::TopologyChanged {
            graph_id: self.id.clone(),
            version: self.version,
        });
    }

    fn bump_parameters(&mut self, node_id: &str) {
        self.version += 1;
        let _ = self.events.send(EngineEvent::ParametersChanged {
            graph_id: self.id.clone(),
            node_id: node_id.to_string(),
            version: self.version,
        });
    }
}

impl std::fmt::Debug for GraphModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphModel")
            .field("id", &self.id)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("version", &self.version)
            .finish()
    }
}
