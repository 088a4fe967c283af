//! Fluent builder for canvas graphs
//!
//! Construction helper for tests and embedding applications. Performs no
//! validation beyond `GraphModel`'s own structural contract — gate edges
//! through `connection::validate` when building from untrusted input.

use crate::model::GraphModel;
use crate::registry::NodeTypeRegistry;
use crate::types::{GraphEdge, GraphNode};

/// Fluent builder for constructing graphs programmatically
///
/// # Example
///
/// ```ignore
/// let graph = GraphBuilder::new("board-1", "Poster Draft")
///     .add_node(registry.instantiate("prompt-1", "text-prompt")?)
///     .with_parameter("text", serde_json::json!("a red chair"))
///     .add_node(registry.instantiate("gen-1", "image-generation")?)
///     .connect("prompt-1", "prompt", "gen-1", "prompt")
///     .build();
/// ```
pub struct GraphBuilder {
    id: String,
    name: String,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    edge_counter: usize,
}

impl GraphBuilder {
    /// Create a new graph builder
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            edge_counter: 0,
        }
    }

    /// Add a node to the graph
    pub fn add_node(mut self, node: GraphNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Instantiate a node from the registry and add it.
    ///
    /// Unknown node types are skipped with a warning; use
    /// `NodeTypeRegistry::instantiate` directly when the caller needs the
    /// error.
    pub fn add_from_registry(
        mut self,
        registry: &NodeTypeRegistry,
        id: impl Into<String>,
        node_type: &str,
    ) -> Self {
        let id = id.into();
        match registry.instantiate(&id, node_type) {
            Ok(node) => self.nodes.push(node),
            Err(e) => log::warn!("GraphBuilder: skipping node '{}': {}", id, e),
        }
        self
    }

    /// Set a parameter on the most recently added node
    ///
    /// Must be called after `add_node`/`add_from_registry`.
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.parameters.insert(key.into(), value);
        }
        self
    }

    /// Connect two nodes (auto-generates the edge ID)
    pub fn connect(
        mut self,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        self.edge_counter += 1;
        self.edges.push(GraphEdge::new(
            format!("edge-{}", self.edge_counter),
            source,
            source_port,
            target,
            target_port,
        ));
        self
    }

    /// Connect two nodes with an explicit edge ID
    pub fn connect_with_id(
        mut self,
        edge_id: impl Into<String>,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        self.edges
            .push(GraphEdge::new(edge_id, source, source_port, target, target_port));
        self
    }

    /// Build the graph
    ///
    /// Edges referencing nodes that were never added are dropped with a
    /// warning rather than poisoning the model.
    pub fn build(self) -> GraphModel {
        let mut graph = GraphModel::new(self.id, self.name);
        for node in self.nodes {
            let id = node.id.clone();
            if let Err(e) = graph.add_node(node) {
                log::warn!("GraphBuilder: dropping node '{}': {}", id, e);
            }
        }
        for edge in self.edges {
            let id = edge.id.clone();
            if let Err(e) = graph.add_edge(edge) {
                log::warn!("GraphBuilder: dropping edge '{}': {}", id, e);
            }
        }
        graph
    }
}
