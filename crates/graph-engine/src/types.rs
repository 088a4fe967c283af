//! Core types for canvas graphs
//!
//! These types define the structure of a canvas graph: nodes, edges,
//! ports, parameters, and their metadata.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use generation::NodeOutput;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Unique identifier for a port
pub type PortId = String;

/// The data type of a port
///
/// Base types carry raw media; domain subtypes refine a base type with a
/// role (a `Garment` is an image used as a try-on reference). Which source
/// types a port accepts is defined by the lattice in [`crate::compat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    /// Accepts any type
    Any,
    /// Plain text
    Text,
    /// Generation prompt (special text for model input)
    Prompt,
    /// Still image
    Image,
    /// Binary mask over an image
    Mask,
    /// Depth map
    Depth,
    /// Pose skeleton reference
    Pose,
    /// Garment reference for try-on
    Garment,
    /// Face identity reference
    Face,
    /// Tileable texture
    Texture,
    /// Video clip
    Video,
    /// Motion reference for video generation
    Motion,
    /// Audio clip
    Audio,
    /// Voice identity reference
    Voice,
    /// Music track
    Music,
    /// 3D mesh
    Mesh,
    /// PBR material for a mesh
    Material,
    /// Style reference
    Style,
    /// Color palette
    Palette,
    /// Numeric value
    Number,
    /// Boolean value
    Boolean,
    /// JSON object
    Json,
}

impl PortType {
    /// Every known port type, for registry iteration and tests
    pub const ALL: [PortType; 22] = [
        PortType::Any,
        PortType::Text,
        PortType::Prompt,
        PortType::Image,
        PortType::Mask,
        PortType::Depth,
        PortType::Pose,
        PortType::Garment,
        PortType::Face,
        PortType::Texture,
        PortType::Video,
        PortType::Motion,
        PortType::Audio,
        PortType::Voice,
        PortType::Music,
        PortType::Mesh,
        PortType::Material,
        PortType::Style,
        PortType::Palette,
        PortType::Number,
        PortType::Boolean,
        PortType::Json,
    ];
}

/// Definition of a port (input or output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    /// Unique identifier for this port within its node
    pub id: PortId,
    /// Human-readable label
    pub label: String,
    /// Data type of the port
    pub port_type: PortType,
    /// Whether this port must be connected (inputs only)
    pub required: bool,
    /// Whether this port accepts multiple connections
    pub multiple: bool,
}

impl PortSpec {
    /// Create a required port
    pub fn required(
        id: impl Into<String>,
        label: impl Into<String>,
        port_type: PortType,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            port_type,
            required: true,
            multiple: false,
        }
    }

    /// Create an optional port
    pub fn optional(
        id: impl Into<String>,
        label: impl Into<String>,
        port_type: PortType,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            port_type,
            required: false,
            multiple: false,
        }
    }

    /// Set this port to accept multiple connections
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// A parameter a node type declares (distinct from port-based inputs)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    /// Parameter key in the node's parameter map
    pub key: String,
    /// Human-readable label
    pub label: String,
    /// Whether a value must be present before the node can run
    pub required: bool,
    /// Default value applied at instantiation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl ParameterSpec {
    /// Create a required parameter
    pub fn required(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            required: true,
            default: None,
        }
    }

    /// Create an optional parameter
    pub fn optional(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            required: false,
            default: None,
        }
    }

    /// Set a default value for this parameter
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Category of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Source nodes (prompts, uploads, asset references)
    Input,
    /// Terminal nodes (export, preview) — unused outputs here are expected
    Output,
    /// Generation and transformation nodes
    Processing,
    /// Nodes combining several upstream results
    Composite,
    /// Helper nodes (routing, constants)
    Utility,
}

impl NodeCategory {
    /// The wire representation used in submit requests
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeCategory::Input => "input",
            NodeCategory::Output => "output",
            NodeCategory::Processing => "processing",
            NodeCategory::Composite => "composite",
            NodeCategory::Utility => "utility",
        }
    }
}

/// Registry descriptor for a node type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Unique type identifier (e.g., "image-generation")
    pub node_type: String,
    /// Category for grouping and terminal-node detection
    pub category: NodeCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the node does
    pub description: String,
    /// Input port definitions
    pub inputs: Vec<PortSpec>,
    /// Output port definitions
    pub outputs: Vec<PortSpec>,
    /// Declared parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterSpec>,
}

/// Execution status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Not part of any run
    Idle,
    /// Submitted, waiting for a worker
    Queued,
    /// Generating
    Running,
    /// Finished successfully; `cached_output` is set
    Completed,
    /// Finished with an error; `error` is set
    Error,
    /// Cancelled before completion
    Cancelled,
    /// Never submitted because an upstream dependency failed
    Blocked,
}

impl NodeStatus {
    /// Whether this status is terminal for the current run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeStatus::Completed
                | NodeStatus::Error
                | NodeStatus::Cancelled
                | NodeStatus::Blocked
        )
    }
}

impl Default for NodeStatus {
    fn default() -> Self {
        NodeStatus::Idle
    }
}

/// A node instance in a graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Node type (references a NodeMetadata in the registry)
    pub node_type: String,
    /// Category (copied from metadata at instantiation)
    pub category: NodeCategory,
    /// Input port definitions
    pub inputs: Vec<PortSpec>,
    /// Output port definitions
    pub outputs: Vec<PortSpec>,
    /// Parameter values for this instance
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    /// Current execution status
    #[serde(default)]
    pub status: NodeStatus,
    /// Output of the last successful run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_output: Option<NodeOutput>,
    /// Error message from the last failed run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GraphNode {
    /// Create a bare node with no ports
    pub fn new(
        id: impl Into<String>,
        node_type: impl Into<String>,
        category: NodeCategory,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            category,
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: HashMap::new(),
            status: NodeStatus::Idle,
            cached_output: None,
            error: None,
        }
    }

    /// Instantiate a node from registry metadata, applying parameter defaults
    pub fn from_metadata(id: impl Into<String>, metadata: &NodeMetadata) -> Self {
        let mut parameters = HashMap::new();
        for spec in &metadata.parameters {
            if let Some(default) = &spec.default {
                parameters.insert(spec.key.clone(), default.clone());
            }
        }
        Self {
            id: id.into(),
            node_type: metadata.node_type.clone(),
            category: metadata.category,
            inputs: metadata.inputs.clone(),
            outputs: metadata.outputs.clone(),
            parameters,
            status: NodeStatus::Idle,
            cached_output: None,
            error: None,
        }
    }

    /// Add an input port (builder style, for tests and embedders)
    pub fn with_input(mut self, port: PortSpec) -> Self {
        self.inputs.push(port);
        self
    }

    /// Add an output port (builder style, for tests and embedders)
    pub fn with_output(mut self, port: PortSpec) -> Self {
        self.outputs.push(port);
        self
    }

    /// Set a parameter value (builder style)
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Find an input port by id
    pub fn input(&self, port_id: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.id == port_id)
    }

    /// Find an output port by id
    pub fn output(&self, port_id: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.id == port_id)
    }
}

/// An edge connecting an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID (producer)
    pub source: NodeId,
    /// Source port ID (an output on the source node)
    pub source_port: PortId,
    /// Target node ID (consumer)
    pub target: NodeId,
    /// Target port ID (an input on the target node)
    pub target_port: PortId,
}

impl GraphEdge {
    /// Create a new edge
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            source_port: source_port.into(),
            target: target.into(),
            target_port: target_port.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_spec_constructors() {
        let port = PortSpec::required("prompt", "Prompt", PortType::Prompt);
        assert!(port.required);
        assert!(!port.multiple);

        let port = PortSpec::optional("style", "Style", PortType::Style).multiple();
        assert!(!port.required);
        assert!(port.multiple);
    }

    #[test]
    fn test_node_from_metadata_applies_defaults() {
        let metadata = NodeMetadata {
            node_type: "upscaler".to_string(),
            category: NodeCategory::Processing,
            label: "Upscaler".to_string(),
            description: "Upscales an image".to_string(),
            inputs: vec![PortSpec::required("image", "Image", PortType::Image)],
            outputs: vec![PortSpec::optional("image", "Image", PortType::Image)],
            parameters: vec![
                ParameterSpec::optional("factor", "Factor").with_default(serde_json::json!(2)),
                ParameterSpec::required("model", "Model"),
            ],
        };

        let node = GraphNode::from_metadata("up-1", &metadata);
        assert_eq!(node.node_type, "upscaler");
        assert_eq!(node.parameters.get("factor"), Some(&serde_json::json!(2)));
        assert!(node.parameters.get("model").is_none());
        assert_eq!(node.status, NodeStatus::Idle);
    }

    #[test]
    fn test_port_lookup() {
        let node = GraphNode::new("n1", "image-generation", NodeCategory::Processing)
            .with_input(PortSpec::required("prompt", "Prompt", PortType::Prompt))
            .with_output(PortSpec::optional("image", "Image", PortType::Image));

        assert!(node.input("prompt").is_some());
        assert!(node.input("image").is_none());
        assert!(node.output("image").is_some());
    }

    #[test]
    fn test_node_status_terminal() {
        assert!(NodeStatus::Completed.is_terminal());
        assert!(NodeStatus::Blocked.is_terminal());
        assert!(!NodeStatus::Running.is_terminal());
        assert!(!NodeStatus::Idle.is_terminal());
    }

    #[test]
    fn test_graph_node_serde_roundtrip() {
        let node = GraphNode::new("n1", "text-prompt", NodeCategory::Input)
            .with_output(PortSpec::optional("prompt", "Prompt", PortType::Prompt))
            .with_parameter("text", serde_json::json!("a red chair"));

        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("nodeType"));
        let restored: GraphNode = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, "n1");
        assert_eq!(
            restored.parameters.get("text"),
            Some(&serde_json::json!("a red chair"))
        );
    }
}
