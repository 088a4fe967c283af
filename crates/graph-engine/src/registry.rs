//! Node type registry
//!
//! Maps node type strings to their metadata (ports, parameters, category).
//! The canvas palette, the graph validator, and node instantiation all
//! resolve through this registry; execution itself goes through the remote
//! generation service, so there are no per-type executors here.

use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::types::{GraphNode, NodeCategory, NodeMetadata};

/// Registry of node types with their metadata
///
/// # Composability
///
/// Registries can be composed by merging:
/// ```ignore
/// let mut registry = catalog::builtin_registry();
/// registry.merge(plugin_registry); // Add plugin nodes
/// ```
pub struct NodeTypeRegistry {
    entries: HashMap<String, NodeMetadata>,
}

impl NodeTypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a node type
    pub fn register(&mut self, metadata: NodeMetadata) {
        self.entries.insert(metadata.node_type.clone(), metadata);
    }

    /// Get metadata for a node type
    pub fn get(&self, node_type: &str) -> Option<&NodeMetadata> {
        self.entries.get(node_type)
    }

    /// Check if a node type is registered
    pub fn has(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// All registered metadata
    pub fn all(&self) -> Vec<&NodeMetadata> {
        self.entries.values().collect()
    }

    /// List all registered node type strings
    pub fn node_types(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Get metadata grouped by category (for the palette UI)
    pub fn by_category(&self) -> HashMap<NodeCategory, Vec<&NodeMetadata>> {
        let mut grouped: HashMap<NodeCategory, Vec<&NodeMetadata>> = HashMap::new();
        for metadata in self.entries.values() {
            grouped.entry(metadata.category).or_default().push(metadata);
        }
        grouped
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` for the same node type.
    pub fn merge(&mut self, other: NodeTypeRegistry) {
        self.entries.extend(other.entries);
    }

    /// Instantiate a node of a registered type, applying parameter defaults
    pub fn instantiate(&self, id: impl Into<String>, node_type: &str) -> Result<GraphNode> {
        let metadata = self
            .get(node_type)
            .ok_or_else(|| EngineError::UnknownNodeType(node_type.to_string()))?;
        Ok(GraphNode::from_metadata(id, metadata))
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParameterSpec, PortSpec, PortType};

    fn test_metadata(node_type: &str) -> NodeMetadata {
        NodeMetadata {
            node_type: node_type.to_string(),
            category: NodeCategory::Processing,
            label: format!("Test {}", node_type),
            description: "Test node".to_string(),
            inputs: vec![PortSpec::optional("input", "Input", PortType::Text)],
            outputs: vec![PortSpec::optional("output", "Output", PortType::Text)],
            parameters: vec![
                ParameterSpec::optional("strength", "Strength")
                    .with_default(serde_json::json!(0.5)),
            ],
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = NodeTypeRegistry::new();
        registry.register(test_metadata("test-node"));

        assert!(registry.has("test-node"));
        assert!(!registry.has("unknown"));
        assert_eq!(registry.get("test-node").unwrap().label, "Test test-node");
    }

    #[test]
    fn test_merge_override() {
        let mut registry1 = NodeTypeRegistry::new();
        let mut meta1 = test_metadata("node-a");
        meta1.label = "Original".to_string();
        registry1.register(meta1);

        let mut registry2 = NodeTypeRegistry::new();
        let mut meta2 = test_metadata("node-a");
        meta2.label = "Override".to_string();
        registry2.register(meta2);
        registry2.register(test_metadata("node-b"));

        registry1.merge(registry2);
        assert_eq!(registry1.all().len(), 2);
        assert_eq!(registry1.get("node-a").unwrap().label, "Override");
    }

    #[test]
    fn test_by_category() {
        let mut registry = NodeTypeRegistry::new();
        let mut input_meta = test_metadata("text-prompt");
        input_meta.category = NodeCategory::Input;
        registry.register(input_meta);
        registry.register(test_metadata("image-generation"));

        let grouped = registry.by_category();
        assert_eq!(grouped.get(&NodeCategory::Input).unwrap().len(), 1);
        assert_eq!(grouped.get(&NodeCategory::Processing).unwrap().len(), 1);
    }

    #[test]
    fn test_instantiate_applies_defaults() {
        let mut registry = NodeTypeRegistry::new();
        registry.register(test_metadata("test-node"));

        let node = registry.instantiate("n1", "test-node").unwrap();
        assert_eq!(node.id, "n1");
        assert_eq!(
            node.parameters.get("strength"),
            Some(&serde_json::json!(0.5))
        );
    }

    #[test]
    fn test_instantiate_unknown_type_fails() {
        let registry = NodeTypeRegistry::new();
        assert!(matches!(
            registry.instantiate("n1", "nope").unwrap_err(),
            EngineError::UnknownNodeType(_)
        ));
    }
}
