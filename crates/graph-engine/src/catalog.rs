//! Built-in canvas node catalog
//!
//! The stock node set registered into every new canvas. Hosts merge their
//! own registries on top for plugin node types.

use crate::registry::NodeTypeRegistry;
use crate::types::{NodeCategory, NodeMetadata, ParameterSpec, PortSpec, PortType};

/// Build the registry of built-in node types
pub fn builtin_registry() -> NodeTypeRegistry {
    let mut registry = NodeTypeRegistry::new();

    registry.register(NodeMetadata {
        node_type: "text-prompt".to_string(),
        category: NodeCategory::Input,
        label: "Text Prompt".to_string(),
        description: "A prompt written directly on the canvas".to_string(),
        inputs: vec![],
        outputs: vec![PortSpec::optional("prompt", "Prompt", PortType::Prompt)],
        parameters: vec![ParameterSpec::required("text", "Text")],
    });

    registry.register(NodeMetadata {
        node_type: "image-input".to_string(),
        category: NodeCategory::Input,
        label: "Image".to_string(),
        description: "An uploaded or library image".to_string(),
        inputs: vec![],
        outputs: vec![PortSpec::optional("image", "Image", PortType::Image)],
        parameters: vec![ParameterSpec::required("source", "Source")],
    });

    registry.register(NodeMetadata {
        node_type: "prompt-enhancer".to_string(),
        category: NodeCategory::Processing,
        label: "Prompt Enhancer".to_string(),
        description: "Rewrites a prompt with more visual detail".to_string(),
        inputs: vec![PortSpec::required("prompt", "Prompt", PortType::Prompt)],
        outputs: vec![PortSpec::optional("prompt", "Prompt", PortType::Prompt)],
        parameters: vec![
            ParameterSpec::optional("strength", "Strength")
                .with_default(serde_json::json!(0.5)),
        ],
    });

    registry.register(NodeMetadata {
        node_type: "image-generation".to_string(),
        category: NodeCategory::Processing,
        label: "Image Generation".to_string(),
        description: "Generates an image from a prompt".to_string(),
        inputs: vec![
            PortSpec::required("prompt", "Prompt", PortType::Prompt),
            PortSpec::optional("style", "Style", PortType::Style),
            PortSpec::optional("mask", "Mask", PortType::Mask),
        ],
        outputs: vec![PortSpec::optional("image", "Image", PortType::Image)],
        parameters: vec![
            ParameterSpec::required("model", "Model"),
            ParameterSpec::optional("seed", "Seed"),
            ParameterSpec::optional("aspectRatio", "Aspect Ratio")
                .with_default(serde_json::json!("1:1")),
        ],
    });

    registry.register(NodeMetadata {
        node_type: "video-generation".to_string(),
        category: NodeCategory::Processing,
        label: "Video Generation".to_string(),
        description: "Generates a video clip from a prompt and optional first frame".to_string(),
        inputs: vec![
            PortSpec::required("prompt", "Prompt", PortType::Prompt),
            PortSpec::optional("firstFrame", "First Frame", PortType::Image),
            PortSpec::optional("motion", "Motion", PortType::Motion),
        ],
        outputs: vec![PortSpec::optional("video", "Video", PortType::Video)],
        parameters: vec![
            ParameterSpec::required("model", "Model"),
            ParameterSpec::optional("durationSeconds", "Duration")
                .with_default(serde_json::json!(4)),
        ],
    });

    registry.register(NodeMetadata {
        node_type: "audio-generation".to_string(),
        category: NodeCategory::Processing,
        label: "Audio Generation".to_string(),
        description: "Generates audio from a prompt".to_string(),
        inputs: vec![
            PortSpec::required("prompt", "Prompt", PortType::Prompt),
            PortSpec::optional("voice", "Voice", PortType::Voice),
        ],
        outputs: vec![PortSpec::optional("audio", "Audio", PortType::Audio)],
        parameters: vec![ParameterSpec::required("model", "Model")],
    });

    registry.register(NodeMetadata {
        node_type: "upscaler".to_string(),
        category: NodeCategory::Processing,
        label: "Upscaler".to_string(),
        description: "Upscales an image".to_string(),
        inputs: vec![PortSpec::required("image", "Image", PortType::Image)],
        outputs: vec![PortSpec::optional("image", "Image", PortType::Image)],
        parameters: vec![
            ParameterSpec::optional("factor", "Factor").with_default(serde_json::json!(2)),
        ],
    });

    registry.register(NodeMetadata {
        node_type: "background-removal".to_string(),
        category: NodeCategory::Processing,
        label: "Background Removal".to_string(),
        description: "Cuts the subject out of an image".to_string(),
        inputs: vec![PortSpec::required("image", "Image", PortType::Image)],
        outputs: vec![
            PortSpec::optional("image", "Image", PortType::Image),
            PortSpec::optional("mask", "Mask", PortType::Mask),
        ],
        parameters: vec![],
    });

    registry.register(NodeMetadata {
        node_type: "garment-try-on".to_string(),
        category: NodeCategory::Processing,
        label: "Garment Try-On".to_string(),
        description: "Renders a garment onto a person image".to_string(),
        inputs: vec![
            PortSpec::required("person", "Person", PortType::Image),
            PortSpec::required("garment", "Garment", PortType::Garment),
        ],
        outputs: vec![PortSpec::optional("image", "Image", PortType::Image)],
        parameters: vec![ParameterSpec::required("model", "Model")],
    });

    registry.register(NodeMetadata {
        node_type: "style-transfer".to_string(),
        category: NodeCategory::Processing,
        label: "Style Transfer".to_string(),
        description: "Applies a style reference to an image".to_string(),
        inputs: vec![
            PortSpec::required("image", "Image", PortType::Image),
            PortSpec::required("style", "Style", PortType::Style),
        ],
        outputs: vec![PortSpec::optional("image", "Image", PortType::Image)],
        parameters: vec![
            ParameterSpec::optional("strength", "Strength")
                .with_default(serde_json::json!(0.8)),
        ],
    });

    registry.register(NodeMetadata {
        node_type: "compositor".to_string(),
        category: NodeCategory::Composite,
        label: "Compositor".to_string(),
        description: "Stacks several images into one".to_string(),
        inputs: vec![PortSpec::required("layers", "Layers", PortType::Image).multiple()],
        outputs: vec![PortSpec::optional("image", "Image", PortType::Image)],
        parameters: vec![],
    });

    registry.register(NodeMetadata {
        node_type: "image-export".to_string(),
        category: NodeCategory::Output,
        label: "Export".to_string(),
        description: "Exports the connected image".to_string(),
        inputs: vec![PortSpec::required("image", "Image", PortType::Image)],
        outputs: vec![],
        parameters: vec![
            ParameterSpec::optional("format", "Format").with_default(serde_json::json!("png")),
        ],
    });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::compatible;

    #[test]
    fn test_builtin_registry_has_core_types() {
        let registry = builtin_registry();
        for node_type in [
            "text-prompt",
            "image-generation",
            "video-generation",
            "garment-try-on",
            "compositor",
            "image-export",
        ] {
            assert!(registry.has(node_type), "missing {}", node_type);
        }
    }

    #[test]
    fn test_builtin_ports_are_connectable() {
        // The canonical chain: prompt -> enhancer -> image generation
        let registry = builtin_registry();
        let prompt = registry.get("text-prompt").unwrap();
        let enhancer = registry.get("prompt-enhancer").unwrap();
        let gen = registry.get("image-generation").unwrap();

        assert!(compatible(
            prompt.outputs[0].port_type,
            enhancer.inputs[0].port_type
        ));
        assert!(compatible(
            enhancer.outputs[0].port_type,
            gen.inputs[0].port_type
        ));
    }

    #[test]
    fn test_compositor_accepts_fan_in() {
        let registry = builtin_registry();
        let compositor = registry.get("compositor").unwrap();
        assert!(compositor.inputs[0].multiple);
    }

    #[test]
    fn test_export_is_terminal_category() {
        let registry = builtin_registry();
        assert_eq!(
            registry.get("image-export").unwrap().category,
            NodeCategory::Output
        );
    }
}
