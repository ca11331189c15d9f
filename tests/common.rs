//! Common test utilities: node metadata fixtures and editor builders.
use widget_inputs::prelude::*;

/// Node metadata in the host's `object_info` shape.
#[allow(dead_code)]
pub const OBJECT_INFO: &str = r#"{
    "CheckpointLoader": {
        "input": { "required": {
            "ckpt_name": [["a.safetensors", "b.safetensors"]]
        }},
        "output": ["MODEL"],
        "output_name": ["MODEL"],
        "category": "loaders",
        "display_name": "Load Checkpoint"
    },
    "OtherLoader": {
        "input": { "required": {
            "ckpt_name": [["a.safetensors", "b.safetensors", "c.safetensors"]]
        }},
        "output": ["MODEL"],
        "category": "loaders"
    },
    "KSampler": {
        "input": { "required": {
            "model": ["MODEL"],
            "seed": ["INT", { "default": 0, "min": 0, "max": 1125899906842624 }],
            "steps": ["INT", { "default": 20, "min": 1, "max": 10000 }],
            "cfg": ["FLOAT", { "default": 8.0, "min": 0.0, "max": 100.0, "step": 0.5 }],
            "sampler_name": [["euler", "dpmpp_2m", "ddim"]],
            "denoise": ["FLOAT", { "default": 1.0, "min": 0.0, "max": 1.0, "step": 0.01 }]
        }},
        "output": ["LATENT"],
        "category": "sampling"
    },
    "Counter": {
        "input": { "required": {
            "count": ["INT", { "default": 7, "min": 0, "max": 100, "step": 1 }]
        }},
        "output": ["INT"],
        "category": "testing"
    },
    "Bounded": {
        "input": { "required": {
            "count": ["INT", { "default": 20, "min": 5, "max": 50 }]
        }},
        "category": "testing"
    },
    "StepSix": {
        "input": { "required": {
            "count": ["INT", { "default": 0, "min": 0, "max": 100, "step": 6 }]
        }},
        "category": "testing"
    },
    "TextEncode": {
        "input": { "required": {
            "clip": ["CLIP"],
            "text": ["STRING", { "multiline": true }]
        }},
        "output": ["CONDITIONING"],
        "category": "conditioning"
    },
    "TextPlain": {
        "input": { "required": {
            "text": ["STRING", {}]
        }},
        "category": "testing"
    },
    "Forced": {
        "input": {
            "required": {
                "text": ["STRING", { "forceInput": true }]
            },
            "optional": {
                "prefix": ["STRING", { "defaultInput": true }],
                "enabled": ["BOOLEAN", { "default": true }]
            }
        },
        "category": "testing"
    }
}"#;

#[allow(dead_code)]
pub fn catalog() -> NodeCatalog {
    NodeCatalog::from_json(OBJECT_INFO).expect("fixture metadata parses")
}

#[allow(dead_code)]
pub fn editor() -> Editor {
    Editor::new(catalog())
}

/// Creates a node and converts `widget` to an input. Returns the node and the input slot.
#[allow(dead_code)]
pub fn node_with_input(editor: &mut Editor, type_name: &str, widget: &str) -> (NodeId, usize) {
    let node_id = editor.create_node(type_name).expect("node type is registered");
    editor
        .convert_widget_to_input(node_id, widget)
        .expect("widget converts");
    let slot = editor
        .node(node_id)
        .and_then(|n| n.input_for_widget(widget))
        .expect("converted input exists");
    (node_id, slot)
}

/// Creates a primitive connected to `widget` on a fresh `type_name` node.
#[allow(dead_code)]
pub fn bound_primitive(editor: &mut Editor, type_name: &str, widget: &str) -> (NodeId, NodeId) {
    let (target, slot) = node_with_input(editor, type_name, widget);
    let primitive = editor.create_node(PRIMITIVE_NODE_TYPE).expect("primitive registered");
    editor
        .connect(primitive, 0, target, slot)
        .expect("first connection is accepted");
    (primitive, target)
}

#[allow(dead_code)]
pub fn widget_value(editor: &Editor, node_id: NodeId, widget: &str) -> WidgetValue {
    editor
        .node(node_id)
        .and_then(|n| n.widget(widget))
        .map(|w| w.value.clone())
        .expect("widget exists")
}

#[allow(dead_code)]
pub fn primitive_value(editor: &Editor, primitive: NodeId) -> WidgetValue {
    editor
        .node(primitive)
        .and_then(|n| n.widgets.first())
        .map(|w| w.value.clone())
        .expect("primitive has a widget")
}

#[allow(dead_code)]
pub fn int_config(min: Option<f64>, max: Option<f64>, step: Option<f64>) -> WidgetConfig {
    let mut options = WidgetOptions::default().with_bounds(min, max);
    options.step = step;
    WidgetConfig::new(ConfigType::Scalar(SemanticType::Int), options)
}

#[allow(dead_code)]
pub fn choices(values: &[&str]) -> WidgetConfig {
    WidgetConfig::choices(values.iter().map(|v| v.to_string()).collect())
}
