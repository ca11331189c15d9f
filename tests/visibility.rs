//! Tests for hiding widgets behind inputs and restoring them.
mod common;
use widget_inputs::prelude::*;
use widget_inputs::widget::visibility::serialize_value;
use widget_inputs::widget::{SerializeMode, SizeMode, hide_widget, show_widget};

fn snapshot(editor: &Editor, node_id: NodeId, name: &str) -> (WidgetKind, SizeMode, SerializeMode, WidgetValue) {
    let widget = editor
        .node(node_id)
        .and_then(|n| n.widget(name))
        .expect("widget exists");
    (widget.kind.clone(), widget.size, widget.serialize, widget.value.clone())
}

#[test]
fn test_hide_replaces_behaviors_and_companions() {
    let mut editor = common::editor();
    let id = editor.create_node("KSampler").unwrap();
    let node = editor.graph_mut().node_mut(id).unwrap();

    hide_widget(node, "seed");

    let seed = node.widget("seed").unwrap();
    assert!(seed.is_hidden());
    assert_eq!(seed.kind, WidgetKind::Converted { suffix: None });
    assert_eq!(seed.kind.to_string(), "converted-widget");
    assert_eq!(seed.size, SizeMode::Collapsed);
    assert_eq!(seed.compute_height(), 0.0);
    assert_eq!(seed.serialize, SerializeMode::WhenLinked);
    assert_eq!(*seed.original_kind(), WidgetKind::Number);

    let control = node.widget("control_after_generate").unwrap();
    assert!(control.is_hidden());
    assert_eq!(control.kind.to_string(), "converted-widget:seed");
}

#[test]
fn test_hide_show_round_trip() {
    let mut editor = common::editor();
    let id = editor.create_node("KSampler").unwrap();
    let seed_before = snapshot(&editor, id, "seed");
    let control_before = snapshot(&editor, id, "control_after_generate");

    let node = editor.graph_mut().node_mut(id).unwrap();
    hide_widget(node, "seed");
    show_widget(node, "seed");

    assert_eq!(snapshot(&editor, id, "seed"), seed_before);
    assert_eq!(snapshot(&editor, id, "control_after_generate"), control_before);
    assert!(!editor.node(id).unwrap().widget("seed").unwrap().is_hidden());
}

#[test]
fn test_double_hide_keeps_original_snapshot() {
    let mut editor = common::editor();
    let id = editor.create_node("KSampler").unwrap();
    let before = snapshot(&editor, id, "steps");

    let node = editor.graph_mut().node_mut(id).unwrap();
    hide_widget(node, "steps");
    hide_widget(node, "steps");
    show_widget(node, "steps");

    assert_eq!(snapshot(&editor, id, "steps"), before);
}

#[test]
fn test_show_on_visible_widget_is_noop() {
    let mut editor = common::editor();
    let id = editor.create_node("KSampler").unwrap();
    let before = snapshot(&editor, id, "cfg");

    let node = editor.graph_mut().node_mut(id).unwrap();
    show_widget(node, "cfg");
    show_widget(node, "missing");

    assert_eq!(snapshot(&editor, id, "cfg"), before);
}

#[test]
fn test_hidden_widget_serializes_only_when_linked() {
    let mut editor = common::editor();
    let (target, slot) = common::node_with_input(&mut editor, "KSampler", "steps");

    let node = editor.node(target).unwrap();
    let steps = node.widget("steps").unwrap();
    assert_eq!(serialize_value(node, steps), None);

    let primitive = editor.create_node(PRIMITIVE_NODE_TYPE).unwrap();
    editor.connect(primitive, 0, target, slot).unwrap();

    let node = editor.node(target).unwrap();
    let steps = node.widget("steps").unwrap();
    assert_eq!(serialize_value(node, steps), Some(WidgetValue::Number(20.0)));
}

#[test]
fn test_hidden_control_widget_never_serializes() {
    let mut editor = common::editor();
    let (target, slot) = common::node_with_input(&mut editor, "KSampler", "seed");
    let primitive = editor.create_node(PRIMITIVE_NODE_TYPE).unwrap();
    editor.connect(primitive, 0, target, slot).unwrap();

    let node = editor.node(target).unwrap();
    let control = node.widget("control_after_generate").unwrap();
    assert!(control.is_hidden());
    assert_eq!(serialize_value(node, control), None);
}
