//! Tests for the primitive node lifecycle.
mod common;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use widget_inputs::constants::{PRIMITIVE_OUTPUT_NAME, VALUE_CONTROL_WIDGET_NAME};
use widget_inputs::graph::{ConfigSource, InputSlot};
use widget_inputs::prelude::*;
use widget_inputs::primitive::{create_primitive_node, primitive_definition};

fn state(editor: &Editor, primitive: NodeId) -> PrimitiveState {
    editor
        .node(primitive)
        .and_then(Node::primitive_state)
        .cloned()
        .expect("node is a primitive")
}

#[test]
fn test_new_primitive_is_empty() {
    let node = create_primitive_node();
    assert!(node.is_primitive());
    assert!(node.is_virtual());
    assert_eq!(node.title, "Primitive");
    assert_eq!(node.outputs.len(), 1);
    assert_eq!(node.outputs[0].ty, SlotType::Wildcard);
    assert_eq!(node.outputs[0].name, PRIMITIVE_OUTPUT_NAME);
    assert!(node.widgets.is_empty());
    assert_eq!(node.primitive_state(), Some(&PrimitiveState::default()));

    let definition = primitive_definition();
    assert_eq!(definition.name, PRIMITIVE_NODE_TYPE);
    assert_eq!(definition.category, "utils");
}

#[test]
fn test_first_connection_binds_to_consumer() {
    let mut editor = common::editor();
    let (primitive, _target) = common::bound_primitive(&mut editor, "Counter", "count");

    let node = editor.node(primitive).unwrap();
    assert_eq!(node.outputs[0].ty, SlotType::Typed(SemanticType::Int));
    assert_eq!(node.outputs[0].name, "INT");
    assert_eq!(node.outputs[0].widget.as_ref().unwrap().name, "count");

    assert_eq!(node.widgets.len(), 2);
    let value = &node.widgets[0];
    assert_eq!(value.name, "value");
    assert_eq!(value.kind, WidgetKind::Number);
    assert_eq!(value.value, WidgetValue::Number(7.0));
    assert_eq!(value.options.min, Some(0.0));
    assert_eq!(value.options.max, Some(100.0));
    assert_eq!(value.options.step, Some(1.0));
    assert_eq!(value.linked_widgets, vec![VALUE_CONTROL_WIDGET_NAME.to_string()]);

    let control = &node.widgets[1];
    assert_eq!(control.name, VALUE_CONTROL_WIDGET_NAME);
    assert_eq!(control.value, WidgetValue::Text("fixed".to_string()));

    let state = state(&editor, primitive);
    assert!(state.base_config().is_some());
    assert!(state.merged_config().is_none());
}

#[test]
fn test_first_connection_queues_resize() {
    let mut editor = common::editor();
    let (primitive, _) = common::bound_primitive(&mut editor, "Counter", "count");
    assert_eq!(editor.next_frame(), vec![primitive]);
    assert!(editor.next_frame().is_empty());

    let node = editor.node(primitive).unwrap();
    let needed = node.compute_size();
    assert!(node.size[1] >= needed[1]);
}

#[test]
fn test_edit_propagates_to_all_consumers() {
    let mut editor = common::editor();
    let (primitive, first) = common::bound_primitive(&mut editor, "Counter", "count");
    let (second, slot) = common::node_with_input(&mut editor, "Counter", "count");
    editor.connect(primitive, 0, second, slot).unwrap();

    editor
        .set_widget_value(primitive, "value", WidgetValue::Number(42.0))
        .unwrap();

    assert_eq!(common::widget_value(&editor, first, "count"), WidgetValue::Number(42.0));
    assert_eq!(common::widget_value(&editor, second, "count"), WidgetValue::Number(42.0));
}

#[test]
fn test_consumer_callbacks_run_on_edit() {
    let mut editor = common::editor();
    let (primitive, target) = common::bound_primitive(&mut editor, "Counter", "count");
    let seen = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = seen.clone();
        let widget = editor
            .graph_mut()
            .node_mut(target)
            .and_then(|n| n.widget_mut("count"))
            .unwrap();
        *widget = widget
            .clone()
            .with_callback(move |value, _| seen.borrow_mut().push(value.clone()));
    }

    editor
        .set_widget_value(primitive, "value", WidgetValue::Number(3.0))
        .unwrap();
    assert_eq!(*seen.borrow(), vec![WidgetValue::Number(3.0)]);
}

#[test]
fn test_second_connection_merges_and_clamps() {
    let mut editor = common::editor();
    let (primitive, first) = common::bound_primitive(&mut editor, "Counter", "count");
    editor
        .set_widget_value(primitive, "value", WidgetValue::Number(2.0))
        .unwrap();

    let (second, slot) = common::node_with_input(&mut editor, "Bounded", "count");
    editor.connect(primitive, 0, second, slot).unwrap();

    let state = state(&editor, primitive);
    let merged = state.merged_config().expect("bounds were intersected");
    assert_eq!(merged.options.min, Some(5.0));
    assert_eq!(merged.options.max, Some(50.0));

    let node = editor.node(primitive).unwrap();
    assert_eq!(node.widgets[0].options.min, Some(5.0));
    assert_eq!(node.widgets[0].options.max, Some(50.0));
    assert_eq!(node.widgets[0].value, WidgetValue::Number(5.0));
    assert_eq!(common::widget_value(&editor, first, "count"), WidgetValue::Number(5.0));
    assert_eq!(common::widget_value(&editor, second, "count"), WidgetValue::Number(5.0));
}

#[test]
fn test_compatible_steps_narrow_config() {
    let mut editor = common::editor();
    let (primitive, _) = common::bound_primitive(&mut editor, "Bounded", "count");
    let (step_six, slot) = common::node_with_input(&mut editor, "StepSix", "count");
    editor.connect(primitive, 0, step_six, slot).unwrap();
    let (counter, slot) = common::node_with_input(&mut editor, "Counter", "count");
    editor.connect(primitive, 0, counter, slot).unwrap();

    let state = state(&editor, primitive);
    let merged = state.merged_config().unwrap();
    assert_eq!(merged.options.min, Some(5.0));
    assert_eq!(merged.options.max, Some(50.0));
    assert_eq!(merged.options.step, Some(6.0));
}

#[test]
fn test_wrong_slot_type_is_rejected() {
    let mut editor = common::editor();
    let (primitive, _) = common::bound_primitive(&mut editor, "Counter", "count");
    let before = state(&editor, primitive);

    let (plain, slot) = common::node_with_input(&mut editor, "TextPlain", "text");
    let err = editor.connect(primitive, 0, plain, slot).unwrap_err();
    assert!(matches!(err, GraphError::SlotTypeMismatch { .. }));
    assert_eq!(state(&editor, primitive), before);
    assert_eq!(editor.graph().link_ids().len(), 1);
}

#[test]
fn test_indivisible_step_rejects_connection() {
    let mut editor = common::editor();
    let (primitive, _) = common::bound_primitive(&mut editor, "StepSix", "count");
    let before = state(&editor, primitive);
    let links_before = editor.graph().link_ids();

    let id = editor.create_node("Counter").unwrap();
    editor.convert_widget_to_input(id, "count").unwrap();
    // Replace the declared step with one that does not divide 6.
    let node = editor.graph_mut().node_mut(id).unwrap();
    let slot = node.input_for_widget("count").unwrap();
    node.inputs[slot].widget = Some(widget_inputs::graph::WidgetRef::captured(
        "count",
        common::int_config(Some(0.0), Some(100.0), Some(4.0)),
    ));

    let err = editor.connect(primitive, 0, id, slot).unwrap_err();
    assert!(matches!(err, GraphError::Rejected { .. }));
    assert_eq!(editor.graph().link_ids(), links_before);
    assert_eq!(state(&editor, primitive), before);
}

#[test]
fn test_mismatched_combo_rejects_connection() {
    let mut editor = common::editor();
    let (primitive, _) = common::bound_primitive(&mut editor, "CheckpointLoader", "ckpt_name");
    let (other, slot) = common::node_with_input(&mut editor, "OtherLoader", "ckpt_name");

    let err = editor.connect(primitive, 0, other, slot).unwrap_err();
    assert!(matches!(err, GraphError::Rejected { .. }));

    let (same, slot) = common::node_with_input(&mut editor, "CheckpointLoader", "ckpt_name");
    assert!(editor.connect(primitive, 0, same, slot).is_ok());
    assert!(state(&editor, primitive).merged_config().is_none());
}

#[test]
fn test_non_widget_input_rejects_connection() {
    let mut editor = common::editor();
    let primitive = editor.create_node(PRIMITIVE_NODE_TYPE).unwrap();
    let sampler = editor.create_node("KSampler").unwrap();

    // `model` has no widget constructor.
    let err = editor.connect(primitive, 0, sampler, 0).unwrap_err();
    assert!(matches!(err, GraphError::Rejected { .. }));
    assert!(editor.node(primitive).unwrap().widgets.is_empty());
}

#[test]
fn test_bare_typed_input_gets_synthesized_config() {
    let mut editor = common::editor();
    let target = editor.create_node("TextPlain").unwrap();
    editor
        .graph_mut()
        .node_mut(target)
        .unwrap()
        .inputs
        .push(InputSlot::new("count", SlotType::Typed(SemanticType::Int)));
    let primitive = editor.create_node(PRIMITIVE_NODE_TYPE).unwrap();

    editor.connect(primitive, 0, target, 0).unwrap();

    let node = editor.node(primitive).unwrap();
    assert_eq!(node.outputs[0].ty, SlotType::Typed(SemanticType::Int));
    assert_eq!(node.widgets[0].kind, WidgetKind::Number);
    assert_eq!(node.widgets[0].value, WidgetValue::Number(0.0));
    assert_eq!(node.widgets[0].options.min, None);
}

#[test]
fn test_last_disconnect_returns_to_empty() {
    let mut editor = common::editor();
    let (primitive, target) = common::bound_primitive(&mut editor, "Counter", "count");
    let removed = Rc::new(RefCell::new(Vec::new()));
    for widget in &mut editor.graph_mut().node_mut(primitive).unwrap().widgets {
        let removed = removed.clone();
        *widget = widget
            .clone()
            .with_on_remove(move |name| removed.borrow_mut().push(name.to_string()));
    }

    let slot = editor.node(target).unwrap().input_for_widget("count").unwrap();
    editor.disconnect_input(target, slot).unwrap();

    let node = editor.node(primitive).unwrap();
    assert_eq!(node.outputs[0].ty, SlotType::Wildcard);
    assert_eq!(node.outputs[0].name, PRIMITIVE_OUTPUT_NAME);
    assert!(node.outputs[0].widget.is_none());
    assert!(node.widgets.is_empty());
    assert_eq!(state(&editor, primitive), PrimitiveState::default());
    assert_eq!(
        *removed.borrow(),
        vec!["value".to_string(), VALUE_CONTROL_WIDGET_NAME.to_string()]
    );
}

#[test]
fn test_removing_constraining_consumer_rebuilds_from_remaining() {
    let mut editor = common::editor();
    let (primitive, _) = common::bound_primitive(&mut editor, "Counter", "count");
    let (bounded, _) = {
        let (id, slot) = common::node_with_input(&mut editor, "Bounded", "count");
        editor.connect(primitive, 0, id, slot).unwrap();
        (id, slot)
    };
    assert!(state(&editor, primitive).merged_config().is_some());

    editor.remove_node(bounded).unwrap();

    let state = state(&editor, primitive);
    assert!(state.merged_config().is_none());
    let widget = &editor.node(primitive).unwrap().widgets[0];
    assert_eq!(widget.options.min, Some(0.0));
    assert_eq!(widget.options.max, Some(100.0));
}

#[test]
fn test_first_consumer_removal_rebases_on_the_next() {
    let mut editor = common::editor();
    let (primitive, counter) = common::bound_primitive(&mut editor, "Counter", "count");
    let (bounded, slot) = common::node_with_input(&mut editor, "Bounded", "count");
    editor.connect(primitive, 0, bounded, slot).unwrap();
    let (third, slot) = common::node_with_input(&mut editor, "Bounded", "count");
    editor.connect(primitive, 0, third, slot).unwrap();

    editor.remove_node(counter).unwrap();

    let node = editor.node(primitive).unwrap();
    assert_eq!(node.outputs[0].widget.as_ref().unwrap().name, "count");
    let base = state(&editor, primitive).base_config().cloned().unwrap();
    assert_eq!(base.options.min, Some(5.0));
    assert_eq!(base.options.max, Some(50.0));
}

#[test]
fn test_remaining_consumer_rebinds_output() {
    let mut editor = common::editor();
    let (primitive, plain) = common::bound_primitive(&mut editor, "TextPlain", "text");
    let forced = editor.create_node("Forced").unwrap();
    let slot = editor.node(forced).unwrap().input_for_widget("prefix").unwrap();
    editor.connect(primitive, 0, forced, slot).unwrap();
    assert!(state(&editor, primitive).merged_config().is_none());

    editor.remove_node(plain).unwrap();
    let node = editor.node(primitive).unwrap();
    assert_eq!(node.outputs[0].links.len(), 1);
    assert_eq!(node.outputs[0].widget.as_ref().unwrap().name, "prefix");
    let state = state(&editor, primitive);
    assert!(state.base_config().expect("bound to a consumer").options.default_input);
}

#[test]
fn test_relay_is_traversed() {
    let mut editor = common::editor();
    let primitive = editor.create_node(PRIMITIVE_NODE_TYPE).unwrap();
    let relay = editor.create_node(RELAY_NODE_TYPE).unwrap();
    let (target, slot) = common::node_with_input(&mut editor, "Counter", "count");

    editor.connect(primitive, 0, relay, 0).unwrap();
    assert!(editor.node(primitive).unwrap().widgets.is_empty());

    editor.connect(relay, 0, target, slot).unwrap();
    let node = editor.node(primitive).unwrap();
    assert_eq!(node.outputs[0].ty, SlotType::Typed(SemanticType::Int));
    assert_eq!(node.widgets[0].value, WidgetValue::Number(7.0));

    editor
        .set_widget_value(primitive, "value", WidgetValue::Number(11.0))
        .unwrap();
    assert_eq!(common::widget_value(&editor, target, "count"), WidgetValue::Number(11.0));
}

#[test]
fn test_relay_connection_is_validated_against_primitive() {
    let mut editor = common::editor();
    let (primitive, _) = common::bound_primitive(&mut editor, "CheckpointLoader", "ckpt_name");
    let relay = editor.create_node(RELAY_NODE_TYPE).unwrap();
    editor.connect(primitive, 0, relay, 0).unwrap();

    let (other, slot) = common::node_with_input(&mut editor, "OtherLoader", "ckpt_name");
    let err = editor.connect(relay, 0, other, slot).unwrap_err();
    assert!(matches!(err, GraphError::Rejected { .. }));
}

#[test]
fn test_rejected_relay_fan_out_leaves_primitive_unchanged() {
    let mut editor = common::editor();
    let (primitive, counter) = common::bound_primitive(&mut editor, "Counter", "count");
    editor
        .set_widget_value(primitive, "value", WidgetValue::Number(2.0))
        .unwrap();

    // The relay feeds one narrowing consumer and one of the wrong type.
    let relay = editor.create_node(RELAY_NODE_TYPE).unwrap();
    let (bounded, bounded_slot) = common::node_with_input(&mut editor, "Bounded", "count");
    let (sampler, cfg_slot) = common::node_with_input(&mut editor, "KSampler", "cfg");
    editor.connect(relay, 0, bounded, bounded_slot).unwrap();
    editor.connect(relay, 0, sampler, cfg_slot).unwrap();

    let before = state(&editor, primitive);
    let links = editor.graph().link_ids();
    let err = editor.connect(primitive, 0, relay, 0).unwrap_err();
    assert!(matches!(err, GraphError::Rejected { .. }));

    assert_eq!(state(&editor, primitive), before);
    assert!(state(&editor, primitive).merged_config().is_none());
    assert_eq!(editor.graph().link_ids(), links);
    let widget = &editor.node(primitive).unwrap().widgets[0];
    assert_eq!(widget.options.min, Some(0.0));
    assert_eq!(widget.options.max, Some(100.0));
    assert_eq!(common::primitive_value(&editor, primitive), WidgetValue::Number(2.0));
    assert_eq!(common::widget_value(&editor, counter, "count"), WidgetValue::Number(2.0));
    assert_eq!(common::widget_value(&editor, bounded, "count"), WidgetValue::Number(20.0));
}

#[test]
fn test_relay_fan_out_merges_all_consumers() {
    let mut editor = common::editor();
    let (primitive, counter) = common::bound_primitive(&mut editor, "Counter", "count");
    editor
        .set_widget_value(primitive, "value", WidgetValue::Number(2.0))
        .unwrap();

    let relay = editor.create_node(RELAY_NODE_TYPE).unwrap();
    let (bounded, slot) = common::node_with_input(&mut editor, "Bounded", "count");
    editor.connect(relay, 0, bounded, slot).unwrap();
    editor.connect(primitive, 0, relay, 0).unwrap();

    let state = state(&editor, primitive);
    let merged = state.merged_config().expect("bounds narrowed");
    assert_eq!(merged.options.min, Some(5.0));
    assert_eq!(merged.options.max, Some(50.0));
    assert_eq!(common::primitive_value(&editor, primitive), WidgetValue::Number(5.0));
    assert_eq!(common::widget_value(&editor, counter, "count"), WidgetValue::Number(5.0));
    assert_eq!(common::widget_value(&editor, bounded, "count"), WidgetValue::Number(5.0));
}

#[test]
fn test_cyclic_relays_terminate() {
    let mut graph = Graph::new();
    let primitive = graph.add_node(create_primitive_node());
    let a = graph.add_node(Node::relay());
    let b = graph.add_node(Node::relay());
    let into_a = graph.add_link(primitive, 0, a, 0).unwrap();
    graph.add_link(a, 0, b, 0).unwrap();
    let back = graph.add_link(b, 0, a, 0).unwrap();

    // A relay has a single input, so closing the loop dropped the primitive's link.
    assert!(graph.link(into_a).is_none());
    assert!(graph.resolve_outgoing_links(primitive, 0).is_empty());
    assert!(graph.resolve_outgoing_links(a, 0).is_empty());
    assert_eq!(graph.resolve_origin(back), None);
}

#[test]
fn test_double_click_spawns_connected_primitive() {
    let mut editor = common::editor();
    let (target, slot) = common::node_with_input(&mut editor, "KSampler", "steps");
    editor.graph_mut().node_mut(target).unwrap().pos = [500.0, 100.0];

    let spawned = editor
        .double_click_input(target, slot, Instant::now())
        .unwrap()
        .expect("steps has a widget constructor");

    let node = editor.node(spawned).unwrap();
    let width = create_primitive_node().size[0];
    assert_eq!(node.pos, [500.0 - width - 30.0, 100.0]);
    assert_eq!(node.title, "steps");
    assert_eq!(node.outputs[0].ty, SlotType::Typed(SemanticType::Int));
    assert_eq!(node.widgets[0].value, WidgetValue::Number(20.0));
}

#[test]
fn test_double_click_avoids_occupied_positions() {
    let mut editor = common::editor();
    let (target, slot) = common::node_with_input(&mut editor, "KSampler", "sampler_name");
    editor.graph_mut().node_mut(target).unwrap().pos = [500.0, 100.0];
    let width = create_primitive_node().size[0];
    let blocker = editor.create_node("Counter").unwrap();
    editor.graph_mut().node_mut(blocker).unwrap().pos = [500.0 - width - 30.0, 100.0];

    let spawned = editor
        .double_click_input(target, slot, Instant::now())
        .unwrap()
        .expect("combo inputs qualify");
    assert_eq!(editor.node(spawned).unwrap().pos, [500.0 - width - 30.0, 130.0]);
    assert_eq!(editor.node(spawned).unwrap().widgets[0].kind, WidgetKind::Combo);
}

#[test]
fn test_double_click_is_debounced() {
    let mut editor = common::editor();
    let (target, slot) = common::node_with_input(&mut editor, "Counter", "count");
    let now = Instant::now();

    assert!(editor.double_click_input(target, slot, now).unwrap().is_some());
    let count = editor.graph().node_count();
    assert!(
        editor
            .double_click_input(target, slot, now + Duration::from_millis(100))
            .unwrap()
            .is_none()
    );
    assert_eq!(editor.graph().node_count(), count);

    assert!(
        editor
            .double_click_input(target, slot, now + Duration::from_millis(400))
            .unwrap()
            .is_some()
    );
}

#[test]
fn test_failed_double_click_spawn_is_rolled_back() {
    let mut editor = common::editor();
    let (target, slot) = common::node_with_input(&mut editor, "Counter", "count");
    let input = &mut editor.graph_mut().node_mut(target).unwrap().inputs[slot];
    input.widget.as_mut().unwrap().source = ConfigSource::Unbound;
    let count = editor.graph().node_count();
    let now = Instant::now();

    let err = editor.double_click_input(target, slot, now).unwrap_err();
    assert!(matches!(err, GraphError::Rejected { .. }));
    assert_eq!(editor.graph().node_count(), count);

    // Not debounced: nothing was spawned.
    let input = &mut editor.graph_mut().node_mut(target).unwrap().inputs[slot];
    input.widget.as_mut().unwrap().source = ConfigSource::Declared;
    let spawned = editor.double_click_input(target, slot, now).unwrap();
    assert!(spawned.is_some());
    assert_eq!(editor.graph().node_count(), count + 1);
}

#[test]
fn test_loading_clears_double_click_state() {
    let mut editor = common::editor();
    let (target, slot) = common::node_with_input(&mut editor, "Counter", "count");
    let now = Instant::now();
    assert!(editor.double_click_input(target, slot, now).unwrap().is_some());

    let doc = editor.save();
    editor.load(&doc).unwrap();
    let spawned = editor
        .double_click_input(target, slot, now + Duration::from_millis(10))
        .unwrap();
    assert!(spawned.is_some());
}

#[test]
fn test_double_click_ignores_non_widget_inputs_and_loading() {
    let mut editor = common::editor();
    let sampler = editor.create_node("KSampler").unwrap();
    assert!(editor.double_click_input(sampler, 0, Instant::now()).unwrap().is_none());

    let (target, slot) = common::node_with_input(&mut editor, "Counter", "count");
    let mut hooks = WidgetInputs::new(common::catalog(), WidgetRegistry::new());
    let spawn = hooks.on_input_dbl_click(editor.graph(), target, slot, LoadPhase::Loading, Instant::now());
    assert!(spawn.is_none());
    let spawn = hooks.on_input_dbl_click(editor.graph(), target, slot, LoadPhase::Idle, Instant::now());
    assert!(spawn.is_some());
}

#[test]
fn test_refresh_definitions_updates_combo_primitive() {
    let mut editor = common::editor();
    let (primitive, loader) = common::bound_primitive(&mut editor, "CheckpointLoader", "ckpt_name");
    editor
        .set_widget_value(primitive, "value", WidgetValue::Text("b.safetensors".to_string()))
        .unwrap();

    let refreshed = NodeCatalog::from_json(
        r#"{ "CheckpointLoader": {
            "input": { "required": { "ckpt_name": [["c.safetensors", "a.safetensors"]] } },
            "output": ["MODEL"]
        }}"#,
    )
    .unwrap();
    editor.refresh_definitions(refreshed);

    let widget = &editor.node(primitive).unwrap().widgets[0];
    assert_eq!(
        widget.options.values,
        Some(vec!["c.safetensors".to_string(), "a.safetensors".to_string()])
    );
    assert_eq!(widget.value, WidgetValue::Text("c.safetensors".to_string()));
    assert_eq!(
        common::widget_value(&editor, loader, "ckpt_name"),
        WidgetValue::Text("c.safetensors".to_string())
    );
}
