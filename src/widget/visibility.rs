//! Hiding a widget behind an input slot and bringing it back.

use super::{HiddenState, SerializeMode, SizeMode, Widget, WidgetKind, WidgetValue};
use crate::graph::Node;
use std::mem;

/// Hides `widget_name` on `node`, and its linked companions with it.
///
/// The widget's kind, size and serialization are recorded and replaced: it
/// turns into a converted marker, takes no room, and only serializes while the
/// input slot mirroring it is linked. Hiding a hidden widget does nothing.
pub fn hide_widget(node: &mut Node, widget_name: &str) {
    hide_with_suffix(node, widget_name, None);
}

fn hide_with_suffix(node: &mut Node, widget_name: &str, suffix: Option<String>) {
    let Some(widget) = node.widget_mut(widget_name) else {
        return;
    };
    if widget.hidden.is_some() {
        return;
    }

    widget.hidden = Some(HiddenState {
        kind: mem::replace(&mut widget.kind, WidgetKind::Converted { suffix }),
        size: mem::replace(&mut widget.size, SizeMode::Collapsed),
        serialize: mem::replace(&mut widget.serialize, SerializeMode::WhenLinked),
    });

    // e.g. seed + control_after_generate
    let companions = widget.linked_widgets.clone();
    for companion in companions {
        hide_with_suffix(node, &companion, Some(format!(":{}", widget_name)));
    }
}

/// Restores everything [`hide_widget`] recorded. Showing a visible widget does nothing.
pub fn show_widget(node: &mut Node, widget_name: &str) {
    let Some(widget) = node.widget_mut(widget_name) else {
        return;
    };
    let Some(original) = widget.hidden.take() else {
        return;
    };

    widget.kind = original.kind;
    widget.size = original.size;
    widget.serialize = original.serialize;

    let companions = widget.linked_widgets.clone();
    for companion in companions {
        show_widget(node, &companion);
    }
}

/// The value `widget` contributes when its node is serialized for execution.
pub fn serialize_value(node: &Node, widget: &Widget) -> Option<WidgetValue> {
    match widget.serialize {
        SerializeMode::Value => Some(widget.value.clone()),
        SerializeMode::Skip => None,
        SerializeMode::WhenLinked => {
            let linked = node
                .inputs
                .iter()
                .find(|input| input.widget.as_ref().is_some_and(|w| w.name == widget.name))
                .is_some_and(|input| input.link.is_some());
            if !linked {
                return None;
            }
            match widget.hidden.as_ref().map(|h| h.serialize) {
                Some(SerializeMode::Skip) => None,
                _ => Some(widget.value.clone()),
            }
        }
    }
}
