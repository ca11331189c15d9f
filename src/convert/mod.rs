//! Converting inline widgets into graph inputs and back.

use crate::config::{ConfigType, NodeCatalog, SemanticType, WidgetConfig};
use crate::constants::NODE_SLOT_HEIGHT;
use crate::error::ResolveError;
use crate::graph::{Graph, InputSlot, Node, NodeId, SlotType, WidgetRef};
use crate::widget::visibility::{hide_widget, show_widget};
use crate::widget::{Widget, WidgetKind};

/// Whether `widget` may be turned into an input, given its config.
///
/// Inputs that can only ever be linked (`forceInput`) stay put.
pub fn is_convertible(widget: &Widget, config: &WidgetConfig) -> bool {
    if widget.options.force_input {
        return false;
    }
    let kind_ok = widget.original_kind().is_primitive();
    let config_ok = match &config.ty {
        ConfigType::Choices(_) => true,
        ConfigType::Scalar(ty) => matches!(
            ty,
            SemanticType::Int
                | SemanticType::Float
                | SemanticType::Str
                | SemanticType::Bool
                | SemanticType::Combo
        ),
    };
    kind_ok || config_ok
}

fn shift_widgets(node: &mut Node, dy: f32) {
    for widget in &mut node.widgets {
        widget.last_y += dy;
    }
}

/// Hides `widget_name` and adds an input slot standing in for it.
pub fn convert_to_input(node: &mut Node, widget_name: &str, config: &WidgetConfig) {
    hide_widget(node, widget_name);

    let previous = node.size;
    let ty = SlotType::Typed(config.slot_type());
    node.inputs.push(InputSlot::for_widget(
        widget_name,
        ty,
        WidgetRef::captured(widget_name, config.clone()),
    ));

    // The new slot row sits above every widget.
    shift_widgets(node, NODE_SLOT_HEIGHT);
    node.grow_to_fit(previous);
}

/// Shows `widget_name` again and removes the input slot mirroring it.
///
/// Also used to drop orphaned widget inputs, in which case there is no widget
/// to show and only the slot goes away.
pub fn convert_to_widget(
    graph: &mut Graph,
    node_id: NodeId,
    widget_name: &str,
) -> Result<(), ResolveError> {
    let node = graph.try_node_mut(node_id)?;
    show_widget(node, widget_name);
    let previous = node.size;
    let index = node
        .input_for_widget(widget_name)
        .ok_or_else(|| ResolveError::NotWidgetInput {
            node_id,
            name: widget_name.to_string(),
        })?;

    graph.remove_input(node_id, index)?;

    let node = graph.try_node_mut(node_id)?;
    shift_widgets(node, -NODE_SLOT_HEIGHT);
    node.grow_to_fit(previous);
    Ok(())
}

/// What a conversion menu entry does when picked.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuAction {
    ToInput { widget: String, config: WidgetConfig },
    ToWidget { widget: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub label: String,
    pub action: MenuAction,
}

/// Context-menu entries for `node`'s widgets. `None` marks a separator.
///
/// "Convert to input" entries come first, then "Convert to widget" entries,
/// each group followed by a separator.
pub fn conversion_menu(catalog: &NodeCatalog, node: &Node) -> Vec<Option<MenuEntry>> {
    let mut to_input = Vec::new();
    let mut to_widget = Vec::new();

    for widget in &node.widgets {
        if widget.options.force_input {
            continue;
        }
        if widget.kind == (WidgetKind::Converted { suffix: None }) {
            to_widget.push(MenuEntry {
                label: format!("Convert {} to widget", widget.name),
                action: MenuAction::ToWidget {
                    widget: widget.name.clone(),
                },
            });
        } else if !widget.is_hidden() {
            let Some(config) = catalog.widget_config(node, &widget.name) else {
                continue;
            };
            if is_convertible(widget, &config) {
                to_input.push(MenuEntry {
                    label: format!("Convert {} to input", widget.name),
                    action: MenuAction::ToInput {
                        widget: widget.name.clone(),
                        config,
                    },
                });
            }
        }
    }

    let mut entries = Vec::new();
    for group in [to_input, to_widget] {
        if !group.is_empty() {
            entries.extend(group.into_iter().map(Some));
            entries.push(None);
        }
    }
    entries
}
