//! The primitive node: a virtual node whose single widget takes its type and
//! constraints from whatever it is connected to.
//!
//! A primitive starts out **empty**, with a wildcard output and no widget. The
//! first outgoing link binds it: the consumer's config decides the output type
//! and the widget that gets built. Further links must be compatible with the
//! current config and may narrow it (see [`crate::merge`]), which rebuilds the
//! widget. Removing the last link returns the node to the empty state.

use crate::config::{NodeCatalog, NodeDefinition, WidgetConfig};
use crate::constants::{
    PRIMITIVE_CATEGORY, PRIMITIVE_NODE_TYPE, PRIMITIVE_OUTPUT_NAME, PRIMITIVE_TITLE,
    PRIMITIVE_WIDGET_NAME,
};
use crate::error::ResolveError;
use crate::graph::{Graph, LinkId, Node, NodeId, NodeKind, OutputSlot, SlotType, WidgetRef};
use crate::merge::merge_configs;
use crate::widget::control::{self, ControlMode};
use crate::widget::{PointerContext, Widget, WidgetKind, WidgetRegistry, WidgetValue};

/// Per-node state of a primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimitiveState {
    /// Config of the first consumer.
    base: Option<WidgetConfig>,
    /// Intersection of all consumers' configs, once one was needed.
    merged: Option<WidgetConfig>,
}

impl PrimitiveState {
    pub fn base_config(&self) -> Option<&WidgetConfig> {
        self.base.as_ref()
    }

    pub fn merged_config(&self) -> Option<&WidgetConfig> {
        self.merged.as_ref()
    }

    /// The config the widget is currently built from.
    pub fn effective_config(&self) -> Option<&WidgetConfig> {
        self.merged.as_ref().or(self.base.as_ref())
    }
}

/// A fresh, empty primitive node.
pub fn create_primitive_node() -> Node {
    let mut node = Node::new(PRIMITIVE_NODE_TYPE, PRIMITIVE_TITLE);
    node.outputs
        .push(OutputSlot::new(PRIMITIVE_OUTPUT_NAME, SlotType::Wildcard));
    node.kind = NodeKind::Primitive(PrimitiveState::default());
    node.size = node.compute_size();
    node
}

/// Registration metadata for the primitive node type, for node pickers.
pub fn primitive_definition() -> NodeDefinition {
    NodeDefinition {
        name: PRIMITIVE_NODE_TYPE.to_string(),
        display_name: Some(PRIMITIVE_TITLE.to_string()),
        category: PRIMITIVE_CATEGORY.to_string(),
        ..NodeDefinition::default()
    }
}

/// The widget input at the far end of one of the primitive's links.
struct Consumer {
    node_id: NodeId,
    widget: WidgetRef,
    config: WidgetConfig,
}

/// Lifecycle operations of one primitive node, borrowing the graph for their duration.
pub struct PrimitiveNode<'a> {
    graph: &'a mut Graph,
    catalog: &'a NodeCatalog,
    registry: &'a WidgetRegistry,
    id: NodeId,
}

impl<'a> PrimitiveNode<'a> {
    pub fn new(
        graph: &'a mut Graph,
        catalog: &'a NodeCatalog,
        registry: &'a WidgetRegistry,
        id: NodeId,
    ) -> Result<Self, ResolveError> {
        if !graph.try_node(id)?.is_primitive() {
            return Err(ResolveError::NotPrimitive(id));
        }
        Ok(Self {
            graph,
            catalog,
            registry,
            id,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    fn node(&self) -> Result<&Node, ResolveError> {
        self.graph.try_node(self.id)
    }

    fn node_mut(&mut self) -> Result<&mut Node, ResolveError> {
        self.graph.try_node_mut(self.id)
    }

    fn state_mut(&mut self) -> Result<&mut PrimitiveState, ResolveError> {
        let id = self.id;
        self.node_mut()?
            .primitive_state_mut()
            .ok_or(ResolveError::NotPrimitive(id))
    }

    pub fn effective_config(&self) -> Option<WidgetConfig> {
        self.graph
            .node(self.id)
            .and_then(Node::primitive_state)
            .and_then(|state| state.effective_config().cloned())
    }

    fn has_direct_links(&self) -> bool {
        self.graph
            .node(self.id)
            .and_then(|n| n.outputs.first())
            .is_some_and(|output| !output.links.is_empty())
    }

    fn has_widgets(&self) -> bool {
        self.graph.node(self.id).is_some_and(|n| !n.widgets.is_empty())
    }

    /// Outgoing links with relay nodes expanded.
    pub fn links(&self) -> Vec<LinkId> {
        self.graph.resolve_outgoing_links(self.id, 0)
    }

    /// The config `target_id`'s input `slot` expects from a primitive.
    ///
    /// Widget-backed inputs report their widget's config. A bare typed input
    /// qualifies too when its type has a registered widget factory; it gets a
    /// config-only back-reference with no options.
    fn consumer_config(
        &self,
        target_id: NodeId,
        slot: usize,
    ) -> Result<(WidgetRef, WidgetConfig), ResolveError> {
        let target = self.graph.try_node(target_id)?;
        let input = target.inputs.get(slot).ok_or(ResolveError::InputNotFound {
            node_id: target_id,
            slot,
        })?;

        match &input.widget {
            Some(widget) => {
                let config = self
                    .graph
                    .widget_ref_config(self.catalog, target_id, widget)
                    .ok_or_else(|| ResolveError::MissingConfig {
                        node_id: target_id,
                        name: widget.name.clone(),
                    })?;
                Ok((widget.clone(), config))
            }
            None => {
                let ty = input
                    .ty
                    .semantic()
                    .filter(|ty| self.registry.contains(ty))
                    .ok_or_else(|| ResolveError::NotWidgetInput {
                        node_id: target_id,
                        name: input.name.clone(),
                    })?;
                let config = WidgetConfig::bare(ty.clone());
                Ok((WidgetRef::captured(&input.name, config.clone()), config))
            }
        }
    }

    fn first_consumer(&self) -> Result<Consumer, ResolveError> {
        let link_id = *self.links().first().ok_or(ResolveError::NoLinks(self.id))?;
        let link = self.graph.try_link(link_id)?;
        let node_id = link.target_id;
        let (widget, config) = self.consumer_config(node_id, link.target_slot)?;
        Ok(Consumer {
            node_id,
            widget,
            config,
        })
    }

    /// Restricts the output to the consumer's type and remembers its config.
    fn bind_output(&mut self, consumer: &Consumer) -> Result<(), ResolveError> {
        let id = self.id;
        let ty = SlotType::Typed(consumer.config.slot_type());
        let output = self
            .node_mut()?
            .outputs
            .first_mut()
            .ok_or(ResolveError::OutputNotFound { node_id: id, slot: 0 })?;
        output.name = ty.to_string();
        output.ty = ty;
        output.widget = Some(consumer.widget.clone());
        self.state_mut()?.base = Some(consumer.config.clone());
        Ok(())
    }

    /// Empty → bound: infer the type from the first consumer and build the widget.
    pub fn on_first_connection(&mut self, recreating: bool) -> Result<(), ResolveError> {
        let consumer = self.first_consumer()?;
        self.bind_output(&consumer)?;
        let config = self
            .state_mut()?
            .merged
            .clone()
            .unwrap_or_else(|| consumer.config.clone());
        self.create_widget(&config, consumer.node_id, &consumer.widget.name, recreating)
    }

    fn create_widget(
        &mut self,
        config: &WidgetConfig,
        consumer_id: NodeId,
        consumer_widget: &str,
        recreating: bool,
    ) -> Result<(), ResolveError> {
        let mut widget = self
            .registry
            .build(PRIMITIVE_WIDGET_NAME, config)
            .unwrap_or_else(|| {
                Widget::new(
                    PRIMITIVE_WIDGET_NAME,
                    WidgetKind::Custom(config.slot_type().to_string()),
                    WidgetValue::Null,
                )
            });

        if let Some(theirs) = self
            .graph
            .node(consumer_id)
            .and_then(|n| n.widget(consumer_widget))
        {
            widget.value = theirs.value.clone();
        }

        let with_control = matches!(widget.kind, WidgetKind::Number | WidgetKind::Combo);
        let id = self.id;
        let node = self.node_mut()?;
        node.widgets.push(widget);
        if with_control {
            control::add_value_control_widget(node, PRIMITIVE_WIDGET_NAME, ControlMode::Fixed);
        }

        if !recreating {
            let current = node.size;
            node.grow_to_fit(current);
            self.graph.request_resize(id);
        }
        Ok(())
    }

    /// Rebuilds the widget from the current config, keeping the current values.
    fn recreate_widget(&mut self) -> Result<(), ResolveError> {
        let values: Vec<WidgetValue> = self.node()?.widgets.iter().map(|w| w.value.clone()).collect();
        self.remove_widgets()?;
        self.on_first_connection(true)?;
        for (widget, value) in self.node_mut()?.widgets.iter_mut().zip(values) {
            widget.value = value;
        }
        Ok(())
    }

    fn remove_widgets(&mut self) -> Result<(), ResolveError> {
        for widget in self.node_mut()?.widgets.drain(..) {
            if let Some(hook) = &widget.on_remove {
                hook.call(&widget.name);
            }
        }
        Ok(())
    }

    /// Checks a consumer's config against the current one, merging when needed.
    ///
    /// When the check narrowed the config, or `force_update` is set, the widget
    /// is rebuilt and its value clamped into the new bounds and pushed to every
    /// consumer. Rejections are logged and leave the node untouched.
    pub fn is_valid_connection(&mut self, input: &WidgetConfig, force_update: bool) -> bool {
        let Some(current) = self.effective_config() else {
            log::debug!("primitive {} is not bound, accepting connection", self.id);
            return true;
        };

        let merged = match merge_configs(&current, input) {
            Ok(merged) => merged,
            Err(err) => {
                log::info!("connection rejected: {}", err);
                return false;
            }
        };

        if merged.is_none() && !force_update {
            return true;
        }
        if let Some(options) = merged {
            match self.state_mut() {
                Ok(state) => state.merged = Some(WidgetConfig::new(current.ty.clone(), options)),
                Err(err) => log::debug!("merged config dropped: {}", err),
            }
        }
        if let Err(err) = self.rebuild_and_clamp() {
            log::debug!("primitive {} rebuild aborted: {}", self.id, err);
        }
        true
    }

    fn rebuild_and_clamp(&mut self) -> Result<(), ResolveError> {
        self.recreate_widget()?;
        // Empty while the consumer is being deleted.
        let Some(value) = self.node()?.widgets.first().map(Widget::clamped_value) else {
            return Ok(());
        };
        self.set_value(value, &PointerContext::default())
    }

    /// Recomputes the merged config across all current links.
    pub fn merge_all_connections(&mut self) -> Result<(), ResolveError> {
        let had_merged = self.state_mut()?.merged.take().is_some();
        let links = self.links();

        if links.len() < 2 {
            // The remaining consumer may not be the one the output was bound to.
            match (links.len(), had_merged) {
                (1, true) => self.recreate_widget()?,
                (1, false) => {
                    let consumer = self.first_consumer()?;
                    self.bind_output(&consumer)?;
                }
                _ => {}
            }
            return Ok(());
        }

        let consumer = self.first_consumer()?;
        self.bind_output(&consumer)?;
        // Non-numeric consumers were only accepted when identical to the base.
        if !consumer.config.ty.is_numeric() {
            return Ok(());
        }

        for link_id in links {
            let Some(link) = self.graph.link(link_id) else {
                continue;
            };
            let (target_id, slot) = (link.target_id, link.target_slot);
            match self.consumer_config(target_id, slot) {
                Ok((_, config)) => {
                    self.is_valid_connection(&config, had_merged);
                }
                Err(err) => log::debug!("skipping link {}: {}", link_id, err),
            }
        }
        Ok(())
    }

    /// Bound → empty: wildcard output, no back-reference, no widgets.
    pub fn on_last_disconnect(&mut self) -> Result<(), ResolveError> {
        let node = self.node_mut()?;
        if let Some(output) = node.outputs.first_mut() {
            output.ty = SlotType::Wildcard;
            output.name = PRIMITIVE_OUTPUT_NAME.to_string();
            output.widget = None;
        }
        if let Some(state) = node.primitive_state_mut() {
            *state = PrimitiveState::default();
        }
        self.remove_widgets()
    }

    /// Pre-connect validation for a link from this primitive to `target_id`'s `slot`.
    ///
    /// A relay target is checked against every consumer it feeds. The configs
    /// are merged in full before anything is stored, so a rejection by any one
    /// consumer leaves the primitive and its consumers untouched.
    pub fn on_connect_output(&mut self, target_id: NodeId, target_slot: usize) -> bool {
        let targets: Vec<(NodeId, usize)> = match self.graph.node(target_id) {
            Some(target) if target.is_relay() => self
                .graph
                .resolve_outgoing_links(target_id, 0)
                .into_iter()
                .filter_map(|l| self.graph.link(l).map(|l| (l.target_id, l.target_slot)))
                .collect(),
            Some(_) => vec![(target_id, target_slot)],
            None => return false,
        };

        let mut configs = Vec::with_capacity(targets.len());
        for (node_id, slot) in targets {
            match self.consumer_config(node_id, slot) {
                Ok((_, config)) => configs.push(config),
                Err(err) => {
                    log::info!("connection rejected: {}", err);
                    return false;
                }
            }
        }

        let mut merged = match self.effective_config() {
            Some(current) if self.has_direct_links() => current,
            _ => return true,
        };
        let mut narrowed = false;
        for config in &configs {
            match merge_configs(&merged, config) {
                Ok(Some(options)) => {
                    merged = WidgetConfig::new(merged.ty.clone(), options);
                    narrowed = true;
                }
                Ok(None) => {}
                Err(err) => {
                    log::info!("connection rejected: {}", err);
                    return false;
                }
            }
        }

        if narrowed {
            match self.state_mut() {
                Ok(state) => state.merged = Some(merged),
                Err(err) => log::debug!("merged config dropped: {}", err),
            }
            if let Err(err) = self.rebuild_and_clamp() {
                log::debug!("primitive {} rebuild aborted: {}", self.id, err);
            }
        }
        true
    }

    /// Reacts to a link being added to or removed from the output.
    pub fn on_connections_change(&mut self, connected: bool) -> Result<(), ResolveError> {
        let has_links = self.has_direct_links();
        let has_widgets = self.has_widgets();

        if connected {
            if !has_links {
                return Ok(());
            }
            return match has_widgets {
                false => self.on_first_connection(false),
                true => self.merge_all_connections(),
            };
        }

        // The removed link may have been the one constraining the config.
        if has_widgets {
            if let Err(err) = self.merge_all_connections() {
                log::debug!("primitive {} merge aborted: {}", self.id, err);
            }
        }
        if !has_links {
            self.on_last_disconnect()?;
        }
        Ok(())
    }

    /// Builds the widget once a loaded graph is complete, then restores saved values.
    pub fn on_after_graph_configured(&mut self) -> Result<(), ResolveError> {
        if !self.has_direct_links() || self.has_widgets() {
            return Ok(());
        }
        self.on_first_connection(false)?;

        let node = self.node_mut()?;
        let saved = node.widgets_values.clone();
        for (widget, value) in node.widgets.iter_mut().zip(saved) {
            widget.value = value;
        }
        self.merge_all_connections()
    }

    /// Sets the value the way a user edit does: the widget's own callback runs,
    /// then the value is pushed to every consumer.
    pub fn set_value(&mut self, value: WidgetValue, ctx: &PointerContext) -> Result<(), ResolveError> {
        let id = self.id;
        self.node_mut()?
            .widgets
            .first_mut()
            .ok_or_else(|| ResolveError::WidgetNotFound {
                node_id: id,
                name: PRIMITIVE_WIDGET_NAME.to_string(),
            })?
            .set_value(value, ctx);
        self.apply_to_graph(ctx);
        Ok(())
    }

    /// Copies the value onto every consuming widget and runs their callbacks.
    pub fn apply_to_graph(&mut self, ctx: &PointerContext) {
        let Some(value) = self
            .graph
            .node(self.id)
            .and_then(|n| n.widgets.first())
            .map(|w| w.value.clone())
        else {
            return;
        };

        for link_id in self.links() {
            let Some(link) = self.graph.link(link_id) else {
                continue;
            };
            let (target_id, slot) = (link.target_id, link.target_slot);
            let Some(target) = self.graph.node_mut(target_id) else {
                continue;
            };
            let Some(name) = target
                .inputs
                .get(slot)
                .and_then(|input| input.widget.as_ref())
                .map(|w| w.name.clone())
            else {
                continue;
            };
            if let Some(widget) = target.widget_mut(&name) {
                widget.set_value(value.clone(), ctx);
            }
        }
    }

    /// Re-reads a combo's choices from its consumer after definitions changed.
    pub fn refresh_combo(&mut self) -> Result<(), ResolveError> {
        let is_combo = self
            .node()?
            .widgets
            .first()
            .is_some_and(|w| w.kind == WidgetKind::Combo);
        if !is_combo {
            return Ok(());
        }

        let consumer = self.first_consumer()?;
        let config = self
            .graph
            .node(consumer.node_id)
            .and_then(|n| self.catalog.resolve(&n.type_name, &consumer.widget.name))
            .unwrap_or(consumer.config);
        let Some(values) = config.ty.choices().map(<[String]>::to_vec) else {
            return Ok(());
        };
        self.state_mut()?.base = Some(config);

        let id = self.id;
        let widget = self
            .node_mut()?
            .widgets
            .first_mut()
            .ok_or_else(|| ResolveError::WidgetNotFound {
                node_id: id,
                name: PRIMITIVE_WIDGET_NAME.to_string(),
            })?;
        widget.options.values = Some(values.clone());

        let allowed = widget
            .value
            .as_str()
            .is_some_and(|v| values.iter().any(|c| c == v));
        match values.first() {
            Some(first) if !allowed => {
                self.set_value(WidgetValue::Text(first.clone()), &PointerContext::default())
            }
            _ => Ok(()),
        }
    }
}
