//! The host side: owns the graph and dispatches lifecycle events to the hooks.
//!
//! [`Editor`] plays the part of the canvas application. It creates nodes from
//! the catalog, loads and saves documents, makes and breaks links, and calls
//! into [`WidgetInputs`] at the same points a real host would.

use crate::config::{ConfigType, NodeCatalog, WidgetConfig};
use crate::constants::{NODE_SLOT_HEIGHT, PRIMITIVE_NODE_TYPE, RELAY_NODE_TYPE};
use crate::convert::{MenuAction, MenuEntry};
use crate::error::{GraphError, ResolveError};
use crate::extension::{LoadPhase, WidgetInputs};
use crate::graph::{
    ConfigSource, Graph, GraphDocument, InputSlot, LinkDocument, LinkId, Node, NodeDocument, NodeId,
    OutputSlot, SlotType,
};
use crate::primitive::create_primitive_node;
use crate::widget::control::{ControlMode, add_value_control_widget};
use crate::widget::visibility::serialize_value;
use crate::widget::{PointerContext, WidgetFactory, WidgetKind, WidgetRegistry, WidgetValue};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Numeric inputs that get a value-control companion when created.
const SEED_INPUTS: [&str; 2] = ["seed", "noise_seed"];

/// One input of a queued node: a literal widget value or `[origin_id, slot]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptInput {
    Link(String, usize),
    Value(WidgetValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptNode {
    pub class_type: String,
    pub inputs: BTreeMap<String, PromptInput>,
}

/// Executable form of the graph, keyed by node id.
pub type Prompt = BTreeMap<String, PromptNode>;

/// Builder for [`Editor`], for registering extra widget constructors.
pub struct EditorBuilder {
    catalog: NodeCatalog,
    registry: WidgetRegistry,
}

impl EditorBuilder {
    pub fn with_widget_factory(mut self, factory: Box<dyn WidgetFactory>) -> Self {
        self.registry.register(factory);
        self
    }

    pub fn build(self) -> Editor {
        Editor {
            graph: Graph::new(),
            widget_inputs: WidgetInputs::new(self.catalog, self.registry),
            phase: LoadPhase::Idle,
        }
    }
}

pub struct Editor {
    graph: Graph,
    widget_inputs: WidgetInputs,
    phase: LoadPhase,
}

impl Editor {
    pub fn new(catalog: NodeCatalog) -> Self {
        Self::builder(catalog).build()
    }

    pub fn builder(catalog: NodeCatalog) -> EditorBuilder {
        EditorBuilder {
            catalog,
            registry: WidgetRegistry::new(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn widget_inputs(&self) -> &WidgetInputs {
        &self.widget_inputs
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node(id)
    }

    /// Builds an unattached node of `type_name` with its declared widgets and slots.
    fn instantiate(&self, type_name: &str) -> Result<Node, GraphError> {
        match type_name {
            PRIMITIVE_NODE_TYPE => return Ok(create_primitive_node()),
            RELAY_NODE_TYPE => return Ok(Node::relay()),
            _ => {}
        }

        let definition = self
            .widget_inputs
            .catalog()
            .get(type_name)
            .ok_or_else(|| GraphError::UnknownNodeType(type_name.to_string()))?;
        let title = definition
            .display_name
            .as_deref()
            .unwrap_or(&definition.name);
        let mut node = Node::new(type_name, title);

        for decl in definition.inputs() {
            match self.widget_inputs.registry().build(&decl.name, &decl.config) {
                Some(widget) => {
                    node.widgets.push(widget);
                    if decl.config.ty.is_numeric() && SEED_INPUTS.contains(&decl.name.as_str()) {
                        add_value_control_widget(&mut node, &decl.name, ControlMode::Randomize);
                    }
                }
                None => node.inputs.push(InputSlot::new(
                    &decl.name,
                    SlotType::Typed(decl.config.slot_type()),
                )),
            }
        }

        for (index, ty) in definition.output.iter().enumerate() {
            let name = definition
                .output_name
                .get(index)
                .cloned()
                .unwrap_or_else(|| ty.to_string());
            node.outputs.push(OutputSlot::new(&name, SlotType::Typed(ty.clone())));
        }

        layout_widgets(&mut node);
        node.size = node.compute_size();
        Ok(node)
    }

    /// Creates a node of `type_name` and runs the node-created hook.
    pub fn create_node(&mut self, type_name: &str) -> Result<NodeId, GraphError> {
        let node = self.instantiate(type_name)?;
        let id = self.graph.add_node(node);
        self.widget_inputs.on_node_created(&mut self.graph, id, self.phase);
        log::debug!("created {} node {}", type_name, id);
        Ok(id)
    }

    /// The real node behind `node_id`: itself, or the origin feeding a relay.
    fn upstream_origin(&self, node_id: NodeId) -> NodeId {
        self.graph
            .node(node_id)
            .filter(|n| n.is_relay())
            .and_then(|n| n.inputs.first()?.link)
            .and_then(|link| self.graph.resolve_origin(link))
            .map_or(node_id, |(origin, _)| origin)
    }

    fn notify_connections_change(&mut self, origin_id: NodeId, upstream: NodeId, connected: bool) {
        self.widget_inputs
            .on_connections_change(&mut self.graph, origin_id, connected, self.phase);
        if upstream != origin_id {
            self.widget_inputs
                .on_connections_change(&mut self.graph, upstream, connected, self.phase);
        }
    }

    /// Connects an output to an input, replacing the input's current link.
    ///
    /// The connection is refused when the slot types differ or the origin's
    /// pre-connect hook rejects it; the graph is unchanged in that case.
    pub fn connect(
        &mut self,
        origin_id: NodeId,
        origin_slot: usize,
        target_id: NodeId,
        target_slot: usize,
    ) -> Result<LinkId, GraphError> {
        let output_ty = self
            .graph
            .try_node(origin_id)?
            .outputs
            .get(origin_slot)
            .map(|o| o.ty.clone())
            .ok_or(ResolveError::OutputNotFound {
                node_id: origin_id,
                slot: origin_slot,
            })?;
        let input = self
            .graph
            .try_node(target_id)?
            .inputs
            .get(target_slot)
            .ok_or(ResolveError::InputNotFound {
                node_id: target_id,
                slot: target_slot,
            })?;
        if !output_ty.accepts(&input.ty) {
            return Err(GraphError::SlotTypeMismatch {
                output: output_ty.to_string(),
                input: input.ty.to_string(),
            });
        }
        let (input_ty, replaced) = (input.ty.clone(), input.link);

        let upstream = self.upstream_origin(origin_id);
        if !self.widget_inputs.on_connect_output(
            &mut self.graph,
            upstream,
            target_id,
            target_slot,
            self.phase,
        ) {
            return Err(GraphError::Rejected {
                origin_id,
                target_id,
            });
        }

        if let Some(old) = replaced {
            self.disconnect(old)?;
        }

        let link_id = self
            .graph
            .add_link(origin_id, origin_slot, target_id, target_slot)?;
        if output_ty == SlotType::Wildcard {
            self.graph.set_link_type(link_id, input_ty);
        }
        self.notify_connections_change(origin_id, upstream, true);
        Ok(link_id)
    }

    /// Removes a link and notifies its origin.
    pub fn disconnect(&mut self, link_id: LinkId) -> Result<(), GraphError> {
        let origin_id = self.graph.try_link(link_id)?.origin_id;
        let upstream = self.upstream_origin(origin_id);
        self.graph.remove_link(link_id);
        self.notify_connections_change(origin_id, upstream, false);
        Ok(())
    }

    pub fn disconnect_input(&mut self, node_id: NodeId, slot: usize) -> Result<(), GraphError> {
        let link = self
            .graph
            .try_node(node_id)?
            .inputs
            .get(slot)
            .ok_or(ResolveError::InputNotFound { node_id, slot })?
            .link;
        match link {
            Some(link_id) => self.disconnect(link_id),
            None => Ok(()),
        }
    }

    /// Removes a node after disconnecting every link touching it.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<Node, GraphError> {
        let node = self.graph.try_node(node_id)?;
        let links: Vec<LinkId> = node
            .inputs
            .iter()
            .filter_map(|i| i.link)
            .chain(node.outputs.iter().flat_map(|o| o.links.iter().copied()))
            .collect();
        for link_id in links {
            self.disconnect(link_id)?;
        }
        self.widget_inputs.on_node_removed(node_id);
        Ok(self
            .graph
            .remove_node(node_id)
            .ok_or(ResolveError::NodeNotFound(node_id))?)
    }

    /// Copies slots, values and placement from a document onto a fresh node.
    fn configure_node(node: &mut Node, doc: &NodeDocument) {
        node.pos = doc.pos;
        if doc.size != [0.0, 0.0] {
            node.size = doc.size;
        }
        if let Some(title) = &doc.title {
            node.title = title.clone();
        }
        if !doc.inputs.is_empty() || node.is_virtual() {
            node.inputs = doc.inputs.clone();
        }
        if !doc.outputs.is_empty() {
            node.outputs = doc.outputs.clone();
        }
        for input in &mut node.inputs {
            input.link = None;
        }
        for output in &mut node.outputs {
            output.links.clear();
        }
        for (widget, value) in node.widgets.iter_mut().zip(&doc.widgets_values) {
            widget.value = value.clone();
        }
        node.widgets_values = doc.widgets_values.clone();
    }

    /// Replaces the graph with `doc`.
    ///
    /// Hooks that rebuild widgets are suppressed while the nodes and links are
    /// restored, then run once per node after the graph is complete.
    pub fn load(&mut self, doc: &GraphDocument) -> Result<(), GraphError> {
        self.phase = LoadPhase::Loading;
        let result = self.load_document(doc);
        self.phase = LoadPhase::Idle;
        result?;

        for node_id in self.graph.node_ids() {
            self.widget_inputs
                .on_after_graph_configured(&mut self.graph, node_id);
        }
        log::info!(
            "loaded {} nodes and {} links",
            self.graph.node_count(),
            doc.links.len()
        );
        Ok(())
    }

    fn load_document(&mut self, doc: &GraphDocument) -> Result<(), GraphError> {
        self.graph.clear();
        self.widget_inputs.reset_spawns();

        for node_doc in &doc.nodes {
            let mut node = self.instantiate(&node_doc.type_name)?;
            node.id = node_doc.id;
            Self::configure_node(&mut node, node_doc);
            self.graph.add_node(node);
        }

        for link_doc in &doc.links {
            let LinkDocument(link_id, origin_id, _, target_id, _, _) = *link_doc;
            for node_id in [origin_id, target_id] {
                if self.graph.node(node_id).is_none() {
                    return Err(GraphError::DanglingLink { link_id, node_id });
                }
            }
            self.graph.insert_link(link_doc.clone().into());
        }
        self.graph.reserve_ids(doc.last_node_id, doc.last_link_id);

        for node_id in self.graph.node_ids() {
            self.widget_inputs.on_graph_configured(&mut self.graph, node_id);
        }
        Ok(())
    }

    /// Serializes the graph, nodes and links in id order.
    pub fn save(&self) -> GraphDocument {
        GraphDocument {
            last_node_id: self.graph.last_node_id(),
            last_link_id: self.graph.last_link_id(),
            nodes: self
                .graph
                .node_ids()
                .into_iter()
                .filter_map(|id| self.graph.node(id))
                .map(NodeDocument::from_node)
                .collect(),
            links: self
                .graph
                .link_ids()
                .into_iter()
                .filter_map(|id| self.graph.link(id))
                .map(LinkDocument::from)
                .collect(),
        }
    }

    /// Pastes a copied node under a fresh id. Its links are not carried over.
    pub fn paste(&mut self, doc: &NodeDocument) -> Result<NodeId, GraphError> {
        let node = self.instantiate(&doc.type_name)?;
        let id = self.graph.add_node(node);
        self.widget_inputs.on_node_created(&mut self.graph, id, self.phase);

        let node = self.graph.try_node_mut(id)?;
        Self::configure_node(node, doc);
        self.widget_inputs.on_configure(&mut self.graph, id, self.phase);
        Ok(id)
    }

    /// Sets a widget value as a user edit would, running its callback.
    ///
    /// On a primitive, the value is also pushed to every consumer.
    pub fn set_widget_value(
        &mut self,
        node_id: NodeId,
        widget_name: &str,
        value: WidgetValue,
    ) -> Result<(), GraphError> {
        let ctx = PointerContext::default();
        let node = self.graph.try_node(node_id)?;
        let is_primary = node.is_primitive() && node.widgets.first().is_some_and(|w| w.name == widget_name);

        if is_primary {
            if let Some(mut primitive) = self.widget_inputs.primitive(&mut self.graph, node_id) {
                primitive.set_value(value, &ctx)?;
            }
            return Ok(());
        }

        self.graph
            .try_node_mut(node_id)?
            .widget_mut(widget_name)
            .ok_or_else(|| ResolveError::WidgetNotFound {
                node_id,
                name: widget_name.to_string(),
            })?
            .set_value(value, &ctx);
        Ok(())
    }

    /// Double-click on an input: spawns and connects a primitive when the input qualifies.
    pub fn double_click_input(
        &mut self,
        node_id: NodeId,
        slot: usize,
        now: Instant,
    ) -> Result<Option<NodeId>, GraphError> {
        let Some(spawn) =
            self.widget_inputs
                .on_input_dbl_click(&self.graph, node_id, slot, self.phase, now)
        else {
            return Ok(None);
        };

        let primitive_id = self.create_node(PRIMITIVE_NODE_TYPE)?;
        self.graph.try_node_mut(primitive_id)?.pos = spawn.pos;
        if let Err(err) = self.connect(primitive_id, 0, spawn.target_id, spawn.target_slot) {
            self.graph.remove_node(primitive_id);
            self.widget_inputs.forget_spawn(spawn.target_id, spawn.target_slot);
            return Err(err);
        }
        self.graph.try_node_mut(primitive_id)?.title = spawn.title;
        Ok(Some(primitive_id))
    }

    pub fn menu(&self, node_id: NodeId) -> Vec<Option<MenuEntry>> {
        self.widget_inputs.extra_menu_options(&self.graph, node_id)
    }

    pub fn run_menu_action(&mut self, node_id: NodeId, action: &MenuAction) -> Result<(), GraphError> {
        // Break the input's link first so its origin hears about it.
        if let MenuAction::ToWidget { widget } = action {
            let node = self.graph.try_node(node_id)?;
            let link = node
                .input_for_widget(widget)
                .and_then(|slot| node.inputs[slot].link);
            if let Some(link_id) = link {
                self.disconnect(link_id)?;
            }
        }
        self.widget_inputs
            .apply_menu_action(&mut self.graph, node_id, action)?;
        Ok(())
    }

    /// Converts a widget to an input through the same path as the menu entry.
    pub fn convert_widget_to_input(&mut self, node_id: NodeId, widget_name: &str) -> Result<(), GraphError> {
        let node = self.graph.try_node(node_id)?;
        let config: WidgetConfig = self
            .widget_inputs
            .catalog()
            .widget_config(node, widget_name)
            .ok_or_else(|| ResolveError::MissingConfig {
                node_id,
                name: widget_name.to_string(),
            })?;
        self.run_menu_action(
            node_id,
            &MenuAction::ToInput {
                widget: widget_name.to_string(),
                config,
            },
        )
    }

    pub fn convert_input_to_widget(&mut self, node_id: NodeId, widget_name: &str) -> Result<(), GraphError> {
        self.run_menu_action(
            node_id,
            &MenuAction::ToWidget {
                widget: widget_name.to_string(),
            },
        )
    }

    /// Builds the executable prompt after pushing primitive values into the graph.
    pub fn graph_to_prompt(&mut self) -> Prompt {
        self.widget_inputs.apply_primitives(&mut self.graph);

        let mut prompt = Prompt::new();
        for node_id in self.graph.node_ids() {
            let Some(node) = self.graph.node(node_id).filter(|n| !n.is_virtual()) else {
                continue;
            };

            let mut inputs = BTreeMap::new();
            for widget in &node.widgets {
                if let Some(value) = serialize_value(node, widget) {
                    inputs.insert(widget.name.clone(), PromptInput::Value(value));
                }
            }
            for input in &node.inputs {
                let Some((origin_id, slot)) = input.link.and_then(|l| self.graph.resolve_origin(l)) else {
                    continue;
                };
                // Values from virtual nodes already sit in the widget.
                if self.graph.node(origin_id).is_some_and(Node::is_virtual) {
                    continue;
                }
                inputs.insert(input.name.clone(), PromptInput::Link(origin_id.to_string(), slot));
            }

            prompt.insert(
                node_id.to_string(),
                PromptNode {
                    class_type: node.type_name.clone(),
                    inputs,
                },
            );
        }
        prompt
    }

    /// Advances value-control widgets once a prompt was queued.
    pub fn after_queued<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.widget_inputs.after_queued(&mut self.graph, rng);
    }

    /// Applies queued resizes. Returns the nodes that were resized.
    pub fn next_frame(&mut self) -> Vec<NodeId> {
        let pending = self.graph.take_pending_resizes();
        for node_id in &pending {
            if let Some(node) = self.graph.node_mut(*node_id) {
                let current = node.size;
                node.grow_to_fit(current);
            }
        }
        pending
    }

    /// Merges refreshed definitions and updates combo choices across the graph.
    pub fn refresh_definitions(&mut self, catalog: NodeCatalog) {
        self.widget_inputs.catalog_mut().merge(catalog);

        for node_id in self.graph.node_ids() {
            let Some(node) = self.graph.node(node_id).filter(|n| !n.is_virtual()) else {
                continue;
            };
            let updates: Vec<(String, Vec<String>)> = node
                .widgets
                .iter()
                .filter(|w| *w.original_kind() == WidgetKind::Combo)
                .filter_map(|w| {
                    let config = self.widget_inputs.catalog().resolve(&node.type_name, &w.name)?;
                    Some((w.name.clone(), config.ty.choices()?.to_vec()))
                })
                .collect();

            let Some(node) = self.graph.node_mut(node_id) else {
                continue;
            };
            for (name, values) in updates {
                if let Some(widget) = node.widget_mut(&name) {
                    widget.options.values = Some(values.clone());
                }
                let captured = node
                    .inputs
                    .iter_mut()
                    .filter_map(|i| i.widget.as_mut())
                    .filter(|w| w.name == name)
                    .filter_map(|w| match &mut w.source {
                        ConfigSource::Captured(config) => Some(config),
                        _ => None,
                    });
                for config in captured {
                    config.ty = ConfigType::Choices(values.clone());
                }
            }
        }

        self.widget_inputs.on_definitions_refreshed(&mut self.graph);
    }
}

/// Stacks widgets below the slot rows.
fn layout_widgets(node: &mut Node) {
    let rows = node.inputs.len().max(node.outputs.len()).max(1) as f32;
    let mut y = rows * NODE_SLOT_HEIGHT + 6.0;
    for widget in &mut node.widgets {
        widget.last_y = y;
        y += widget.compute_height();
    }
}
