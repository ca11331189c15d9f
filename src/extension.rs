//! Lifecycle hooks the host invokes on behalf of the widget-inputs extension.
//!
//! Each hook takes the graph and the id of the node the event concerns, plus
//! the current [`LoadPhase`]. Hooks never fail: resolution errors are logged and
//! the node is left as it was.

use crate::config::{ConfigType, NodeCatalog, SemanticType};
use crate::constants::{DOUBLE_CLICK_DEBOUNCE, NODE_TITLE_HEIGHT, SPAWN_OFFSET_X};
use crate::convert::{self, MenuAction, MenuEntry};
use crate::error::ResolveError;
use crate::graph::{ConfigSource, Graph, LinkId, NodeId, SlotType};
use crate::primitive::{PrimitiveNode, create_primitive_node};
use crate::widget::control::{control_mode, next_value};
use crate::widget::visibility::hide_widget;
use crate::widget::{PointerContext, WidgetRegistry};
use ahash::AHashMap;
use rand::Rng;
use std::time::Instant;

/// Whether the host is in the middle of loading a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
}

impl LoadPhase {
    pub fn is_loading(self) -> bool {
        self == LoadPhase::Loading
    }
}

/// Where and how to spawn a primitive for a double-clicked input.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSpawn {
    pub pos: [f32; 2],
    pub title: String,
    pub target_id: NodeId,
    pub target_slot: usize,
}

/// The extension: node metadata, widget constructors and per-input click state.
pub struct WidgetInputs {
    catalog: NodeCatalog,
    registry: WidgetRegistry,
    last_spawn: AHashMap<(NodeId, usize), Instant>,
}

impl WidgetInputs {
    pub fn new(catalog: NodeCatalog, registry: WidgetRegistry) -> Self {
        Self {
            catalog,
            registry,
            last_spawn: AHashMap::new(),
        }
    }

    pub fn catalog(&self) -> &NodeCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut NodeCatalog {
        &mut self.catalog
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    /// A primitive view over `node_id`, or `None` if it is not a primitive.
    pub fn primitive<'a>(&'a self, graph: &'a mut Graph, node_id: NodeId) -> Option<PrimitiveNode<'a>> {
        PrimitiveNode::new(graph, &self.catalog, &self.registry, node_id).ok()
    }

    fn is_regular(graph: &Graph, node_id: NodeId) -> bool {
        graph.node(node_id).is_some_and(|n| !n.is_virtual())
    }

    /// Conversion entries for the node's context menu.
    pub fn extra_menu_options(&self, graph: &Graph, node_id: NodeId) -> Vec<Option<MenuEntry>> {
        match graph.node(node_id) {
            Some(node) if !node.is_virtual() => convert::conversion_menu(&self.catalog, node),
            _ => Vec::new(),
        }
    }

    pub fn apply_menu_action(
        &self,
        graph: &mut Graph,
        node_id: NodeId,
        action: &MenuAction,
    ) -> Result<(), ResolveError> {
        match action {
            MenuAction::ToInput { widget, config } => {
                let node = graph.try_node_mut(node_id)?;
                if node.widget(widget).is_none() {
                    return Err(ResolveError::WidgetNotFound {
                        node_id,
                        name: widget.clone(),
                    });
                }
                convert::convert_to_input(node, widget, config);
                Ok(())
            }
            MenuAction::ToWidget { widget } => convert::convert_to_widget(graph, node_id, widget),
        }
    }

    /// Binds every widget input to its declared config, hides the widgets the
    /// inputs stand in for and drops inputs whose widget no longer exists.
    ///
    /// Older documents stored the config inline. A stored choice list means the
    /// input was a combo, so its slot and link type become `COMBO`.
    pub fn on_graph_configured(&self, graph: &mut Graph, node_id: NodeId) {
        if !Self::is_regular(graph, node_id) {
            return;
        }
        let mut orphans = Vec::new();
        let mut retyped_links: Vec<LinkId> = Vec::new();

        let Some(node) = graph.node_mut(node_id) else {
            return;
        };
        for index in 0..node.inputs.len() {
            let input = &mut node.inputs[index];
            let Some(widget) = input.widget.as_mut() else {
                continue;
            };
            if widget.source == ConfigSource::Unbound {
                widget.source = ConfigSource::Declared;
            }
            if let Some(legacy) = widget.legacy_config.take() {
                if matches!(legacy.ty, ConfigType::Choices(_)) {
                    input.ty = SlotType::Typed(SemanticType::Combo);
                    retyped_links.extend(input.link);
                }
            }

            let name = widget.name.clone();
            if node.widget(&name).is_some() {
                hide_widget(node, &name);
            } else {
                orphans.push(name);
            }
        }

        for link_id in retyped_links {
            graph.set_link_type(link_id, SlotType::Typed(SemanticType::Combo));
        }
        for name in orphans {
            if let Err(err) = convert::convert_to_widget(graph, node_id, &name) {
                log::debug!("orphaned input '{}' on node {} kept: {}", name, node_id, err);
            }
        }
    }

    /// Converts `forceInput`/`defaultInput` widgets of a freshly created node.
    pub fn on_node_created(&self, graph: &mut Graph, node_id: NodeId, phase: LoadPhase) {
        if phase.is_loading() || !Self::is_regular(graph, node_id) {
            return;
        }
        let Some(node) = graph.node(node_id) else {
            return;
        };
        let pending: Vec<_> = node
            .widgets
            .iter()
            .filter(|w| !w.is_hidden() && (w.options.force_input || w.options.default_input))
            .filter_map(|w| self.catalog.widget_config(node, &w.name).map(|c| (w.name.clone(), c)))
            .collect();

        let Some(node) = graph.node_mut(node_id) else {
            return;
        };
        for (name, config) in pending {
            convert::convert_to_input(node, &name, &config);
        }
    }

    /// Sets up widget inputs of a node configured outside a document load (paste).
    pub fn on_configure(&self, graph: &mut Graph, node_id: NodeId, phase: LoadPhase) {
        if phase.is_loading() || !Self::is_regular(graph, node_id) {
            return;
        }
        let Some(node) = graph.node_mut(node_id) else {
            return;
        };
        let mut names = Vec::new();
        for input in &mut node.inputs {
            if let Some(widget) = input.widget.as_mut() {
                if widget.source == ConfigSource::Unbound {
                    widget.source = ConfigSource::Declared;
                }
                names.push(widget.name.clone());
            }
        }
        for name in names {
            hide_widget(node, &name);
        }
    }

    /// Decides whether double-clicking `slot` spawns a primitive feeding it.
    ///
    /// Only inputs a primitive could drive qualify: their type has a widget
    /// constructor, or their config is a choice list. Repeated clicks within
    /// the debounce window are ignored.
    pub fn on_input_dbl_click(
        &mut self,
        graph: &Graph,
        node_id: NodeId,
        slot: usize,
        phase: LoadPhase,
        now: Instant,
    ) -> Option<PrimitiveSpawn> {
        if phase.is_loading() {
            return None;
        }
        let node = graph.node(node_id).filter(|n| !n.is_virtual())?;
        let input = node.inputs.get(slot)?;

        let registered = input.ty.semantic().is_some_and(|ty| self.registry.contains(ty));
        let is_combo = graph
            .input_config(&self.catalog, node_id, slot)
            .is_some_and(|config| config.ty.choices().is_some());
        if !registered && !is_combo {
            return None;
        }

        if let Some(last) = self.last_spawn.get(&(node_id, slot)) {
            if now.saturating_duration_since(*last) < DOUBLE_CLICK_DEBOUNCE {
                log::debug!("ignoring repeated double click on node {} slot {}", node_id, slot);
                return None;
            }
        }
        self.last_spawn
            .retain(|_, last| now.saturating_duration_since(*last) < DOUBLE_CLICK_DEBOUNCE);
        self.last_spawn.insert((node_id, slot), now);

        let width = create_primitive_node().size[0];
        let mut pos = [node.pos[0] - width - SPAWN_OFFSET_X, node.pos[1]];
        while graph.is_node_at(pos) {
            pos[1] += NODE_TITLE_HEIGHT;
        }

        Some(PrimitiveSpawn {
            pos,
            title: input.name.clone(),
            target_id: node_id,
            target_slot: slot,
        })
    }

    /// Clears the debounce for `slot`, after a spawn for it was rolled back.
    pub fn forget_spawn(&mut self, node_id: NodeId, slot: usize) {
        self.last_spawn.remove(&(node_id, slot));
    }

    /// Drops per-input click state for a node leaving the graph.
    pub fn on_node_removed(&mut self, node_id: NodeId) {
        self.last_spawn.retain(|(id, _), _| *id != node_id);
    }

    /// Drops all per-input click state, before a document replaces the graph.
    pub fn reset_spawns(&mut self) {
        self.last_spawn.clear();
    }

    /// Pre-connect validation for a link leaving `origin_id`.
    pub fn on_connect_output(
        &self,
        graph: &mut Graph,
        origin_id: NodeId,
        target_id: NodeId,
        target_slot: usize,
        phase: LoadPhase,
    ) -> bool {
        if phase.is_loading() {
            return true;
        }
        match self.primitive(graph, origin_id) {
            Some(mut primitive) => primitive.on_connect_output(target_id, target_slot),
            None => true,
        }
    }

    /// A link on `node_id`'s output was added or removed.
    pub fn on_connections_change(&self, graph: &mut Graph, node_id: NodeId, connected: bool, phase: LoadPhase) {
        // Rebuilds run once from on_after_graph_configured instead.
        if phase.is_loading() {
            return;
        }
        if let Some(mut primitive) = self.primitive(graph, node_id) {
            if let Err(err) = primitive.on_connections_change(connected) {
                log::debug!("primitive {} not updated: {}", node_id, err);
            }
        }
    }

    pub fn on_after_graph_configured(&self, graph: &mut Graph, node_id: NodeId) {
        if let Some(mut primitive) = self.primitive(graph, node_id) {
            if let Err(err) = primitive.on_after_graph_configured() {
                log::debug!("primitive {} not restored: {}", node_id, err);
            }
        }
    }

    /// Re-reads combo choices on every primitive after definitions were refreshed.
    pub fn on_definitions_refreshed(&self, graph: &mut Graph) {
        for node_id in graph.node_ids() {
            if let Some(mut primitive) = self.primitive(graph, node_id) {
                if let Err(err) = primitive.refresh_combo() {
                    log::debug!("primitive {} combo not refreshed: {}", node_id, err);
                }
            }
        }
    }

    /// Pushes every primitive's value onto its consumers.
    pub fn apply_primitives(&self, graph: &mut Graph) {
        for node_id in graph.node_ids() {
            if let Some(mut primitive) = self.primitive(graph, node_id) {
                primitive.apply_to_graph(&PointerContext::default());
            }
        }
    }

    /// Advances every widget that has a value-control companion, after a run was queued.
    pub fn after_queued<R: Rng + ?Sized>(&self, graph: &mut Graph, rng: &mut R) {
        for node_id in graph.node_ids() {
            let Some(node) = graph.node(node_id) else {
                continue;
            };
            let is_primitive = node.is_primitive();
            let updates: Vec<_> = node
                .widgets
                .iter()
                .filter(|w| !w.is_hidden())
                .filter_map(|w| {
                    let mode = control_mode(node, w)?;
                    next_value(w, mode, rng).map(|value| (w.name.clone(), value))
                })
                .collect();

            for (name, value) in updates {
                let ctx = PointerContext::default();
                if is_primitive {
                    if let Some(mut primitive) = self.primitive(graph, node_id) {
                        if let Err(err) = primitive.set_value(value, &ctx) {
                            log::debug!("primitive {} not advanced: {}", node_id, err);
                        }
                    }
                } else if let Some(widget) = graph.node_mut(node_id).and_then(|n| n.widget_mut(&name)) {
                    widget.set_value(value, &ctx);
                }
            }
        }
    }
}
