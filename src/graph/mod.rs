//! In-memory host graph: nodes, slots and links.
//!
//! This is the surface the conversion hooks and the primitive node consume from
//! the editor host. It performs no validation of its own beyond referential
//! integrity; lifecycle events are dispatched by [`crate::editor::Editor`].

use crate::config::{NodeCatalog, SemanticType, WidgetConfig};
use crate::constants::{NODE_MIN_WIDTH, NODE_SLOT_HEIGHT, RELAY_NODE_TYPE, TITLE_CHAR_WIDTH};
use crate::error::ResolveError;
use crate::primitive::PrimitiveState;
use crate::widget::visibility::serialize_value;
use crate::widget::{Widget, WidgetValue};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub mod document;

pub use document::{GraphDocument, LinkDocument, NodeDocument};

pub type NodeId = u32;
pub type LinkId = u32;

/// Type carried by a slot or link. `*` accepts anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SlotType {
    Wildcard,
    Typed(SemanticType),
}

impl SlotType {
    pub fn accepts(&self, other: &SlotType) -> bool {
        match (self, other) {
            (SlotType::Wildcard, _) | (_, SlotType::Wildcard) => true,
            (SlotType::Typed(a), SlotType::Typed(b)) => a == b,
        }
    }

    pub fn semantic(&self) -> Option<&SemanticType> {
        match self {
            SlotType::Wildcard => None,
            SlotType::Typed(ty) => Some(ty),
        }
    }
}

impl From<SemanticType> for SlotType {
    fn from(ty: SemanticType) -> Self {
        SlotType::Typed(ty)
    }
}

impl From<String> for SlotType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "*" | "" => SlotType::Wildcard,
            other => SlotType::Typed(SemanticType::from(other)),
        }
    }
}

impl From<SlotType> for String {
    fn from(ty: SlotType) -> Self {
        ty.to_string()
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotType::Wildcard => f.write_str("*"),
            SlotType::Typed(ty) => write!(f, "{}", ty),
        }
    }
}

/// Where a widget back-reference gets its config from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConfigSource {
    /// Freshly deserialized; bound by the configure hooks.
    #[default]
    Unbound,
    /// Looked up in the owning node type's declarations on every access.
    Declared,
    /// Snapshot taken when the widget was converted.
    Captured(WidgetConfig),
}

/// Back-reference from a slot to the widget it stands in for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetRef {
    pub name: String,
    #[serde(skip)]
    pub source: ConfigSource,
    /// Inline config written by older documents.
    #[serde(default, rename = "config", skip_serializing)]
    pub legacy_config: Option<WidgetConfig>,
}

impl WidgetRef {
    pub fn captured(name: &str, config: WidgetConfig) -> Self {
        Self {
            name: name.to_string(),
            source: ConfigSource::Captured(config),
            legacy_config: None,
        }
    }

    pub fn declared(name: &str) -> Self {
        Self {
            name: name.to_string(),
            source: ConfigSource::Declared,
            legacy_config: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSlot {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SlotType,
    #[serde(default)]
    pub link: Option<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<WidgetRef>,
}

impl InputSlot {
    pub fn new(name: &str, ty: SlotType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            link: None,
            widget: None,
        }
    }

    pub fn for_widget(name: &str, ty: SlotType, widget: WidgetRef) -> Self {
        Self {
            widget: Some(widget),
            ..Self::new(name, ty)
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<LinkId>, D::Error> {
    Ok(Option::<Vec<LinkId>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSlot {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SlotType,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub links: Vec<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<WidgetRef>,
}

impl OutputSlot {
    pub fn new(name: &str, ty: SlotType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            links: Vec::new(),
            widget: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub origin_id: NodeId,
    pub origin_slot: usize,
    pub target_id: NodeId,
    pub target_slot: usize,
    pub ty: SlotType,
}

/// Behavior layered onto a node at registration time.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A node type from the catalog; executes on the backend.
    Regular,
    /// Virtual node mirroring one value into every connected widget.
    Primitive(PrimitiveState),
    /// Virtual pass-through node, transparent to endpoint resolution.
    Relay,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub type_name: String,
    pub title: String,
    pub pos: [f32; 2],
    pub size: [f32; 2],
    pub inputs: Vec<InputSlot>,
    pub outputs: Vec<OutputSlot>,
    pub widgets: Vec<Widget>,
    /// Values from a loaded document, kept for nodes that build widgets late.
    pub widgets_values: Vec<WidgetValue>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(type_name: &str, title: &str) -> Self {
        let mut node = Self {
            id: 0,
            type_name: type_name.to_string(),
            title: title.to_string(),
            pos: [0.0, 0.0],
            size: [0.0, 0.0],
            inputs: Vec::new(),
            outputs: Vec::new(),
            widgets: Vec::new(),
            widgets_values: Vec::new(),
            kind: NodeKind::Regular,
        };
        node.size = node.compute_size();
        node
    }

    pub fn relay() -> Self {
        let mut node = Self::new(RELAY_NODE_TYPE, RELAY_NODE_TYPE);
        node.inputs.push(InputSlot::new("", SlotType::Wildcard));
        node.outputs.push(OutputSlot::new("", SlotType::Wildcard));
        node.kind = NodeKind::Relay;
        node.size = [75.0, 26.0];
        node
    }

    pub fn is_relay(&self) -> bool {
        matches!(self.kind, NodeKind::Relay)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, NodeKind::Primitive(_))
    }

    /// Virtual nodes never reach the backend.
    pub fn is_virtual(&self) -> bool {
        !matches!(self.kind, NodeKind::Regular)
    }

    pub fn primitive_state(&self) -> Option<&PrimitiveState> {
        match &self.kind {
            NodeKind::Primitive(state) => Some(state),
            _ => None,
        }
    }

    pub fn primitive_state_mut(&mut self) -> Option<&mut PrimitiveState> {
        match &mut self.kind {
            NodeKind::Primitive(state) => Some(state),
            _ => None,
        }
    }

    pub fn widget(&self, name: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.name == name)
    }

    pub fn widget_mut(&mut self, name: &str) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.name == name)
    }

    /// Index of the input slot whose back-reference names `widget_name`.
    pub fn input_for_widget(&self, widget_name: &str) -> Option<usize> {
        self.inputs
            .iter()
            .position(|input| input.widget.as_ref().is_some_and(|w| w.name == widget_name))
    }

    pub fn compute_size(&self) -> [f32; 2] {
        let width = (self.title.chars().count() as f32 * TITLE_CHAR_WIDTH + 40.0).max(NODE_MIN_WIDTH);
        let rows = self.inputs.len().max(self.outputs.len()).max(1) as f32;
        let widgets: f32 = self.widgets.iter().map(Widget::compute_height).sum();
        [width, rows * NODE_SLOT_HEIGHT + 6.0 + widgets]
    }

    /// Sets the size to `previous`, grown where the computed size needs more room.
    pub fn grow_to_fit(&mut self, previous: [f32; 2]) {
        let needed = self.compute_size();
        self.size = [previous[0].max(needed[0]), previous[1].max(needed[1])];
    }

    /// The execution value of every widget that serializes one.
    pub fn serialized_widget_values(&self) -> Vec<(String, WidgetValue)> {
        self.widgets
            .iter()
            .filter_map(|w| serialize_value(self, w).map(|v| (w.name.clone(), v)))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct Graph {
    nodes: AHashMap<NodeId, Node>,
    links: AHashMap<LinkId, Link>,
    last_node_id: NodeId,
    last_link_id: LinkId,
    pending_resizes: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Adds `node`, keeping its id when set and free, and returns the id.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        if node.id == 0 || self.nodes.contains_key(&node.id) {
            self.last_node_id += 1;
            node.id = self.last_node_id;
        } else {
            self.last_node_id = self.last_node_id.max(node.id);
        }
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn try_node(&self, id: NodeId) -> Result<&Node, ResolveError> {
        self.node(id).ok_or(ResolveError::NodeNotFound(id))
    }

    pub fn try_node_mut(&mut self, id: NodeId) -> Result<&mut Node, ResolveError> {
        self.node_mut(id).ok_or(ResolveError::NodeNotFound(id))
    }

    /// Node ids in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().sorted().collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Removes a node and every link touching it, without lifecycle events.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let touching: Vec<LinkId> = self
            .links
            .values()
            .filter(|l| l.origin_id == id || l.target_id == id)
            .map(|l| l.id)
            .collect();
        for link_id in touching {
            self.remove_link(link_id);
        }
        self.nodes.remove(&id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn try_link(&self, id: LinkId) -> Result<&Link, ResolveError> {
        self.link(id).ok_or(ResolveError::LinkNotFound(id))
    }

    /// Link ids in ascending order.
    pub fn link_ids(&self) -> Vec<LinkId> {
        self.links.keys().copied().sorted().collect()
    }

    pub fn last_node_id(&self) -> NodeId {
        self.last_node_id
    }

    pub fn last_link_id(&self) -> LinkId {
        self.last_link_id
    }

    /// Raises the id counters to at least the given values.
    pub fn reserve_ids(&mut self, last_node_id: NodeId, last_link_id: LinkId) {
        self.last_node_id = self.last_node_id.max(last_node_id);
        self.last_link_id = self.last_link_id.max(last_link_id);
    }

    /// Creates a link and records it on both slots. An existing link into the
    /// target slot is dropped first.
    pub fn add_link(
        &mut self,
        origin_id: NodeId,
        origin_slot: usize,
        target_id: NodeId,
        target_slot: usize,
    ) -> Result<LinkId, ResolveError> {
        let ty = self
            .try_node(origin_id)?
            .outputs
            .get(origin_slot)
            .map(|o| o.ty.clone())
            .ok_or(ResolveError::OutputNotFound {
                node_id: origin_id,
                slot: origin_slot,
            })?;
        let replaced = self
            .try_node(target_id)?
            .inputs
            .get(target_slot)
            .ok_or(ResolveError::InputNotFound {
                node_id: target_id,
                slot: target_slot,
            })?
            .link;
        if let Some(old) = replaced {
            self.remove_link(old);
        }

        self.last_link_id += 1;
        let id = self.last_link_id;
        self.insert_link(Link {
            id,
            origin_id,
            origin_slot,
            target_id,
            target_slot,
            ty,
        });
        Ok(id)
    }

    /// Stores a link and wires it into both endpoint slots.
    pub fn insert_link(&mut self, link: Link) {
        self.last_link_id = self.last_link_id.max(link.id);
        if let Some(output) = self
            .nodes
            .get_mut(&link.origin_id)
            .and_then(|n| n.outputs.get_mut(link.origin_slot))
        {
            if !output.links.contains(&link.id) {
                output.links.push(link.id);
            }
        }
        if let Some(input) = self
            .nodes
            .get_mut(&link.target_id)
            .and_then(|n| n.inputs.get_mut(link.target_slot))
        {
            input.link = Some(link.id);
        }
        self.links.insert(link.id, link);
    }

    pub fn set_link_type(&mut self, id: LinkId, ty: SlotType) {
        if let Some(link) = self.links.get_mut(&id) {
            link.ty = ty;
        }
    }

    /// Removes a link from the graph and from both endpoint slots.
    pub fn remove_link(&mut self, id: LinkId) -> Option<Link> {
        let link = self.links.remove(&id)?;
        if let Some(output) = self
            .nodes
            .get_mut(&link.origin_id)
            .and_then(|n| n.outputs.get_mut(link.origin_slot))
        {
            output.links.retain(|l| *l != id);
        }
        if let Some(input) = self
            .nodes
            .get_mut(&link.target_id)
            .and_then(|n| n.inputs.get_mut(link.target_slot))
        {
            if input.link == Some(id) {
                input.link = None;
            }
        }
        Some(link)
    }

    /// Removes an input slot, its link, and re-indexes links into later slots.
    pub fn remove_input(&mut self, node_id: NodeId, index: usize) -> Result<InputSlot, ResolveError> {
        let link = self
            .try_node(node_id)?
            .inputs
            .get(index)
            .ok_or(ResolveError::InputNotFound { node_id, slot: index })?
            .link;
        if let Some(link_id) = link {
            self.remove_link(link_id);
        }

        let node = self.try_node_mut(node_id)?;
        let removed = node.inputs.remove(index);
        let shifted: Vec<LinkId> = node.inputs[index..].iter().filter_map(|i| i.link).collect();
        for link_id in shifted {
            if let Some(link) = self.links.get_mut(&link_id) {
                link.target_slot -= 1;
            }
        }
        Ok(removed)
    }

    pub fn request_resize(&mut self, node_id: NodeId) {
        if !self.pending_resizes.contains(&node_id) {
            self.pending_resizes.push(node_id);
        }
    }

    /// Drains resize notifications queued for the next frame.
    pub fn take_pending_resizes(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.pending_resizes)
    }

    pub fn is_node_at(&self, pos: [f32; 2]) -> bool {
        self.nodes.values().any(|n| n.pos == pos)
    }

    /// Links leaving `node_id`'s output `slot`, with relay nodes replaced by the
    /// links leaving them. Each relay is expanded once, so relay cycles terminate.
    pub fn resolve_outgoing_links(&self, node_id: NodeId, slot: usize) -> Vec<LinkId> {
        let mut visited = AHashSet::new();
        let mut resolved = Vec::new();
        self.collect_outgoing(node_id, slot, &mut visited, &mut resolved);
        resolved
    }

    fn collect_outgoing(
        &self,
        node_id: NodeId,
        slot: usize,
        visited: &mut AHashSet<NodeId>,
        resolved: &mut Vec<LinkId>,
    ) {
        if !visited.insert(node_id) {
            return;
        }
        let Some(output) = self.node(node_id).and_then(|n| n.outputs.get(slot)) else {
            return;
        };
        for link_id in &output.links {
            let Some(link) = self.link(*link_id) else {
                continue;
            };
            match self.node(link.target_id) {
                Some(target) if target.is_relay() => {
                    self.collect_outgoing(target.id, 0, visited, resolved)
                }
                Some(_) => resolved.push(*link_id),
                None => continue,
            }
        }
    }

    /// The real origin of a link, walking upstream through relay nodes.
    pub fn resolve_origin(&self, link_id: LinkId) -> Option<(NodeId, usize)> {
        let mut visited = AHashSet::new();
        let mut link = self.link(link_id)?;
        loop {
            let origin = self.node(link.origin_id)?;
            if !origin.is_relay() {
                return Some((link.origin_id, link.origin_slot));
            }
            if !visited.insert(origin.id) {
                return None;
            }
            link = self.link(origin.inputs.first()?.link?)?;
        }
    }

    /// The config behind a widget back-reference on `node_id`.
    pub fn widget_ref_config(
        &self,
        catalog: &NodeCatalog,
        node_id: NodeId,
        widget: &WidgetRef,
    ) -> Option<WidgetConfig> {
        match &widget.source {
            ConfigSource::Captured(config) => Some(config.clone()),
            ConfigSource::Declared => catalog.widget_config(self.node(node_id)?, &widget.name),
            ConfigSource::Unbound => None,
        }
    }

    /// The config of a widget-backed input slot.
    pub fn input_config(
        &self,
        catalog: &NodeCatalog,
        node_id: NodeId,
        slot: usize,
    ) -> Option<WidgetConfig> {
        let widget = self.node(node_id)?.inputs.get(slot)?.widget.as_ref()?;
        self.widget_ref_config(catalog, node_id, widget)
    }
}
