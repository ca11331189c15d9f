use super::{InputSlot, Link, LinkId, Node, NodeId, OutputSlot, SlotType};
use crate::error::GraphError;
use crate::widget::WidgetValue;
use serde::{Deserialize, Serialize};

/// Serialized workflow, as saved and loaded by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub last_node_id: NodeId,
    #[serde(default)]
    pub last_link_id: LinkId,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub links: Vec<LinkDocument>,
}

impl GraphDocument {
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub pos: [f32; 2],
    #[serde(default)]
    pub size: [f32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputSlot>,
    #[serde(default)]
    pub outputs: Vec<OutputSlot>,
    #[serde(default)]
    pub widgets_values: Vec<WidgetValue>,
}

impl NodeDocument {
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id,
            type_name: node.type_name.clone(),
            pos: node.pos,
            size: node.size,
            title: Some(node.title.clone()),
            inputs: node.inputs.clone(),
            outputs: node.outputs.clone(),
            widgets_values: node.widgets.iter().map(|w| w.value.clone()).collect(),
        }
    }
}

/// `[id, origin_id, origin_slot, target_id, target_slot, type]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDocument(
    pub LinkId,
    pub NodeId,
    pub usize,
    pub NodeId,
    pub usize,
    pub SlotType,
);

impl From<&Link> for LinkDocument {
    fn from(link: &Link) -> Self {
        LinkDocument(
            link.id,
            link.origin_id,
            link.origin_slot,
            link.target_id,
            link.target_slot,
            link.ty.clone(),
        )
    }
}

impl From<LinkDocument> for Link {
    fn from(doc: LinkDocument) -> Self {
        let LinkDocument(id, origin_id, origin_slot, target_id, target_slot, ty) = doc;
        Link {
            id,
            origin_id,
            origin_slot,
            target_id,
            target_slot,
            ty,
        }
    }
}
