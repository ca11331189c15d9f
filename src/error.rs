use crate::graph::{LinkId, NodeId};
use thiserror::Error;

/// Reasons a candidate connection is rejected by the validator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("tried to connect combo to {0}")]
    NotAChoiceList(String),

    #[error("combo lists dont match: {ours} entries vs {theirs} entries")]
    ChoiceLengthMismatch { ours: usize, theirs: usize },

    #[error("combo lists dont match at entry {index}")]
    ChoiceMismatch { index: usize },

    #[error("types dont match: {output} vs {input}")]
    TypeMismatch { output: String, input: String },

    #[error("min > max: {min} > {max}")]
    MinExceedsMax { min: f64, max: f64 },

    #[error("max < min: {max} < {min}")]
    MaxBelowMin { max: f64, min: f64 },

    #[error("steps not divisible: current {larger}, new {smaller}")]
    StepNotDivisible { larger: f64, smaller: f64 },

    #[error("config {key} values dont match")]
    OptionMismatch { key: String },
}

/// The far end of a connection could not be resolved.
///
/// These happen during normal editing (a node deleted mid-drag, a link removed
/// before its change event is delivered) and abort the current operation only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Link {0} not found")]
    LinkNotFound(LinkId),

    #[error("Node {node_id} has no input slot {slot}")]
    InputNotFound { node_id: NodeId, slot: usize },

    #[error("Node {node_id} has no widget named '{name}'")]
    WidgetNotFound { node_id: NodeId, name: String },

    #[error("Node {node_id} has no output slot {slot}")]
    OutputNotFound { node_id: NodeId, slot: usize },

    #[error("Node {0} has no outgoing links")]
    NoLinks(NodeId),

    #[error("Input '{name}' on node {node_id} cannot be driven by a widget")]
    NotWidgetInput { node_id: NodeId, name: String },

    #[error("No config available for widget '{name}' on node {node_id}")]
    MissingConfig { node_id: NodeId, name: String },

    #[error("Node {0} is not a primitive node")]
    NotPrimitive(NodeId),
}

/// Errors raised by the in-memory host graph and its document format.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Node type '{0}' is not registered")]
    UnknownNodeType(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Cannot connect {output} output to {input} input")]
    SlotTypeMismatch { output: String, input: String },

    #[error("Connection from node {origin_id} to node {target_id} was rejected")]
    Rejected { origin_id: NodeId, target_id: NodeId },

    #[error("Link {link_id} references missing node {node_id}")]
    DanglingLink { link_id: LinkId, node_id: NodeId },
}
