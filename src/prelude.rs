//! Prelude module for convenient imports
//!
//! Re-exports the types most programs driving the editor need.
//!
//! # Example
//!
//! ```rust,no_run
//! use widget_inputs::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let catalog = NodeCatalog::from_json(&std::fs::read_to_string("object_info.json")?)?;
//! let workflow = GraphDocument::from_json(&std::fs::read_to_string("workflow.json")?)?;
//!
//! let mut editor = Editor::new(catalog);
//! editor.load(&workflow)?;
//! println!("{} nodes", editor.graph().node_count());
//! # Ok(())
//! # }
//! ```

// Host model
pub use crate::editor::{Editor, EditorBuilder, Prompt, PromptInput, PromptNode};
pub use crate::graph::{Graph, GraphDocument, Node, NodeId, LinkId, SlotType};

// Configs and merging
pub use crate::config::{ConfigType, NodeCatalog, NodeDefinition, SemanticType, WidgetConfig, WidgetOptions};
pub use crate::merge::{is_compatible, merge_configs};

// Widgets
pub use crate::widget::{ControlMode, Widget, WidgetFactory, WidgetKind, WidgetRegistry, WidgetValue};

// Hooks
pub use crate::convert::{MenuAction, MenuEntry};
pub use crate::extension::{LoadPhase, WidgetInputs};
pub use crate::primitive::{PrimitiveNode, PrimitiveState};

pub use crate::constants::{PRIMITIVE_NODE_TYPE, RELAY_NODE_TYPE};

// Error types
pub use crate::error::{ConnectionError, GraphError, ResolveError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
