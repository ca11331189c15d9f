//! # widget-inputs - Widget/Input Conversion and Primitive Nodes for Node Graphs
//!
//! **widget-inputs** extends a node-graph editor with two capabilities:
//!
//! 1.  **Widget conversion**: any inline widget of a node (a number field, a
//!     combo box, a text box, a toggle) can be turned into a typed input slot so
//!     its value comes from a link, and turned back again.
//! 2.  **Primitive nodes**: a virtual node whose single widget adopts the type
//!     and constraints of whatever it is connected to. One primitive may feed
//!     several widgets; their numeric constraints are intersected and the
//!     primitive's value is mirrored into every one of them.
//!
//! ## Core Workflow
//!
//! 1.  **Load node metadata**: parse the host's `object_info` JSON into a [`config::NodeCatalog`].
//! 2.  **Create an editor**: [`editor::Editor`] owns the graph and dispatches lifecycle
//!     events to the [`extension::WidgetInputs`] hooks.
//! 3.  **Edit**: create nodes, convert widgets, connect primitives, or load a saved workflow.
//! 4.  **Export**: build the executable prompt with [`editor::Editor::graph_to_prompt`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use widget_inputs::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let catalog = NodeCatalog::from_json(&std::fs::read_to_string("object_info.json")?)?;
//!     let mut editor = Editor::new(catalog);
//!
//!     let sampler = editor.create_node("KSampler")?;
//!     editor.convert_widget_to_input(sampler, "steps")?;
//!
//!     // The primitive takes the INT type and bounds of `steps`.
//!     let primitive = editor.create_node(PRIMITIVE_NODE_TYPE)?;
//!     let slot = editor
//!         .node(sampler)
//!         .and_then(|n| n.input_for_widget("steps"))
//!         .ok_or("steps input missing")?;
//!     editor.connect(primitive, 0, sampler, slot)?;
//!     editor.set_widget_value(primitive, "value", WidgetValue::Number(30.0))?;
//!
//!     let prompt = editor.graph_to_prompt();
//!     println!("{}", serde_json::to_string_pretty(&prompt)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod convert;
pub mod editor;
pub mod error;
pub mod extension;
pub mod graph;
pub mod merge;
pub mod prelude;
pub mod primitive;
pub mod widget;
