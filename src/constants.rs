//! Layout metrics and reserved names shared across the crate.

use std::time::Duration;

/// Height of one input/output slot row.
pub const NODE_SLOT_HEIGHT: f32 = 20.0;
/// Height of a node's title bar; also the nudge step for spawned primitives.
pub const NODE_TITLE_HEIGHT: f32 = 30.0;
/// Default height of an inline widget.
pub const NODE_WIDGET_HEIGHT: f32 = 20.0;
/// Vertical gap the host inserts between consecutive widgets.
pub const WIDGET_GAP: f32 = 4.0;
pub const NODE_MIN_WIDTH: f32 = 140.0;
/// Approximate width of one title character.
pub const TITLE_CHAR_WIDTH: f32 = 7.0;

/// Type tag given to hidden widgets.
pub const CONVERTED_TYPE: &str = "converted-widget";

pub const PRIMITIVE_NODE_TYPE: &str = "PrimitiveNode";
pub const PRIMITIVE_TITLE: &str = "Primitive";
pub const PRIMITIVE_CATEGORY: &str = "utils";
pub const PRIMITIVE_OUTPUT_NAME: &str = "connect to widget input";
pub const PRIMITIVE_WIDGET_NAME: &str = "value";

pub const RELAY_NODE_TYPE: &str = "Reroute";

pub const VALUE_CONTROL_WIDGET_NAME: &str = "control_after_generate";

/// Horizontal distance between a spawned primitive and its target.
pub const SPAWN_OFFSET_X: f32 = 30.0;
pub const DOUBLE_CLICK_DEBOUNCE: Duration = Duration::from_millis(300);
