//! Inline node widgets and the behaviors the conversion layer swaps in and out.

use crate::config::WidgetOptions;
use crate::constants::{CONVERTED_TYPE, NODE_WIDGET_HEIGHT, WIDGET_GAP};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

pub mod control;
pub mod registry;
pub mod visibility;

pub use control::ControlMode;
pub use registry::{WidgetFactory, WidgetRegistry};
pub use visibility::{hide_widget, show_widget};

/// What a widget is drawn as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetKind {
    Number,
    Combo,
    Text,
    Toggle,
    Custom(String),
    /// A widget that was hidden because its value now comes from an input slot.
    /// Linked companions carry `:<parent name>` as suffix.
    Converted { suffix: Option<String> },
}

impl WidgetKind {
    pub fn type_tag(&self) -> Cow<'_, str> {
        match self {
            WidgetKind::Number => Cow::Borrowed("number"),
            WidgetKind::Combo => Cow::Borrowed("combo"),
            WidgetKind::Text => Cow::Borrowed("text"),
            WidgetKind::Toggle => Cow::Borrowed("toggle"),
            WidgetKind::Custom(tag) => Cow::Borrowed(tag),
            WidgetKind::Converted { suffix: None } => Cow::Borrowed(CONVERTED_TYPE),
            WidgetKind::Converted {
                suffix: Some(suffix),
            } => Cow::Owned(format!("{}{}", CONVERTED_TYPE, suffix)),
        }
    }

    /// Kinds that map onto a primitive semantic type.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            WidgetKind::Number | WidgetKind::Combo | WidgetKind::Text | WidgetKind::Toggle
        )
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.type_tag())
    }
}

/// Runtime value held by a widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WidgetValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl WidgetValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WidgetValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WidgetValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a declared `default` into a widget value.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => WidgetValue::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(WidgetValue::Null, WidgetValue::Number),
            serde_json::Value::String(s) => WidgetValue::Text(s.clone()),
            _ => WidgetValue::Null,
        }
    }
}

impl fmt::Display for WidgetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetValue::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            WidgetValue::Bool(b) => write!(f, "{}", b),
            WidgetValue::Text(s) => write!(f, "{:?}", s),
            WidgetValue::Null => write!(f, "null"),
        }
    }
}

/// How tall a widget is when the node computes its size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeMode {
    Auto,
    Fixed(f32),
    /// Takes no room at all; cancels the gap the host adds between widgets.
    Collapsed,
}

/// How a widget contributes its value when the graph is serialized for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializeMode {
    Value,
    Skip,
    /// Only while the input slot mirroring this widget is linked.
    WhenLinked,
}

/// Pointer state forwarded to consumer callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerContext {
    pub canvas_pos: [f32; 2],
}

/// Change callback invoked after a widget's value was set.
#[derive(Clone)]
pub struct ChangeCallback(Rc<dyn Fn(&WidgetValue, &PointerContext)>);

impl ChangeCallback {
    pub fn new(f: impl Fn(&WidgetValue, &PointerContext) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, value: &WidgetValue, ctx: &PointerContext) {
        (self.0)(value, ctx)
    }
}

impl fmt::Debug for ChangeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChangeCallback")
    }
}

/// Cleanup hook invoked with the widget name right before the widget is discarded.
#[derive(Clone)]
pub struct RemoveHook(Rc<dyn Fn(&str)>);

impl RemoveHook {
    pub fn new(f: impl Fn(&str) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, widget_name: &str) {
        (self.0)(widget_name)
    }
}

impl fmt::Debug for RemoveHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RemoveHook")
    }
}

/// Behaviors recorded by [`hide_widget`] so [`show_widget`] can restore them.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HiddenState {
    pub(crate) kind: WidgetKind,
    pub(crate) size: SizeMode,
    pub(crate) serialize: SerializeMode,
}

#[derive(Debug, Clone)]
pub struct Widget {
    pub name: String,
    pub kind: WidgetKind,
    pub value: WidgetValue,
    pub options: WidgetOptions,
    /// Names of companion widgets on the same node that hide and show with this one.
    pub linked_widgets: Vec<String>,
    pub size: SizeMode,
    pub serialize: SerializeMode,
    /// Vertical position of the widget inside its node.
    pub last_y: f32,
    pub callback: Option<ChangeCallback>,
    pub on_remove: Option<RemoveHook>,
    pub(crate) hidden: Option<HiddenState>,
}

impl Widget {
    pub fn new(name: &str, kind: WidgetKind, value: WidgetValue) -> Self {
        Self {
            name: name.to_string(),
            kind,
            value,
            options: WidgetOptions::default(),
            linked_widgets: Vec::new(),
            size: SizeMode::Auto,
            serialize: SerializeMode::Value,
            last_y: 0.0,
            callback: None,
            on_remove: None,
            hidden: None,
        }
    }

    pub fn with_options(mut self, options: WidgetOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_callback(mut self, callback: impl Fn(&WidgetValue, &PointerContext) + 'static) -> Self {
        self.callback = Some(ChangeCallback::new(callback));
        self
    }

    pub fn with_on_remove(mut self, hook: impl Fn(&str) + 'static) -> Self {
        self.on_remove = Some(RemoveHook::new(hook));
        self
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.is_some()
    }

    /// The kind before the widget was hidden.
    pub fn original_kind(&self) -> &WidgetKind {
        self.hidden.as_ref().map_or(&self.kind, |h| &h.kind)
    }

    /// Height this widget adds to its node, including the trailing gap.
    pub fn compute_height(&self) -> f32 {
        match self.size {
            SizeMode::Auto => NODE_WIDGET_HEIGHT + WIDGET_GAP,
            SizeMode::Fixed(height) => height + WIDGET_GAP,
            SizeMode::Collapsed => 0.0,
        }
    }

    /// The current value pulled into the widget's `[min, max]` range.
    pub fn clamped_value(&self) -> WidgetValue {
        match self.value {
            WidgetValue::Number(mut n) => {
                if let Some(min) = self.options.min {
                    if n < min {
                        n = min;
                    }
                }
                if let Some(max) = self.options.max {
                    if n > max {
                        n = max;
                    }
                }
                WidgetValue::Number(n)
            }
            ref other => other.clone(),
        }
    }

    /// Sets the value and invokes the change callback.
    pub fn set_value(&mut self, value: WidgetValue, ctx: &PointerContext) {
        self.value = value;
        if let Some(callback) = &self.callback {
            callback.call(&self.value, ctx);
        }
    }
}
