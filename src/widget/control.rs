//! The `control_after_generate` companion that advances a value after each run.

use super::{SerializeMode, Widget, WidgetKind, WidgetValue};
use crate::constants::VALUE_CONTROL_WIDGET_NAME;
use crate::graph::Node;
use rand::Rng;

/// Upper bound used when randomizing a number widget without a declared max.
const DEFAULT_RANDOM_MAX: f64 = 1_125_899_906_842_624.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Fixed,
    Increment,
    Decrement,
    Randomize,
}

impl ControlMode {
    pub const ALL: [ControlMode; 4] = [
        ControlMode::Fixed,
        ControlMode::Increment,
        ControlMode::Decrement,
        ControlMode::Randomize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::Fixed => "fixed",
            ControlMode::Increment => "increment",
            ControlMode::Decrement => "decrement",
            ControlMode::Randomize => "randomize",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == name)
    }
}

/// Appends a control companion for `target` and links the two together.
pub fn add_value_control_widget(node: &mut Node, target: &str, mode: ControlMode) {
    let mut control = Widget::new(
        VALUE_CONTROL_WIDGET_NAME,
        WidgetKind::Combo,
        WidgetValue::Text(mode.as_str().to_string()),
    );
    control.options.values = Some(
        ControlMode::ALL
            .iter()
            .map(|m| m.as_str().to_string())
            .collect(),
    );
    control.serialize = SerializeMode::Skip;
    node.widgets.push(control);

    if let Some(widget) = node.widget_mut(target) {
        widget.linked_widgets.push(VALUE_CONTROL_WIDGET_NAME.to_string());
    }
}

/// The mode selected on `widget`'s control companion, if it has one.
pub fn control_mode(node: &Node, widget: &Widget) -> Option<ControlMode> {
    widget
        .linked_widgets
        .iter()
        .filter(|name| name.as_str() == VALUE_CONTROL_WIDGET_NAME)
        .find_map(|name| node.widget(name))
        .and_then(|control| control.value.as_str())
        .and_then(ControlMode::from_name)
}

/// The value `widget` should take after a run under `mode`, or `None` to keep it.
pub fn next_value<R: Rng + ?Sized>(
    widget: &Widget,
    mode: ControlMode,
    rng: &mut R,
) -> Option<WidgetValue> {
    if mode == ControlMode::Fixed {
        return None;
    }
    match widget.original_kind() {
        WidgetKind::Number => next_number(widget, mode, rng).map(WidgetValue::Number),
        WidgetKind::Combo => next_choice(widget, mode, rng).map(WidgetValue::Text),
        _ => None,
    }
}

fn next_number<R: Rng + ?Sized>(widget: &Widget, mode: ControlMode, rng: &mut R) -> Option<f64> {
    let current = widget.value.as_f64()?;
    let step = widget.options.step.filter(|s| *s > 0.0).unwrap_or(1.0);
    let min = widget.options.min;
    let max = widget.options.max;

    let next = match mode {
        ControlMode::Fixed => return None,
        ControlMode::Increment => {
            let v = current + step;
            max.map_or(v, |max| v.min(max))
        }
        ControlMode::Decrement => {
            let v = current - step;
            min.map_or(v, |min| v.max(min))
        }
        ControlMode::Randomize => {
            let lo = min.unwrap_or(0.0);
            let hi = max.unwrap_or(DEFAULT_RANDOM_MAX);
            if hi < lo {
                return None;
            }
            let raw = rng.random_range(lo..=hi);
            (lo + ((raw - lo) / step).floor() * step).min(hi)
        }
    };
    Some(next)
}

fn next_choice<R: Rng + ?Sized>(widget: &Widget, mode: ControlMode, rng: &mut R) -> Option<String> {
    let values = widget.options.values.as_ref().filter(|v| !v.is_empty())?;
    let current = widget
        .value
        .as_str()
        .and_then(|v| values.iter().position(|c| c == v))
        .unwrap_or(0);

    let index = match mode {
        ControlMode::Fixed => return None,
        ControlMode::Increment => (current + 1).min(values.len() - 1),
        ControlMode::Decrement => current.saturating_sub(1),
        ControlMode::Randomize => rng.random_range(0..values.len()),
    };
    values.get(index).cloned()
}
