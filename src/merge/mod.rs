//! Connection validation and constraint merging.
//!
//! When one primitive feeds several widgets, its widget has to satisfy all of
//! them at once. [`merge_configs`] checks a candidate consumer against the
//! primitive's current config and, for numeric types, narrows `min`/`max`/`step`
//! to their intersection. It is pure; the primitive node applies the result.

use crate::config::{ConfigType, WidgetConfig, WidgetOptions};
use crate::error::ConnectionError;
use itertools::Itertools;

/// Relative tolerance when checking that one step is a multiple of another.
const STEP_EPSILON: f64 = 1e-9;

/// Checks `input` against the primitive's `output` config.
///
/// Returns `Ok(None)` when the two are compatible as they stand, `Ok(Some(options))`
/// when they are compatible only under the merged options, and the first
/// incompatibility found otherwise. Keys that never affect the value
/// (`default`, `forceInput`, `defaultInput`) are ignored.
pub fn merge_configs(
    output: &WidgetConfig,
    input: &WidgetConfig,
) -> Result<Option<WidgetOptions>, ConnectionError> {
    check_types(&output.ty, &input.ty)?;

    let numeric = output.ty.is_numeric();
    let ours = &output.options;
    let theirs = &input.options;
    let mut merged: Option<WidgetOptions> = None;

    if !same_number(ours.min, theirs.min) {
        if !numeric {
            return Err(mismatch("min"));
        }
        if let (Some(min), Some(max)) = (ours.min, theirs.max) {
            if min > max {
                return Err(ConnectionError::MinExceedsMax { min, max });
            }
        }
        merged.get_or_insert_with(|| ours.clone()).min = pick(ours.min, theirs.min, f64::max);
    }

    if !same_number(ours.max, theirs.max) {
        if !numeric {
            return Err(mismatch("max"));
        }
        if let (Some(max), Some(min)) = (ours.max, theirs.min) {
            if max < min {
                return Err(ConnectionError::MaxBelowMin { max, min });
            }
        }
        merged.get_or_insert_with(|| ours.clone()).max = pick(ours.max, theirs.max, f64::min);
    }

    if !same_number(ours.step, theirs.step) {
        if !numeric {
            return Err(mismatch("step"));
        }
        merged.get_or_insert_with(|| ours.clone()).step = merge_step(ours.step, theirs.step)?;
    }

    if ours.values != theirs.values {
        return Err(mismatch("values"));
    }

    for key in ours.extra.keys().chain(theirs.extra.keys()).unique() {
        let a = ours.extra.get(key);
        let b = theirs.extra.get(key);
        if a == b || (is_falsy(a) && is_falsy(b)) {
            continue;
        }
        return Err(mismatch(key));
    }

    Ok(merged)
}

/// `true` when `input` may share a primitive configured with `output`.
pub fn is_compatible(output: &WidgetConfig, input: &WidgetConfig) -> bool {
    merge_configs(output, input).is_ok()
}

fn check_types(output: &ConfigType, input: &ConfigType) -> Result<(), ConnectionError> {
    match (output, input) {
        (ConfigType::Choices(ours), ConfigType::Choices(theirs)) => {
            if ours.len() != theirs.len() {
                return Err(ConnectionError::ChoiceLengthMismatch {
                    ours: ours.len(),
                    theirs: theirs.len(),
                });
            }
            match ours.iter().zip(theirs).position(|(a, b)| a != b) {
                Some(index) => Err(ConnectionError::ChoiceMismatch { index }),
                None => Ok(()),
            }
        }
        (ConfigType::Choices(_), ConfigType::Scalar(ty)) => {
            Err(ConnectionError::NotAChoiceList(ty.to_string()))
        }
        (ConfigType::Scalar(a), ConfigType::Scalar(b)) if a == b => Ok(()),
        (a, b) => Err(ConnectionError::TypeMismatch {
            output: a.to_string(),
            input: b.to_string(),
        }),
    }
}

fn mismatch(key: &str) -> ConnectionError {
    ConnectionError::OptionMismatch {
        key: key.to_string(),
    }
}

/// Absent and zero compare equal, like any other pair of falsy option values.
fn same_number(a: Option<f64>, b: Option<f64>) -> bool {
    let falsy = |v: Option<f64>| v.is_none_or(|n| n == 0.0 || n.is_nan());
    a == b || (falsy(a) && falsy(b))
}

fn is_falsy(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::Bool(b)) => !b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_none_or(|n| n == 0.0),
        Some(serde_json::Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Combines two optional bounds; an absent side leaves the other unchanged.
fn pick(ours: Option<f64>, theirs: Option<f64>, combine: fn(f64, f64) -> f64) -> Option<f64> {
    match (ours, theirs) {
        (Some(a), Some(b)) => Some(combine(a, b)),
        (a, b) => a.or(b),
    }
}

fn merge_step(ours: Option<f64>, theirs: Option<f64>) -> Result<Option<f64>, ConnectionError> {
    let positive = |s: Option<f64>| s.filter(|v| *v > 0.0);
    match (positive(ours), positive(theirs)) {
        (Some(a), Some(b)) => {
            let (larger, smaller) = if a < b { (b, a) } else { (a, b) };
            if !is_multiple(larger, smaller) {
                return Err(ConnectionError::StepNotDivisible { larger, smaller });
            }
            Ok(Some(larger))
        }
        (a, b) => Ok(a.or(b)),
    }
}

/// `larger` is an integer multiple of `smaller`, tolerating float rounding
/// (so `0.5` is a multiple of `0.1`).
fn is_multiple(larger: f64, smaller: f64) -> bool {
    let quotient = (larger / smaller).round();
    (quotient * smaller - larger).abs() <= STEP_EPSILON * larger.abs().max(1.0)
}
