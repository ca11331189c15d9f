//! Semantic widget configuration: a type tag paired with an options bag.
//!
//! A config is what a node type declares for each of its inputs, and what the
//! merger intersects when one primitive drives several widgets. On the wire it
//! is the two-element array `[type, options]`, where `type` is either a tag
//! such as `"INT"` or a list of allowed choices.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod resolver;

pub use resolver::{InputDeclaration, InputDeclarations, NodeCatalog, NodeDefinition};

/// The closed set of semantic types a widget input can carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SemanticType {
    Int,
    Float,
    Str,
    Bool,
    Combo,
    /// Any type tag the crate has no built-in knowledge of (e.g. `"IMAGE"`).
    Custom(String),
}

impl SemanticType {
    pub fn as_str(&self) -> &str {
        match self {
            SemanticType::Int => "INT",
            SemanticType::Float => "FLOAT",
            SemanticType::Str => "STRING",
            SemanticType::Bool => "BOOLEAN",
            SemanticType::Combo => "COMBO",
            SemanticType::Custom(tag) => tag,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SemanticType::Int | SemanticType::Float)
    }
}

impl From<&str> for SemanticType {
    fn from(tag: &str) -> Self {
        match tag {
            "INT" => SemanticType::Int,
            "FLOAT" => SemanticType::Float,
            "STRING" => SemanticType::Str,
            "BOOLEAN" => SemanticType::Bool,
            "COMBO" => SemanticType::Combo,
            other => SemanticType::Custom(other.to_string()),
        }
    }
}

impl From<String> for SemanticType {
    fn from(tag: String) -> Self {
        SemanticType::from(tag.as_str())
    }
}

impl From<SemanticType> for String {
    fn from(ty: SemanticType) -> Self {
        ty.as_str().to_string()
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first element of a config: a scalar tag or an enumerated choice list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigType {
    Choices(Vec<String>),
    Scalar(SemanticType),
}

impl ConfigType {
    /// The wire type of a slot carrying this config. Choice lists collapse to `COMBO`.
    pub fn slot_type(&self) -> SemanticType {
        match self {
            ConfigType::Choices(_) => SemanticType::Combo,
            ConfigType::Scalar(ty) => ty.clone(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ConfigType::Scalar(ty) if ty.is_numeric())
    }

    pub fn choices(&self) -> Option<&[String]> {
        match self {
            ConfigType::Choices(values) => Some(values),
            ConfigType::Scalar(_) => None,
        }
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigType::Choices(values) => write!(f, "COMBO[{}]", values.len()),
            ConfigType::Scalar(ty) => write!(f, "{}", ty),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Type-specific constraints attached to a widget or a declared input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Choice list of a live combo widget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    /// The input can only ever be fed by a link.
    #[serde(rename = "forceInput", default, skip_serializing_if = "is_false")]
    pub force_input: bool,
    /// The input starts out converted but may be turned back into a widget.
    #[serde(rename = "defaultInput", default, skip_serializing_if = "is_false")]
    pub default_input: bool,
    /// Every other key (`multiline`, `round`, `placeholder`, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl WidgetOptions {
    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }
}

/// A `(type, options)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetConfig {
    pub ty: ConfigType,
    pub options: WidgetOptions,
}

impl WidgetConfig {
    pub fn new(ty: ConfigType, options: WidgetOptions) -> Self {
        Self { ty, options }
    }

    /// A config with no options, as synthesized for bare typed inputs.
    pub fn bare(ty: SemanticType) -> Self {
        Self::new(ConfigType::Scalar(ty), WidgetOptions::default())
    }

    pub fn choices(values: Vec<String>) -> Self {
        Self::new(ConfigType::Choices(values), WidgetOptions::default())
    }

    pub fn slot_type(&self) -> SemanticType {
        self.ty.slot_type()
    }
}

impl Serialize for WidgetConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.ty, &self.options).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WidgetConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
        let mut parts = raw.into_iter();

        let ty = parts
            .next()
            .ok_or_else(|| de::Error::invalid_length(0, &"a [type, options] pair"))?;
        let ty = ConfigType::deserialize(ty).map_err(de::Error::custom)?;

        let options = match parts.next() {
            None | Some(serde_json::Value::Null) => WidgetOptions::default(),
            Some(value) => WidgetOptions::deserialize(value).map_err(de::Error::custom)?,
        };

        Ok(WidgetConfig { ty, options })
    }
}
