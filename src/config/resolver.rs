use super::{ConfigType, SemanticType, WidgetConfig};
use crate::error::GraphError;
use crate::graph::Node;
use crate::widget::{Widget, WidgetKind};
use ahash::AHashMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single declared input of a node type.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDeclaration {
    pub name: String,
    pub config: WidgetConfig,
}

/// Required and optional inputs of a node type, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputDeclarations {
    #[serde(default, with = "ordered_inputs")]
    pub required: Vec<InputDeclaration>,
    #[serde(default, with = "ordered_inputs")]
    pub optional: Vec<InputDeclaration>,
}

/// Static metadata for one node type, in the host's `object_info` shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub input: InputDeclarations,
    #[serde(default)]
    pub output: Vec<SemanticType>,
    #[serde(default)]
    pub output_name: Vec<String>,
}

impl NodeDefinition {
    /// Looks up the declared config of `widget_name`, required inputs first.
    pub fn resolve(&self, widget_name: &str) -> Option<&WidgetConfig> {
        self.input
            .required
            .iter()
            .chain(self.input.optional.iter())
            .find(|decl| decl.name == widget_name)
            .map(|decl| &decl.config)
    }

    /// All declared inputs, required first.
    pub fn inputs(&self) -> impl Iterator<Item = &InputDeclaration> {
        self.input.required.iter().chain(self.input.optional.iter())
    }
}

/// Every node type known to the host, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    definitions: AHashMap<String, NodeDefinition>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an `object_info` document: a map of type name to definition.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let raw: AHashMap<String, NodeDefinition> = serde_json::from_str(json)?;
        let definitions = raw
            .into_iter()
            .map(|(type_name, mut definition)| {
                if definition.name.is_empty() {
                    definition.name = type_name.clone();
                }
                (type_name, definition)
            })
            .collect();
        Ok(Self { definitions })
    }

    pub fn insert(&mut self, type_name: &str, definition: NodeDefinition) {
        self.definitions.insert(type_name.to_string(), definition);
    }

    pub fn with_definition(mut self, type_name: &str, definition: NodeDefinition) -> Self {
        self.insert(type_name, definition);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&NodeDefinition> {
        self.definitions.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.definitions.contains_key(type_name)
    }

    /// Replaces definitions wholesale, e.g. after the host refreshed its node list.
    pub fn merge(&mut self, other: NodeCatalog) {
        self.definitions.extend(other.definitions);
    }

    /// The declared config of `widget_name` on `node_type`, if any.
    pub fn resolve(&self, node_type: &str, widget_name: &str) -> Option<WidgetConfig> {
        self.get(node_type)?.resolve(widget_name).cloned()
    }

    /// The declared config, or one synthesized from the live widget when the
    /// widget was added dynamically and has no static declaration.
    pub fn widget_config(&self, node: &Node, widget_name: &str) -> Option<WidgetConfig> {
        self.resolve(&node.type_name, widget_name)
            .or_else(|| node.widget(widget_name).map(synthesize_config))
    }
}

/// Builds a config from a widget's original kind and options bag.
pub fn synthesize_config(widget: &Widget) -> WidgetConfig {
    let mut options = widget.options.clone();
    let ty = match widget.original_kind() {
        WidgetKind::Number => ConfigType::Scalar(SemanticType::Float),
        WidgetKind::Combo => ConfigType::Choices(options.values.take().unwrap_or_default()),
        WidgetKind::Text => ConfigType::Scalar(SemanticType::Str),
        WidgetKind::Toggle => ConfigType::Scalar(SemanticType::Bool),
        WidgetKind::Custom(tag) => ConfigType::Scalar(SemanticType::from(tag.as_str())),
        WidgetKind::Converted { .. } => ConfigType::Scalar(SemanticType::Custom(
            widget.kind.type_tag().into_owned(),
        )),
    };
    WidgetConfig::new(ty, options)
}

/// Keeps the source order of a `{ name: [type, options] }` map.
mod ordered_inputs {
    use super::*;

    pub fn serialize<S: Serializer>(
        inputs: &[InputDeclaration],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(inputs.len()))?;
        for decl in inputs {
            map.serialize_entry(&decl.name, &decl.config)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<InputDeclaration>, D::Error> {
        struct InputsVisitor;

        impl<'de> Visitor<'de> for InputsVisitor {
            type Value = Vec<InputDeclaration>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of input name to [type, options]")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut inputs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, config)) = access.next_entry::<String, WidgetConfig>()? {
                    inputs.push(InputDeclaration { name, config });
                }
                Ok(inputs)
            }
        }

        deserializer.deserialize_map(InputsVisitor)
    }
}
