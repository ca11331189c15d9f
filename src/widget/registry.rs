use super::{Widget, WidgetKind, WidgetValue};
use crate::config::{SemanticType, WidgetConfig, WidgetOptions};
use ahash::AHashMap;

/// Builds the inline widget for one semantic type.
pub trait WidgetFactory {
    fn semantic_type(&self) -> SemanticType;
    fn build(&self, name: &str, config: &WidgetConfig) -> Widget;
}

fn declared_default(options: &WidgetOptions) -> Option<WidgetValue> {
    options.default.as_ref().map(WidgetValue::from_json)
}

fn number_widget(name: &str, config: &WidgetConfig) -> Widget {
    let value = declared_default(&config.options)
        .and_then(|v| v.as_f64())
        .or(config.options.min)
        .unwrap_or(0.0);
    Widget::new(name, WidgetKind::Number, WidgetValue::Number(value))
        .with_options(config.options.clone())
}

fn text_widget(name: &str, config: &WidgetConfig) -> Widget {
    let value = declared_default(&config.options)
        .filter(|v| v.as_str().is_some())
        .unwrap_or_else(|| WidgetValue::Text(String::new()));
    Widget::new(name, WidgetKind::Text, value).with_options(config.options.clone())
}

fn toggle_widget(name: &str, config: &WidgetConfig) -> Widget {
    let value = match declared_default(&config.options) {
        Some(WidgetValue::Bool(b)) => b,
        _ => false,
    };
    Widget::new(name, WidgetKind::Toggle, WidgetValue::Bool(value))
        .with_options(config.options.clone())
}

fn combo_widget(name: &str, config: &WidgetConfig) -> Widget {
    let values: Vec<String> = config
        .ty
        .choices()
        .map(<[String]>::to_vec)
        .or_else(|| config.options.values.clone())
        .unwrap_or_default();

    let value = declared_default(&config.options)
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|v| values.contains(v))
        .or_else(|| values.first().cloned())
        .map_or(WidgetValue::Null, WidgetValue::Text);

    let mut options = config.options.clone();
    options.values = Some(values);
    Widget::new(name, WidgetKind::Combo, value).with_options(options)
}

/// Defines the built-in factories and the function registering them.
macro_rules! define_widget_factories {
    ( $( ($struct_name:ident, $ty:expr, $build:path) ),* $(,)? ) => {
        $(
            struct $struct_name;
            impl WidgetFactory for $struct_name {
                fn semantic_type(&self) -> SemanticType { $ty }
                fn build(&self, name: &str, config: &WidgetConfig) -> Widget {
                    $build(name, config)
                }
            }
        )*

        fn register_default_factories(factories: &mut AHashMap<SemanticType, Box<dyn WidgetFactory>>) {
            $( factories.insert($ty, Box::new($struct_name)); )*
        }
    };
}

define_widget_factories!(
    (IntWidgetFactory, SemanticType::Int, number_widget),
    (FloatWidgetFactory, SemanticType::Float, number_widget),
    (StringWidgetFactory, SemanticType::Str, text_widget),
    (BooleanWidgetFactory, SemanticType::Bool, toggle_widget),
    (ComboWidgetFactory, SemanticType::Combo, combo_widget),
);

/// Maps semantic types to the factory that builds their widget.
pub struct WidgetRegistry {
    factories: AHashMap<SemanticType, Box<dyn WidgetFactory>>,
}

impl Default for WidgetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetRegistry {
    /// A registry with the built-in `INT`, `FLOAT`, `STRING`, `BOOLEAN` and `COMBO` factories.
    pub fn new() -> Self {
        let mut factories: AHashMap<SemanticType, Box<dyn WidgetFactory>> = AHashMap::new();
        register_default_factories(&mut factories);
        Self { factories }
    }

    pub fn empty() -> Self {
        Self {
            factories: AHashMap::new(),
        }
    }

    pub fn with_factory(mut self, factory: Box<dyn WidgetFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn register(&mut self, factory: Box<dyn WidgetFactory>) {
        self.factories.insert(factory.semantic_type(), factory);
    }

    pub fn contains(&self, ty: &SemanticType) -> bool {
        self.factories.contains_key(ty)
    }

    /// Builds a widget for `config`, or `None` if its type has no factory.
    pub fn build(&self, name: &str, config: &WidgetConfig) -> Option<Widget> {
        self.factories
            .get(&config.slot_type())
            .map(|factory| factory.build(name, config))
    }
}
