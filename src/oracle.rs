//! Type information oracle
//!
//! The compiler never inspects real types at run time; everything it knows
//! about instantiable classes, their properties, and controllers comes
//! through the [`TypeOracle`] trait. The bundled [`StaticOracle`] answers
//! from descriptor tables loaded ahead of time (typically from a JSON
//! fixture produced by the target platform's tooling).

use crate::error::{CompilerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Answers type questions during resolution.
///
/// `resolve_type` takes the name as written in markup (simple or qualified)
/// plus the document's import list and returns the descriptor, or `None`
/// when the name cannot be resolved.
pub trait TypeOracle: Sync {
    fn resolve_type(&self, name: &str, imports: &[String]) -> Option<Arc<TypeDescriptor>>;

    /// Controller classes are always referenced by qualified name.
    fn resolve_controller(&self, qualified_name: &str) -> Option<Arc<ControllerDescriptor>>;
}

/// The type of a settable value, used to pick coercions at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    Enumeration { variants: Vec<String> },
    Object { type_name: String },
    Sequence { element: Box<ValueType> },
    Handler { event_type: String },
}

impl ValueType {
    pub fn is_sequence(&self) -> bool {
        matches!(self, ValueType::Sequence { .. })
    }

    /// Human-readable name for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            ValueType::String => "string".to_string(),
            ValueType::Integer => "integer".to_string(),
            ValueType::Float => "float".to_string(),
            ValueType::Boolean => "boolean".to_string(),
            ValueType::Enumeration { .. } => "enumeration".to_string(),
            ValueType::Object { type_name } => type_name.clone(),
            ValueType::Sequence { element } => format!("sequence of {}", element.describe()),
            ValueType::Handler { event_type } => format!("handler of {}", event_type),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub value_type: ValueType,
    /// Read-only properties can only be filled through their sequence or
    /// by mutating the held value, never reassigned.
    #[serde(default)]
    pub read_only: bool,
}

/// A property set through an owner class onto arbitrary children, like a
/// layout constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticPropertyDescriptor {
    pub property: String,
    pub value_type: ValueType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerDescriptor {
    /// Attribute name, e.g. `onAction`.
    pub name: String,
    pub event_type: String,
}

/// How instances of a type can be created, beyond property assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionInfo {
    #[serde(default = "default_true")]
    pub no_arg_constructor: bool,
    /// Builder type's build method, when the platform provides one.
    #[serde(default)]
    pub builder_method: Option<String>,
    /// Static factory methods usable via the factory initialization form.
    #[serde(default)]
    pub factories: Vec<String>,
    /// Whether a string-coercing `value_of` construction form exists.
    #[serde(default)]
    pub value_of: bool,
    /// Single-argument constructor parameter type, when one exists.
    #[serde(default)]
    pub single_arg: Option<ValueType>,
}

fn default_true() -> bool {
    true
}

impl Default for ConstructionInfo {
    fn default() -> Self {
        Self {
            no_arg_constructor: true,
            builder_method: None,
            factories: Vec::new(),
            value_of: false,
            single_arg: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub qualified_name: String,
    pub simple_name: String,
    #[serde(default)]
    pub construction: ConstructionInfo,
    /// The property that absorbs child elements not wrapped in a property
    /// element. Usually a sequence.
    #[serde(default)]
    pub default_property: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
    #[serde(default)]
    pub static_properties: Vec<StaticPropertyDescriptor>,
    #[serde(default)]
    pub handlers: Vec<HandlerDescriptor>,
    /// Named constants accessible through the constant initialization form.
    #[serde(default)]
    pub constants: Vec<String>,
    /// Variant names when the type itself is an enumeration.
    #[serde(default)]
    pub enum_variants: Vec<String>,
}

impl TypeDescriptor {
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn static_property(&self, name: &str) -> Option<&StaticPropertyDescriptor> {
        self.static_properties.iter().find(|p| p.property == name)
    }

    pub fn handler(&self, name: &str) -> Option<&HandlerDescriptor> {
        self.handlers.iter().find(|h| h.name == name)
    }

    pub fn has_constant(&self, name: &str) -> bool {
        self.constants.iter().any(|c| c == name)
    }

    pub fn default_property_descriptor(&self) -> Option<&PropertyDescriptor> {
        self.default_property
            .as_deref()
            .and_then(|name| self.property(name))
    }
}

/// A controller field eligible for injection by `fx:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerField {
    pub name: String,
    pub type_name: String,
}

/// A controller method eligible for event-handler binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerMethod {
    pub name: String,
    /// `None` means the zero-argument form.
    #[serde(default)]
    pub event_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerDescriptor {
    pub qualified_name: String,
    #[serde(default)]
    pub fields: Vec<ControllerField>,
    #[serde(default)]
    pub methods: Vec<ControllerMethod>,
    /// Whether the class exposes the conventional post-build hook.
    #[serde(default)]
    pub has_initialize: bool,
    /// Static factory on the controller class itself, if any.
    #[serde(default)]
    pub factory_method: Option<String>,
}

impl ControllerDescriptor {
    pub fn field(&self, name: &str) -> Option<&ControllerField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All methods with the given name, in declaration order. More than
    /// one match means the binding is ambiguous and must be reported.
    pub fn methods_named(&self, name: &str) -> Vec<&ControllerMethod> {
        self.methods.iter().filter(|m| m.name == name).collect()
    }
}

/// Serialized form of a full oracle table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleFixture {
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
    #[serde(default)]
    pub controllers: Vec<ControllerDescriptor>,
}

/// In-memory oracle backed by descriptor tables.
#[derive(Debug, Default)]
pub struct StaticOracle {
    types: HashMap<String, Arc<TypeDescriptor>>,
    controllers: HashMap<String, Arc<ControllerDescriptor>>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: OracleFixture) -> Self {
        let mut oracle = Self::new();
        for descriptor in fixture.types {
            oracle.add_type(descriptor);
        }
        for controller in fixture.controllers {
            oracle.add_controller(controller);
        }
        oracle
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let fixture: OracleFixture = serde_json::from_str(&content).map_err(|e| {
            CompilerError::InvalidFormat {
                message: format!("invalid type table {}: {}", path.display(), e),
            }
        })?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn add_type(&mut self, descriptor: TypeDescriptor) {
        self.types
            .insert(descriptor.qualified_name.clone(), Arc::new(descriptor));
    }

    pub fn add_controller(&mut self, descriptor: ControllerDescriptor) {
        self.controllers
            .insert(descriptor.qualified_name.clone(), Arc::new(descriptor));
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

impl TypeOracle for StaticOracle {
    fn resolve_type(&self, name: &str, imports: &[String]) -> Option<Arc<TypeDescriptor>> {
        // Qualified names bypass the import list entirely.
        if name.contains('.') {
            return self.types.get(name).cloned();
        }

        // Simple names resolve through the imports in declaration order;
        // the first import that supplies the name wins.
        for import in imports {
            if let Some(package) = import.strip_suffix(".*") {
                let candidate = format!("{}.{}", package, name);
                if let Some(descriptor) = self.types.get(&candidate) {
                    return Some(descriptor.clone());
                }
            } else if import == name
                || import
                    .rsplit_once('.')
                    .map_or(false, |(_, simple)| simple == name)
            {
                if let Some(descriptor) = self.types.get(import) {
                    return Some(descriptor.clone());
                }
            }
        }

        // Unpackaged types can be registered under their simple name.
        self.types.get(name).cloned()
    }

    fn resolve_controller(&self, qualified_name: &str) -> Option<Arc<ControllerDescriptor>> {
        self.controllers.get(qualified_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn descriptor(package: &str, simple: &str) -> TypeDescriptor {
        TypeDescriptor {
            qualified_name: format!("{}.{}", package, simple),
            simple_name: simple.to_string(),
            construction: ConstructionInfo::default(),
            default_property: None,
            properties: Vec::new(),
            static_properties: Vec::new(),
            handlers: Vec::new(),
            constants: Vec::new(),
            enum_variants: Vec::new(),
        }
    }

    #[test]
    fn test_resolves_through_wildcard_import() {
        let mut oracle = StaticOracle::new();
        oracle.add_type(descriptor("demo.widgets", "Label"));

        let imports = vec!["demo.widgets.*".to_string()];
        let resolved = oracle.resolve_type("Label", &imports).unwrap();
        assert_eq!(resolved.qualified_name, "demo.widgets.Label");

        assert!(oracle.resolve_type("Button", &imports).is_none());
    }

    #[test]
    fn test_exact_import_wins_over_later_wildcard() {
        let mut oracle = StaticOracle::new();
        oracle.add_type(descriptor("a", "Label"));
        oracle.add_type(descriptor("b", "Label"));

        let imports = vec!["a.Label".to_string(), "b.*".to_string()];
        let resolved = oracle.resolve_type("Label", &imports).unwrap();
        assert_eq!(resolved.qualified_name, "a.Label");
    }

    #[test]
    fn test_qualified_name_needs_no_import() {
        let mut oracle = StaticOracle::new();
        oracle.add_type(descriptor("demo.widgets", "Label"));

        let resolved = oracle.resolve_type("demo.widgets.Label", &[]).unwrap();
        assert_eq!(resolved.simple_name, "Label");
    }

    #[test]
    fn test_fixture_round_trip() {
        let json = r#"{
            "types": [{
                "qualified_name": "demo.widgets.Slider",
                "simple_name": "Slider",
                "properties": [
                    {"name": "value", "value_type": {"kind": "float"}},
                    {"name": "orientation", "value_type": {
                        "kind": "enumeration",
                        "variants": ["HORIZONTAL", "VERTICAL"]
                    }}
                ],
                "handlers": [{"name": "onChange", "event_type": "demo.events.ChangeEvent"}]
            }],
            "controllers": [{
                "qualified_name": "demo.MainController",
                "fields": [{"name": "slider", "type_name": "demo.widgets.Slider"}],
                "methods": [{"name": "handleChange", "event_type": "demo.events.ChangeEvent"}],
                "has_initialize": true
            }]
        }"#;

        let fixture: OracleFixture = serde_json::from_str(json).unwrap();
        let oracle = StaticOracle::from_fixture(fixture);

        let slider = oracle
            .resolve_type("demo.widgets.Slider", &[])
            .expect("slider registered");
        assert!(slider.construction.no_arg_constructor);
        assert_eq!(
            slider.property("value").unwrap().value_type,
            ValueType::Float
        );
        assert!(matches!(
            slider.property("orientation").unwrap().value_type,
            ValueType::Enumeration { .. }
        ));

        let controller = oracle
            .resolve_controller("demo.MainController")
            .expect("controller registered");
        assert!(controller.has_initialize);
        assert_eq!(controller.methods_named("handleChange").len(), 1);
    }
}
