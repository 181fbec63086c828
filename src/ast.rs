//! Abstract syntax tree for parsed markup documents

use crate::error::SourceSpan;
use crate::expression::{Expression, PathSegment};

/// A fully parsed markup document: processing instructions plus the tree
/// rooted at the single top-level element.
#[derive(Debug, Clone)]
pub struct Document {
    pub file: String,
    pub imports: Vec<String>,
    pub language: Option<String>,
    pub compile: bool,
    pub root: DocumentNode,
}

impl Document {
    /// The controller class declared on the root element, if any.
    pub fn controller_name(&self) -> Option<&str> {
        self.root.body().and_then(|body| {
            body.attributes.iter().find_map(|attr| match attr {
                Attribute::Controller { class_name, .. } => Some(class_name.as_str()),
                _ => None,
            })
        })
    }
}

/// Attributes, children, and inner text shared by instance-like elements.
#[derive(Debug, Clone, Default)]
pub struct ElementBody {
    pub attributes: Vec<Attribute>,
    pub children: Vec<DocumentNode>,
    pub inner_text: Option<String>,
}

/// Document tree node. Control elements in the reserved `fx:` namespace
/// get dedicated variants rather than being treated as ordinary elements.
#[derive(Debug, Clone)]
pub enum DocumentNode {
    /// Ordinary type instantiation: `<Label text="..."/>`
    Element {
        type_name: String,
        body: ElementBody,
        span: SourceSpan,
    },

    /// `<fx:root type="...">` - the instance is provided by the caller.
    Root {
        type_name: String,
        body: ElementBody,
        span: SourceSpan,
    },

    /// Lowercase-tag property wrapper: `<padding><Insets .../></padding>`
    PropertyElement {
        name: String,
        body: ElementBody,
        span: SourceSpan,
    },

    /// `<GridPane.rowIndex>` style static property wrapper.
    StaticPropertyElement {
        class_name: String,
        property: String,
        body: ElementBody,
        span: SourceSpan,
    },

    /// `<fx:define>` - values that get ids but no place in the graph.
    Define {
        children: Vec<DocumentNode>,
        span: SourceSpan,
    },

    /// `<fx:reference source="id"/>`
    Reference { source: String, span: SourceSpan },

    /// `<fx:copy source="id"/>`
    Copy {
        source: String,
        body: ElementBody,
        span: SourceSpan,
    },

    /// `<Type fx:constant="MEMBER"/>` - static constant lookup.
    Constant {
        type_name: String,
        member: String,
        span: SourceSpan,
    },

    /// `<Type fx:factory="method"/>` - static factory invocation.
    Factory {
        type_name: String,
        method: String,
        body: ElementBody,
        span: SourceSpan,
    },

    /// `<Type fx:value="literal"/>` - valueOf-style construction.
    Value {
        type_name: String,
        literal: String,
        body: ElementBody,
        span: SourceSpan,
    },

    /// `<fx:include source="other.fxml"/>` - recorded, never inlined here,
    /// so diagnostics stay attributed to the right file.
    Include {
        source: String,
        resources: Option<String>,
        body: ElementBody,
        span: SourceSpan,
    },
}

impl DocumentNode {
    pub fn span(&self) -> SourceSpan {
        match self {
            DocumentNode::Element { span, .. }
            | DocumentNode::Root { span, .. }
            | DocumentNode::PropertyElement { span, .. }
            | DocumentNode::StaticPropertyElement { span, .. }
            | DocumentNode::Define { span, .. }
            | DocumentNode::Reference { span, .. }
            | DocumentNode::Copy { span, .. }
            | DocumentNode::Constant { span, .. }
            | DocumentNode::Factory { span, .. }
            | DocumentNode::Value { span, .. }
            | DocumentNode::Include { span, .. } => *span,
        }
    }

    pub fn body(&self) -> Option<&ElementBody> {
        match self {
            DocumentNode::Element { body, .. }
            | DocumentNode::Root { body, .. }
            | DocumentNode::PropertyElement { body, .. }
            | DocumentNode::StaticPropertyElement { body, .. }
            | DocumentNode::Copy { body, .. }
            | DocumentNode::Factory { body, .. }
            | DocumentNode::Value { body, .. }
            | DocumentNode::Include { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The `fx:id` declared on this node, if any.
    pub fn declared_id(&self) -> Option<&str> {
        self.body().and_then(|body| {
            body.attributes.iter().find_map(|attr| match attr {
                Attribute::Id { value, .. } => Some(value.as_str()),
                _ => None,
            })
        })
    }

    /// True for nodes that produce a value in the object graph.
    pub fn is_instance(&self) -> bool {
        matches!(
            self,
            DocumentNode::Element { .. }
                | DocumentNode::Root { .. }
                | DocumentNode::Reference { .. }
                | DocumentNode::Copy { .. }
                | DocumentNode::Constant { .. }
                | DocumentNode::Factory { .. }
                | DocumentNode::Value { .. }
                | DocumentNode::Include { .. }
        )
    }
}

/// A classified attribute. Attribute order is preserved by the parser since
/// it participates in assignment order when no dependency says otherwise.
#[derive(Debug, Clone)]
pub enum Attribute {
    Id {
        value: String,
        span: SourceSpan,
    },
    Controller {
        class_name: String,
        span: SourceSpan,
    },
    /// `onAction="#handleClick"` style handler binding.
    EventHandler {
        name: String,
        value: HandlerValue,
        span: SourceSpan,
    },
    /// `GridPane.rowIndex="1"` style static property.
    StaticProperty {
        class_name: String,
        property: String,
        value: AttributeValue,
        span: SourceSpan,
    },
    InstanceProperty {
        name: String,
        value: AttributeValue,
        span: SourceSpan,
    },
}

impl Attribute {
    pub fn span(&self) -> SourceSpan {
        match self {
            Attribute::Id { span, .. }
            | Attribute::Controller { span, .. }
            | Attribute::EventHandler { span, .. }
            | Attribute::StaticProperty { span, .. }
            | Attribute::InstanceProperty { span, .. } => *span,
        }
    }
}

/// A classified attribute value. Sigil classification follows the runtime
/// loader: `@location`, `%resource`, `${binding}`, `$reference`, `\escape`,
/// bracketed collections, and plain literals.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Empty,
    /// Plain text, coerced against the target property type at resolution.
    Literal(String),
    /// `@path` relative location value.
    Location(String),
    /// `%key` resource bundle lookup.
    Resource(String),
    /// `$id` or `$id.a.b()` - evaluated once at construction time.
    Reference {
        root: String,
        segments: Vec<PathSegment>,
    },
    /// `${expr}` - re-evaluated whenever its operands change.
    Binding(Expression),
    /// `[a, b, c]` - elements are themselves classified values.
    Collection(Vec<AttributeValue>),
}

impl AttributeValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, AttributeValue::Empty)
    }
}

/// Value of an event-handler attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerValue {
    Empty,
    /// `#methodName` - a controller method reference.
    Method(String),
    /// `$id` - a handler object held by a named element.
    Reference(String),
    /// Bare script text. Parsed for fidelity, rejected at resolution since
    /// generated code cannot embed a script engine.
    Script(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_with(attributes: Vec<Attribute>) -> DocumentNode {
        DocumentNode::Element {
            type_name: "Label".to_string(),
            body: ElementBody {
                attributes,
                children: Vec::new(),
                inner_text: None,
            },
            span: SourceSpan::new(2, 3),
        }
    }

    #[test]
    fn test_declared_id() {
        let node = label_with(vec![Attribute::Id {
            value: "lbl".to_string(),
            span: SourceSpan::new(2, 10),
        }]);
        assert_eq!(node.declared_id(), Some("lbl"));
        assert!(label_with(Vec::new()).declared_id().is_none());
    }

    #[test]
    fn test_controller_name_from_root() {
        let document = Document {
            file: "view.fxml".to_string(),
            imports: vec!["demo.widgets.*".to_string()],
            language: None,
            compile: true,
            root: label_with(vec![Attribute::Controller {
                class_name: "demo.MainController".to_string(),
                span: SourceSpan::new(2, 10),
            }]),
        };
        assert_eq!(document.controller_name(), Some("demo.MainController"));
    }
}
