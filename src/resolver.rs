//! Semantic resolution
//!
//! Walks the document AST against the type oracle and produces the resolved
//! graph the generator consumes: an arena of [`ResolvedElement`]s, the
//! named-element registry, a construction order satisfying every data
//! dependency, and the controller binding plan. Resolution batches errors:
//! a failed element skips its own subtree but sibling elements and sibling
//! attributes keep getting checked.
//!
//! Ids are resolved in two passes. The first pass registers every id while
//! building elements bottom-up; the second pass patches `$id` references,
//! binding operands, and copy/alias sources once the whole tree is known,
//! so forward references work without placeholder nodes.

use crate::ast::*;
use crate::dependency::DependencyGraph;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::SourceSpan;
use crate::expression::{Expression, PathSegment};
use crate::oracle::{
    ControllerDescriptor, HandlerDescriptor, TypeDescriptor, TypeOracle, ValueType,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Compiled interface of an included sub-document, as seen from the
/// including document.
#[derive(Debug, Clone)]
pub struct IncludedUnit {
    pub file: String,
    pub builder_name: String,
    /// Qualified type of the sub-document's root.
    pub root_type: String,
    /// Qualified controller class, when the sub-document declares one.
    /// Its builder then takes a provided-controller parameter.
    pub controller_type: Option<String>,
}

/// Supplies included sub-documents during resolution. The batch driver
/// implements this over its input set; `None` means the source is missing,
/// cyclic, or failed to compile (the driver reports cycle details itself).
pub trait IncludeCatalog {
    fn lookup(&self, referrer: &str, source: &str) -> Option<IncludedUnit>;
}

/// Catalog for documents that include nothing.
pub struct NoIncludes;

impl IncludeCatalog for NoIncludes {
    fn lookup(&self, _referrer: &str, _source: &str) -> Option<IncludedUnit> {
        None
    }
}

/// A literal after coercion against the target property type.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    EnumVariant { type_name: String, variant: String },
    Constant { type_name: String, member: String },
    List(Vec<CoercedValue>),
}

/// Where an assignment's value comes from.
#[derive(Debug, Clone)]
pub enum ValueSource {
    Literal(CoercedValue),
    /// `%key` resource-bundle lookup, resolved when the builder runs.
    Resource(String),
    /// A child element constructed by this document.
    Element(usize),
    /// `$id` one-shot reference, optionally with a trailing path.
    NamedRef {
        id: String,
        element: Option<usize>,
        segments: Vec<PathSegment>,
    },
    /// `${expr}` continuous binding; operands are patched in pass two.
    Binding {
        expression: Expression,
        operands: Vec<BindingOperand>,
    },
    /// Event handler bound to a controller method.
    ControllerMethod(String),
    /// Event handler held by a named element.
    HandlerRef { id: String, element: Option<usize> },
    Collection(Vec<ValueSource>),
}

#[derive(Debug, Clone)]
pub struct BindingOperand {
    pub id: String,
    pub element: Option<usize>,
}

/// The slot an assignment writes to.
#[derive(Debug, Clone)]
pub enum PropertySlot {
    Instance { name: String, sequence: bool },
    /// Static property applied through its owning class.
    Static { owner: String, property: String },
    Handler { name: String },
}

#[derive(Debug, Clone)]
pub struct PropertyAssignment {
    pub slot: PropertySlot,
    pub value: ValueSource,
    pub span: SourceSpan,
}

/// How an element's value is obtained.
#[derive(Debug, Clone)]
pub enum ConstructionStrategy {
    NoArgConstructor,
    Builder { method: String },
    Factory { method: String },
    SingleArg { argument: CoercedValue },
    ValueOf { literal: String },
    Constant { member: String },
    /// `fx:reference` - reuses another element's value.
    Alias { source_id: String, source: Option<usize> },
    /// `fx:copy` - clones another element's value.
    Copy { source_id: String, source: Option<usize> },
    Include(IncludedUnit),
    /// `fx:root` - the instance is passed into the builder by the caller.
    ProvidedRoot,
}

#[derive(Debug, Clone)]
pub struct ResolvedElement {
    pub var_name: String,
    /// Qualified type name; empty only when the type is carried by the
    /// strategy (alias sources are patched in pass two).
    pub type_name: String,
    pub descriptor: Option<Arc<TypeDescriptor>>,
    pub strategy: ConstructionStrategy,
    pub assignments: Vec<PropertyAssignment>,
    pub id: Option<String>,
    pub span: SourceSpan,
}

impl ResolvedElement {
    pub fn display_name(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.var_name)
    }
}

#[derive(Debug, Clone)]
pub struct FieldInjection {
    pub field: String,
    pub element: usize,
}

#[derive(Debug, Clone)]
pub struct ControllerPlan {
    pub class_name: String,
    pub descriptor: Arc<ControllerDescriptor>,
    pub fields: Vec<FieldInjection>,
}

/// Everything the generator needs for one document.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub file: String,
    pub root: usize,
    pub elements: Vec<ResolvedElement>,
    /// Construction order: document order except where a dependency
    /// forces an element forward.
    pub order: Vec<usize>,
    /// id to element, in registration order.
    pub registry: Vec<(String, usize)>,
    pub controller: Option<ControllerPlan>,
}

pub struct Resolver<'a> {
    oracle: &'a dyn TypeOracle,
    includes: &'a dyn IncludeCatalog,
    diagnostics: &'a mut Diagnostics,
    file: String,
    imports: Vec<String>,
    elements: Vec<ResolvedElement>,
    ids: HashMap<String, usize>,
    registry: Vec<(String, usize)>,
    used_names: HashSet<String>,
    controller: Option<(String, Arc<ControllerDescriptor>)>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        oracle: &'a dyn TypeOracle,
        includes: &'a dyn IncludeCatalog,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            oracle,
            includes,
            diagnostics,
            file: String::new(),
            imports: Vec::new(),
            elements: Vec::new(),
            ids: HashMap::new(),
            registry: Vec::new(),
            used_names: HashSet::new(),
            controller: None,
        }
    }

    /// Resolve one document. Returns `None` when any resolution error was
    /// recorded; diagnostics always accumulate regardless.
    pub fn resolve(mut self, document: &Document) -> Option<ResolvedDocument> {
        let baseline = self.diagnostics.error_count();
        self.file = document.file.clone();
        self.imports = document.imports.clone();

        self.resolve_controller_declaration(document);
        let root = self.resolve_instance(&document.root, true);
        self.patch_references();

        let order = root.and_then(|_| self.order_elements(document.root.span()));
        let controller = self.build_controller_plan();

        if self.diagnostics.error_count() > baseline {
            return None;
        }

        Some(ResolvedDocument {
            file: self.file,
            root: root?,
            elements: self.elements,
            order: order?,
            registry: self.registry,
            controller,
        })
    }

    fn resolve_controller_declaration(&mut self, document: &Document) {
        let Some(class_name) = document.controller_name() else {
            return;
        };
        match self.oracle.resolve_controller(class_name) {
            Some(descriptor) => {
                self.controller = Some((class_name.to_string(), descriptor));
            }
            None => {
                self.error(
                    DiagnosticKind::UnknownType,
                    document.root.span(),
                    format!("unknown controller class '{}'", class_name),
                );
            }
        }
    }

    /// Resolve a node that produces a value. Returns the element index, or
    /// `None` when the node failed and its subtree was skipped.
    fn resolve_instance(&mut self, node: &DocumentNode, is_root: bool) -> Option<usize> {
        match node {
            DocumentNode::Element { type_name, body, span } => {
                let descriptor = self.resolve_type(type_name, *span)?;
                let strategy = self.pick_strategy(&descriptor, body, *span)?;
                self.finish_element(descriptor.qualified_name.clone(), Some(descriptor), strategy, Some(body), is_root, *span)
            }
            DocumentNode::Root { type_name, body, span } => {
                if !is_root {
                    self.error(
                        DiagnosticKind::MalformedDocument,
                        *span,
                        "fx:root is only allowed as the document root",
                    );
                    return None;
                }
                let descriptor = self.resolve_type(type_name, *span)?;
                self.finish_element(
                    descriptor.qualified_name.clone(),
                    Some(descriptor),
                    ConstructionStrategy::ProvidedRoot,
                    Some(body),
                    true,
                    *span,
                )
            }
            DocumentNode::Reference { source, span } => {
                // Backward sources resolve now so the alias carries its
                // type; forward sources are patched in pass two.
                let (type_name, descriptor, element) = self.lookup_source(source);
                let strategy = ConstructionStrategy::Alias {
                    source_id: source.clone(),
                    source: element,
                };
                self.finish_element(type_name, descriptor, strategy, None, is_root, *span)
            }
            DocumentNode::Copy { source, body, span } => {
                let (type_name, descriptor, element) = self.lookup_source(source);
                if descriptor.is_none() && has_checkable_content(body) {
                    self.error(
                        DiagnosticKind::UnknownReference,
                        *span,
                        format!(
                            "properties on fx:copy require source '{}' to be declared first",
                            source
                        ),
                    );
                }
                let strategy = ConstructionStrategy::Copy {
                    source_id: source.clone(),
                    source: element,
                };
                self.finish_element(type_name, descriptor, strategy, Some(body), is_root, *span)
            }
            DocumentNode::Constant { type_name, member, span } => {
                let descriptor = self.resolve_type(type_name, *span)?;
                if !descriptor.has_constant(member) && !descriptor.enum_variants.iter().any(|v| v == member) {
                    self.error(
                        DiagnosticKind::InvalidValue,
                        *span,
                        format!("{} has no constant '{}'", descriptor.qualified_name, member),
                    );
                    return None;
                }
                let strategy = ConstructionStrategy::Constant {
                    member: member.clone(),
                };
                self.finish_element(descriptor.qualified_name.clone(), Some(descriptor), strategy, None, is_root, *span)
            }
            DocumentNode::Factory { type_name, method, body, span } => {
                let descriptor = self.resolve_type(type_name, *span)?;
                if !descriptor.construction.factories.iter().any(|f| f == method) {
                    self.error(
                        DiagnosticKind::InvalidValue,
                        *span,
                        format!("{} has no factory method '{}'", descriptor.qualified_name, method),
                    );
                    return None;
                }
                let strategy = ConstructionStrategy::Factory {
                    method: method.clone(),
                };
                self.finish_element(descriptor.qualified_name.clone(), Some(descriptor), strategy, Some(body), is_root, *span)
            }
            DocumentNode::Value { type_name, literal, body, span } => {
                let descriptor = self.resolve_type(type_name, *span)?;
                if !descriptor.construction.value_of {
                    self.error(
                        DiagnosticKind::InvalidValue,
                        *span,
                        format!("{} has no string-coercing constructor", descriptor.qualified_name),
                    );
                    return None;
                }
                let strategy = ConstructionStrategy::ValueOf {
                    literal: literal.clone(),
                };
                self.finish_element(descriptor.qualified_name.clone(), Some(descriptor), strategy, Some(body), is_root, *span)
            }
            DocumentNode::Include { source, body, span, .. } => {
                let Some(unit) = self.includes.lookup(&self.file, source) else {
                    self.error(
                        DiagnosticKind::UnknownReference,
                        *span,
                        format!("cannot include '{}'", source),
                    );
                    return None;
                };
                // Properties on the include apply to the sub-document's
                // root, so they resolve against its type when known.
                let descriptor = self.oracle.resolve_type(&unit.root_type, &[]);
                let type_name = unit.root_type.clone();
                let strategy = ConstructionStrategy::Include(unit);
                self.finish_element(type_name, descriptor, strategy, Some(body), is_root, *span)
            }
            DocumentNode::Define { span, .. }
            | DocumentNode::PropertyElement { span, .. }
            | DocumentNode::StaticPropertyElement { span, .. } => {
                self.error(
                    DiagnosticKind::MalformedDocument,
                    *span,
                    "expected an instance-producing element here",
                );
                None
            }
        }
    }

    /// The type carried by an already-registered source element, for
    /// alias and copy nodes. Ids register bottom-up, so any source that
    /// appears before its use in document order resolves here.
    fn lookup_source(
        &self,
        source_id: &str,
    ) -> (String, Option<Arc<TypeDescriptor>>, Option<usize>) {
        match self.ids.get(source_id) {
            Some(&index) => {
                let element = &self.elements[index];
                (element.type_name.clone(), element.descriptor.clone(), Some(index))
            }
            None => (String::new(), None, None),
        }
    }

    fn resolve_type(&mut self, name: &str, span: SourceSpan) -> Option<Arc<TypeDescriptor>> {
        match self.oracle.resolve_type(name, &self.imports) {
            Some(descriptor) => Some(descriptor),
            None => {
                self.error(
                    DiagnosticKind::UnknownType,
                    span,
                    format!("unknown type '{}'", name),
                );
                None
            }
        }
    }

    /// No-argument constructor when available, then builder, then a
    /// single-argument constructor fed the coerced inner text.
    fn pick_strategy(
        &mut self,
        descriptor: &TypeDescriptor,
        body: &ElementBody,
        span: SourceSpan,
    ) -> Option<ConstructionStrategy> {
        let construction = &descriptor.construction;
        if construction.no_arg_constructor {
            return Some(ConstructionStrategy::NoArgConstructor);
        }
        if let Some(method) = &construction.builder_method {
            return Some(ConstructionStrategy::Builder {
                method: method.clone(),
            });
        }
        if let Some(arg_type) = &construction.single_arg {
            if let Some(text) = body.inner_text.as_deref() {
                let argument = self.coerce_literal(text, arg_type, span)?;
                return Some(ConstructionStrategy::SingleArg { argument });
            }
        }
        self.error(
            DiagnosticKind::InvalidValue,
            span,
            format!("no usable construction form for {}", descriptor.qualified_name),
        );
        None
    }

    /// Process an element's body into assignments, then allocate its slot
    /// in the arena. Children are resolved before the element itself, so
    /// arena index order is completion order.
    fn finish_element(
        &mut self,
        type_name: String,
        descriptor: Option<Arc<TypeDescriptor>>,
        strategy: ConstructionStrategy,
        body: Option<&ElementBody>,
        is_root: bool,
        span: SourceSpan,
    ) -> Option<usize> {
        let mut assignments = Vec::new();
        let mut id = None;

        if let Some(body) = body {
            id = body.attributes.iter().find_map(|a| match a {
                Attribute::Id { value, .. } => Some(value.clone()),
                _ => None,
            });

            self.resolve_attributes(descriptor.as_deref(), body, is_root, &mut assignments);
            self.resolve_children(descriptor.as_deref(), body, span, &mut assignments);
        }

        let var_name = self.synthesize_var_name(id.as_deref(), &type_name, &strategy);
        let index = self.elements.len();
        self.elements.push(ResolvedElement {
            var_name,
            type_name,
            descriptor,
            strategy,
            assignments,
            id: id.clone(),
            span,
        });

        if let Some(id) = id {
            self.register_id(id, index, span);
        }

        Some(index)
    }

    fn register_id(&mut self, id: String, index: usize, span: SourceSpan) {
        if self.ids.contains_key(&id) {
            self.error(
                DiagnosticKind::DuplicateId,
                span,
                format!("id '{}' is already declared", id),
            );
            return;
        }
        self.ids.insert(id.clone(), index);
        self.registry.push((id, index));
    }

    fn resolve_attributes(
        &mut self,
        descriptor: Option<&TypeDescriptor>,
        body: &ElementBody,
        is_root: bool,
        assignments: &mut Vec<PropertyAssignment>,
    ) {
        for attribute in &body.attributes {
            match attribute {
                Attribute::Id { .. } => {}
                Attribute::Controller { span, .. } => {
                    if !is_root {
                        self.error(
                            DiagnosticKind::MalformedDocument,
                            *span,
                            "a controller may only be declared on the root element",
                        );
                    }
                }
                Attribute::EventHandler { name, value, span } => {
                    if let Some(assignment) =
                        self.resolve_handler(descriptor, name, value, *span)
                    {
                        assignments.push(assignment);
                    }
                }
                Attribute::StaticProperty {
                    class_name,
                    property,
                    value,
                    span,
                } => {
                    if let Some(assignment) =
                        self.resolve_static_property(class_name, property, value, *span)
                    {
                        assignments.push(assignment);
                    }
                }
                Attribute::InstanceProperty { name, value, span } => {
                    if let Some(assignment) =
                        self.resolve_instance_property(descriptor, name, value, *span)
                    {
                        assignments.push(assignment);
                    }
                }
            }
        }
    }

    fn resolve_instance_property(
        &mut self,
        descriptor: Option<&TypeDescriptor>,
        name: &str,
        value: &AttributeValue,
        span: SourceSpan,
    ) -> Option<PropertyAssignment> {
        let descriptor = descriptor?;
        let Some(property) = descriptor.property(name) else {
            self.error(
                DiagnosticKind::UnknownAttribute,
                span,
                format!("{} has no property '{}'", descriptor.qualified_name, name),
            );
            return None;
        };
        if self.reject_read_only(property, &descriptor.qualified_name, span) {
            return None;
        }
        let value_type = property.value_type.clone();
        let sequence = value_type.is_sequence();
        let name = property.name.clone();
        let source = self.resolve_value(value, &value_type, span)?;
        Some(PropertyAssignment {
            slot: PropertySlot::Instance { name, sequence },
            value: source,
            span,
        })
    }

    fn resolve_static_property(
        &mut self,
        class_name: &str,
        property: &str,
        value: &AttributeValue,
        span: SourceSpan,
    ) -> Option<PropertyAssignment> {
        let owner = self.resolve_type(class_name, span)?;
        let Some(static_property) = owner.static_property(property) else {
            self.error(
                DiagnosticKind::UnknownAttribute,
                span,
                format!("{} has no static property '{}'", owner.qualified_name, property),
            );
            return None;
        };
        let value_type = static_property.value_type.clone();
        let source = self.resolve_value(value, &value_type, span)?;
        Some(PropertyAssignment {
            slot: PropertySlot::Static {
                owner: owner.qualified_name.clone(),
                property: property.to_string(),
            },
            value: source,
            span,
        })
    }

    fn resolve_handler(
        &mut self,
        descriptor: Option<&TypeDescriptor>,
        name: &str,
        value: &HandlerValue,
        span: SourceSpan,
    ) -> Option<PropertyAssignment> {
        let descriptor = descriptor?;
        let Some(handler) = descriptor.handler(name) else {
            self.error(
                DiagnosticKind::UnknownAttribute,
                span,
                format!("{} has no event handler '{}'", descriptor.qualified_name, name),
            );
            return None;
        };
        let handler = handler.clone();

        let source = match value {
            HandlerValue::Empty => return None,
            HandlerValue::Method(method) => {
                self.bind_controller_method(&handler, method, span)?
            }
            HandlerValue::Reference(id) => ValueSource::HandlerRef {
                id: id.clone(),
                element: None,
            },
            HandlerValue::Script(_) => {
                self.error(
                    DiagnosticKind::InvalidValue,
                    span,
                    format!(
                        "'{}' uses inline script, which generated code cannot execute",
                        name
                    ),
                );
                return None;
            }
        };

        Some(PropertyAssignment {
            slot: PropertySlot::Handler {
                name: handler.name.clone(),
            },
            value: source,
            span,
        })
    }

    /// Overloads are disambiguated by the handler slot's event type; a
    /// zero-argument method is acceptable when it is the only survivor.
    fn bind_controller_method(
        &mut self,
        handler: &HandlerDescriptor,
        method: &str,
        span: SourceSpan,
    ) -> Option<ValueSource> {
        let Some((_, controller)) = self.controller.clone() else {
            self.error(
                DiagnosticKind::UnknownReference,
                span,
                format!("handler '#{}' requires a controller declaration", method),
            );
            return None;
        };

        let candidates = controller.methods_named(method);
        if candidates.is_empty() {
            self.error(
                DiagnosticKind::UnknownReference,
                span,
                format!("controller has no method '{}'", method),
            );
            return None;
        }
        if candidates.len() > 1 {
            let matching: Vec<_> = candidates
                .iter()
                .filter(|m| m.event_type.as_deref() == Some(handler.event_type.as_str()))
                .collect();
            if matching.len() != 1 {
                self.error(
                    DiagnosticKind::AmbiguousControllerBinding,
                    span,
                    format!(
                        "method '{}' is ambiguous for event type {}",
                        method, handler.event_type
                    ),
                );
                return None;
            }
        }

        Some(ValueSource::ControllerMethod(method.to_string()))
    }

    fn resolve_children(
        &mut self,
        descriptor: Option<&TypeDescriptor>,
        body: &ElementBody,
        span: SourceSpan,
        assignments: &mut Vec<PropertyAssignment>,
    ) {
        let mut default_children = Vec::new();

        for child in &body.children {
            match child {
                DocumentNode::Define { children, .. } => {
                    // Defined values live in the registry only; they reach
                    // the graph through $id references.
                    for definition in children {
                        if definition.declared_id().is_none() {
                            self.error(
                                DiagnosticKind::MalformedDocument,
                                definition.span(),
                                "definitions must declare fx:id to be reachable",
                            );
                        }
                        self.resolve_instance(definition, false);
                    }
                }
                DocumentNode::PropertyElement { name, body, span } => {
                    if let Some(assignment) =
                        self.resolve_property_element(descriptor, name, body, *span)
                    {
                        assignments.push(assignment);
                    }
                }
                DocumentNode::StaticPropertyElement {
                    class_name,
                    property,
                    body,
                    span,
                } => {
                    if let Some(assignment) =
                        self.resolve_static_property_element(class_name, property, body, *span)
                    {
                        assignments.push(assignment);
                    }
                }
                node if node.is_instance() => {
                    if let Some(index) = self.resolve_instance(node, false) {
                        default_children.push((index, node.span()));
                    }
                }
                node => {
                    self.error(
                        DiagnosticKind::MalformedDocument,
                        node.span(),
                        "unexpected content inside element",
                    );
                }
            }
        }

        self.assign_default_property(descriptor, body, default_children, span, assignments);
    }

    fn assign_default_property(
        &mut self,
        descriptor: Option<&TypeDescriptor>,
        body: &ElementBody,
        default_children: Vec<(usize, SourceSpan)>,
        span: SourceSpan,
        assignments: &mut Vec<PropertyAssignment>,
    ) {
        let text = body
            .inner_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        if default_children.is_empty() && text.is_none() {
            return;
        }
        let Some(descriptor) = descriptor else {
            return;
        };
        let Some(property) = descriptor.default_property_descriptor() else {
            self.error(
                DiagnosticKind::InvalidDefaultProperty,
                span,
                format!(
                    "{} does not accept unwrapped children",
                    descriptor.qualified_name
                ),
            );
            return;
        };

        let sequence = property.value_type.is_sequence();
        if default_children.len() > 1 && !sequence {
            self.error(
                DiagnosticKind::InvalidDefaultProperty,
                span,
                format!(
                    "default property '{}' of {} holds a single value",
                    property.name, descriptor.qualified_name
                ),
            );
            return;
        }

        let name = property.name.clone();
        let value_type = property.value_type.clone();

        for (child, child_span) in default_children {
            assignments.push(PropertyAssignment {
                slot: PropertySlot::Instance {
                    name: name.clone(),
                    sequence,
                },
                value: ValueSource::Element(child),
                span: child_span,
            });
        }

        if let Some(text) = text {
            let target = match &value_type {
                ValueType::Sequence { element } => element.as_ref().clone(),
                other => other.clone(),
            };
            if let Some(coerced) = self.coerce_literal(text, &target, span) {
                assignments.push(PropertyAssignment {
                    slot: PropertySlot::Instance {
                        name: name.clone(),
                        sequence,
                    },
                    value: ValueSource::Literal(coerced),
                    span,
                });
            }
        }
    }

    fn resolve_property_element(
        &mut self,
        descriptor: Option<&TypeDescriptor>,
        name: &str,
        body: &ElementBody,
        span: SourceSpan,
    ) -> Option<PropertyAssignment> {
        let descriptor = descriptor?;
        let Some(property) = descriptor.property(name) else {
            self.error(
                DiagnosticKind::UnknownAttribute,
                span,
                format!("{} has no property '{}'", descriptor.qualified_name, name),
            );
            return None;
        };
        if self.reject_read_only(property, &descriptor.qualified_name, span) {
            return None;
        }
        let value_type = property.value_type.clone();
        let name = property.name.clone();

        for attribute in &body.attributes {
            self.error(
                DiagnosticKind::UnknownAttribute,
                attribute.span(),
                "property elements take no attributes",
            );
        }

        let sequence = value_type.is_sequence();
        let value = self.resolve_wrapped_content(body, &value_type, sequence, span)?;
        Some(PropertyAssignment {
            slot: PropertySlot::Instance { name, sequence },
            value,
            span,
        })
    }

    fn resolve_static_property_element(
        &mut self,
        class_name: &str,
        property: &str,
        body: &ElementBody,
        span: SourceSpan,
    ) -> Option<PropertyAssignment> {
        let owner = self.resolve_type(class_name, span)?;
        let Some(static_property) = owner.static_property(property) else {
            self.error(
                DiagnosticKind::UnknownAttribute,
                span,
                format!("{} has no static property '{}'", owner.qualified_name, property),
            );
            return None;
        };
        let value_type = static_property.value_type.clone();
        let owner_name = owner.qualified_name.clone();
        let value = self.resolve_wrapped_content(body, &value_type, false, span)?;
        Some(PropertyAssignment {
            slot: PropertySlot::Static {
                owner: owner_name,
                property: property.to_string(),
            },
            value,
            span,
        })
    }

    /// Content of a property-element wrapper: either literal text or
    /// nested instance children.
    fn resolve_wrapped_content(
        &mut self,
        body: &ElementBody,
        value_type: &ValueType,
        sequence: bool,
        span: SourceSpan,
    ) -> Option<ValueSource> {
        let children: Vec<_> = body.children.iter().collect();

        if children.is_empty() {
            let text = body
                .inner_text
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty());
            let Some(text) = text else {
                self.error(DiagnosticKind::InvalidValue, span, "empty property element");
                return None;
            };
            return match crate::expression::parse_value(text, &self.file, span, true) {
                Ok(value) => self.resolve_value(&value, value_type, span),
                Err(error) => {
                    self.error(DiagnosticKind::MalformedExpression, span, error.to_string());
                    None
                }
            };
        }

        if sequence {
            let mut items = Vec::new();
            for child in children {
                if let Some(index) = self.resolve_instance(child, false) {
                    items.push(ValueSource::Element(index));
                }
            }
            return Some(ValueSource::Collection(items));
        }

        if children.len() > 1 {
            self.error(
                DiagnosticKind::InvalidValue,
                span,
                "single-valued property element holds more than one child",
            );
            return None;
        }
        let index = self.resolve_instance(children[0], false)?;
        Some(ValueSource::Element(index))
    }

    /// Classify a parsed attribute value against the target type.
    fn resolve_value(
        &mut self,
        value: &AttributeValue,
        value_type: &ValueType,
        span: SourceSpan,
    ) -> Option<ValueSource> {
        match value {
            AttributeValue::Empty => None,
            AttributeValue::Literal(text) => {
                let target = match value_type {
                    ValueType::Sequence { element } => element.as_ref(),
                    other => other,
                };
                Some(ValueSource::Literal(self.coerce_literal(text, target, span)?))
            }
            AttributeValue::Location(_) => {
                self.error(
                    DiagnosticKind::InvalidValue,
                    span,
                    "location values (@path) are not supported by compiled documents",
                );
                None
            }
            AttributeValue::Resource(key) => {
                if !matches!(value_type, ValueType::String) {
                    self.error(
                        DiagnosticKind::InvalidValue,
                        span,
                        format!(
                            "resource lookup '%{}' targets a non-string property",
                            key
                        ),
                    );
                    return None;
                }
                Some(ValueSource::Resource(key.clone()))
            }
            AttributeValue::Reference { root, segments } => Some(ValueSource::NamedRef {
                id: root.clone(),
                element: None,
                segments: segments.clone(),
            }),
            AttributeValue::Binding(expression) => {
                let operands = expression
                    .referenced_ids()
                    .into_iter()
                    .map(|id| BindingOperand {
                        id: id.to_string(),
                        element: None,
                    })
                    .collect();
                Some(ValueSource::Binding {
                    expression: expression.clone(),
                    operands,
                })
            }
            AttributeValue::Collection(items) => {
                let element_type = match value_type {
                    ValueType::Sequence { element } => element.as_ref().clone(),
                    _ => {
                        self.error(
                            DiagnosticKind::InvalidValue,
                            span,
                            "collection literal targets a non-sequence property",
                        );
                        return None;
                    }
                };
                let mut sources = Vec::with_capacity(items.len());
                for item in items {
                    sources.push(self.resolve_value(item, &element_type, span)?);
                }
                Some(ValueSource::Collection(sources))
            }
        }
    }

    /// Read-only scalar properties have no setter to call. Read-only
    /// sequences are still fillable through their accessor.
    fn reject_read_only(
        &mut self,
        property: &crate::oracle::PropertyDescriptor,
        type_name: &str,
        span: SourceSpan,
    ) -> bool {
        if property.read_only && !property.value_type.is_sequence() {
            self.error(
                DiagnosticKind::InvalidValue,
                span,
                format!("property '{}' of {} is read-only", property.name, type_name),
            );
            return true;
        }
        false
    }

    /// Deterministic literal coercion: string passthrough, numeric parse,
    /// boolean, case-insensitive enumeration match, constant-name lookup.
    fn coerce_literal(
        &mut self,
        text: &str,
        value_type: &ValueType,
        span: SourceSpan,
    ) -> Option<CoercedValue> {
        let coerced = match value_type {
            ValueType::String => Some(CoercedValue::Str(text.to_string())),
            ValueType::Integer => text.trim().parse::<i64>().ok().map(CoercedValue::Int),
            ValueType::Float => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(CoercedValue::Float),
            ValueType::Boolean => {
                let trimmed = text.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Some(CoercedValue::Bool(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Some(CoercedValue::Bool(false))
                } else {
                    None
                }
            }
            ValueType::Enumeration { variants } => variants
                .iter()
                .find(|v| v.eq_ignore_ascii_case(text.trim()))
                .map(|variant| CoercedValue::EnumVariant {
                    type_name: String::new(),
                    variant: variant.clone(),
                }),
            ValueType::Object { type_name } => self.coerce_object_literal(text, type_name),
            ValueType::Sequence { element } => {
                let mut items = Vec::new();
                for part in text.split(',') {
                    items.push(self.coerce_literal(part.trim(), element, span)?);
                }
                return Some(CoercedValue::List(items));
            }
            ValueType::Handler { .. } => None,
        };

        if coerced.is_none() {
            self.error(
                DiagnosticKind::InvalidValue,
                span,
                format!("cannot coerce '{}' to {}", text, value_type.describe()),
            );
        }
        coerced
    }

    /// Object-typed targets accept enumeration variants and recognized
    /// constant names declared on the target type.
    fn coerce_object_literal(&mut self, text: &str, type_name: &str) -> Option<CoercedValue> {
        let descriptor = self.oracle.resolve_type(type_name, &self.imports)?;
        let trimmed = text.trim();

        if let Some(variant) = descriptor
            .enum_variants
            .iter()
            .find(|v| v.eq_ignore_ascii_case(trimmed))
        {
            return Some(CoercedValue::EnumVariant {
                type_name: descriptor.qualified_name.clone(),
                variant: variant.clone(),
            });
        }
        if descriptor.has_constant(trimmed) {
            return Some(CoercedValue::Constant {
                type_name: descriptor.qualified_name.clone(),
                member: trimmed.to_string(),
            });
        }
        None
    }

    /// Second pass: patch every id reference now that the registry is
    /// complete. Unresolved ids are fatal for the referencing assignment.
    fn patch_references(&mut self) {
        let has_controller = self.controller.is_some();
        let mut elements = std::mem::take(&mut self.elements);

        for element in &mut elements {
            match &mut element.strategy {
                ConstructionStrategy::Alias { source_id, source }
                | ConstructionStrategy::Copy { source_id, source } => {
                    match self.ids.get(source_id) {
                        Some(&index) => *source = Some(index),
                        None => {
                            let message = format!("unknown source id '{}'", source_id);
                            self.diagnostics.error(
                                DiagnosticKind::UnknownReference,
                                &self.file,
                                element.span,
                                message,
                            );
                        }
                    }
                }
                _ => {}
            }

            // Aliases and copies take their type from the source element,
            // patched below once all strategies are known.

            for assignment in &mut element.assignments {
                Self::patch_value(
                    &self.ids,
                    has_controller,
                    &self.file,
                    self.diagnostics,
                    &mut assignment.value,
                    assignment.span,
                );
            }
        }

        // Propagate source types into aliases and copies.
        for index in 0..elements.len() {
            let source = match &elements[index].strategy {
                ConstructionStrategy::Alias { source: Some(s), .. }
                | ConstructionStrategy::Copy { source: Some(s), .. } => Some(*s),
                _ => None,
            };
            if let Some(source) = source {
                elements[index].type_name = elements[source].type_name.clone();
                elements[index].descriptor = elements[source].descriptor.clone();
            }
        }

        self.elements = elements;
    }

    fn patch_value(
        ids: &HashMap<String, usize>,
        has_controller: bool,
        file: &str,
        diagnostics: &mut Diagnostics,
        value: &mut ValueSource,
        span: SourceSpan,
    ) {
        // Paths may root at the declared controller. An element id named
        // "controller" shadows it; otherwise the operand stays unpatched
        // and the generator addresses the controller variable directly.
        match value {
            ValueSource::NamedRef { id, element, .. }
            | ValueSource::HandlerRef { id, element } => match ids.get(id.as_str()) {
                Some(&index) => *element = Some(index),
                None if has_controller && id == "controller" => {}
                None => diagnostics.error(
                    DiagnosticKind::UnknownReference,
                    file,
                    span,
                    format!("unknown id '{}'", id),
                ),
            },
            ValueSource::Binding { operands, .. } => {
                for operand in operands {
                    match ids.get(operand.id.as_str()) {
                        Some(&index) => operand.element = Some(index),
                        None if has_controller && operand.id == "controller" => {}
                        None => diagnostics.error(
                            DiagnosticKind::UnknownReference,
                            file,
                            span,
                            format!("unknown id '{}' in binding", operand.id),
                        ),
                    }
                }
            }
            ValueSource::Collection(items) => {
                for item in items {
                    Self::patch_value(ids, has_controller, file, diagnostics, item, span);
                }
            }
            _ => {}
        }
    }

    /// Build the dependency graph and compute construction order.
    fn order_elements(&mut self, root_span: SourceSpan) -> Option<Vec<usize>> {
        let mut graph = DependencyGraph::new(self.elements.len());

        for (index, element) in self.elements.iter().enumerate() {
            match &element.strategy {
                ConstructionStrategy::Alias { source: Some(s), .. }
                | ConstructionStrategy::Copy { source: Some(s), .. } => {
                    graph.add_dependency(index, *s);
                }
                _ => {}
            }
            for assignment in &element.assignments {
                Self::collect_value_deps(&assignment.value, index, &mut graph);
            }
        }

        match graph.order() {
            Ok(order) => Some(order),
            Err(cycle) => {
                let names: Vec<_> = cycle
                    .iter()
                    .map(|&i| self.elements[i].display_name().to_string())
                    .collect();
                self.error(
                    DiagnosticKind::CyclicDependency,
                    root_span,
                    format!("construction cycle: {}", names.join(" -> ")),
                );
                None
            }
        }
    }

    fn collect_value_deps(value: &ValueSource, node: usize, graph: &mut DependencyGraph) {
        match value {
            ValueSource::Element(index) => graph.add_dependency(node, *index),
            ValueSource::NamedRef {
                element: Some(index),
                ..
            }
            | ValueSource::HandlerRef {
                element: Some(index),
                ..
            } => graph.add_dependency(node, *index),
            ValueSource::Binding { operands, .. } => {
                for operand in operands {
                    if let Some(index) = operand.element {
                        graph.add_dependency(node, index);
                    }
                }
            }
            ValueSource::Collection(items) => {
                for item in items {
                    Self::collect_value_deps(item, node, graph);
                }
            }
            _ => {}
        }
    }

    /// Match registered ids against controller fields for injection.
    fn build_controller_plan(&mut self) -> Option<ControllerPlan> {
        let (class_name, descriptor) = self.controller.clone()?;
        let mut fields = Vec::new();

        for (id, index) in &self.registry {
            let Some(field) = descriptor.field(id) else {
                continue;
            };
            let element_type = &self.elements[*index].type_name;
            if !element_type.is_empty() && field.type_name != *element_type {
                self.diagnostics.warning(
                    DiagnosticKind::InvalidValue,
                    &self.file,
                    self.elements[*index].span,
                    format!(
                        "field '{}' is declared as {} but '{}' is a {}",
                        field.name, field.type_name, id, element_type
                    ),
                );
                continue;
            }
            fields.push(FieldInjection {
                field: field.name.clone(),
                element: *index,
            });
        }

        Some(ControllerPlan {
            class_name,
            descriptor,
            fields,
        })
    }

    fn synthesize_var_name(
        &mut self,
        id: Option<&str>,
        type_name: &str,
        strategy: &ConstructionStrategy,
    ) -> String {
        let base = match id {
            Some(id) => sanitize_identifier(id),
            None => {
                let simple = type_name.rsplit('.').next().unwrap_or(type_name);
                let stem = match strategy {
                    ConstructionStrategy::Include(unit) => {
                        format!("{}_include", sanitize_identifier(&unit.builder_name))
                    }
                    _ if simple.is_empty() => "value".to_string(),
                    _ => to_snake_case(simple),
                };
                stem
            }
        };

        let mut candidate = base.clone();
        let mut counter = 1;
        while !self.used_names.insert(candidate.clone()) {
            counter += 1;
            candidate = format!("{}_{}", base, counter);
        }
        candidate
    }

    fn error(&mut self, kind: DiagnosticKind, span: SourceSpan, message: impl Into<String>) {
        self.diagnostics.error(kind, &self.file, span, message);
    }
}

/// Whether an element body carries anything that needs a type to check:
/// property attributes, children, or inner text. A bare `fx:id` does not.
fn has_checkable_content(body: &ElementBody) -> bool {
    body.attributes
        .iter()
        .any(|a| !matches!(a, Attribute::Id { .. }))
        || !body.children.is_empty()
        || body
            .inner_text
            .as_deref()
            .map_or(false, |t| !t.trim().is_empty())
}

/// Lowercase a camel-case name with underscores at case boundaries.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn sanitize_identifier(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    to_snake_case(&out)
}
