//! Code generation
//!
//! Lowers a [`ResolvedDocument`] into one builder source file. The builder
//! exposes a single `build` function that constructs the object graph in
//! the resolved order, wires handlers and bindings through the `fxrt`
//! runtime support library, registers named elements, and invokes the
//! controller's post-construction hook exactly once at the end.
//!
//! Generation never originates user-facing errors. A resolved graph that
//! still contains an unresolved reference is a resolver contract breach
//! and is reported as an internal invariant violation.

use crate::diagnostics::Diagnostics;
use crate::error::SourceSpan;
use crate::expression::{Expression, PathSegment};
use crate::resolver::{
    to_snake_case, CoercedValue, ConstructionStrategy, ControllerPlan, PropertyAssignment,
    PropertySlot, ResolvedDocument, ResolvedElement, ValueSource,
};
use std::path::Path;

/// One emitted source artifact per input document.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub file: String,
    /// Module the builder lives in, derived from the file stem.
    pub module_name: String,
    /// Qualified markup type of the document root.
    pub root_type: String,
    pub source: String,
    /// id to generated variable name, in registration order.
    pub id_map: Vec<(String, String)>,
    /// Qualified controller class, when the document declares one.
    pub controller_type: Option<String>,
}

/// Builder module name for a markup file path: `ui/MainView.fxml`
/// becomes `main_view`.
pub fn module_name(file: &str) -> String {
    let stem = Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    to_snake_case(&sanitized)
}

pub struct CodeGenerator<'a> {
    document: &'a ResolvedDocument,
    diagnostics: &'a mut Diagnostics,
    out: String,
    indent: usize,
}

impl<'a> CodeGenerator<'a> {
    pub fn generate(
        document: &'a ResolvedDocument,
        diagnostics: &'a mut Diagnostics,
    ) -> Option<CompiledUnit> {
        let mut generator = Self {
            document,
            diagnostics,
            out: String::new(),
            indent: 0,
        };
        generator.emit_unit()
    }

    fn emit_unit(&mut self) -> Option<CompiledUnit> {
        let root = &self.document.elements[self.document.root];
        let root_type = root.type_name.clone();
        let root_var = root.var_name.clone();
        let provided_root = matches!(root.strategy, ConstructionStrategy::ProvidedRoot);

        self.line(format!(
            "// Generated by {} {} from {}. Do not edit.",
            crate::NAME,
            crate::VERSION,
            self.document.file
        ));
        self.line("");

        self.emit_signature(&root_type, provided_root);
        self.indent += 1;
        self.line("let mut registry = fxrt::Registry::new();");
        self.emit_controller_setup();
        self.line("");

        let order = self.document.order.clone();
        for index in order {
            self.emit_element(index)?;
        }

        self.emit_controller_finish();

        self.line(format!("Ok(fxrt::BuildResult::new({}, registry))", root_var));
        self.indent -= 1;
        self.line("}");

        let id_map = self
            .document
            .registry
            .iter()
            .map(|(id, index)| (id.clone(), self.document.elements[*index].var_name.clone()))
            .collect();

        Some(CompiledUnit {
            file: self.document.file.clone(),
            module_name: module_name(&self.document.file),
            root_type,
            source: std::mem::take(&mut self.out),
            id_map,
            controller_type: self
                .document
                .controller
                .as_ref()
                .map(|c| c.class_name.clone()),
        })
    }

    fn emit_signature(&mut self, root_type: &str, provided_root: bool) {
        let root_path = type_path(root_type);
        self.line("#[allow(clippy::redundant_clone)]");
        self.line("pub fn build(");
        if let Some(controller) = &self.document.controller {
            self.line(format!(
                "    controller: Option<{}>,",
                type_path(&controller.class_name)
            ));
        }
        if provided_root {
            self.line(format!("    root: {},", root_path));
        }
        self.line("    resources: &fxrt::Resources,");
        self.line(format!(
            ") -> fxrt::Result<fxrt::BuildResult<{}>> {{",
            root_path
        ));
    }

    /// The controller instance exists before any element is built so that
    /// handler wiring can capture it.
    fn emit_controller_setup(&mut self) {
        let Some(controller) = &self.document.controller else {
            return;
        };
        let path = type_path(&controller.class_name);
        let construct = match &controller.descriptor.factory_method {
            Some(factory) => format!("{}::{}", path, to_snake_case(factory)),
            None => format!("{}::new", path),
        };
        self.line(format!(
            "let controller = controller.unwrap_or_else({});",
            construct
        ));
    }

    /// Field injection happens after every element exists; the hook runs
    /// once, strictly after all fields and handlers are in place.
    fn emit_controller_finish(&mut self) {
        let Some(controller) = self.document.controller.clone() else {
            return;
        };
        self.emit_field_injections(&controller);
        if controller.descriptor.has_initialize {
            self.line("controller.initialize();");
        }
        self.line("registry.set_controller(controller);");
        self.line("");
    }

    fn emit_field_injections(&mut self, controller: &ControllerPlan) {
        for injection in &controller.fields {
            let var = self.document.elements[injection.element].var_name.clone();
            self.line(format!(
                "controller.set_{}({}.clone());",
                to_snake_case(&injection.field),
                var
            ));
        }
    }

    /// One atomic block per element: construction, then its assignments.
    fn emit_element(&mut self, index: usize) -> Option<()> {
        let element = self.document.elements[index].clone();
        self.emit_construction(&element)?;

        for assignment in &element.assignments {
            self.emit_assignment(&element, assignment)?;
        }

        if let Some(id) = &element.id {
            self.line(format!(
                "registry.insert(\"{}\", {}.clone().into());",
                escape_str(id),
                element.var_name
            ));
        }
        self.line("");
        Some(())
    }

    fn emit_construction(&mut self, element: &ResolvedElement) -> Option<()> {
        let var = &element.var_name;
        let path = type_path(&element.type_name);

        match &element.strategy {
            ConstructionStrategy::NoArgConstructor => {
                self.line(format!("let {} = {}::new();", var, path));
            }
            ConstructionStrategy::Builder { method } => {
                self.line(format!(
                    "let {} = {}::builder().{}();",
                    var,
                    path,
                    to_snake_case(method)
                ));
            }
            ConstructionStrategy::Factory { method } => {
                self.line(format!(
                    "let {} = {}::{}();",
                    var,
                    path,
                    to_snake_case(method)
                ));
            }
            ConstructionStrategy::SingleArg { argument } => {
                let rendered = self.render_coerced(argument);
                self.line(format!("let {} = {}::new({});", var, path, rendered));
            }
            ConstructionStrategy::ValueOf { literal } => {
                self.line(format!(
                    "let {} = {}::value_of(\"{}\")?;",
                    var,
                    path,
                    escape_str(literal)
                ));
            }
            ConstructionStrategy::Constant { member } => {
                self.line(format!("let {} = {}::{};", var, path, member));
            }
            ConstructionStrategy::Alias { source, source_id } => {
                let source = self.expect_resolved(*source, element.span, source_id)?;
                self.line(format!("let {} = {}.clone();", var, source));
            }
            ConstructionStrategy::Copy { source, source_id } => {
                let source = self.expect_resolved(*source, element.span, source_id)?;
                self.line(format!("let {} = fxrt::copy(&{});", var, source));
            }
            ConstructionStrategy::Include(unit) => {
                // The sub-document is fully constructed before any property
                // of the splice point is read; its ids merge under a prefix.
                let arguments = if unit.controller_type.is_some() {
                    "None, resources"
                } else {
                    "resources"
                };
                self.line(format!(
                    "let {}_unit = {}::build({})?;",
                    var, unit.builder_name, arguments
                ));
                self.line(format!("let {} = {}_unit.root.clone();", var, var));
                let prefix = element.id.as_deref().unwrap_or(&unit.builder_name);
                self.line(format!(
                    "registry.merge_namespaced(\"{}\", {}_unit.registry);",
                    escape_str(prefix),
                    var
                ));
            }
            ConstructionStrategy::ProvidedRoot => {
                self.line(format!("let {} = root;", var));
            }
        }
        Some(())
    }

    fn emit_assignment(
        &mut self,
        element: &ResolvedElement,
        assignment: &PropertyAssignment,
    ) -> Option<()> {
        if let ValueSource::Binding {
            expression,
            operands,
        } = &assignment.value
        {
            return self.emit_binding(element, assignment, expression, operands);
        }

        // Sequence slots push each collection item individually.
        if let (
            PropertySlot::Instance {
                name,
                sequence: true,
            },
            ValueSource::Collection(items),
        ) = (&assignment.slot, &assignment.value)
        {
            let getter = to_snake_case(name);
            for item in items.clone() {
                let rendered = self.render_value(&item, assignment.span)?;
                self.line(format!(
                    "{}.{}().push({});",
                    element.var_name, getter, rendered
                ));
            }
            return Some(());
        }

        let rendered = self.render_value(&assignment.value, assignment.span)?;
        self.emit_slot_write(&element.var_name, &assignment.slot, &rendered);
        Some(())
    }

    fn emit_slot_write(&mut self, var: &str, slot: &PropertySlot, rendered: &str) {
        self.line(render_slot_write(var, slot, rendered));
    }

    /// Continuous bindings register a recomputation callback: the closure
    /// re-applies the assignment whenever any operand changes.
    fn emit_binding(
        &mut self,
        element: &ResolvedElement,
        assignment: &PropertyAssignment,
        expression: &Expression,
        operands: &[crate::resolver::BindingOperand],
    ) -> Option<()> {
        let mut operand_vars = Vec::new();
        for operand in operands {
            let var = self.expect_resolved(operand.element, assignment.span, &operand.id)?;
            operand_vars.push(var);
        }

        let rendered = self.render_expression(expression, assignment.span)?;
        let target = element.var_name.clone();

        self.line("{");
        self.indent += 1;
        for var in &operand_vars {
            self.line(format!("let {} = {}.clone();", var, var));
        }
        self.line(format!("let {} = {}.clone();", target, target));
        let observed = operand_vars
            .iter()
            .map(|v| format!("{}.observable()", v))
            .collect::<Vec<_>>()
            .join(", ");
        self.line(format!("fxrt::bind(&[{}], move || {{", observed));
        self.indent += 1;
        self.line(render_slot_write(&target, &assignment.slot, &rendered));
        self.indent -= 1;
        self.line("});");
        self.indent -= 1;
        self.line("}");
        Some(())
    }

    fn render_value(&mut self, value: &ValueSource, span: SourceSpan) -> Option<String> {
        match value {
            ValueSource::Literal(coerced) => Some(self.render_coerced(coerced)),
            ValueSource::Resource(key) => Some(format!("resources.get(\"{}\")?", escape_str(key))),
            ValueSource::Element(index) => Some(format!(
                "{}.clone()",
                self.document.elements[*index].var_name
            )),
            ValueSource::NamedRef {
                id,
                element,
                segments,
            } => {
                let var = self.expect_resolved(*element, span, id)?;
                self.render_path(var, segments, span)
            }
            ValueSource::HandlerRef { id, element } => {
                let var = self.expect_resolved(*element, span, id)?;
                Some(format!("{}.clone()", var))
            }
            ValueSource::ControllerMethod(method) => Some(format!(
                "fxrt::handler!(controller, {})",
                to_snake_case(method)
            )),
            ValueSource::Collection(items) => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    rendered.push(self.render_value(item, span)?);
                }
                Some(format!("vec![{}]", rendered.join(", ")))
            }
            ValueSource::Binding { .. } => {
                // Bindings are emitted as registrations, never as values.
                self.diagnostics.internal(
                    &self.document.file,
                    span,
                    "binding reached value rendering",
                );
                None
            }
        }
    }

    fn render_coerced(&self, value: &CoercedValue) -> String {
        match value {
            CoercedValue::Str(text) => format!("\"{}\"", escape_str(text)),
            CoercedValue::Int(n) => n.to_string(),
            CoercedValue::Float(f) => format!("{:?}", f),
            CoercedValue::Bool(b) => b.to_string(),
            CoercedValue::EnumVariant { type_name, variant } => {
                if type_name.is_empty() {
                    // The slot's declared coercion resolves the variant.
                    format!("fxrt::coerce(\"{}\")", escape_str(variant))
                } else {
                    format!("{}::{}", type_path(type_name), variant)
                }
            }
            CoercedValue::Constant { type_name, member } => {
                format!("{}::{}", type_path(type_name), member)
            }
            CoercedValue::List(items) => {
                let rendered: Vec<_> = items.iter().map(|i| self.render_coerced(i)).collect();
                format!("vec![{}]", rendered.join(", "))
            }
        }
    }

    /// `$id.a.b(x)[0]` one-shot path, evaluated once at construction time.
    fn render_path(
        &mut self,
        root: String,
        segments: &[PathSegment],
        span: SourceSpan,
    ) -> Option<String> {
        if segments.is_empty() {
            return Some(format!("{}.clone()", root));
        }
        let mut out = root;
        for segment in segments {
            match segment {
                PathSegment::Property(name) => {
                    out.push_str(&format!(".{}()", to_snake_case(name)));
                }
                PathSegment::Call { method, arg } => {
                    let rendered = match arg {
                        Some(arg) => self.render_expression(arg, span)?,
                        None => String::new(),
                    };
                    out.push_str(&format!(".{}({})", to_snake_case(method), rendered));
                }
                PathSegment::Index(key) => {
                    let rendered = self.render_expression(key, span)?;
                    out.push_str(&format!(".get({})", rendered));
                }
            }
        }
        Some(out)
    }

    fn render_expression(&mut self, expression: &Expression, span: SourceSpan) -> Option<String> {
        let rendered = match expression {
            Expression::Null => "fxrt::null()".to_string(),
            Expression::Boolean(b) => b.to_string(),
            Expression::Whole(n) => n.to_string(),
            Expression::Fraction(f) => format!("{:?}", f),
            Expression::Str(s) => format!("\"{}\"", escape_str(s)),
            Expression::Variable(name) => match self.lookup_id_var(name) {
                Some(var) => var,
                None if name == "controller" && self.document.controller.is_some() => {
                    "controller".to_string()
                }
                None => {
                    self.diagnostics.internal(
                        &self.document.file,
                        span,
                        format!("unresolved binding operand '{}'", name),
                    );
                    return None;
                }
            },
            Expression::PropertyRead { target, property } => {
                let target = self.render_expression(target, span)?;
                format!("{}.{}()", target, to_snake_case(property))
            }
            Expression::MethodCall {
                target,
                method,
                arg,
            } => {
                let target = self.render_expression(target, span)?;
                let arg = match arg {
                    Some(arg) => self.render_expression(arg, span)?,
                    None => String::new(),
                };
                format!("{}.{}({})", target, to_snake_case(method), arg)
            }
            Expression::CollectionAccess { target, key } => {
                let target = self.render_expression(target, span)?;
                let key = self.render_expression(key, span)?;
                format!("{}.get({})", target, key)
            }
            Expression::Collection(items) => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    rendered.push(self.render_expression(item, span)?);
                }
                format!("vec![{}]", rendered.join(", "))
            }
        };
        Some(rendered)
    }

    fn lookup_id_var(&self, id: &str) -> Option<String> {
        self.document
            .registry
            .iter()
            .find(|(name, _)| name == id)
            .map(|(_, index)| self.document.elements[*index].var_name.clone())
    }

    /// Resolver contract: every surviving reference is either patched or
    /// names the declared controller. Anything else is a compiler bug,
    /// not a markup mistake.
    fn expect_resolved(
        &mut self,
        element: Option<usize>,
        span: SourceSpan,
        id: &str,
    ) -> Option<String> {
        match element {
            Some(index) => Some(self.document.elements[index].var_name.clone()),
            None if id == "controller" && self.document.controller.is_some() => {
                Some("controller".to_string())
            }
            None => {
                self.diagnostics.internal(
                    &self.document.file,
                    span,
                    format!("reference '{}' was not resolved before generation", id),
                );
                None
            }
        }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

fn render_slot_write(var: &str, slot: &PropertySlot, rendered: &str) -> String {
    match slot {
        PropertySlot::Instance { name, sequence } => {
            let snake = to_snake_case(name);
            if *sequence {
                format!("{}.{}().push({});", var, snake, rendered)
            } else {
                format!("{}.set_{}({});", var, snake, rendered)
            }
        }
        PropertySlot::Static { owner, property } => format!(
            "{}::set_{}(&{}, {});",
            type_path(owner),
            to_snake_case(property),
            var,
            rendered
        ),
        PropertySlot::Handler { name } => {
            format!("{}.set_{}({});", var, to_snake_case(name), rendered)
        }
    }
}

fn type_path(dotted: &str) -> String {
    dotted.replace('.', "::")
}

fn escape_str(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
