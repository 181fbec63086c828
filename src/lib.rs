//! FXML-style view markup compiler
//!
//! An ahead-of-time compiler that translates declarative view markup (an
//! XML dialect describing an object graph, property assignments, event
//! handlers, and a small expression language) into imperative builder
//! source. The generated builder constructs the identical object graph
//! with no reflection and no markup parsing at run time.
//!
//! # Features
//!
//! - Full markup surface: property attributes and elements, static
//!   properties, default-property children, `fx:define` / `fx:reference` /
//!   `fx:copy` / `fx:constant` / `fx:factory` / `fx:value` / `fx:root`
//! - Expression mini-language: `$id` references, dotted/indexed paths,
//!   `${...}` continuous bindings, `%key` resource lookups, collections
//! - Controller wiring: field injection by id, `#method` handler binding
//!   with event-type overload disambiguation, post-construction hook
//! - Sub-document inclusion compiled per file, spliced by a single call
//! - Batched diagnostics with file/line/column on every entry
//!
//! # Basic Usage
//!
//! ```no_run
//! use fxc::{Compiler, DocumentInput};
//! use fxc::oracle::StaticOracle;
//!
//! let oracle = StaticOracle::load(std::path::Path::new("types.json"))?;
//! let compiler = Compiler::new(&oracle);
//! let batch = compiler.compile_batch(&[DocumentInput {
//!     file: "main_view.fxml".to_string(),
//!     source: std::fs::read_to_string("main_view.fxml")?,
//! }]);
//! for output in &batch.outputs {
//!     for diagnostic in output.diagnostics.iter() {
//!         eprintln!("{}", diagnostic);
//!     }
//! }
//! # Ok::<(), fxc::CompilerError>(())
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Lexer & Markup Parser** - tokenize and build the document AST,
//!    routing expression-valued attributes through the expression parser
//! 2. **Semantic Resolver** - resolve types through the oracle, bind
//!    attributes to properties and handlers, register ids, coerce
//!    literals, and compute a dependency-respecting construction order
//! 3. **Code Generator** - emit one builder source file per document

pub mod ast;
pub mod cli;
pub mod codegen;
pub mod dependency;
pub mod diagnostics;
pub mod error;
pub mod expression;
pub mod lexer;
pub mod oracle;
pub mod parser;
pub mod resolver;

#[cfg(test)]
pub(crate) mod test_support;

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path};
use std::time::Instant;

pub use codegen::{module_name, CodeGenerator, CompiledUnit};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{CompilerError, Result, SourceSpan};
pub use oracle::{OracleFixture, StaticOracle, TypeOracle};
pub use parser::parse_document;
pub use resolver::{IncludeCatalog, IncludedUnit, ResolvedDocument, Resolver};

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Compilation options and settings
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Treat warnings as errors: a document with warnings produces no unit.
    pub deny_warnings: bool,

    /// Skip generation and only report diagnostics.
    pub check_only: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            deny_warnings: false,
            check_only: false,
        }
    }
}

/// One markup document handed to the compiler. The file path identifies
/// the document in diagnostics and resolves its relative includes.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub file: String,
    pub source: String,
}

/// Result for a single document: the unit is absent whenever any error
/// was recorded for the document.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub file: String,
    pub unit: Option<CompiledUnit>,
    pub diagnostics: Diagnostics,
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationStats {
    /// Number of input documents
    pub documents: usize,

    /// Documents that produced a unit
    pub succeeded: usize,

    /// Documents excluded because of errors
    pub failed: usize,

    /// Documents skipped by a `<?compile false?>` directive
    pub skipped: usize,

    /// Total errors across the batch
    pub errors: usize,

    /// Total warnings across the batch
    pub warnings: usize,

    /// Wall-clock compilation time in milliseconds
    pub compile_time_ms: u64,
}

/// Batch result: outputs in input order plus aggregate metrics.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub outputs: Vec<CompileOutput>,
    pub stats: CompilationStats,
}

impl BatchOutput {
    pub fn has_errors(&self) -> bool {
        self.outputs.iter().any(|o| o.diagnostics.has_errors())
    }
}

/// Main compiler entry point. Holds no per-document state; each document
/// runs its pipeline over immutable inputs and the shared read-only oracle.
pub struct Compiler<'a> {
    oracle: &'a dyn TypeOracle,
    options: CompilerOptions,
}

impl<'a> Compiler<'a> {
    pub fn new(oracle: &'a dyn TypeOracle) -> Self {
        Self {
            oracle,
            options: CompilerOptions::default(),
        }
    }

    pub fn with_options(oracle: &'a dyn TypeOracle, options: CompilerOptions) -> Self {
        Self { oracle, options }
    }

    /// Compile one standalone document. Includes cannot be resolved in
    /// this mode; use [`Compiler::compile_batch`] for documents that
    /// include others.
    pub fn compile_document(&self, input: &DocumentInput) -> CompileOutput {
        let catalog = UnitCatalog::default();
        self.compile_with_catalog(input, &catalog)
    }

    /// Convenience wrapper over [`Compiler::compile_document`] for raw
    /// source text.
    pub fn compile_source(&self, file: &str, source: &str) -> CompileOutput {
        self.compile_document(&DocumentInput {
            file: file.to_string(),
            source: source.to_string(),
        })
    }

    /// Compile a batch. Documents are independent except for includes,
    /// which are resolved among the batch inputs: included documents are
    /// compiled first so the including document can splice their builder.
    pub fn compile_batch(&self, inputs: &[DocumentInput]) -> BatchOutput {
        let start_time = Instant::now();
        log::info!("{} v{}: compiling {} document(s)", NAME, VERSION, inputs.len());

        let order = self.include_order(inputs);

        let mut catalog = UnitCatalog::default();
        let mut outputs: Vec<Option<CompileOutput>> = vec![None; inputs.len()];

        for index in order {
            let input = &inputs[index];
            let output = self.compile_with_catalog(input, &catalog);
            if let Some(unit) = &output.unit {
                catalog.insert(&input.file, unit);
            }
            outputs[index] = Some(output);
        }

        let outputs: Vec<_> = outputs.into_iter().flatten().collect();
        let stats = self.collect_stats(&outputs, start_time);
        BatchOutput { outputs, stats }
    }

    fn compile_with_catalog(&self, input: &DocumentInput, catalog: &UnitCatalog) -> CompileOutput {
        let mut diagnostics = Diagnostics::new();
        log::debug!("parsing {}", input.file);

        let document = match parser::parse_document(&input.source, &input.file, &mut diagnostics) {
            Ok(document) => document,
            Err(error) => {
                record_parse_error(&mut diagnostics, &input.file, error);
                return CompileOutput {
                    file: input.file.clone(),
                    unit: None,
                    diagnostics,
                };
            }
        };

        if !document.compile {
            log::debug!("{} is marked compile=false, skipping", input.file);
            return CompileOutput {
                file: input.file.clone(),
                unit: None,
                diagnostics,
            };
        }

        log::debug!("resolving {}", input.file);
        let resolved =
            Resolver::new(self.oracle, catalog, &mut diagnostics).resolve(&document);

        let unit = match resolved {
            Some(resolved) if self.accepts(&diagnostics) => {
                if self.options.check_only {
                    None
                } else {
                    log::debug!("generating {}", input.file);
                    CodeGenerator::generate(&resolved, &mut diagnostics)
                        .filter(|_| !diagnostics.has_errors())
                }
            }
            _ => None,
        };

        CompileOutput {
            file: input.file.clone(),
            unit,
            diagnostics,
        }
    }

    fn accepts(&self, diagnostics: &Diagnostics) -> bool {
        if diagnostics.has_errors() {
            return false;
        }
        !(self.options.deny_warnings && diagnostics.warning_count() > 0)
    }

    /// Order the batch so included documents compile before their
    /// includers. Include cycles fall back to input order; the resolver
    /// then reports the unresolvable include on each cycle member.
    fn include_order(&self, inputs: &[DocumentInput]) -> Vec<usize> {
        let position: HashMap<String, usize> = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| (normalize_path(&input.file), i))
            .collect();

        let mut graph = dependency::DependencyGraph::new(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            for target in include_targets(&input.source, &input.file) {
                if let Some(&dep) = position.get(&target) {
                    graph.add_dependency(index, dep);
                }
            }
        }

        match graph.order() {
            Ok(order) => order,
            Err(cycle) => {
                log::warn!(
                    "include cycle across {} document(s), falling back to input order",
                    cycle.len()
                );
                (0..inputs.len()).collect()
            }
        }
    }

    fn collect_stats(&self, outputs: &[CompileOutput], start_time: Instant) -> CompilationStats {
        let mut stats = CompilationStats {
            documents: outputs.len(),
            compile_time_ms: start_time.elapsed().as_millis() as u64,
            ..CompilationStats::default()
        };
        for output in outputs {
            stats.errors += output.diagnostics.error_count();
            stats.warnings += output.diagnostics.warning_count();
            if output.unit.is_some() {
                stats.succeeded += 1;
            } else if output.diagnostics.has_errors() {
                stats.failed += 1;
            } else {
                stats.skipped += 1;
            }
        }
        log::info!(
            "batch complete: {} succeeded, {} failed, {} error(s), {} warning(s), {}ms",
            stats.succeeded,
            stats.failed,
            stats.errors,
            stats.warnings,
            stats.compile_time_ms
        );
        stats
    }
}

/// Compiled units known so far in a batch, keyed by normalized path.
#[derive(Default)]
struct UnitCatalog {
    units: HashMap<String, IncludedUnit>,
}

impl UnitCatalog {
    fn insert(&mut self, file: &str, unit: &CompiledUnit) {
        self.units.insert(
            normalize_path(file),
            IncludedUnit {
                file: file.to_string(),
                builder_name: unit.module_name.clone(),
                root_type: unit.root_type.clone(),
                controller_type: unit.controller_type.clone(),
            },
        );
    }
}

impl IncludeCatalog for UnitCatalog {
    fn lookup(&self, referrer: &str, source: &str) -> Option<IncludedUnit> {
        self.units.get(&resolve_include_path(referrer, source)).cloned()
    }
}

fn record_parse_error(diagnostics: &mut Diagnostics, file: &str, error: CompilerError) {
    let (kind, span, message) = match error {
        CompilerError::Expression { span, message, .. } => {
            (DiagnosticKind::MalformedExpression, span, message)
        }
        CompilerError::Parse { span, message, .. } => {
            (DiagnosticKind::MalformedDocument, span, message)
        }
        other => (
            DiagnosticKind::MalformedDocument,
            SourceSpan::start(),
            other.to_string(),
        ),
    };
    diagnostics.error(kind, file, span, message);
}

/// Include targets declared in a document, resolved against its path.
/// Works from a throwaway parse so that documents which later fail
/// semantic checks still participate in batch ordering.
fn include_targets(source: &str, file: &str) -> Vec<String> {
    let mut diagnostics = Diagnostics::new();
    let Ok(document) = parser::parse_document(source, file, &mut diagnostics) else {
        return Vec::new();
    };
    let mut raw = Vec::new();
    collect_includes(&document.root, &mut raw);
    raw.iter()
        .map(|target| resolve_include_path(file, target))
        .collect()
}

fn collect_includes(node: &ast::DocumentNode, out: &mut Vec<String>) {
    if let ast::DocumentNode::Include { source, .. } = node {
        out.push(source.clone());
    }
    if let Some(body) = node.body() {
        for child in &body.children {
            collect_includes(child, out);
        }
    }
    if let ast::DocumentNode::Define { children, .. } = node {
        for child in children {
            collect_includes(child, out);
        }
    }
}

/// Resolve an include source against the including file's directory and
/// normalize it for catalog lookup.
pub fn resolve_include_path(referrer: &str, source: &str) -> String {
    let base = Path::new(referrer).parent().unwrap_or_else(|| Path::new(""));
    normalize_path(&base.join(source).to_string_lossy())
}

fn normalize_path(path: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                if parts.pop().is_none() {
                    parts.push("..".to_string());
                }
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                parts.clear();
                parts.push(String::new());
            }
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::widget_oracle;

    const IMPORTS: &str = "<?import demo.widgets.*?>";

    fn input(file: &str, source: String) -> DocumentInput {
        DocumentInput {
            file: file.to_string(),
            source,
        }
    }

    #[test]
    fn test_single_document_compiles() {
        let oracle = widget_oracle();
        let compiler = Compiler::new(&oracle);
        let output = compiler.compile_document(&input(
            "main_view.fxml",
            format!(r#"{IMPORTS}<Pane><Label fx:id="lbl" text="Hello"/></Pane>"#),
        ));

        assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics);
        let unit = output.unit.unwrap();
        assert_eq!(unit.id_map, vec![("lbl".to_string(), "lbl".to_string())]);
        assert!(unit.source.contains("lbl.set_text(\"Hello\");"));
    }

    #[test]
    fn test_failed_document_does_not_abort_batch() {
        let oracle = widget_oracle();
        let compiler = Compiler::new(&oracle);
        let batch = compiler.compile_batch(&[
            input("bad.fxml", format!(r#"{IMPORTS}<Missing/>"#)),
            input("good.fxml", format!(r#"{IMPORTS}<Label text="ok"/>"#)),
        ]);

        assert_eq!(batch.outputs.len(), 2);
        assert!(batch.outputs[0].unit.is_none());
        assert!(batch.outputs[0].diagnostics.has_errors());
        let unknown = &batch.outputs[0].diagnostics.entries()[0];
        assert_eq!(unknown.kind, DiagnosticKind::UnknownType);
        assert_eq!(unknown.file, "bad.fxml");
        assert!(unknown.line >= 1);

        assert!(batch.outputs[1].unit.is_some());
        assert_eq!(batch.stats.succeeded, 1);
        assert_eq!(batch.stats.failed, 1);
    }

    #[test]
    fn test_include_compiles_sub_document_first() {
        let oracle = widget_oracle();
        let compiler = Compiler::new(&oracle);
        let batch = compiler.compile_batch(&[
            input(
                "ui/outer.fxml",
                format!(r#"{IMPORTS}<Pane><fx:include fx:id="head" source="header.fxml"/></Pane>"#),
            ),
            input(
                "ui/header.fxml",
                format!(r#"{IMPORTS}<Label text="Header"/>"#),
            ),
        ]);

        assert!(!batch.has_errors(), "{:?}", batch.outputs);
        let outer = batch.outputs[0].unit.as_ref().unwrap();
        assert!(outer.source.contains("header::build(resources)?"));
        assert!(outer
            .source
            .contains("registry.merge_namespaced(\"head\""));
    }

    #[test]
    fn test_missing_include_is_unknown_reference() {
        let oracle = widget_oracle();
        let compiler = Compiler::new(&oracle);
        let batch = compiler.compile_batch(&[input(
            "outer.fxml",
            format!(r#"{IMPORTS}<Pane><fx:include source="ghost.fxml"/></Pane>"#),
        )]);

        assert!(batch.outputs[0].unit.is_none());
        assert_eq!(
            batch.outputs[0]
                .diagnostics
                .of_kind(DiagnosticKind::UnknownReference)
                .len(),
            1
        );
    }

    #[test]
    fn test_include_cycle_fails_both_documents() {
        let oracle = widget_oracle();
        let compiler = Compiler::new(&oracle);
        let batch = compiler.compile_batch(&[
            input(
                "a.fxml",
                format!(r#"{IMPORTS}<Pane><fx:include source="b.fxml"/></Pane>"#),
            ),
            input(
                "b.fxml",
                format!(r#"{IMPORTS}<Pane><fx:include source="a.fxml"/></Pane>"#),
            ),
        ]);

        assert!(batch.outputs[0].unit.is_none());
        assert!(batch.outputs[1].unit.is_none());
        assert!(batch.has_errors());
    }

    #[test]
    fn test_compile_false_skips_generation() {
        let oracle = widget_oracle();
        let compiler = Compiler::new(&oracle);
        let batch = compiler.compile_batch(&[input(
            "static.fxml",
            format!(r#"<?compile false?>{IMPORTS}<Label text="x"/>"#),
        )]);

        assert!(batch.outputs[0].unit.is_none());
        assert!(!batch.outputs[0].diagnostics.has_errors());
        assert_eq!(batch.stats.skipped, 1);
    }

    #[test]
    fn test_check_only_reports_without_units() {
        let oracle = widget_oracle();
        let compiler = Compiler::with_options(
            &oracle,
            CompilerOptions {
                check_only: true,
                ..CompilerOptions::default()
            },
        );
        let output = compiler.compile_document(&input(
            "main_view.fxml",
            format!(r#"{IMPORTS}<Label text="Hello"/>"#),
        ));

        assert!(output.unit.is_none());
        assert!(!output.diagnostics.has_errors());
    }

    #[test]
    fn test_malformed_document_reports_and_excludes() {
        let oracle = widget_oracle();
        let compiler = Compiler::new(&oracle);
        let output = compiler.compile_document(&input(
            "broken.fxml",
            "<Pane><Label></Pane>".to_string(),
        ));

        assert!(output.unit.is_none());
        assert_eq!(
            output
                .diagnostics
                .of_kind(DiagnosticKind::MalformedDocument)
                .len(),
            1
        );
    }

    #[test]
    fn test_normalize_include_paths() {
        assert_eq!(resolve_include_path("ui/outer.fxml", "header.fxml"), "ui/header.fxml");
        assert_eq!(
            resolve_include_path("ui/outer.fxml", "../shared/head.fxml"),
            "shared/head.fxml"
        );
        assert_eq!(resolve_include_path("outer.fxml", "./sub.fxml"), "sub.fxml");
    }
}
