//! Structured diagnostics collected across the compilation pipeline
//!
//! Parsing, resolution, and generation report problems through a shared
//! [`Diagnostics`] collector so that one pass over a document surfaces all
//! independent errors instead of stopping at the first. Every entry carries
//! the file and line/column position of the offending markup.

use crate::error::SourceSpan;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Error,
    /// A compiler bug rather than a markup mistake. Tooling must treat
    /// these differently from user errors.
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    // Syntax stage
    MalformedExpression,
    MalformedDocument,
    // Resolution stage
    UnknownType,
    UnknownAttribute,
    InvalidDefaultProperty,
    UnknownReference,
    DuplicateId,
    CyclicDependency,
    AmbiguousControllerBinding,
    InvalidValue,
    // Internal assertion
    GenerationInvariantViolation,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::MalformedExpression => "malformed expression",
            DiagnosticKind::MalformedDocument => "malformed document",
            DiagnosticKind::UnknownType => "unknown type",
            DiagnosticKind::UnknownAttribute => "unknown attribute",
            DiagnosticKind::InvalidDefaultProperty => "invalid default property",
            DiagnosticKind::UnknownReference => "unknown reference",
            DiagnosticKind::DuplicateId => "duplicate id",
            DiagnosticKind::CyclicDependency => "cyclic dependency",
            DiagnosticKind::AmbiguousControllerBinding => "ambiguous controller binding",
            DiagnosticKind::InvalidValue => "invalid value",
            DiagnosticKind::GenerationInvariantViolation => "generation invariant violation",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Internal => "internal error",
        };
        write!(
            f,
            "{}:{}:{}: {}: {} ({})",
            self.file, self.line, self.column, tag, self.message, self.kind
        )
    }
}

/// Ordered collection of diagnostics for a compilation run.
///
/// A batch shares one aggregate; everything else is per-document and
/// discarded once its unit is emitted.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(
        &mut self,
        kind: DiagnosticKind,
        file: impl Into<String>,
        span: SourceSpan,
        message: impl Into<String>,
    ) {
        self.push(Severity::Error, kind, file, span, message);
    }

    pub fn warning(
        &mut self,
        kind: DiagnosticKind,
        file: impl Into<String>,
        span: SourceSpan,
        message: impl Into<String>,
    ) {
        self.push(Severity::Warning, kind, file, span, message);
    }

    pub fn internal(
        &mut self,
        file: impl Into<String>,
        span: SourceSpan,
        message: impl Into<String>,
    ) {
        self.push(
            Severity::Internal,
            DiagnosticKind::GenerationInvariantViolation,
            file,
            span,
            message,
        );
    }

    fn push(
        &mut self,
        severity: Severity,
        kind: DiagnosticKind,
        file: impl Into<String>,
        span: SourceSpan,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            severity,
            kind,
            message: message.into(),
            file: file.into(),
            line: span.line,
            column: span.column,
        };
        log::debug!("diagnostic: {}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|d| matches!(d.severity, Severity::Error | Severity::Internal))
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| matches!(d.severity, Severity::Error | Severity::Internal))
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// All entries of a given kind, in report order.
    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.entries.iter().filter(|d| d.kind == kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_counting() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warning(
            DiagnosticKind::UnknownAttribute,
            "a.fxml",
            SourceSpan::new(3, 7),
            "unused",
        );
        diagnostics.error(
            DiagnosticKind::UnknownType,
            "a.fxml",
            SourceSpan::new(4, 2),
            "no such type",
        );

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.warning_count(), 1);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn test_internal_counts_as_error() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.internal("a.fxml", SourceSpan::start(), "unresolved reference in graph");

        assert!(diagnostics.has_errors());
        assert_eq!(
            diagnostics.entries()[0].kind,
            DiagnosticKind::GenerationInvariantViolation
        );
    }

    #[test]
    fn test_display_carries_position() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(
            DiagnosticKind::MalformedDocument,
            "view.fxml",
            SourceSpan::new(12, 5),
            "unexpected end of input",
        );

        let rendered = diagnostics.entries()[0].to_string();
        assert!(rendered.contains("view.fxml:12:5"));
        assert!(rendered.contains("unexpected end of input"));
    }
}
