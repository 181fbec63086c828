//! Error types for the fxc compiler

use thiserror::Error;

/// A line/column position in a markup or expression source.
///
/// Columns are 1-based to match the positions editors report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
}

impl SourceSpan {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl std::fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {file} at {span}: {message}")]
    Parse { file: String, span: SourceSpan, message: String },

    #[error("Expression error in {file} at {span}: {message}")]
    Expression { file: String, span: SourceSpan, message: String },

    #[error("Include error: {message}")]
    Include { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn parse(file: impl Into<String>, span: SourceSpan, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            span,
            message: message.into(),
        }
    }

    pub fn expression(file: impl Into<String>, span: SourceSpan, message: impl Into<String>) -> Self {
        Self::Expression {
            file: file.into(),
            span,
            message: message.into(),
        }
    }

    pub fn include(message: impl Into<String>) -> Self {
        Self::Include {
            message: message.into(),
        }
    }
}
