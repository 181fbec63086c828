//! Lexer and parser for the attribute expression mini-language
//!
//! Attribute values carry a small embedded language: `$id` element
//! references, `$id.a.b` property paths, `${...}` binding expressions,
//! `%key` resource lookups, `#name` handler references, and bracketed
//! collection literals. This module classifies a raw attribute string and
//! parses the expression forms into an [`Expression`] tree. Literal
//! coercion against the target property type is deferred to the resolver.

use crate::ast::{AttributeValue, HandlerValue};
use crate::error::{CompilerError, Result, SourceSpan};

/// Expression tree for one-shot paths and `${}` binding bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Null,
    Boolean(bool),
    Whole(i64),
    Fraction(f64),
    Str(String),
    /// Bare identifier root: a named element id or the controller.
    Variable(String),
    /// Dotted property access: `lbl.text`
    PropertyRead {
        target: Box<Expression>,
        property: String,
    },
    /// Zero- or one-argument method invocation in a path segment.
    MethodCall {
        target: Box<Expression>,
        method: String,
        arg: Option<Box<Expression>>,
    },
    /// Bracket indexing: `items[0]`
    CollectionAccess {
        target: Box<Expression>,
        key: Box<Expression>,
    },
    Collection(Vec<Expression>),
}

impl Expression {
    /// The element ids this expression reads, in first-use order.
    /// Used by the resolver to materialize dependency edges.
    pub fn referenced_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        match self {
            Expression::Variable(name) => {
                if !ids.contains(&name.as_str()) {
                    ids.push(name);
                }
            }
            Expression::PropertyRead { target, .. } => target.collect_ids(ids),
            Expression::MethodCall { target, arg, .. } => {
                target.collect_ids(ids);
                if let Some(arg) = arg {
                    arg.collect_ids(ids);
                }
            }
            Expression::CollectionAccess { target, key } => {
                target.collect_ids(ids);
                key.collect_ids(ids);
            }
            Expression::Collection(items) => {
                for item in items {
                    item.collect_ids(ids);
                }
            }
            _ => {}
        }
    }
}

/// A path segment after the `$root` of a one-shot reference.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Property(String),
    Call {
        method: String,
        arg: Option<Expression>,
    },
    Index(Expression),
}

/// Classify a raw attribute value, parsing embedded expression syntax.
///
/// `allow_binding` gates `${}` syntax: positions that are evaluated once
/// (collection elements, control-element arguments) reject it.
pub fn parse_value(
    raw: &str,
    file: &str,
    span: SourceSpan,
    allow_binding: bool,
) -> Result<AttributeValue> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Ok(AttributeValue::Empty);
    }

    if let Some(rest) = trimmed.strip_prefix('\\') {
        return Ok(AttributeValue::Literal(rest.to_string()));
    }

    if let Some(rest) = trimmed.strip_prefix('@') {
        return Ok(AttributeValue::Location(rest.to_string()));
    }

    if let Some(rest) = trimmed.strip_prefix('%') {
        if rest.is_empty() {
            return Err(CompilerError::expression(file, span, "empty resource key"));
        }
        return Ok(AttributeValue::Resource(rest.to_string()));
    }

    if trimmed.starts_with("${") {
        if !allow_binding {
            return Err(CompilerError::expression(
                file,
                span,
                "binding expressions are not permitted in this position",
            ));
        }
        let body = trimmed
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| {
                CompilerError::expression(file, span, "unterminated binding expression")
            })?;
        let expression = ExpressionParser::new(body, file, span)?.parse()?;
        return Ok(AttributeValue::Binding(expression));
    }

    if let Some(rest) = trimmed.strip_prefix('$') {
        let (root, segments) = ExpressionParser::new(rest, file, span)?.parse_reference_path()?;
        return Ok(AttributeValue::Reference { root, segments });
    }

    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let mut items = Vec::new();
        for piece in split_collection(inner, file, span)? {
            let piece = piece.trim();
            if !piece.is_empty() {
                items.push(parse_value(piece, file, span, false)?);
            }
        }
        return Ok(AttributeValue::Collection(items));
    }

    Ok(AttributeValue::Literal(trimmed.to_string()))
}

/// Classify an event-handler attribute value.
pub fn parse_handler(raw: &str) -> HandlerValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        HandlerValue::Empty
    } else if let Some(rest) = trimmed.strip_prefix('#') {
        HandlerValue::Method(rest.to_string())
    } else if let Some(rest) = trimmed.strip_prefix('$') {
        HandlerValue::Reference(rest.to_string())
    } else {
        HandlerValue::Script(trimmed.to_string())
    }
}

/// Split collection literal content at top-level commas, respecting
/// nested brackets and string quoting.
fn split_collection(inner: &str, file: &str, span: SourceSpan) -> Result<Vec<String>> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in inner.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '[' | '(' | '{' => {
                    depth += 1;
                    current.push(ch);
                }
                ']' | ')' | '}' => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        CompilerError::expression(file, span, "unbalanced bracket in collection")
                    })?;
                    current.push(ch);
                }
                ',' if depth == 0 => {
                    pieces.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            },
        }
    }

    if depth != 0 || quote.is_some() {
        return Err(CompilerError::expression(
            file,
            span,
            "unbalanced bracket or unterminated literal in collection",
        ));
    }

    pieces.push(current);
    Ok(pieces)
}

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    Ident(String),
    Str(String),
    Whole(i64),
    Fraction(f64),
    Dot,
    Comma,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Eof,
}

/// Recursive descent parser over a hand-rolled token stream, covering
/// path expressions, literals, and collection literals.
struct ExpressionParser<'a> {
    tokens: Vec<ExprToken>,
    current: usize,
    file: &'a str,
    span: SourceSpan,
}

impl<'a> ExpressionParser<'a> {
    fn new(input: &str, file: &'a str, span: SourceSpan) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(input, file, span)?,
            current: 0,
            file,
            span,
        })
    }

    fn parse(mut self) -> Result<Expression> {
        let expression = self.expression()?;
        self.expect_eof()?;
        Ok(expression)
    }

    /// Parse `id(.segment)*` as used by one-shot `$` references.
    fn parse_reference_path(mut self) -> Result<(String, Vec<PathSegment>)> {
        let root = match self.advance() {
            ExprToken::Ident(name) => name,
            other => {
                return Err(self.error(format!(
                    "expected reference id after '$', got {:?}",
                    other
                )))
            }
        };

        let mut segments = Vec::new();
        loop {
            match self.peek().clone() {
                ExprToken::Dot => {
                    self.advance();
                    let name = match self.advance() {
                        ExprToken::Ident(name) => name,
                        _ => return Err(self.error("empty path segment")),
                    };
                    if self.peek() == &ExprToken::LeftParen {
                        self.advance();
                        let arg = if self.peek() == &ExprToken::RightParen {
                            None
                        } else {
                            Some(self.expression()?)
                        };
                        self.expect(ExprToken::RightParen)?;
                        segments.push(PathSegment::Call { method: name, arg });
                    } else {
                        segments.push(PathSegment::Property(name));
                    }
                }
                ExprToken::LeftBracket => {
                    self.advance();
                    let key = self.expression()?;
                    self.expect(ExprToken::RightBracket)?;
                    segments.push(PathSegment::Index(key));
                }
                ExprToken::Eof => break,
                other => {
                    return Err(self.error(format!("unexpected token {:?} in reference", other)))
                }
            }
        }

        Ok((root, segments))
    }

    fn expression(&mut self) -> Result<Expression> {
        let mut expression = self.primary()?;

        loop {
            match self.peek().clone() {
                ExprToken::Dot => {
                    self.advance();
                    let name = match self.advance() {
                        ExprToken::Ident(name) => name,
                        _ => return Err(self.error("empty path segment")),
                    };
                    if self.peek() == &ExprToken::LeftParen {
                        self.advance();
                        let arg = if self.peek() == &ExprToken::RightParen {
                            None
                        } else {
                            Some(Box::new(self.expression()?))
                        };
                        self.expect(ExprToken::RightParen)?;
                        expression = Expression::MethodCall {
                            target: Box::new(expression),
                            method: name,
                            arg,
                        };
                    } else {
                        expression = Expression::PropertyRead {
                            target: Box::new(expression),
                            property: name,
                        };
                    }
                }
                ExprToken::LeftBracket => {
                    self.advance();
                    let key = self.expression()?;
                    self.expect(ExprToken::RightBracket)?;
                    expression = Expression::CollectionAccess {
                        target: Box::new(expression),
                        key: Box::new(key),
                    };
                }
                _ => break,
            }
        }

        Ok(expression)
    }

    fn primary(&mut self) -> Result<Expression> {
        match self.advance() {
            ExprToken::Ident(name) => Ok(match name.as_str() {
                "true" => Expression::Boolean(true),
                "false" => Expression::Boolean(false),
                "null" => Expression::Null,
                _ => Expression::Variable(name),
            }),
            ExprToken::Str(value) => Ok(Expression::Str(value)),
            ExprToken::Whole(value) => Ok(Expression::Whole(value)),
            ExprToken::Fraction(value) => Ok(Expression::Fraction(value)),
            ExprToken::LeftBracket => {
                let mut items = Vec::new();
                if self.peek() != &ExprToken::RightBracket {
                    loop {
                        items.push(self.expression()?);
                        if self.peek() == &ExprToken::Comma {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(ExprToken::RightBracket)?;
                Ok(Expression::Collection(items))
            }
            ExprToken::LeftParen => {
                let inner = self.expression()?;
                self.expect(ExprToken::RightParen)?;
                Ok(inner)
            }
            other => Err(self.error(format!("unexpected token {:?} in expression", other))),
        }
    }

    fn peek(&self) -> &ExprToken {
        self.tokens.get(self.current).unwrap_or(&ExprToken::Eof)
    }

    fn advance(&mut self) -> ExprToken {
        let token = self.peek().clone();
        if self.current < self.tokens.len() {
            self.current += 1;
        }
        token
    }

    fn expect(&mut self, expected: ExprToken) -> Result<()> {
        let token = self.advance();
        if token == expected {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, got {:?}", expected, token)))
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        match self.peek() {
            ExprToken::Eof => Ok(()),
            other => Err(self.error(format!("trailing input after expression: {:?}", other))),
        }
    }

    fn error(&self, message: impl Into<String>) -> CompilerError {
        CompilerError::expression(self.file, self.span, message)
    }
}

fn tokenize(input: &str, file: &str, span: SourceSpan) -> Result<Vec<ExprToken>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut position = 0usize;

    while position < chars.len() {
        let ch = chars[position];
        match ch {
            c if c.is_whitespace() => position += 1,
            '.' => {
                tokens.push(ExprToken::Dot);
                position += 1;
            }
            ',' => {
                tokens.push(ExprToken::Comma);
                position += 1;
            }
            '(' => {
                tokens.push(ExprToken::LeftParen);
                position += 1;
            }
            ')' => {
                tokens.push(ExprToken::RightParen);
                position += 1;
            }
            '[' => {
                tokens.push(ExprToken::LeftBracket);
                position += 1;
            }
            ']' => {
                tokens.push(ExprToken::RightBracket);
                position += 1;
            }
            '\'' | '"' => {
                let quote = ch;
                position += 1;
                let start = position;
                while position < chars.len() && chars[position] != quote {
                    position += 1;
                }
                if position >= chars.len() {
                    return Err(CompilerError::expression(
                        file,
                        span,
                        "unterminated string literal in expression",
                    ));
                }
                tokens.push(ExprToken::Str(chars[start..position].iter().collect()));
                position += 1;
            }
            c if c.is_ascii_digit()
                || (c == '-'
                    && chars
                        .get(position + 1)
                        .map_or(false, |n| n.is_ascii_digit())) =>
            {
                let start = position;
                position += 1;
                let mut has_dot = false;
                while position < chars.len() {
                    let c = chars[position];
                    if c.is_ascii_digit() {
                        position += 1;
                    } else if c == '.'
                        && !has_dot
                        && chars
                            .get(position + 1)
                            .map_or(false, |n| n.is_ascii_digit())
                    {
                        has_dot = true;
                        position += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..position].iter().collect();
                if has_dot {
                    tokens.push(ExprToken::Fraction(text.parse().map_err(|_| {
                        CompilerError::expression(file, span, format!("invalid number: {}", text))
                    })?));
                } else {
                    tokens.push(ExprToken::Whole(text.parse().map_err(|_| {
                        CompilerError::expression(file, span, format!("invalid number: {}", text))
                    })?));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = position;
                while position < chars.len()
                    && (chars[position].is_alphanumeric() || chars[position] == '_')
                {
                    position += 1;
                }
                tokens.push(ExprToken::Ident(chars[start..position].iter().collect()));
            }
            _ => {
                return Err(CompilerError::expression(
                    file,
                    span,
                    format!("unexpected character '{}' in expression", ch),
                ));
            }
        }
    }

    tokens.push(ExprToken::Eof);
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(raw: &str) -> AttributeValue {
        parse_value(raw, "test.fxml", SourceSpan::start(), true).unwrap()
    }

    #[test]
    fn test_plain_literal() {
        assert_eq!(value("Hello"), AttributeValue::Literal("Hello".to_string()));
    }

    #[test]
    fn test_blank_is_empty() {
        assert_eq!(value("   "), AttributeValue::Empty);
    }

    #[test]
    fn test_escaped_literal() {
        assert_eq!(
            value("\\$notARef"),
            AttributeValue::Literal("$notARef".to_string())
        );
    }

    #[test]
    fn test_resource_key() {
        assert_eq!(
            value("%greeting.text"),
            AttributeValue::Resource("greeting.text".to_string())
        );
    }

    #[test]
    fn test_location_value() {
        assert_eq!(
            value("@images/icon.png"),
            AttributeValue::Location("images/icon.png".to_string())
        );
    }

    #[test]
    fn test_simple_reference() {
        match value("$lbl") {
            AttributeValue::Reference { root, segments } => {
                assert_eq!(root, "lbl");
                assert!(segments.is_empty());
            }
            other => panic!("expected reference, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_with_path() {
        match value("$lbl.text") {
            AttributeValue::Reference { root, segments } => {
                assert_eq!(root, "lbl");
                assert_eq!(segments, vec![PathSegment::Property("text".to_string())]);
            }
            other => panic!("expected reference, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_with_method_call() {
        match value("$ctrl.describe()") {
            AttributeValue::Reference { root, segments } => {
                assert_eq!(root, "ctrl");
                assert_eq!(
                    segments,
                    vec![PathSegment::Call {
                        method: "describe".to_string(),
                        arg: None
                    }]
                );
            }
            other => panic!("expected reference, got {:?}", other),
        }
    }

    #[test]
    fn test_binding_expression() {
        match value("${lbl.text}") {
            AttributeValue::Binding(Expression::PropertyRead { target, property }) => {
                assert_eq!(*target, Expression::Variable("lbl".to_string()));
                assert_eq!(property, "text");
            }
            other => panic!("expected binding, got {:?}", other),
        }
    }

    #[test]
    fn test_binding_rejected_when_not_permitted() {
        let result = parse_value("${lbl.text}", "test.fxml", SourceSpan::start(), false);
        assert!(result.is_err());
    }

    #[test]
    fn test_binding_collects_referenced_ids() {
        match value("${first.text(second.suffix)}") {
            AttributeValue::Binding(expression) => {
                assert_eq!(expression.referenced_ids(), vec!["first", "second"]);
            }
            other => panic!("expected binding, got {:?}", other),
        }
    }

    #[test]
    fn test_collection_literal() {
        match value("[1, 2, 3]") {
            AttributeValue::Collection(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], AttributeValue::Literal("1".to_string()));
            }
            other => panic!("expected collection, got {:?}", other),
        }
    }

    #[test]
    fn test_collection_of_references() {
        match value("[$a, $b]") {
            AttributeValue::Collection(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(&items[1], AttributeValue::Reference { root, .. } if root == "b"));
            }
            other => panic!("expected collection, got {:?}", other),
        }
    }

    #[test]
    fn test_unbalanced_collection_fails() {
        assert!(parse_value("[1, [2]", "test.fxml", SourceSpan::start(), true).is_err());
    }

    #[test]
    fn test_unterminated_binding_fails() {
        assert!(parse_value("${lbl.text", "test.fxml", SourceSpan::start(), true).is_err());
    }

    #[test]
    fn test_empty_path_segment_fails() {
        assert!(parse_value("$lbl..text", "test.fxml", SourceSpan::start(), true).is_err());
    }

    #[test]
    fn test_handler_classification() {
        assert_eq!(
            parse_handler("#handleClick"),
            HandlerValue::Method("handleClick".to_string())
        );
        assert_eq!(
            parse_handler("$sharedHandler"),
            HandlerValue::Reference("sharedHandler".to_string())
        );
        assert_eq!(parse_handler(""), HandlerValue::Empty);
        assert_eq!(
            parse_handler("doSomething()"),
            HandlerValue::Script("doSomething()".to_string())
        );
    }

    #[test]
    fn test_binding_indexed_access() {
        match value("${items[0]}") {
            AttributeValue::Binding(Expression::CollectionAccess { target, key }) => {
                assert_eq!(*target, Expression::Variable("items".to_string()));
                assert_eq!(*key, Expression::Whole(0));
            }
            other => panic!("expected collection access, got {:?}", other),
        }
    }
}
