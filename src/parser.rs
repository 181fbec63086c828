//! Recursive descent parser for markup documents
//!
//! Builds the [`Document`] AST from the lexer's token stream. Reserved
//! `fx:`-namespace elements and attributes are recognized here and parsed
//! into dedicated variants; attribute values that use expression syntax
//! are routed to the expression parser. Expression errors are recoverable
//! per attribute (they become diagnostics and the attribute is dropped);
//! structural errors abort the enclosing document.

use crate::ast::*;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{CompilerError, Result, SourceSpan};
use crate::expression;
use crate::lexer::{Token, TokenType};
use regex::Regex;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    file: String,

    static_name_regex: Regex,
    property_tag_regex: Regex,
}

/// One raw attribute as lexed, before classification.
struct RawAttribute {
    name: String,
    value: String,
    span: SourceSpan,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, file: String) -> Self {
        Self {
            tokens,
            current: 0,
            file,
            static_name_regex: Regex::new(r"^(?:\w+\.)*[A-Z]\w*\.[a-z]\w*$").unwrap(),
            property_tag_regex: Regex::new(r"^[a-z]\w*$").unwrap(),
        }
    }

    pub fn parse(&mut self, diagnostics: &mut Diagnostics) -> Result<Document> {
        let mut imports = Vec::new();
        let mut language = None;
        let mut compile = true;
        let mut root = None;

        while !self.is_at_end() {
            let token = self.peek().clone();
            match token.token_type {
                TokenType::Comment(_) => {
                    self.advance();
                }
                TokenType::ProcessingInstruction { target, data } => {
                    let span = token.span;
                    self.advance();
                    match target.as_str() {
                        "import" => imports.push(data),
                        "language" => language = Some(data),
                        "compile" => compile = !data.eq_ignore_ascii_case("false"),
                        _ => {
                            return Err(self.error(
                                span,
                                format!("unknown processing instruction <?{}?>", target),
                            ));
                        }
                    }
                }
                TokenType::TagOpen(_) => {
                    if root.is_some() {
                        return Err(self.error(
                            token.span,
                            "only one root element is allowed per document",
                        ));
                    }
                    root = Some(self.parse_node(diagnostics)?);
                }
                TokenType::Text(text) => {
                    return Err(self.error(
                        token.span,
                        format!("unexpected text outside root element: {}", text),
                    ));
                }
                other => {
                    return Err(self.error(token.span, format!("unexpected {}", other)));
                }
            }
        }

        let root = root
            .ok_or_else(|| self.error(SourceSpan::start(), "document has no root element"))?;

        if !root.is_instance() {
            return Err(CompilerError::parse(
                &self.file,
                root.span(),
                "root element must declare an instance",
            ));
        }

        Ok(Document {
            file: self.file.clone(),
            imports,
            language,
            compile,
            root,
        })
    }

    fn parse_node(&mut self, diagnostics: &mut Diagnostics) -> Result<DocumentNode> {
        let opening = self.advance().clone();
        let (tag, span) = match opening.token_type {
            TokenType::TagOpen(name) => (name, opening.span),
            other => return Err(self.error(opening.span, format!("expected element, got {}", other))),
        };

        let mut raw_attributes = Vec::new();
        let self_closing = loop {
            let token = self.advance().clone();
            match token.token_type {
                TokenType::AttrName(name) => {
                    let attr_span = token.span;
                    self.consume_equals(attr_span, &name)?;
                    let value_token = self.advance().clone();
                    let value = match value_token.token_type {
                        TokenType::AttrValue(value) => value,
                        other => {
                            return Err(self.error(
                                attr_span,
                                format!("expected value for attribute '{}', got {}", name, other),
                            ));
                        }
                    };
                    raw_attributes.push(RawAttribute {
                        name,
                        value,
                        span: attr_span,
                    });
                }
                TokenType::TagClose => break false,
                TokenType::TagSelfClose => break true,
                other => {
                    return Err(self.error(token.span, format!("unexpected {} in tag", other)));
                }
            }
        };

        let mut children = Vec::new();
        let mut texts: Vec<String> = Vec::new();

        if !self_closing {
            loop {
                let token = self.peek().clone();
                match token.token_type {
                    TokenType::TagEnd(name) => {
                        if name != tag {
                            return Err(self.error(
                                token.span,
                                format!("mismatched end tag: expected </{}>, got </{}>", tag, name),
                            ));
                        }
                        self.advance();
                        break;
                    }
                    TokenType::TagOpen(_) => {
                        children.push(self.parse_node(diagnostics)?);
                    }
                    TokenType::Text(text) => {
                        texts.push(text);
                        self.advance();
                    }
                    TokenType::Comment(_) => {
                        self.advance();
                    }
                    TokenType::Eof => {
                        return Err(self.error(token.span, format!("unclosed element <{}>", tag)));
                    }
                    other => {
                        return Err(self.error(
                            token.span,
                            format!("unexpected {} inside <{}>", other, tag),
                        ));
                    }
                }
            }
        }

        let inner_text = if texts.is_empty() {
            None
        } else {
            Some(texts.join(" "))
        };

        self.classify_element(tag, raw_attributes, children, inner_text, span, diagnostics)
    }

    fn classify_element(
        &self,
        tag: String,
        mut raw_attributes: Vec<RawAttribute>,
        children: Vec<DocumentNode>,
        inner_text: Option<String>,
        span: SourceSpan,
        diagnostics: &mut Diagnostics,
    ) -> Result<DocumentNode> {
        match tag.as_str() {
            "fx:define" => {
                if !raw_attributes.is_empty() {
                    return Err(self.error(span, "fx:define takes no attributes"));
                }
                return Ok(DocumentNode::Define { children, span });
            }
            "fx:reference" => {
                let source = self
                    .take_attribute(&mut raw_attributes, "source")
                    .ok_or_else(|| self.error(span, "fx:reference requires a source attribute"))?;
                if !raw_attributes.is_empty() || !children.is_empty() {
                    return Err(self.error(
                        span,
                        "fx:reference takes only a source attribute; use fx:copy to override properties",
                    ));
                }
                return Ok(DocumentNode::Reference { source, span });
            }
            "fx:copy" => {
                let source = self
                    .take_attribute(&mut raw_attributes, "source")
                    .ok_or_else(|| self.error(span, "fx:copy requires a source attribute"))?;
                let body = self.build_body(raw_attributes, children, inner_text, diagnostics)?;
                return Ok(DocumentNode::Copy { source, body, span });
            }
            "fx:include" => {
                let source = self
                    .take_attribute(&mut raw_attributes, "source")
                    .ok_or_else(|| self.error(span, "fx:include requires a source attribute"))?;
                let resources = self.take_attribute(&mut raw_attributes, "resources");
                // Charset is accepted for compatibility; inputs are UTF-8.
                self.take_attribute(&mut raw_attributes, "charset");
                let body = self.build_body(raw_attributes, children, inner_text, diagnostics)?;
                return Ok(DocumentNode::Include {
                    source,
                    resources,
                    body,
                    span,
                });
            }
            "fx:root" => {
                let type_name = self
                    .take_attribute(&mut raw_attributes, "type")
                    .ok_or_else(|| self.error(span, "fx:root requires a type attribute"))?;
                let body = self.build_body(raw_attributes, children, inner_text, diagnostics)?;
                return Ok(DocumentNode::Root {
                    type_name,
                    body,
                    span,
                });
            }
            "fx:script" => {
                return Err(self.error(
                    span,
                    "fx:script is not supported: generated code cannot embed a script engine",
                ));
            }
            _ => {}
        }

        if self.property_tag_regex.is_match(&tag) {
            let body = self.build_body(raw_attributes, children, inner_text, diagnostics)?;
            return Ok(DocumentNode::PropertyElement {
                name: tag,
                body,
                span,
            });
        }

        if self.static_name_regex.is_match(&tag) {
            let (class_name, property) = split_static_name(&tag);
            let body = self.build_body(raw_attributes, children, inner_text, diagnostics)?;
            return Ok(DocumentNode::StaticPropertyElement {
                class_name,
                property,
                body,
                span,
            });
        }

        // Ordinary instance element; fx:factory / fx:value / fx:constant
        // change the construction form and are mutually exclusive.
        let factory = self.take_attribute(&mut raw_attributes, "fx:factory");
        let value = self.take_attribute(&mut raw_attributes, "fx:value");
        let constant = self.take_attribute(&mut raw_attributes, "fx:constant");
        let initializers = [&factory, &value, &constant]
            .iter()
            .filter(|v| v.is_some())
            .count();
        if initializers > 1 {
            return Err(self.error(
                span,
                format!("multiple initialization attributes specified on <{}>", tag),
            ));
        }

        if let Some(member) = constant {
            if !raw_attributes.is_empty() || !children.is_empty() {
                return Err(self.error(span, "fx:constant elements take no other content"));
            }
            return Ok(DocumentNode::Constant {
                type_name: tag,
                member,
                span,
            });
        }

        let body = self.build_body(raw_attributes, children, inner_text, diagnostics)?;

        if let Some(method) = factory {
            return Ok(DocumentNode::Factory {
                type_name: tag,
                method,
                body,
                span,
            });
        }

        if let Some(literal) = value {
            return Ok(DocumentNode::Value {
                type_name: tag,
                literal,
                body,
                span,
            });
        }

        Ok(DocumentNode::Element {
            type_name: tag,
            body,
            span,
        })
    }

    fn build_body(
        &self,
        raw_attributes: Vec<RawAttribute>,
        children: Vec<DocumentNode>,
        inner_text: Option<String>,
        diagnostics: &mut Diagnostics,
    ) -> Result<ElementBody> {
        let mut attributes = Vec::new();

        for raw in raw_attributes {
            match self.classify_attribute(raw, diagnostics) {
                Some(attribute) => attributes.push(attribute),
                None => continue, // already reported, keep checking siblings
            }
        }

        Ok(ElementBody {
            attributes,
            children,
            inner_text,
        })
    }

    fn classify_attribute(
        &self,
        raw: RawAttribute,
        diagnostics: &mut Diagnostics,
    ) -> Option<Attribute> {
        let RawAttribute { name, value, span } = raw;

        if name == "fx:id" {
            return Some(Attribute::Id { value, span });
        }

        if name == "fx:controller" {
            return Some(Attribute::Controller {
                class_name: value,
                span,
            });
        }

        // Namespace declarations carry no graph information.
        if name == "xmlns" || name.starts_with("xmlns:") {
            return None;
        }

        if is_handler_name(&name) {
            return Some(Attribute::EventHandler {
                name,
                value: expression::parse_handler(&value),
                span,
            });
        }

        if self.static_name_regex.is_match(&name) {
            let (class_name, property) = split_static_name(&name);
            let parsed = self.parse_attribute_value(&value, span, diagnostics)?;
            return Some(Attribute::StaticProperty {
                class_name,
                property,
                value: parsed,
                span,
            });
        }

        let parsed = self.parse_attribute_value(&value, span, diagnostics)?;
        Some(Attribute::InstanceProperty {
            name,
            value: parsed,
            span,
        })
    }

    /// Expression errors are batched as diagnostics; the attribute is
    /// dropped but sibling attributes keep getting checked.
    fn parse_attribute_value(
        &self,
        value: &str,
        span: SourceSpan,
        diagnostics: &mut Diagnostics,
    ) -> Option<AttributeValue> {
        match expression::parse_value(value, &self.file, span, true) {
            Ok(parsed) => Some(parsed),
            Err(error) => {
                diagnostics.error(
                    DiagnosticKind::MalformedExpression,
                    &self.file,
                    span,
                    error.to_string(),
                );
                None
            }
        }
    }

    fn take_attribute(&self, raw_attributes: &mut Vec<RawAttribute>, name: &str) -> Option<String> {
        let index = raw_attributes.iter().position(|a| a.name == name)?;
        Some(raw_attributes.remove(index).value)
    }

    fn consume_equals(&mut self, span: SourceSpan, attr: &str) -> Result<()> {
        let is_equals = matches!(self.advance().token_type, TokenType::Equals);
        if is_equals {
            Ok(())
        } else {
            Err(self.error(span, format!("expected '=' after attribute '{}'", attr)))
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn error(&self, span: SourceSpan, message: impl Into<String>) -> CompilerError {
        CompilerError::parse(&self.file, span, message)
    }
}

fn split_static_name(name: &str) -> (String, String) {
    let separator = name.rfind('.').unwrap_or(0);
    (name[..separator].to_string(), name[separator + 1..].to_string())
}

/// Event-handler naming convention: `on` followed by a capitalized slot
/// name, e.g. `onAction`.
fn is_handler_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('o')
        && chars.next() == Some('n')
        && chars.next().map_or(false, |c| c.is_ascii_uppercase())
}

/// Convenience entry point: lex and parse one document.
pub fn parse_document(source: &str, file: &str, diagnostics: &mut Diagnostics) -> Result<Document> {
    let mut lexer = crate::lexer::Lexer::new(source, file.to_string());
    let tokens = lexer.tokenize()?;
    Parser::new(tokens, file.to_string()).parse(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Document {
        let mut diagnostics = Diagnostics::new();
        let document = parse_document(source, "test.fxml", &mut diagnostics).unwrap();
        assert!(!diagnostics.has_errors(), "diagnostics: {:?}", diagnostics);
        document
    }

    #[test]
    fn test_parse_simple_document() {
        let document = parse(
            r#"<?import demo.widgets.*?>
               <Root><Label fx:id="lbl" text="Hello"/></Root>"#,
        );

        assert_eq!(document.imports, vec!["demo.widgets.*".to_string()]);
        match &document.root {
            DocumentNode::Element { type_name, body, .. } => {
                assert_eq!(type_name, "Root");
                assert_eq!(body.children.len(), 1);
                assert_eq!(body.children[0].declared_id(), Some("lbl"));
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_attribute_order_preserved() {
        let document = parse(r#"<Label a="1" b="2" c="3"/>"#);
        let body = document.root.body().unwrap();
        let names: Vec<_> = body
            .attributes
            .iter()
            .map(|a| match a {
                Attribute::InstanceProperty { name, .. } => name.clone(),
                _ => panic!("expected instance property"),
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_controller_declaration() {
        let document = parse(r#"<Root fx:controller="demo.MainController"/>"#);
        assert_eq!(document.controller_name(), Some("demo.MainController"));
    }

    #[test]
    fn test_event_handler_attribute() {
        let document = parse(r##"<Button onAction="#handleClick"/>"##);
        let body = document.root.body().unwrap();
        match &body.attributes[0] {
            Attribute::EventHandler { name, value, .. } => {
                assert_eq!(name, "onAction");
                assert_eq!(value, &HandlerValue::Method("handleClick".to_string()));
            }
            other => panic!("expected handler, got {:?}", other),
        }
    }

    #[test]
    fn test_static_property_attribute() {
        let document = parse(r#"<Label GridPane.rowIndex="1"/>"#);
        let body = document.root.body().unwrap();
        match &body.attributes[0] {
            Attribute::StaticProperty {
                class_name,
                property,
                value,
                ..
            } => {
                assert_eq!(class_name, "GridPane");
                assert_eq!(property, "rowIndex");
                assert_eq!(value, &AttributeValue::Literal("1".to_string()));
            }
            other => panic!("expected static property, got {:?}", other),
        }
    }

    #[test]
    fn test_property_element_wrapper() {
        let document = parse("<Label><text>Hello</text></Label>");
        let body = document.root.body().unwrap();
        match &body.children[0] {
            DocumentNode::PropertyElement { name, body, .. } => {
                assert_eq!(name, "text");
                assert_eq!(body.inner_text.as_deref(), Some("Hello"));
            }
            other => panic!("expected property element, got {:?}", other),
        }
    }

    #[test]
    fn test_define_reference_and_copy() {
        let document = parse(
            r#"<Root>
                 <fx:define><Insets fx:id="pad" top="4"/></fx:define>
                 <fx:reference source="pad"/>
                 <fx:copy source="pad"/>
               </Root>"#,
        );
        let body = document.root.body().unwrap();
        assert!(matches!(body.children[0], DocumentNode::Define { .. }));
        assert!(matches!(
            &body.children[1],
            DocumentNode::Reference { source, .. } if source == "pad"
        ));
        assert!(matches!(
            &body.children[2],
            DocumentNode::Copy { source, .. } if source == "pad"
        ));
    }

    #[test]
    fn test_reference_with_extra_attributes_fails() {
        let mut diagnostics = Diagnostics::new();
        let result = parse_document(
            r#"<Root>
                 <fx:define><Insets fx:id="pad" top="4"/></fx:define>
                 <fx:reference source="pad" top="8"/>
               </Root>"#,
            "test.fxml",
            &mut diagnostics,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_constant_factory_and_value_forms() {
        let document = parse(
            r#"<Root>
                 <Orientation fx:constant="HORIZONTAL"/>
                 <Collections fx:factory="observableArrayList"/>
                 <Duration fx:value="200ms"/>
               </Root>"#,
        );
        let body = document.root.body().unwrap();
        assert!(matches!(body.children[0], DocumentNode::Constant { .. }));
        assert!(matches!(body.children[1], DocumentNode::Factory { .. }));
        assert!(matches!(body.children[2], DocumentNode::Value { .. }));
    }

    #[test]
    fn test_include_records_path_without_inlining() {
        let document = parse(r#"<Root><fx:include source="header.fxml"/></Root>"#);
        let body = document.root.body().unwrap();
        match &body.children[0] {
            DocumentNode::Include { source, .. } => assert_eq!(source, "header.fxml"),
            other => panic!("expected include, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_processing_instruction_fails() {
        let mut diagnostics = Diagnostics::new();
        let result = parse_document("<?mystery data?>\n<Root/>", "test.fxml", &mut diagnostics);
        assert!(result.is_err());
    }

    #[test]
    fn test_multiple_initializers_fail() {
        let mut diagnostics = Diagnostics::new();
        let result = parse_document(
            r#"<Duration fx:value="1" fx:factory="make"/>"#,
            "test.fxml",
            &mut diagnostics,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_expression_batches_diagnostic_and_continues() {
        let mut diagnostics = Diagnostics::new();
        let document = parse_document(
            r#"<Label text="${broken" other="fine"/>"#,
            "test.fxml",
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(
            diagnostics.entries()[0].kind,
            DiagnosticKind::MalformedExpression
        );
        // The sibling attribute survives.
        let body = document.root.body().unwrap();
        assert_eq!(body.attributes.len(), 1);
    }

    #[test]
    fn test_mismatched_end_tag_fails() {
        let mut diagnostics = Diagnostics::new();
        let result = parse_document("<Root><Label></Root>", "test.fxml", &mut diagnostics);
        assert!(result.is_err());
    }

    #[test]
    fn test_root_must_be_instance() {
        let mut diagnostics = Diagnostics::new();
        let result = parse_document("<text>Hello</text>", "test.fxml", &mut diagnostics);
        assert!(result.is_err());
    }

    #[test]
    fn test_script_element_rejected() {
        let mut diagnostics = Diagnostics::new();
        let result = parse_document(
            "<Root><fx:script>doThing()</fx:script></Root>",
            "test.fxml",
            &mut diagnostics,
        );
        assert!(result.is_err());
    }
}
