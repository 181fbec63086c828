//! Lexical analysis for markup document text
//!
//! A small XML tokenizer sufficient for the markup dialect: tags,
//! attributes, text content, comments, and processing instructions.
//! Namespace prefixes are kept as part of names (`fx:id` is one name);
//! classification of reserved names happens in the parser.

use crate::error::{CompilerError, Result, SourceSpan};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    /// `<Name` - attribute tokens follow until TagClose or TagSelfClose.
    TagOpen(String),
    /// `>`
    TagClose,
    /// `/>`
    TagSelfClose,
    /// `</Name>`
    TagEnd(String),
    AttrName(String),
    Equals,
    /// Quoted attribute value, entities decoded.
    AttrValue(String),
    /// Text content between tags, entities decoded, whitespace collapsed.
    Text(String),
    /// `<?target data?>`
    ProcessingInstruction { target: String, data: String },
    Comment(String),
    Eof,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::TagOpen(name) => write!(f, "<{}", name),
            TokenType::TagClose => write!(f, ">"),
            TokenType::TagSelfClose => write!(f, "/>"),
            TokenType::TagEnd(name) => write!(f, "</{}>", name),
            TokenType::AttrName(name) => write!(f, "attribute({})", name),
            TokenType::Equals => write!(f, "="),
            TokenType::AttrValue(value) => write!(f, "value(\"{}\")", value),
            TokenType::Text(text) => write!(f, "text({})", text),
            TokenType::ProcessingInstruction { target, .. } => write!(f, "<?{}?>", target),
            TokenType::Comment(text) => write!(f, "comment({})", text),
            TokenType::Eof => write!(f, "EOF"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub span: SourceSpan,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    filename: String,
    in_tag: bool,
}

impl Lexer {
    pub fn new(input: &str, filename: String) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            filename,
            in_tag: false,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while !self.is_at_end() {
            if let Some(token) = self.next_token()? {
                tokens.push(token);
            }
        }

        tokens.push(Token {
            token_type: TokenType::Eof,
            span: self.span(),
        });

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        if self.in_tag {
            return self.next_tag_token();
        }

        let start = self.span();
        if self.peek() == Some('<') {
            return self.read_markup(start);
        }

        // Text content up to the next tag.
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch == '<' {
                break;
            }
            if ch == '&' {
                text.push(self.read_entity()?);
            } else {
                text.push(self.advance());
            }
        }

        let collapsed = collapse_whitespace(&text);
        if collapsed.is_empty() {
            return Ok(None);
        }

        Ok(Some(Token {
            token_type: TokenType::Text(collapsed),
            span: start,
        }))
    }

    fn read_markup(&mut self, start: SourceSpan) -> Result<Option<Token>> {
        self.advance(); // consume '<'

        match self.peek() {
            Some('?') => {
                self.advance();
                let token = self.read_processing_instruction(start)?;
                Ok(Some(token))
            }
            Some('!') => {
                self.advance();
                if self.peek() == Some('-') {
                    let comment = self.read_comment(start)?;
                    Ok(Some(comment))
                } else {
                    // DOCTYPE and friends: skip to the closing '>'.
                    while let Some(ch) = self.peek() {
                        self.advance();
                        if ch == '>' {
                            break;
                        }
                    }
                    Ok(None)
                }
            }
            Some('/') => {
                self.advance();
                let name = self.read_name(start)?;
                self.skip_whitespace();
                if self.peek() != Some('>') {
                    return Err(self.error(start, format!("malformed end tag </{}", name)));
                }
                self.advance();
                Ok(Some(Token {
                    token_type: TokenType::TagEnd(name),
                    span: start,
                }))
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let name = self.read_name(start)?;
                self.in_tag = true;
                Ok(Some(Token {
                    token_type: TokenType::TagOpen(name),
                    span: start,
                }))
            }
            _ => Err(self.error(start, "unexpected character after '<'")),
        }
    }

    fn next_tag_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();
        let start = self.span();

        match self.peek() {
            None => Err(self.error(start, "unexpected end of input inside tag")),
            Some('>') => {
                self.advance();
                self.in_tag = false;
                Ok(Some(Token {
                    token_type: TokenType::TagClose,
                    span: start,
                }))
            }
            Some('/') => {
                self.advance();
                if self.peek() != Some('>') {
                    return Err(self.error(start, "expected '>' after '/'"));
                }
                self.advance();
                self.in_tag = false;
                Ok(Some(Token {
                    token_type: TokenType::TagSelfClose,
                    span: start,
                }))
            }
            Some('=') => {
                self.advance();
                Ok(Some(Token {
                    token_type: TokenType::Equals,
                    span: start,
                }))
            }
            Some('"') | Some('\'') => {
                let value = self.read_quoted_value(start)?;
                Ok(Some(Token {
                    token_type: TokenType::AttrValue(value),
                    span: start,
                }))
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let name = self.read_name(start)?;
                Ok(Some(Token {
                    token_type: TokenType::AttrName(name),
                    span: start,
                }))
            }
            Some(ch) => Err(self.error(start, format!("unexpected character '{}' in tag", ch))),
        }
    }

    fn read_processing_instruction(&mut self, start: SourceSpan) -> Result<Token> {
        let mut content = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(self.error(start, "unterminated processing instruction"));
                }
                Some('?') => {
                    self.advance();
                    if self.peek() == Some('>') {
                        self.advance();
                        break;
                    }
                    content.push('?');
                }
                Some(_) => content.push(self.advance()),
            }
        }

        let trimmed = content.trim();
        let (target, data) = match trimmed.split_once(char::is_whitespace) {
            Some((target, data)) => (target.to_string(), data.trim().to_string()),
            None => (trimmed.to_string(), String::new()),
        };

        Ok(Token {
            token_type: TokenType::ProcessingInstruction { target, data },
            span: start,
        })
    }

    fn read_comment(&mut self, start: SourceSpan) -> Result<Token> {
        // Already consumed "<!", expect "--".
        for _ in 0..2 {
            if self.peek() != Some('-') {
                return Err(self.error(start, "malformed comment"));
            }
            self.advance();
        }

        let mut text = String::new();
        loop {
            if self.is_at_end() {
                return Err(self.error(start, "unterminated comment"));
            }
            if self.peek() == Some('-') && self.peek_ahead(1) == Some('-') {
                self.advance();
                self.advance();
                if self.peek() == Some('>') {
                    self.advance();
                    break;
                }
                text.push_str("--");
            } else {
                text.push(self.advance());
            }
        }

        Ok(Token {
            token_type: TokenType::Comment(text),
            span: start,
        })
    }

    fn read_name(&mut self, start: SourceSpan) -> Result<String> {
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' || ch == ':' || ch == '-' {
                name.push(self.advance());
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error(start, "expected a name"));
        }
        Ok(name)
    }

    fn read_quoted_value(&mut self, start: SourceSpan) -> Result<String> {
        let quote = self.advance();
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error(start, "unterminated attribute value")),
                Some(ch) if ch == quote => {
                    self.advance();
                    return Ok(value);
                }
                Some('&') => value.push(self.read_entity()?),
                Some('<') => {
                    return Err(self.error(start, "raw '<' in attribute value"));
                }
                Some(_) => value.push(self.advance()),
            }
        }
    }

    fn read_entity(&mut self) -> Result<char> {
        let start = self.span();
        self.advance(); // consume '&'
        let mut name = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error(start, "unterminated entity reference")),
                Some(';') => {
                    self.advance();
                    break;
                }
                Some(ch) if ch.is_alphanumeric() || ch == '#' => {
                    name.push(self.advance());
                }
                Some(_) => return Err(self.error(start, "malformed entity reference")),
            }
        }

        match name.as_str() {
            "lt" => Ok('<'),
            "gt" => Ok('>'),
            "amp" => Ok('&'),
            "quot" => Ok('"'),
            "apos" => Ok('\''),
            _ => {
                if let Some(code) = name.strip_prefix('#') {
                    let value = if let Some(hex) = code.strip_prefix('x') {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        code.parse::<u32>().ok()
                    };
                    value
                        .and_then(char::from_u32)
                        .ok_or_else(|| self.error(start, format!("invalid character entity &{};", name)))
                } else {
                    Err(self.error(start, format!("unknown entity &{};", name)))
                }
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn advance(&mut self) -> char {
        if self.position < self.input.len() {
            let ch = self.input[self.position];
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            ch
        } else {
            '\0'
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn span(&self) -> SourceSpan {
        SourceSpan::new(self.line, self.column)
    }

    fn error(&self, span: SourceSpan, message: impl Into<String>) -> CompilerError {
        CompilerError::parse(&self.filename, span, message)
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::new();
    let mut last_was_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        Lexer::new(input, "test.fxml".to_string()).tokenize().unwrap()
    }

    #[test]
    fn test_simple_element() {
        let tokens = tokenize(r#"<Label text="Hello"/>"#);
        assert_eq!(tokens[0].token_type, TokenType::TagOpen("Label".to_string()));
        assert_eq!(tokens[1].token_type, TokenType::AttrName("text".to_string()));
        assert_eq!(tokens[2].token_type, TokenType::Equals);
        assert_eq!(tokens[3].token_type, TokenType::AttrValue("Hello".to_string()));
        assert_eq!(tokens[4].token_type, TokenType::TagSelfClose);
        assert_eq!(tokens[5].token_type, TokenType::Eof);
    }

    #[test]
    fn test_nested_elements_and_text() {
        let tokens = tokenize("<Label>\n  Hello world\n</Label>");
        assert_eq!(tokens[0].token_type, TokenType::TagOpen("Label".to_string()));
        assert_eq!(tokens[1].token_type, TokenType::TagClose);
        assert_eq!(tokens[2].token_type, TokenType::Text("Hello world".to_string()));
        assert_eq!(tokens[3].token_type, TokenType::TagEnd("Label".to_string()));
    }

    #[test]
    fn test_namespaced_names() {
        let tokens = tokenize(r#"<fx:include source="a.fxml"/>"#);
        assert_eq!(
            tokens[0].token_type,
            TokenType::TagOpen("fx:include".to_string())
        );
        assert_eq!(
            tokens[1].token_type,
            TokenType::AttrName("source".to_string())
        );
    }

    #[test]
    fn test_processing_instruction() {
        let tokens = tokenize("<?import demo.widgets.Label?>\n<Label/>");
        match &tokens[0].token_type {
            TokenType::ProcessingInstruction { target, data } => {
                assert_eq!(target, "import");
                assert_eq!(data, "demo.widgets.Label");
            }
            other => panic!("expected processing instruction, got {:?}", other),
        }
    }

    #[test]
    fn test_entity_decoding() {
        let tokens = tokenize(r#"<Label text="a &lt; b &amp; c"/>"#);
        assert_eq!(
            tokens[3].token_type,
            TokenType::AttrValue("a < b & c".to_string())
        );
    }

    #[test]
    fn test_numeric_entity() {
        let tokens = tokenize(r#"<Label text="&#65;&#x42;"/>"#);
        assert_eq!(tokens[3].token_type, TokenType::AttrValue("AB".to_string()));
    }

    #[test]
    fn test_comment() {
        let tokens = tokenize("<!-- header -->\n<Label/>");
        assert_eq!(
            tokens[0].token_type,
            TokenType::Comment(" header ".to_string())
        );
    }

    #[test]
    fn test_spans_track_lines() {
        let tokens = tokenize("<Root>\n  <Label/>\n</Root>");
        let label = tokens
            .iter()
            .find(|t| t.token_type == TokenType::TagOpen("Label".to_string()))
            .unwrap();
        assert_eq!(label.span.line, 2);
        assert_eq!(label.span.column, 3);
    }

    #[test]
    fn test_unterminated_value_fails() {
        let result = Lexer::new(r#"<Label text="oops/>"#, "test.fxml".to_string()).tokenize();
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_entity_fails() {
        let result = Lexer::new(r#"<Label text="&bogus;"/>"#, "test.fxml".to_string()).tokenize();
        assert!(result.is_err());
    }

    #[test]
    fn test_single_quoted_value() {
        let tokens = tokenize(r#"<Label text='Hello'/>"#);
        assert_eq!(tokens[3].token_type, TokenType::AttrValue("Hello".to_string()));
    }
}
