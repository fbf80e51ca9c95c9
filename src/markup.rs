//! Component markup parser.
//!
//! Produces a node tree with byte spans for the parts of a single-file
//! component the preprocessor cares about: elements and their attributes,
//! directives, mustache expressions and raw `<script>`/`<style>` blocks. It does
//! not try to understand the full templating grammar; block tags such as
//! `{#if cond}` are reduced to the expression they carry.

use thiserror::Error;

/// Byte range into the component source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message} at byte {offset}")]
pub struct MarkupError {
    pub offset: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(Text),
    Expression(ExpressionTag),
    Comment(Span),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub data: String,
    pub span: Span,
}

/// A `{...}` tag in content. `source` is the embedded expression, with any
/// block keyword (`#if`, `:else if`, `@html`, ...) removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionTag {
    pub source: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    /// Content span of raw-text elements (`script`, `style`)
    pub raw: Option<Span>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute name; empty for `{shorthand}` and `{...spread}` attributes
    pub name: String,
    pub value: AttributeValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Boolean,
    Parts(Vec<ValuePart>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValuePart {
    Text { data: String, span: Span },
    Expression { source: String, span: Span },
}

const DIRECTIVE_PREFIXES: &[&str] = &[
    "on", "bind", "class", "style", "use", "transition", "in", "out", "animate", "let",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr", "!doctype",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea"];

const AUTO_CLOSING: &[&str] = &["p", "li", "dt", "dd", "option", "optgroup", "tr", "td", "th", "thead", "tbody", "tfoot"];

impl Attribute {
    /// Split a directive name such as `class:active` into (`class`, `active`)
    pub fn directive(&self) -> Option<(&str, &str)> {
        let (prefix, name) = self.name.split_once(':')?;
        DIRECTIVE_PREFIXES
            .contains(&prefix)
            .then_some((prefix, name.split('|').next().unwrap_or(name)))
    }

    /// Value text when it consists only of literal text
    pub fn static_value(&self) -> Option<String> {
        match &self.value {
            AttributeValue::Boolean => None,
            AttributeValue::Parts(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        ValuePart::Text { data, .. } => text.push_str(data),
                        ValuePart::Expression { .. } => return None,
                    }
                }
                Some(text)
            }
        }
    }

    pub fn parts(&self) -> &[ValuePart] {
        match &self.value {
            AttributeValue::Boolean => &[],
            AttributeValue::Parts(parts) => parts,
        }
    }

    pub fn has_expression(&self) -> bool {
        self.parts().iter().any(|p| matches!(p, ValuePart::Expression { .. }))
    }
}

/// Parsed component
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Document {
    /// Visit every node depth-first, parents before children
    pub fn walk<'a, F: FnMut(&'a Node)>(&'a self, f: &mut F) {
        fn visit<'a, F: FnMut(&'a Node)>(nodes: &'a [Node], f: &mut F) {
            for node in nodes {
                f(node);
                if let Node::Element(element) = node {
                    visit(&element.children, f);
                }
            }
        }
        visit(&self.nodes, f);
    }

    /// All elements in document order
    pub fn elements(&self) -> Vec<&Element> {
        let mut elements = Vec::new();
        self.walk(&mut |node| {
            if let Node::Element(element) = node {
                elements.push(element);
            }
        });
        elements
    }

    /// The first top-level `<style>` block
    pub fn style_block(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(element) if element.name == "style" => Some(element),
            _ => None,
        })
    }
}

pub fn parse(source: &str) -> Result<Document, MarkupError> {
    let mut parser = MarkupParser {
        src: source.as_bytes(),
        text: source,
        pos: 0,
    };
    parser.parse_document()
}

struct MarkupParser<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> MarkupParser<'a> {
    fn error(&self, offset: usize, message: impl Into<String>) -> MarkupError {
        MarkupError {
            offset,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s.as_bytes())
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_document(&mut self) -> Result<Document, MarkupError> {
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Vec<Node> = Vec::new();

        while self.pos < self.src.len() {
            let node = if self.starts_with("<!--") {
                let start = self.pos;
                let end = self.text[self.pos + 4..]
                    .find("-->")
                    .ok_or_else(|| self.error(start, "unterminated comment"))?;
                self.pos += 4 + end + 3;
                Some(Node::Comment(Span::new(start, self.pos)))
            } else if self.starts_with("</") {
                self.close_element(&mut stack, &mut root)?;
                None
            } else if self.peek() == Some(b'<') && self.src.get(self.pos + 1).is_some_and(|c| is_tag_start(*c)) {
                let element = self.parse_open_tag()?;
                match element {
                    OpenTag::Complete(element) => Some(Node::Element(element)),
                    OpenTag::Open(element) => {
                        stack.push(element);
                        None
                    }
                }
            } else if self.peek() == Some(b'{') {
                let tag = self.parse_expression_tag()?;
                tag.map(Node::Expression)
            } else {
                Some(Node::Text(self.parse_text()))
            };

            if let Some(node) = node {
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root.push(node),
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(self.error(open.span.start, format!("<{}> was left open", open.name)));
        }
        Ok(Document { nodes: root })
    }

    fn parse_text(&mut self) -> Text {
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek() {
            if c == b'{' || (c == b'<' && self.src.get(self.pos + 1).is_some_and(|n| is_tag_start(*n) || *n == b'/' || *n == b'!')) {
                break;
            }
            self.pos += 1;
        }
        Text {
            data: self.text[start..self.pos].to_string(),
            span: Span::new(start, self.pos),
        }
    }

    fn close_element(&mut self, stack: &mut Vec<Element>, root: &mut Vec<Node>) -> Result<(), MarkupError> {
        let start = self.pos;
        self.pos += 2;
        let name = self.read_tag_name();
        self.skip_whitespace();
        if self.peek() != Some(b'>') {
            return Err(self.error(self.pos, format!("expected '>' to close </{}>", name)));
        }
        self.pos += 1;

        let Some(index) = stack.iter().rposition(|e| e.name == name) else {
            return Err(self.error(start, format!("</{}> attempted to close an element that was not open", name)));
        };
        if stack[index + 1..].iter().any(|e| !AUTO_CLOSING.contains(&e.name.as_str())) {
            let open = stack.last().map(|e| e.name.clone()).unwrap_or_default();
            return Err(self.error(start, format!("</{}> attempted to close <{}>", name, open)));
        }

        while stack.len() > index {
            let Some(mut element) = stack.pop() else { break };
            element.span.end = if stack.len() == index { self.pos } else { start };
            let node = Node::Element(element);
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => root.push(node),
            }
        }
        Ok(())
    }

    fn read_tag_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, b'-' | b':' | b'.' | b'_' | b'!') {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.text[start..self.pos].to_string()
    }

    fn parse_open_tag(&mut self) -> Result<OpenTag, MarkupError> {
        let start = self.pos;
        self.pos += 1;
        let name = self.read_tag_name();
        let mut attributes = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error(start, format!("unterminated <{}> tag", name))),
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') if self.src.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    return Ok(OpenTag::Complete(Element {
                        name,
                        attributes,
                        children: Vec::new(),
                        raw: None,
                        span: Span::new(start, self.pos),
                    }));
                }
                Some(_) => attributes.push(self.parse_attribute()?),
            }
        }

        let lower = name.to_ascii_lowercase();
        if VOID_ELEMENTS.contains(&lower.as_str()) {
            return Ok(OpenTag::Complete(Element {
                name,
                attributes,
                children: Vec::new(),
                raw: None,
                span: Span::new(start, self.pos),
            }));
        }

        if RAW_TEXT_ELEMENTS.contains(&lower.as_str()) {
            let content_start = self.pos;
            let closing = format!("</{}", lower);
            let offset = self.text[content_start..]
                .to_ascii_lowercase()
                .find(&closing)
                .ok_or_else(|| self.error(start, format!("<{}> was left open", name)))?;
            let content_end = content_start + offset;
            let close_end = self.text[content_end..]
                .find('>')
                .map(|i| content_end + i + 1)
                .ok_or_else(|| self.error(content_end, format!("unterminated </{}> tag", name)))?;
            self.pos = close_end;
            return Ok(OpenTag::Complete(Element {
                name,
                attributes,
                children: Vec::new(),
                raw: Some(Span::new(content_start, content_end)),
                span: Span::new(start, close_end),
            }));
        }

        Ok(OpenTag::Open(Element {
            name,
            attributes,
            children: Vec::new(),
            raw: None,
            span: Span::new(start, self.pos),
        }))
    }

    fn parse_attribute(&mut self) -> Result<Attribute, MarkupError> {
        let start = self.pos;
        if self.peek() == Some(b'{') {
            let (source, span) = self.read_expression()?;
            return Ok(Attribute {
                name: String::new(),
                value: AttributeValue::Parts(vec![ValuePart::Expression { source, span }]),
                span: Span::new(start, self.pos),
            });
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() || matches!(c, b'=' | b'>' | b'"' | b'\'') {
                break;
            }
            if c == b'/' && self.src.get(self.pos + 1) == Some(&b'>') {
                break;
            }
            self.pos += 1;
        }
        let name = self.text[start..self.pos].to_string();
        if name.is_empty() {
            return Err(self.error(start, "expected attribute name"));
        }

        let name_end = self.pos;
        self.skip_whitespace();
        if self.peek() != Some(b'=') {
            self.pos = name_end;
            return Ok(Attribute {
                name,
                value: AttributeValue::Boolean,
                span: Span::new(start, name_end),
            });
        }
        self.pos += 1;
        self.skip_whitespace();

        let parts = match self.peek() {
            Some(q @ (b'"' | b'\'')) => {
                self.pos += 1;
                self.parse_value_parts(Some(q))?
            }
            Some(_) => self.parse_value_parts(None)?,
            None => return Err(self.error(start, format!("missing value for attribute '{}'", name))),
        };

        Ok(Attribute {
            name,
            value: AttributeValue::Parts(parts),
            span: Span::new(start, self.pos),
        })
    }

    fn parse_value_parts(&mut self, quote: Option<u8>) -> Result<Vec<ValuePart>, MarkupError> {
        let mut parts = Vec::new();
        let mut text_start = self.pos;

        loop {
            let Some(c) = self.peek() else {
                if quote.is_some() {
                    return Err(self.error(text_start, "unterminated attribute value"));
                }
                break;
            };
            let at_end = match quote {
                Some(q) => c == q,
                None => c.is_ascii_whitespace() || c == b'>' || (c == b'/' && self.src.get(self.pos + 1) == Some(&b'>')),
            };
            if at_end {
                break;
            }
            if c == b'{' {
                if self.pos > text_start {
                    parts.push(ValuePart::Text {
                        data: self.text[text_start..self.pos].to_string(),
                        span: Span::new(text_start, self.pos),
                    });
                }
                let (source, span) = self.read_expression()?;
                parts.push(ValuePart::Expression { source, span });
                text_start = self.pos;
                continue;
            }
            self.pos += 1;
        }

        if self.pos > text_start {
            parts.push(ValuePart::Text {
                data: self.text[text_start..self.pos].to_string(),
                span: Span::new(text_start, self.pos),
            });
        }
        if quote.is_some() {
            self.pos += 1;
        }
        Ok(parts)
    }

    /// Read a `{...}` expression starting at the current `{`.
    fn read_expression(&mut self) -> Result<(String, Span), MarkupError> {
        let start = self.pos;
        let end = scan_expression_end(self.src, start + 1)
            .ok_or_else(|| self.error(start, "unterminated expression"))?;
        self.pos = end + 1;
        Ok((self.text[start + 1..end].trim().to_string(), Span::new(start, self.pos)))
    }

    fn parse_expression_tag(&mut self) -> Result<Option<ExpressionTag>, MarkupError> {
        let (source, span) = self.read_expression()?;
        let source = strip_block_keyword(&source);
        if source.is_empty() {
            return Ok(None);
        }
        Ok(Some(ExpressionTag { source, span }))
    }
}

enum OpenTag {
    Complete(Element),
    Open(Element),
}

fn is_tag_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'!'
}

/// Reduce `#if cond`, `:else if cond`, `#each items as item`, `@html x` to the
/// embedded expression. Keyword-only tags (`:else`, `/if`) reduce to nothing.
fn strip_block_keyword(source: &str) -> String {
    let Some(first) = source.chars().next() else {
        return String::new();
    };
    if !matches!(first, '#' | ':' | '/' | '@') {
        return source.to_string();
    }
    if first == '/' {
        return String::new();
    }
    let mut words = source[1..].splitn(2, char::is_whitespace);
    let keyword = words.next().unwrap_or_default();
    let mut rest = words.next().unwrap_or_default().trim();
    if keyword == "else" {
        rest = rest.strip_prefix("if").map(str::trim).unwrap_or("");
    }
    if keyword == "each" {
        rest = rest.split(" as ").next().unwrap_or(rest).trim();
    }
    if keyword == "await" {
        rest = rest.split(" then").next().unwrap_or(rest).trim();
    }
    if keyword == "const" {
        rest = rest.split_once('=').map(|(_, value)| value.trim()).unwrap_or("");
    }
    rest.to_string()
}

/// Find the index of the `}` closing an expression whose body starts at `start`.
/// String literals, template literals (with nested `${}`) and comments are skipped.
pub(crate) fn scan_expression_end(src: &[u8], start: usize) -> Option<usize> {
    #[derive(PartialEq)]
    enum Frame {
        Brace,
        Template,
    }

    let mut stack = vec![Frame::Brace];
    let mut i = start;
    while i < src.len() {
        let c = src[i];
        if stack.last() == Some(&Frame::Template) {
            match c {
                b'\\' => i += 1,
                b'`' => {
                    stack.pop();
                }
                b'$' if src.get(i + 1) == Some(&b'{') => {
                    stack.push(Frame::Brace);
                    i += 1;
                }
                _ => {}
            }
            i += 1;
            continue;
        }
        match c {
            b'"' | b'\'' => {
                i += 1;
                while i < src.len() && src[i] != c {
                    if src[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                if i >= src.len() {
                    return None;
                }
            }
            b'`' => stack.push(Frame::Template),
            b'/' if src.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < src.len() && !(src[i] == b'*' && src[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'{' => stack.push(Frame::Brace),
            b'}' => {
                stack.pop();
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
