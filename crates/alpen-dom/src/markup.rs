#![forbid(unsafe_code)]

//! Minimal markup fragment parser and serializer.
//!
//! Accepts the HTML subset directive-bearing pages are written in: elements,
//! quoted/unquoted/bare attributes (names may contain `:`, `@`, `.`),
//! text, comments, void elements, and `/>` self-closing tags. Whitespace-only
//! text between elements is dropped.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `</b>` while `<a>` is open | Mismatched close | [`MarkupError::MismatchedClose`] |
//! | `<a>` never closed | Truncated input | [`MarkupError::Unclosed`] |
//! | `<` without a name | Stray bracket | [`MarkupError::Malformed`] |

use std::fmt;

use crate::document::{Document, NodeId, NodeKind};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Errors from [`Document::parse_fragment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// A closing tag did not match the innermost open element.
    MismatchedClose {
        expected: String,
        found: String,
        offset: usize,
    },
    /// Input ended with elements still open.
    Unclosed { tag: String },
    /// Anything else the parser could not make sense of.
    Malformed { offset: usize, message: String },
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MismatchedClose {
                expected,
                found,
                offset,
            } => write!(
                f,
                "expected </{expected}> but found </{found}> at offset {offset}"
            ),
            Self::Unclosed { tag } => write!(f, "unclosed <{tag}>"),
            Self::Malformed { offset, message } => {
                write!(f, "malformed markup at offset {offset}: {message}")
            }
        }
    }
}

impl std::error::Error for MarkupError {}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn malformed(&self, message: &str) -> MarkupError {
        MarkupError::Malformed {
            offset: self.pos,
            message: message.to_string(),
        }
    }
}

fn is_name_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\'' | '<')
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn escape(raw: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

impl Document {
    /// Parse `markup` into detached top-level nodes.
    ///
    /// # Errors
    ///
    /// Returns a [`MarkupError`] for mismatched, unclosed, or malformed tags.
    pub fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>, MarkupError> {
        let mut cur = Cursor { src: markup, pos: 0 };
        let mut roots = Vec::new();
        let mut open: Vec<NodeId> = Vec::new();

        while !cur.eof() {
            if cur.eat("<!--") {
                match cur.rest().find("-->") {
                    Some(end) => cur.pos += end + 3,
                    None => return Err(cur.malformed("unterminated comment")),
                }
                continue;
            }

            if cur.eat("</") {
                let offset = cur.pos;
                let name = cur.take_while(is_name_char).to_ascii_lowercase();
                cur.skip_ws();
                if !cur.eat(">") {
                    return Err(cur.malformed("expected '>' after closing tag"));
                }
                let Some(top) = open.pop() else {
                    return Err(MarkupError::Malformed {
                        offset,
                        message: format!("stray </{name}>"),
                    });
                };
                let expected = self.tag(top).unwrap_or_default().to_string();
                if expected != name {
                    return Err(MarkupError::MismatchedClose {
                        expected,
                        found: name,
                        offset,
                    });
                }
                continue;
            }

            if cur.eat("<") {
                let parent = open.last().copied();
                let node = self.parse_open_tag(&mut cur, &mut open)?;
                self.attach_parsed(node, parent, &mut roots);
                continue;
            }

            let text = cur.take_while(|c| c != '<');
            if !text.trim().is_empty() {
                let node = self.create_text(decode_entities(text));
                let parent = open.last().copied();
                self.attach_parsed(node, parent, &mut roots);
            }
        }

        if let Some(top) = open.pop() {
            return Err(MarkupError::Unclosed {
                tag: self.tag(top).unwrap_or_default().to_string(),
            });
        }
        Ok(roots)
    }

    fn attach_parsed(&mut self, node: NodeId, parent: Option<NodeId>, roots: &mut Vec<NodeId>) {
        match parent {
            // Detached parents never produce records, and a fresh element
            // always accepts children.
            Some(parent) => {
                let _ = self.append_child(parent, node);
            }
            None => roots.push(node),
        }
    }

    fn parse_open_tag(
        &mut self,
        cur: &mut Cursor<'_>,
        open: &mut Vec<NodeId>,
    ) -> Result<NodeId, MarkupError> {
        let name = cur.take_while(is_name_char);
        if name.is_empty() {
            return Err(cur.malformed("expected tag name"));
        }
        let node = self.create_element(name);
        let tag = name.to_ascii_lowercase();

        loop {
            cur.skip_ws();
            if cur.eat("/>") {
                return Ok(node);
            }
            if cur.eat(">") {
                if !VOID_ELEMENTS.contains(&tag.as_str()) {
                    // Attached on return; pushed now so children find it.
                    open.push(node);
                }
                return Ok(node);
            }
            if cur.eof() {
                return Err(MarkupError::Unclosed { tag });
            }

            let attr = cur.take_while(is_name_char);
            if attr.is_empty() {
                return Err(cur.malformed("expected attribute name"));
            }
            cur.skip_ws();
            let value = if cur.eat("=") {
                cur.skip_ws();
                match cur.peek() {
                    Some(q @ ('"' | '\'')) => {
                        cur.bump();
                        let raw = cur.take_while(|c| c != q);
                        if cur.bump().is_none() {
                            return Err(cur.malformed("unterminated attribute value"));
                        }
                        decode_entities(raw)
                    }
                    _ => decode_entities(cur.take_while(is_name_char)),
                }
            } else {
                String::new()
            };
            self.set_attribute(node, attr, value);
        }
    }

    /// Parse `markup` and append the resulting nodes to `parent`.
    ///
    /// # Errors
    ///
    /// Returns a [`MarkupError`] if the markup does not parse; nothing is
    /// attached in that case.
    pub fn append_markup(
        &mut self,
        parent: NodeId,
        markup: &str,
    ) -> Result<Vec<NodeId>, MarkupError> {
        let nodes = self.parse_fragment(markup)?;
        for &node in &nodes {
            self.append_child(parent, node)
                .map_err(|e| MarkupError::Malformed {
                    offset: 0,
                    message: e.to_string(),
                })?;
        }
        Ok(nodes)
    }

    /// Serialize a node and its subtree.
    #[must_use]
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serialize the children of a node.
    #[must_use]
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(node) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            NodeKind::Text(text) => out.push_str(&escape(text, false)),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for attr in attributes {
                    out.push(' ');
                    out.push_str(&attr.name);
                    if !attr.value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape(&attr.value, true));
                        out.push('"');
                    }
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for &child in self.children(node) {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}
