//! Lenient HTML fragment parser.
//!
//! Markdown documents embed HTML snippets that are rarely well-formed XML:
//! void elements without a slash, boolean attributes, unquoted values,
//! stray `&` and unclosed tags. The reader is configured to tolerate all of
//! these, and tree building recovers from mismatched end tags the way a
//! browser would for the simple cases.

#![allow(clippy::unused_self)] // Unit struct methods have &self for API consistency

use std::sync::LazyLock;

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;

use crate::entities::{decode_entities, decode_entity};
use crate::error::TreeError;
use crate::node::{Attributes, Element, Node, is_void_element};

/// Script and style bodies are not markup and confuse the reader.
static RAW_TEXT_ELEMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b[^>]*>.*?(?:</script\s*>|\z)|<style\b[^>]*>.*?(?:</style\s*>|\z)",
    )
    .expect("invalid raw text element regex")
});

/// A single lexical unit of an HTML fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// Start tag. Void elements and `<x/>` report `self_closing`.
    Open {
        tag: String,
        attrs: Attributes,
        self_closing: bool,
    },
    /// End tag.
    Close { tag: String },
    /// Decoded character data.
    Text(String),
}

/// Parse HTML fragments into [`Node`] trees.
pub struct HtmlParser;

impl HtmlParser {
    /// Create a new parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Split a fragment into tokens.
    ///
    /// Comments, doctypes and processing instructions are dropped. Script and
    /// style elements are removed together with their bodies.
    pub fn tokenize(&self, html: &str) -> Result<Vec<Token>, TreeError> {
        let html = RAW_TEXT_ELEMENTS.replace_all(html, "");

        let mut reader = Reader::from_str(&html);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;

        let mut tokens = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let tag = self.decode_tag(reader.decoder(), e.name().as_ref());
                    let self_closing = is_void_element(&tag);
                    tokens.push(Token::Open {
                        attrs: self.decode_attrs(reader.decoder(), &e),
                        tag,
                        self_closing,
                    });
                }
                Event::Empty(e) => {
                    tokens.push(Token::Open {
                        tag: self.decode_tag(reader.decoder(), e.name().as_ref()),
                        attrs: self.decode_attrs(reader.decoder(), &e),
                        self_closing: true,
                    });
                }
                Event::End(e) => {
                    let tag = self.decode_tag(reader.decoder(), e.name().as_ref());
                    // `</br>` and friends carry no structure
                    if !is_void_element(&tag) {
                        tokens.push(Token::Close { tag });
                    }
                }
                Event::Text(e) => {
                    let text = reader.decoder().decode(&e)?;
                    push_text(&mut tokens, &decode_entities(&text));
                }
                Event::GeneralRef(e) => {
                    let name = reader.decoder().decode(&e)?;
                    let text = decode_entity(&name).unwrap_or_else(|| format!("&{name};"));
                    push_text(&mut tokens, &text);
                }
                Event::CData(e) => {
                    push_text(&mut tokens, &String::from_utf8_lossy(&e));
                }
                Event::Eof => break,
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }
        Ok(tokens)
    }

    /// Parse a fragment into a node list.
    pub fn parse(&self, html: &str) -> Result<Vec<Node>, TreeError> {
        let mut builder = TreeBuilder::new();
        for token in self.tokenize(html)? {
            builder.push(token);
        }
        Ok(builder.finish())
    }

    /// Parse a fragment, degrading to a single text node when the markup
    /// cannot be read at all.
    pub fn parse_lossy(&self, html: &str) -> Vec<Node> {
        match self.parse(html) {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::debug!(error = %e, "Falling back to text for unreadable markup");
                vec![Node::Text(html.to_owned())]
            }
        }
    }

    fn decode_tag(&self, decoder: Decoder, name: &[u8]) -> String {
        decoder
            .decode(name)
            .unwrap_or_else(|_| String::from_utf8_lossy(name))
            .to_ascii_lowercase()
    }

    fn decode_attrs(&self, decoder: Decoder, e: &BytesStart) -> Attributes {
        let mut attrs = Attributes::new();
        for attr in e.html_attributes().flatten() {
            let key = svg_attr_case(self.decode_tag(decoder, attr.key.as_ref()));
            let raw = decoder
                .decode(&attr.value)
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value));
            // First occurrence wins, as in browsers
            if !attrs.contains(&key) {
                attrs.set(key, decode_entities(&raw));
            }
        }
        attrs
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Restore the case of SVG attributes that HTML parsing lowercases.
fn svg_attr_case(name: String) -> String {
    match name.as_str() {
        "viewbox" => "viewBox".to_owned(),
        "preserveaspectratio" => "preserveAspectRatio".to_owned(),
        _ => name,
    }
}

/// Parse a fragment with the default parser.
pub fn parse_fragment(html: &str) -> Result<Vec<Node>, TreeError> {
    HtmlParser::new().parse(html)
}

fn push_text(tokens: &mut Vec<Token>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Token::Text(last)) = tokens.last_mut() {
        last.push_str(text);
    } else {
        tokens.push(Token::Text(text.to_owned()));
    }
}

/// Assemble tokens into a tree.
///
/// End tags close the nearest open element with the same name, implicitly
/// closing anything opened after it. End tags with no open counterpart are
/// ignored, and elements still open at the end are closed.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    root: Vec<Node>,
    open: Vec<Element>,
}

impl TreeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) {
        match token {
            Token::Open {
                tag,
                attrs,
                self_closing,
            } => {
                let el = Element {
                    tag,
                    attrs,
                    children: Vec::new(),
                };
                if self_closing {
                    self.append(Node::Element(el));
                } else {
                    self.open.push(el);
                }
            }
            Token::Close { tag } => {
                if self.open.iter().any(|el| el.tag == tag) {
                    while let Some(el) = self.open.pop() {
                        let done = el.tag == tag;
                        self.append(Node::Element(el));
                        if done {
                            break;
                        }
                    }
                }
            }
            Token::Text(text) => self.append_text(&text),
        }
    }

    /// Number of elements currently open.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Append an already-built node at the current insertion point.
    pub fn append(&mut self, node: Node) {
        let target = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.root,
        };
        if let (Node::Text(text), Some(Node::Text(last))) = (&node, target.last_mut()) {
            last.push_str(text);
            return;
        }
        target.push(node);
    }

    fn append_text(&mut self, text: &str) {
        self.append(Node::Text(text.to_owned()));
    }

    /// Close every open element and return the finished node list.
    #[must_use]
    pub fn finish(mut self) -> Vec<Node> {
        while let Some(el) = self.open.pop() {
            self.append(Node::Element(el));
        }
        self.root
    }
}
