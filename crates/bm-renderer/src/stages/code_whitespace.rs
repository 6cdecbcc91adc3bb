//! Code block whitespace protection.

use bm_tree::{Element, Node};

use super::{Stage, StageContext};
use crate::document::Document;
use crate::error::RenderError;

const NBSP: char = '\u{a0}';

/// Makes whitespace in block code survive editors that collapse it.
///
/// Inside `pre > code`: carriage returns are dropped, newlines become
/// `<br>`, tabs become two non-breaking spaces, and spaces at the start of
/// a line become non-breaking spaces. A spaces-only text node between two
/// `span`s (highlighter tokens) is converted as well.
#[derive(Clone, Copy, Debug, Default)]
pub struct CodeWhitespace;

impl Stage for CodeWhitespace {
    fn name(&self) -> &'static str {
        "code-whitespace"
    }

    fn apply(&self, doc: &mut Document, _ctx: &mut StageContext<'_>) -> Result<(), RenderError> {
        walk(&mut doc.nodes, false);
        Ok(())
    }
}

fn walk(nodes: &mut [Node], in_pre: bool) {
    for node in nodes {
        let Node::Element(el) = node else {
            continue;
        };
        if in_pre && el.is("code") {
            LineState::default().protect(el);
            preserve_span_gaps(el);
        } else {
            let is_pre = el.is("pre");
            walk(&mut el.children, is_pre);
        }
    }
}

/// Tracks line starts across the text nodes of one code element.
struct LineState {
    at_line_start: bool,
}

impl Default for LineState {
    fn default() -> Self {
        Self { at_line_start: true }
    }
}

impl LineState {
    fn protect(&mut self, el: &mut Element) {
        let children = std::mem::take(&mut el.children);
        for child in children {
            match child {
                Node::Text(text) => self.split_text(&text, &mut el.children),
                Node::Element(mut inner) => {
                    self.protect(&mut inner);
                    el.children.push(inner.into());
                }
                raw @ Node::Raw(_) => el.children.push(raw),
            }
        }
    }

    fn split_text(&mut self, value: &str, out: &mut Vec<Node>) {
        let mut buffer = String::new();
        for c in value.chars() {
            match c {
                '\r' => {}
                '\n' => {
                    if !buffer.is_empty() {
                        out.push(Node::Text(std::mem::take(&mut buffer)));
                    }
                    out.push(Element::new("br").into());
                    self.at_line_start = true;
                }
                '\t' => {
                    buffer.push(NBSP);
                    buffer.push(NBSP);
                }
                ' ' if self.at_line_start => buffer.push(NBSP),
                _ => {
                    self.at_line_start = false;
                    buffer.push(c);
                }
            }
        }
        if !buffer.is_empty() {
            out.push(Node::Text(buffer));
        }
    }
}

fn preserve_span_gaps(el: &mut Element) {
    for i in 1..el.children.len().saturating_sub(1) {
        let between_spans =
            el.children[i - 1].is_element("span") && el.children[i + 1].is_element("span");
        if let Node::Text(text) = &mut el.children[i]
            && between_spans
            && !text.is_empty()
            && text.chars().all(|c| c == ' ')
        {
            *text = NBSP.to_string().repeat(text.len());
        }
    }
    for child in &mut el.children {
        if let Node::Element(inner) = child {
            preserve_span_gaps(inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::stages::test_support::apply;

    #[test]
    fn test_newlines_become_breaks() {
        assert_eq!(
            apply(&CodeWhitespace, "<pre><code>a = 1\nb = 2\n</code></pre>"),
            "<pre><code>a = 1<br>b = 2<br></code></pre>"
        );
    }

    #[test]
    fn test_leading_spaces_and_tabs() {
        assert_eq!(
            apply(&CodeWhitespace, "<pre><code>  a b\n\tc</code></pre>"),
            "<pre><code>\u{a0}\u{a0}a b<br>\u{a0}\u{a0}c</code></pre>"
        );
    }

    #[test]
    fn test_carriage_returns_dropped() {
        assert_eq!(
            apply(&CodeWhitespace, "<pre><code>a\r\nb\r\n</code></pre>"),
            "<pre><code>a<br>b<br></code></pre>"
        );
    }

    #[test]
    fn test_line_start_tracked_across_spans() {
        assert_eq!(
            apply(
                &CodeWhitespace,
                "<pre><code><span class=\"hljs-keyword\">if</span>\n  <span>x</span></code></pre>"
            ),
            "<pre><code><span class=\"hljs-keyword\">if</span><br>\u{a0}\u{a0}<span>x</span></code></pre>"
        );
    }

    #[test]
    fn test_spaces_between_spans_protected() {
        assert_eq!(
            apply(&CodeWhitespace, "<pre><code><span>a</span> <span>=</span></code></pre>"),
            "<pre><code><span>a</span>\u{a0}<span>=</span></code></pre>"
        );
    }

    #[test]
    fn test_inline_code_untouched() {
        let html = "<p><code>a\n  b</code></p>";
        assert_eq!(apply(&CodeWhitespace, html), html);
    }
}
