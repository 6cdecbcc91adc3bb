//! HTML serializer.
//!
//! Void elements are written without a closing tag (`<br>`), boolean
//! attributes with an empty value are written bare (`<input disabled>`), and
//! raw nodes are copied through untouched.

use std::fmt::Write;

use crate::node::{AttrValue, Element, Node};

/// Serialize a node list to an HTML string.
#[must_use]
pub fn to_html(nodes: &[Node]) -> String {
    let mut out = String::with_capacity(4096);
    for node in nodes {
        serialize_node(node, &mut out);
    }
    out
}

/// Serialize a single element including its subtree.
#[must_use]
pub fn element_to_html(el: &Element) -> String {
    let mut out = String::new();
    serialize_element(el, &mut out);
    out
}

fn serialize_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(el) => serialize_element(el, out),
        Node::Text(text) => escape_into(text, false, out),
        Node::Raw(html) => out.push_str(html),
    }
}

fn serialize_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);

    for (key, value) in el.attrs.iter() {
        if let AttrValue::Classes(list) = value
            && list.is_empty()
        {
            continue;
        }
        let value = value.to_attr_string();
        if value.is_empty() && is_boolean_attribute(key) {
            write!(out, " {key}").ok();
        } else {
            write!(out, " {key}=\"").ok();
            escape_into(&value, true, out);
            out.push('"');
        }
    }
    out.push('>');

    if el.is_void() {
        return;
    }
    for child in &el.children {
        serialize_node(child, out);
    }
    write!(out, "</{}>", el.tag).ok();
}

fn is_boolean_attribute(name: &str) -> bool {
    matches!(
        name,
        "checked" | "disabled" | "open" | "hidden" | "selected" | "readonly" | "required"
    )
}

/// Escape HTML special characters.
pub fn escape_html(text: &str, escape_quotes: bool) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(text, escape_quotes, &mut out);
    out
}

fn escape_into(text: &str, escape_quotes: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if escape_quotes => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
