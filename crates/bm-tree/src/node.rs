//! Tree model shared by every rewrite stage.
//!
//! A document is an ordered list of [`Node`]s. Each node is exclusively owned
//! by its parent's `children` vector, so stages that need to duplicate content
//! must `clone()` it, which deep-copies the subtree.

use std::borrow::Cow;
use std::fmt;

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Check whether a tag name is an HTML void element.
#[must_use]
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Ordered set of CSS class tokens.
///
/// Insertion order is preserved and duplicates are rejected, so serializing
/// the same list twice always yields the same string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassList(Vec<String>);

impl ClassList {
    /// Create an empty class list.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse a whitespace-separated `class` attribute value.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        value.split_whitespace().collect()
    }

    /// Add a token. Returns `false` if it was already present.
    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        let token = token.into();
        if token.is_empty() || self.contains(&token) {
            return false;
        }
        self.0.push(token);
        true
    }

    /// Check whether a token is present.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|t| t == token)
    }

    /// Remove a token. Returns `true` if it was present.
    pub fn remove(&mut self, token: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t != token);
        before != self.0.len()
    }

    /// Keep only tokens for which the predicate returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&str) -> bool) {
        self.0.retain(|t| f(t));
    }

    /// Iterate over tokens in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: Into<String>> FromIterator<S> for ClassList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = Self::new();
        for token in iter {
            list.insert(token);
        }
        list
    }
}

impl fmt::Display for ClassList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Attribute value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrValue {
    /// Plain string value (empty for boolean attributes such as `checked`).
    Str(String),
    /// Class token set, only used for the `class` attribute.
    Classes(ClassList),
}

impl AttrValue {
    /// Borrow the value if it is a plain string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Classes(_) => None,
        }
    }

    /// Render the value as it appears in serialized HTML.
    #[must_use]
    pub fn to_attr_string(&self) -> Cow<'_, str> {
        match self {
            Self::Str(s) => Cow::Borrowed(s),
            Self::Classes(list) => Cow::Owned(list.to_string()),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<ClassList> for AttrValue {
    fn from(value: ClassList) -> Self {
        Self::Classes(value)
    }
}

/// Ordered attribute map.
///
/// Backed by a vector so iteration follows insertion order and output is
/// reproducible across runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, AttrValue)>);

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Get a string-valued attribute.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttrValue::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k == name)
    }

    /// Set an attribute, replacing an existing value in place.
    ///
    /// Setting `class` to a string value stores it as a [`ClassList`].
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let name = name.into();
        let value = match value.into() {
            AttrValue::Str(s) if name == "class" => AttrValue::Classes(ClassList::parse(&s)),
            other => other,
        };
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        let pos = self.0.iter().position(|(k, _)| k == name)?;
        Some(self.0.remove(pos).1)
    }

    /// Keep only attributes for which the predicate returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&str, &mut AttrValue) -> bool) {
        self.0.retain_mut(|(k, v)| f(k, v));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Class list, if a `class` attribute is present.
    #[must_use]
    pub fn classes(&self) -> Option<&ClassList> {
        match self.get("class")? {
            AttrValue::Classes(list) => Some(list),
            AttrValue::Str(_) => None,
        }
    }

    /// Mutable class list, created empty when missing.
    pub fn classes_mut(&mut self) -> &mut ClassList {
        let pos = match self.0.iter().position(|(k, _)| k == "class") {
            Some(pos) => pos,
            None => {
                self.0
                    .push(("class".to_owned(), AttrValue::Classes(ClassList::new())));
                self.0.len() - 1
            }
        };
        let slot = &mut self.0[pos].1;
        if let AttrValue::Str(s) = slot {
            *slot = AttrValue::Classes(ClassList::parse(s));
        }
        match slot {
            AttrValue::Classes(list) => list,
            AttrValue::Str(_) => unreachable!("class attribute normalized above"),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// An element node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes in insertion order.
    pub attrs: Attributes,
    /// Children in document order.
    pub children: Vec<Node>,
}

impl Element {
    /// Create an element without attributes or children.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attributes::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.set(name, value);
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.add_class(class);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Node::Text(text.into()))
    }

    /// Check the tag name.
    #[must_use]
    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        is_void_element(&self.tag)
    }

    /// Get a string-valued attribute.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get_str(name)
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attrs.classes().is_some_and(|list| list.contains(class))
    }

    pub fn add_class(&mut self, class: impl Into<String>) {
        self.attrs.classes_mut().insert(class);
    }

    /// Iterate over element children, skipping text and raw nodes.
    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text_content(&self) -> String {
        text_content(&self.children)
    }
}

/// A tree node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Pre-serialized markup emitted verbatim by the serializer.
    Raw(String),
}

impl Node {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn raw(html: impl Into<String>) -> Self {
        Self::Raw(html.into())
    }

    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(el) => Some(el),
            Self::Text(_) | Self::Raw(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(el) => Some(el),
            Self::Text(_) | Self::Raw(_) => None,
        }
    }

    /// Check whether this is an element with the given tag.
    #[must_use]
    pub fn is_element(&self, tag: &str) -> bool {
        self.as_element().is_some_and(|el| el.is(tag))
    }

    /// Check whether this is a text node containing only whitespace.
    #[must_use]
    pub fn is_whitespace_text(&self) -> bool {
        matches!(self, Self::Text(t) if t.trim().is_empty())
    }
}

impl From<Element> for Node {
    fn from(value: Element) -> Self {
        Self::Element(value)
    }
}

/// Concatenated text content of a node list. Raw markup contributes nothing.
#[must_use]
pub fn text_content(nodes: &[Node]) -> String {
    fn walk(nodes: &[Node], out: &mut String) {
        for node in nodes {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(el) => walk(&el.children, out),
                Node::Raw(_) => {}
            }
        }
    }
    let mut out = String::new();
    walk(nodes, &mut out);
    out
}

/// Visit every element depth-first in document order.
pub fn for_each_element_mut(nodes: &mut [Node], f: &mut impl FnMut(&mut Element)) {
    for node in nodes {
        if let Node::Element(el) = node {
            f(el);
            for_each_element_mut(&mut el.children, f);
        }
    }
}

/// Visit every element depth-first in document order.
pub fn for_each_element(nodes: &[Node], f: &mut impl FnMut(&Element)) {
    for node in nodes {
        if let Node::Element(el) = node {
            f(el);
            for_each_element(&el.children, f);
        }
    }
}
