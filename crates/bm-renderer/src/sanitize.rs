//! Allow-list sanitizer.
//!
//! The tree is serialized and cleaned by an HTML5 parser-based cleaner:
//! elements off the list are unwrapped (children kept), unsafe ones are
//! removed with their content, attributes off the list are dropped and URL
//! attributes must use an allowed scheme or be relative. A second pass over
//! the reparsed tree filters class tokens, narrows image sources, keeps only
//! read-only checkboxes and prefixes generated ids so user content cannot
//! clobber page globals.

use std::collections::{HashMap, HashSet};

use ammonia::Builder;
use bm_tree::{AttrValue, Element, HtmlParser, Node, to_html};

use crate::document::Document;
use crate::error::RenderError;
use crate::markdown::CLOBBER_PREFIX;
use crate::stages::{Stage, StageContext};

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "caption", "code", "dd", "del", "details", "div", "dl",
    "dt", "em", "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img",
    "input", "ins", "kbd", "li", "mark", "ol", "p", "path", "picture", "pre", "q", "rp", "rt",
    "ruby", "s", "samp", "section", "small", "source", "span", "strike", "strong", "sub",
    "summary", "sup", "svg", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "tt", "u",
    "ul", "var",
];

/// Removed together with their content.
const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "textarea", "title",
];

const GLOBAL_ATTRS: &[&str] = &[
    "abbr", "align", "alt", "aria-describedby", "aria-hidden", "aria-label", "aria-labelledby",
    "border", "cellpadding", "cellspacing", "class", "colspan", "datetime", "dir", "headers",
    "height", "hreflang", "id", "itemprop", "lang", "name", "open", "rowspan", "scope", "span",
    "start", "summary", "title", "valign", "value", "width",
];

const TAG_ATTRS: &[(&str, &[&str])] = &[
    (
        "a",
        &["href", "target", "rel", "data-footnote-ref", "data-footnote-backref"],
    ),
    ("blockquote", &["cite"]),
    ("del", &["cite"]),
    ("img", &["src", "longdesc"]),
    ("input", &["type", "checked", "disabled"]),
    ("ins", &["cite"]),
    ("q", &["cite"]),
    ("section", &["data-footnotes"]),
    ("source", &["src", "srcset", "media", "type"]),
    ("svg", &["viewBox", "version"]),
    ("path", &["d"]),
];

/// Class tokens emitted by the parser, highlighter, math renderer and
/// rewrite stages.
const CLASS_PREFIXES: &[&str] = &[
    "language-",
    "hljs",
    "katex",
    "math",
    "markdown-alert",
    "octicon",
    "footnote",
    "data-footnote-backref",
    "task-list-item",
    "contains-task-list",
    "frontmatter",
    "figure-",
    "sr-only",
];

/// Schemes allowed in any URL attribute.
const URL_SCHEMES: &[&str] = &["http", "https", "mailto", "tel"];
/// Schemes allowed in image sources.
const SRC_SCHEMES: &[&str] = &["http", "https"];

/// Attributes whose values are prefixed with [`CLOBBER_PREFIX`].
const CLOBBERED_ATTRS: &[&str] = &["id", "name", "aria-describedby", "aria-labelledby"];

/// What the sanitizer lets through.
#[derive(Clone, Debug)]
pub struct SanitizePolicy {
    tags: HashSet<String>,
    stripped: HashSet<String>,
    global_attrs: HashSet<String>,
    tag_attrs: HashMap<String, HashSet<String>>,
    class_prefixes: Vec<String>,
}

impl SanitizePolicy {
    /// Allow an extra element. An element removed with its content by
    /// default is kept instead.
    #[must_use]
    pub fn allow_tag(mut self, tag: &str) -> Self {
        self.stripped.remove(tag);
        self.tags.insert(tag.to_owned());
        self
    }

    /// Allow an extra attribute on one element.
    #[must_use]
    pub fn allow_attr(mut self, tag: &str, attr: &str) -> Self {
        self.tag_attrs
            .entry(tag.to_owned())
            .or_default()
            .insert(attr.to_owned());
        self
    }

    /// Allow class tokens starting with `prefix`.
    #[must_use]
    pub fn allow_class_prefix(mut self, prefix: &str) -> Self {
        self.class_prefixes.push(prefix.to_owned());
        self
    }

    fn class_allowed(&self, class: &str) -> bool {
        self.class_prefixes.iter().any(|p| class.starts_with(p.as_str()))
    }

    /// HTML cleaner configured with this policy's allow-lists.
    fn cleaner(&self) -> Builder<'_> {
        let tag_attributes: HashMap<&str, HashSet<&str>> = self
            .tag_attrs
            .iter()
            .map(|(tag, attrs)| (tag.as_str(), strs(attrs)))
            .collect();

        let mut builder = Builder::empty();
        builder
            .tags(strs(&self.tags))
            .clean_content_tags(strs(&self.stripped))
            .generic_attributes(strs(&self.global_attrs))
            .tag_attributes(tag_attributes)
            .url_schemes(URL_SCHEMES.iter().copied().collect())
            .strip_comments(true)
            .link_rel(None);
        builder
    }
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        let set = |items: &[&str]| -> HashSet<String> {
            items.iter().map(|s| (*s).to_owned()).collect()
        };
        Self {
            tags: set(ALLOWED_TAGS),
            stripped: set(STRIPPED_TAGS),
            global_attrs: set(GLOBAL_ATTRS),
            tag_attrs: TAG_ATTRS
                .iter()
                .map(|(tag, attrs)| ((*tag).to_owned(), set(attrs)))
                .collect(),
            class_prefixes: CLASS_PREFIXES.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Sanitizer stage.
#[derive(Clone, Debug, Default)]
pub struct Sanitizer {
    policy: SanitizePolicy,
}

impl Sanitizer {
    #[must_use]
    pub fn new(policy: SanitizePolicy) -> Self {
        Self { policy }
    }

    /// Sanitize a node list. Raw markup is cleaned along with the elements
    /// around it.
    pub fn sanitize(&self, nodes: Vec<Node>) -> Vec<Node> {
        if nodes.is_empty() {
            return nodes;
        }
        let cleaned = self.policy.cleaner().clean(&to_html(&nodes)).to_string();
        self.refine(HtmlParser::new().parse_lossy(&cleaned))
    }

    fn refine(&self, nodes: Vec<Node>) -> Vec<Node> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::Element(mut el) => {
                    el.children = self.refine(std::mem::take(&mut el.children));
                    if self.clean_element(&mut el) {
                        out.push(Node::Element(el));
                    }
                }
                other => push_node(&mut out, other),
            }
        }
        out
    }

    /// Filter attribute values in place. Returns `false` when the element
    /// itself must go.
    fn clean_element(&self, el: &mut Element) -> bool {
        el.attrs.retain(|name, value| match name {
            "class" => match value {
                AttrValue::Classes(list) => {
                    list.retain(|class| self.policy.class_allowed(class));
                    !list.is_empty()
                }
                AttrValue::Str(_) => false,
            },
            "src" | "srcset" => value
                .as_str()
                .is_some_and(|url| protocol_allowed(url, SRC_SCHEMES)),
            name if CLOBBERED_ATTRS.contains(&name) => match value.as_str() {
                Some(v) if v.is_empty() => false,
                Some(v) if v.starts_with(CLOBBER_PREFIX) => true,
                Some(v) => {
                    *value = AttrValue::Str(format!("{CLOBBER_PREFIX}{v}"));
                    true
                }
                None => false,
            },
            _ => true,
        });

        // Only read-only checkboxes survive as form controls
        if el.is("input") {
            if !el.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("checkbox")) {
                return false;
            }
            el.attrs.set("type", "checkbox");
            if !el.attrs.contains("disabled") {
                el.attrs.set("disabled", "");
            }
        }
        true
    }
}

impl Stage for Sanitizer {
    fn name(&self) -> &'static str {
        "sanitize"
    }

    fn apply(&self, doc: &mut Document, _ctx: &mut StageContext<'_>) -> Result<(), RenderError> {
        doc.nodes = self.sanitize(std::mem::take(&mut doc.nodes));
        Ok(())
    }
}

fn strs(set: &HashSet<String>) -> HashSet<&str> {
    set.iter().map(String::as_str).collect()
}

fn push_node(out: &mut Vec<Node>, node: Node) {
    match (out.last_mut(), node) {
        (Some(Node::Text(last)), Node::Text(text)) => last.push_str(&text),
        (_, node) => out.push(node),
    }
}

/// Check a URL's scheme. URLs without one are relative and always allowed.
fn protocol_allowed(url: &str, allowed: &[&str]) -> bool {
    // Browsers ignore whitespace and control characters inside schemes
    let url: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    let end = url.find(['/', '?', '#']).unwrap_or(url.len());
    match url[..end].find(':') {
        None => true,
        Some(colon) => allowed
            .iter()
            .any(|scheme| url[..colon].eq_ignore_ascii_case(scheme)),
    }
}

#[cfg(test)]
mod tests {
    use bm_tree::{parse_fragment, to_html};
    use pretty_assertions::assert_eq;

    use super::*;

    fn clean(html: &str) -> String {
        let nodes = parse_fragment(html).unwrap();
        to_html(&Sanitizer::default().sanitize(nodes))
    }

    fn clean_raw(html: &str) -> String {
        to_html(&Sanitizer::default().sanitize(vec![Node::raw(html)]))
    }

    #[test]
    fn test_script_removed_with_content() {
        let mut nodes = parse_fragment("<p>a</p>").unwrap();
        nodes.push(Element::new("script").with_text("alert(1)").into());
        let html = to_html(&Sanitizer::default().sanitize(nodes));
        assert_eq!(html, "<p>a</p>");
    }

    #[test]
    fn test_unknown_element_unwrapped() {
        assert_eq!(clean("<p><font>x</font>y</p>"), "<p>xy</p>");
    }

    #[test]
    fn test_event_handlers_and_style_dropped() {
        assert_eq!(
            clean(r#"<p onclick="x()" style="color: red" title="t">x</p>"#),
            r#"<p title="t">x</p>"#
        );
    }

    #[test]
    fn test_javascript_href_removed() {
        assert_eq!(clean(r#"<a href="javascript:alert(1)">x</a>"#), "<a>x</a>");
        assert_eq!(clean(r#"<a href="java&#9;script:x">x</a>"#), "<a>x</a>");
        assert_eq!(
            clean(r#"<a href="mailto:a@b.c">x</a>"#),
            r#"<a href="mailto:a@b.c">x</a>"#
        );
        assert_eq!(clean(r#"<a href="/p?q=a:b">x</a>"#), r#"<a href="/p?q=a:b">x</a>"#);
    }

    #[test]
    fn test_img_src_protocols() {
        assert_eq!(
            clean(r#"<img src="data:image/png;base64,xx" alt="a">"#),
            r#"<img alt="a">"#
        );
        assert_eq!(
            clean(r#"<img src="https://x.test/a.png">"#),
            r#"<img src="https://x.test/a.png">"#
        );
    }

    #[test]
    fn test_classes_filtered_by_prefix() {
        assert_eq!(
            clean(r#"<code class="language-rs evil hljs">x</code>"#),
            r#"<code class="language-rs hljs">x</code>"#
        );
        assert_eq!(clean(r#"<div class="evil">x</div>"#), "<div>x</div>");
    }

    #[test]
    fn test_ids_prefixed_once() {
        assert_eq!(clean(r#"<h2 id="top">x</h2>"#), r#"<h2 id="user-content-top">x</h2>"#);
        assert_eq!(
            clean(r#"<h2 id="user-content-top">x</h2>"#),
            r#"<h2 id="user-content-top">x</h2>"#
        );
    }

    #[test]
    fn test_only_checkbox_inputs_kept() {
        assert_eq!(clean(r#"<input type="text" value="x">"#), "");
        assert_eq!(
            clean(r#"<input type="checkbox" checked>"#),
            r#"<input type="checkbox" checked disabled>"#
        );
    }

    #[test]
    fn test_svg_subset_kept() {
        let html = r#"<svg class="octicon" viewBox="0 0 16 16" onload="x()"><path d="M0" fill="red"></path></svg>"#;
        assert_eq!(
            clean(html),
            r#"<svg class="octicon" viewBox="0 0 16 16"><path d="M0"></path></svg>"#
        );
    }

    #[test]
    fn test_raw_markup_cleaned() {
        let nodes = vec![
            Node::raw(r#"<b onclick="x()">bold</b><script>x</script>"#),
            Node::text("ok"),
        ];
        assert_eq!(to_html(&Sanitizer::default().sanitize(nodes)), "<b>bold</b>ok");
    }

    #[test]
    fn test_comments_and_unclosed_markup() {
        assert_eq!(clean_raw("<p>a<!-- hidden -->b</p>"), "<p>ab</p>");
        assert_eq!(
            clean_raw(r#"<div><img src=x onerror="alert(1)"><em>open"#),
            r#"<div><img src="x"><em>open</em></div>"#
        );
    }

    #[test]
    fn test_mixed_case_script_stripped() {
        assert_eq!(clean_raw("<p>a</p><ScRiPt>alert(1)</sCrIpT>"), "<p>a</p>");
    }

    #[test]
    fn test_allowing_stripped_tag_keeps_it() {
        let sanitizer = Sanitizer::new(SanitizePolicy::default().allow_tag("textarea"));
        let nodes = parse_fragment("<textarea>x</textarea>").unwrap();
        assert_eq!(to_html(&sanitizer.sanitize(nodes)), "<textarea>x</textarea>");
    }

    #[test]
    fn test_custom_attr_allowed() {
        let sanitizer = Sanitizer::new(SanitizePolicy::default().allow_attr("span", "data-x"));
        let nodes = parse_fragment(r#"<span data-x="1" data-y="2">x</span>"#).unwrap();
        assert_eq!(to_html(&sanitizer.sanitize(nodes)), r#"<span data-x="1">x</span>"#);
    }
}
