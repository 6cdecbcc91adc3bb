//! Link footnotes.
//!
//! External links are numbered in order of first appearance and collected
//! into a reference list appended to the document. Each occurrence of a
//! link is followed by a `[n]` marker; repeated hrefs reuse their number.

use std::collections::HashMap;

use bm_tree::{Element, Node, text_content};
use url::Url;

use super::external_links::is_external;
use super::{Stage, StageContext};
use crate::document::Document;
use crate::error::RenderError;
use crate::markdown::CLOBBER_PREFIX;

/// One entry of the reference list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FootnoteLink {
    /// 1-based number, assigned in first-seen order.
    pub id: usize,
    pub href: String,
    pub text: String,
}

/// Links seen during one render, deduplicated by exact href.
#[derive(Debug, Default)]
pub struct LinkIndex {
    links: Vec<FootnoteLink>,
    by_href: HashMap<String, usize>,
}

impl LinkIndex {
    /// Number for `href`, registering it with `text()` on first sight.
    pub fn insert(&mut self, href: &str, text: impl FnOnce() -> String) -> usize {
        if let Some(&id) = self.by_href.get(href) {
            return id;
        }
        let id = self.links.len() + 1;
        self.links.push(FootnoteLink {
            id,
            href: href.to_owned(),
            text: text(),
        });
        self.by_href.insert(href.to_owned(), id);
        id
    }

    #[must_use]
    pub fn links(&self) -> &[FootnoteLink] {
        &self.links
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }
}

/// How links are treated and how the reference list is rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceStyle {
    /// `http(s)` links stay clickable; the list links to each target.
    Linked,
    /// For editors that drop foreign links: every link except internal
    /// ones and the allowed hosts becomes a plain `span`, and the list shows
    /// hrefs as text. GFM footnote back-references are removed.
    Stripped { allowed_hosts: Vec<String> },
}

enum Action {
    Keep,
    Remove,
    Marker(usize),
}

/// Footnote rewriter stage.
#[derive(Clone, Debug)]
pub struct FootnoteRewriter {
    style: ReferenceStyle,
}

impl FootnoteRewriter {
    /// Rewriter for targets that keep links.
    #[must_use]
    pub fn linked() -> Self {
        Self {
            style: ReferenceStyle::Linked,
        }
    }

    /// Rewriter for targets that strip links outside `allowed_hosts`.
    #[must_use]
    pub fn stripped<I, S>(allowed_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            style: ReferenceStyle::Stripped {
                allowed_hosts: allowed_hosts
                    .into_iter()
                    .map(|h| h.into().to_ascii_lowercase())
                    .collect(),
            },
        }
    }

    #[must_use]
    pub fn style(&self) -> &ReferenceStyle {
        &self.style
    }

    /// Rewrite links in `nodes` and return the collected index.
    pub fn rewrite(&self, nodes: &mut Vec<Node>) -> LinkIndex {
        let mut index = LinkIndex::default();
        self.walk(nodes, &mut index);
        index
    }

    fn walk(&self, nodes: &mut Vec<Node>, index: &mut LinkIndex) {
        let mut i = 0;
        while i < nodes.len() {
            let action = match &mut nodes[i] {
                Node::Element(el) => {
                    let action = if el.is("a") {
                        match &self.style {
                            ReferenceStyle::Linked => visit_linked(el, index),
                            ReferenceStyle::Stripped { allowed_hosts } => {
                                visit_stripped(el, allowed_hosts, index)
                            }
                        }
                    } else {
                        Action::Keep
                    };
                    if !matches!(action, Action::Remove) {
                        self.walk(&mut el.children, index);
                    }
                    action
                }
                Node::Text(_) | Node::Raw(_) => Action::Keep,
            };
            match action {
                Action::Keep => i += 1,
                Action::Remove => {
                    nodes.remove(i);
                }
                Action::Marker(id) => {
                    nodes.insert(i + 1, marker(id));
                    i += 2;
                }
            }
        }
    }

    fn section(&self, index: &LinkIndex, title: &str) -> Element {
        match self.style {
            ReferenceStyle::Linked => {
                let items = index
                    .links()
                    .iter()
                    .map(|link| {
                        Element::new("li")
                            .with_class("footnote-item")
                            .with_child(
                                Element::new("span")
                                    .with_class("footnote-text")
                                    .with_text(link.text.clone()),
                            )
                            .with_text(": ")
                            .with_child(
                                Element::new("a")
                                    .with_class("footnote-url")
                                    .with_attr("href", link.href.clone())
                                    .with_text(link.href.clone()),
                            )
                            .into()
                    })
                    .collect();
                Element::new("section")
                    .with_class("footnote-links")
                    .with_child(Element::new("hr").with_class("footnote-divider"))
                    .with_child(Element::new("h4").with_class("footnote-title").with_text(title))
                    .with_child(
                        Element::new("ol")
                            .with_class("footnote-list")
                            .with_children(items),
                    )
            }
            ReferenceStyle::Stripped { .. } => {
                let items = index
                    .links()
                    .iter()
                    .map(|link| {
                        let label = if link.text.is_empty() { &link.href } else { &link.text };
                        Element::new("li")
                            .with_child(Element::new("span").with_text(format!("{label}: ")))
                            .with_child(
                                Element::new("span")
                                    .with_attr("style", "word-break: break-all;")
                                    .with_text(link.href.clone()),
                            )
                            .into()
                    })
                    .collect();
                Element::new("section")
                    .with_class("footnotes")
                    .with_attr("data-footnotes", "")
                    .with_child(Element::new("h4").with_text(title))
                    .with_child(Element::new("ol").with_children(items))
            }
        }
    }
}

impl Stage for FootnoteRewriter {
    fn name(&self) -> &'static str {
        match self.style {
            ReferenceStyle::Linked => "footnote-links",
            ReferenceStyle::Stripped { .. } => "stripped-footnote-links",
        }
    }

    fn apply(&self, doc: &mut Document, ctx: &mut StageContext<'_>) -> Result<(), RenderError> {
        let index = self.rewrite(&mut doc.nodes);
        if !index.is_empty() {
            tracing::debug!(links = index.len(), stage = self.name(), "Collected link footnotes");
            let section = self.section(&index, &ctx.request.reference_title);
            doc.nodes.push(section.into());
        }
        Ok(())
    }
}

fn visit_linked(el: &Element, index: &mut LinkIndex) -> Action {
    let Some(href) = el.attr("href") else {
        return Action::Keep;
    };
    if !is_external(href) {
        return Action::Keep;
    }
    Action::Marker(index.insert(href, || link_text(el, href)))
}

fn visit_stripped(el: &mut Element, allowed_hosts: &[String], index: &mut LinkIndex) -> Action {
    let Some(href) = el.attr("href").map(|h| h.trim().to_owned()) else {
        return Action::Keep;
    };
    if el.attrs.contains("data-footnote-backref")
        || href.starts_with(&format!("#{CLOBBER_PREFIX}fnref-"))
    {
        return Action::Remove;
    }
    if !href.is_empty() && is_allowed_host(&href, allowed_hosts) {
        return Action::Keep;
    }
    into_span(el);
    if href.is_empty() || is_internal(&href) {
        return Action::Keep;
    }
    Action::Marker(index.insert(&href, || text_content(&el.children).trim().to_owned()))
}

/// Anchor text, or the href when the anchor has none.
fn link_text(el: &Element, href: &str) -> String {
    let text = el.text_content();
    let text = text.trim();
    if text.is_empty() {
        href.to_owned()
    } else {
        text.to_owned()
    }
}

fn into_span(el: &mut Element) {
    el.tag = "span".to_owned();
    el.attrs.remove("href");
    el.attrs.remove("target");
    el.attrs.remove("rel");
}

fn is_internal(href: &str) -> bool {
    ["#", "/", "./", "../"].iter().any(|p| href.starts_with(p))
}

/// Exact hostname match; subdomains are distinct hosts.
fn is_allowed_host(href: &str, allowed_hosts: &[String]) -> bool {
    let Ok(base) = Url::parse("https://localhost/") else {
        return false;
    };
    base.join(href)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
        .is_some_and(|host| allowed_hosts.iter().any(|allowed| *allowed == host))
}

fn marker(id: usize) -> Node {
    Element::new("sup")
        .with_class("footnote-ref")
        .with_text(format!("[{id}]"))
        .into()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::request::RenderRequest;
    use crate::stages::test_support::run;

    fn linked(html: &str) -> String {
        run(&FootnoteRewriter::linked(), html, &RenderRequest::default()).0
    }

    fn stripped(html: &str) -> String {
        let request = RenderRequest::default().with_reference_title("Refs");
        run(&FootnoteRewriter::stripped(["mp.weixin.qq.com"]), html, &request).0
    }

    #[test]
    fn test_link_index_dedups_by_exact_href() {
        let mut index = LinkIndex::default();
        assert_eq!(index.insert("https://a.test", || "a".to_owned()), 1);
        assert_eq!(index.insert("https://b.test", || "b".to_owned()), 2);
        assert_eq!(index.insert("https://a.test", || unreachable!()), 1);
        assert_eq!(index.insert("https://a.test/", || "a/".to_owned()), 3);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_linked_markers_and_section() {
        let html = linked(r#"<p><a href="https://x.test">a</a> and <a href="https://x.test">b</a></p>"#);
        assert_eq!(
            html,
            concat!(
                r#"<p><a href="https://x.test">a</a><sup class="footnote-ref">[1]</sup> and "#,
                r#"<a href="https://x.test">b</a><sup class="footnote-ref">[1]</sup></p>"#,
                r#"<section class="footnote-links"><hr class="footnote-divider"><h4 class="footnote-title">References</h4>"#,
                r#"<ol class="footnote-list"><li class="footnote-item"><span class="footnote-text">a</span>: "#,
                r#"<a class="footnote-url" href="https://x.test">https://x.test</a></li></ol></section>"#
            )
        );
    }

    #[test]
    fn test_linked_ids_follow_first_appearance() {
        let html = linked(concat!(
            r#"<a href="https://b.test">b</a><a href="https://a.test">a</a>"#,
            r#"<a href="https://b.test">b</a><a href="https://c.test">c</a>"#
        ));
        let markers: Vec<_> = html.match_indices("[").map(|(i, _)| &html[i..i + 3]).collect();
        assert_eq!(markers, vec!["[1]", "[2]", "[1]", "[3]"]);
    }

    #[test]
    fn test_linked_empty_text_falls_back_to_href() {
        let html = linked(r#"<a href="https://x.test"> </a>"#);
        assert!(html.contains(r#"<span class="footnote-text">https://x.test</span>"#));
    }

    #[test]
    fn test_linked_scheme_is_case_insensitive() {
        let html = linked(r#"<a href="HTTPS://x.test">a</a>"#);
        assert!(html.contains(r#"<sup class="footnote-ref">[1]</sup>"#), "{html}");
    }

    #[test]
    fn test_linked_ignores_non_http_links() {
        let input = r##"<a href="#x">x</a><a href="mailto:a@b.c">m</a><a href="/p">p</a>"##;
        assert_eq!(linked(input), input);
    }

    #[test]
    fn test_stripped_external_link_becomes_span() {
        let html = stripped(r#"<p><a href="https://x.test" target="_blank" rel="noopener">示例</a></p>"#);
        assert_eq!(
            html,
            concat!(
                r#"<p><span>示例</span><sup class="footnote-ref">[1]</sup></p>"#,
                r#"<section class="footnotes" data-footnotes=""><h4>Refs</h4><ol><li>"#,
                r#"<span>示例: </span><span style="word-break: break-all;">https://x.test</span>"#,
                "</li></ol></section>"
            )
        );
    }

    #[test]
    fn test_stripped_keeps_allowed_host() {
        let input = r#"<a href="https://mp.weixin.qq.com/s/abc">a</a>"#;
        assert_eq!(stripped(input), input);
    }

    #[test]
    fn test_stripped_subdomain_is_not_allowed() {
        let html = stripped(r#"<a href="https://evil.mp.weixin.qq.com/s">a</a>"#);
        assert!(!html.contains("href="));
        assert!(html.contains("[1]"));
    }

    #[test]
    fn test_stripped_mail_and_tel_are_footnoted() {
        let html = stripped(r#"<a href="mailto:a@b.c">m</a><a href="tel:123">t</a>"#);
        assert!(html.starts_with(r#"<span>m</span><sup class="footnote-ref">[1]</sup><span>t</span><sup class="footnote-ref">[2]</sup>"#));
        assert!(html.contains("mailto:a@b.c"));
    }

    #[test]
    fn test_stripped_internal_links_lose_href_without_marker() {
        assert_eq!(
            stripped(r##"<a href="#sec">s</a><a href="./x">x</a><a href="">e</a>"##),
            "<span>s</span><span>x</span><span>e</span>"
        );
    }

    #[test]
    fn test_stripped_removes_backrefs() {
        let html = stripped(concat!(
            r##"<sup><a href="#user-content-fn-1" data-footnote-ref="">1</a></sup>"##,
            r##"<li><p>Note <a href="#user-content-fnref-1" data-footnote-backref="">↩</a></p></li>"##
        ));
        assert_eq!(html, "<sup><span data-footnote-ref=\"\">1</span></sup><li><p>Note </p></li>");
    }

    #[test]
    fn test_no_links_no_section() {
        assert_eq!(linked("<p>x</p>"), "<p>x</p>");
        assert_eq!(stripped("<p>x</p>"), "<p>x</p>");
    }
}
