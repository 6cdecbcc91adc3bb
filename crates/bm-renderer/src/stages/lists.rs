//! List item paragraph unwrapping.

use bm_tree::{Element, Node};

use super::{Stage, StageContext};
use crate::document::Document;
use crate::error::RenderError;

const BLOCK_TAGS: &[&str] = &[
    "div", "p", "blockquote", "pre", "ul", "ol", "table", "h1", "h2", "h3", "h4", "h5", "h6",
    "hr", "figure",
];

/// Which paragraph of a list item is unwrapped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnwrapScope {
    /// Only when the paragraph is the item's sole content.
    SoleParagraph,
    /// The item's first child, whatever follows it (nested lists included).
    LeadingParagraph,
}

/// Splices a list item's paragraph children directly into the `li`.
///
/// Paragraphs holding block content are left alone.
#[derive(Copy, Clone, Debug)]
pub struct ListItemUnwrap {
    scope: UnwrapScope,
}

impl ListItemUnwrap {
    #[must_use]
    pub fn new(scope: UnwrapScope) -> Self {
        Self { scope }
    }

    fn unwrap_item(self, li: &mut Element) {
        let significant: Vec<usize> = li
            .children
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_whitespace_text())
            .map(|(i, _)| i)
            .collect();
        let target = match self.scope {
            UnwrapScope::SoleParagraph if significant.len() == 1 => significant[0],
            UnwrapScope::LeadingParagraph if !li.children.is_empty() => 0,
            _ => return,
        };
        let unwrap = li.children[target]
            .as_element()
            .is_some_and(|p| p.is("p") && !has_block_child(p));
        if unwrap {
            if let Node::Element(p) = li.children.remove(target) {
                li.children.splice(target..target, p.children);
            }
        }
    }
}

impl Stage for ListItemUnwrap {
    fn name(&self) -> &'static str {
        match self.scope {
            UnwrapScope::SoleParagraph => "list-unwrap",
            UnwrapScope::LeadingParagraph => "nested-list-unwrap",
        }
    }

    fn apply(&self, doc: &mut Document, _ctx: &mut StageContext<'_>) -> Result<(), RenderError> {
        bm_tree::for_each_element_mut(&mut doc.nodes, &mut |el| {
            if el.is("li") {
                self.unwrap_item(el);
            }
        });
        Ok(())
    }
}

fn has_block_child(el: &Element) -> bool {
    el.element_children()
        .any(|c| BLOCK_TAGS.contains(&c.tag.as_str()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::stages::test_support::apply;

    const SOLE: ListItemUnwrap = ListItemUnwrap {
        scope: UnwrapScope::SoleParagraph,
    };
    const LEADING: ListItemUnwrap = ListItemUnwrap {
        scope: UnwrapScope::LeadingParagraph,
    };

    #[test]
    fn test_sole_paragraph_unwrapped() {
        assert_eq!(
            apply(&SOLE, "<ul><li>\n<p>a <em>b</em></p>\n</li></ul>"),
            "<ul><li>\na <em>b</em>\n</li></ul>"
        );
    }

    #[test]
    fn test_sole_scope_keeps_multi_block_items() {
        let html = "<ul><li><p>a</p><ul><li>b</li></ul></li></ul>";
        assert_eq!(apply(&SOLE, html), html);
    }

    #[test]
    fn test_leading_paragraph_unwrapped_before_nested_list() {
        assert_eq!(
            apply(&LEADING, "<ul><li><p>a</p><ul><li><p>b</p></li></ul></li></ul>"),
            "<ul><li>a<ul><li>b</li></ul></li></ul>"
        );
    }

    #[test]
    fn test_paragraph_with_block_content_kept() {
        let html = "<ol><li><p><div>x</div></p></li></ol>";
        assert_eq!(apply(&LEADING, html), html);
        assert_eq!(apply(&SOLE, html), html);
    }

    #[test]
    fn test_non_paragraph_first_child_kept() {
        let html = "<ul><li><pre>x</pre></li></ul>";
        assert_eq!(apply(&LEADING, html), html);
    }
}
