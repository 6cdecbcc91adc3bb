//! Task list checkboxes as text glyphs.

use bm_tree::Node;

use super::{Stage, StageContext};
use crate::document::Document;
use crate::error::RenderError;

const CHECKED: &str = "☑";
const UNCHECKED: &str = "☐";

/// Replaces checkbox inputs with `☑` / `☐` followed by a space.
#[derive(Clone, Copy, Debug, Default)]
pub struct TaskListGlyphs;

impl Stage for TaskListGlyphs {
    fn name(&self) -> &'static str {
        "task-list-glyphs"
    }

    fn apply(&self, doc: &mut Document, _ctx: &mut StageContext<'_>) -> Result<(), RenderError> {
        replace_checkboxes(&mut doc.nodes);
        Ok(())
    }
}

fn replace_checkboxes(nodes: &mut Vec<Node>) {
    let mut i = 0;
    while i < nodes.len() {
        let glyph = match &mut nodes[i] {
            Node::Element(el) if el.is("input") && el.attr("type") == Some("checkbox") => {
                Some(if el.attrs.contains("checked") { CHECKED } else { UNCHECKED })
            }
            Node::Element(el) => {
                replace_checkboxes(&mut el.children);
                None
            }
            Node::Text(_) | Node::Raw(_) => None,
        };
        if let Some(glyph) = glyph {
            // The separating space is carried by the glyph
            if let Some(Node::Text(next)) = nodes.get_mut(i + 1)
                && let Some(rest) = next.strip_prefix(' ')
            {
                *next = rest.to_owned();
            }
            nodes[i] = Node::text(format!("{glyph} "));
            if nodes.get(i + 1).is_some_and(|n| matches!(n, Node::Text(t) if t.is_empty())) {
                nodes.remove(i + 1);
            }
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::stages::test_support::apply;

    #[test]
    fn test_checkboxes_become_glyphs() {
        assert_eq!(
            apply(
                &TaskListGlyphs,
                concat!(
                    r#"<ul><li class="task-list-item"><input type="checkbox" checked disabled> done</li>"#,
                    r#"<li class="task-list-item"><input type="checkbox" disabled> todo</li></ul>"#
                )
            ),
            concat!(
                r#"<ul><li class="task-list-item">☑ done</li>"#,
                r#"<li class="task-list-item">☐ todo</li></ul>"#
            )
        );
    }

    #[test]
    fn test_glyph_keeps_space_without_following_text() {
        assert_eq!(
            apply(&TaskListGlyphs, r#"<li><input type="checkbox"><em>x</em></li>"#),
            "<li>☐ <em>x</em></li>"
        );
    }

    #[test]
    fn test_other_inputs_untouched() {
        let html = r#"<p><input type="text"></p>"#;
        assert_eq!(apply(&TaskListGlyphs, html), html);
    }
}
