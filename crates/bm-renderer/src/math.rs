//! Math rendering seam.

use bm_tree::{Element, Node};

/// Renders TeX into tree nodes.
pub trait MathRenderer: Send + Sync {
    /// Render `tex`. `display` is true for `$$` blocks.
    fn render(&self, tex: &str, display: bool) -> Node;
}

/// Keeps the TeX source inside KaTeX-shaped containers so the math
/// stylesheet applies and the source stays readable after paste.
#[derive(Clone, Copy, Debug, Default)]
pub struct SourceMathRenderer;

impl MathRenderer for SourceMathRenderer {
    fn render(&self, tex: &str, display: bool) -> Node {
        let katex = Element::new("span").with_class("katex").with_child(
            Element::new("span")
                .with_class("katex-html")
                .with_attr("aria-hidden", "true")
                .with_text(tex.trim()),
        );
        if display {
            Element::new("span")
                .with_class("katex-display")
                .with_child(katex)
                .into()
        } else {
            katex.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use bm_tree::to_html;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_inline_math() {
        let node = SourceMathRenderer.render("x^2", false);
        assert_eq!(
            to_html(&[node]),
            r#"<span class="katex"><span class="katex-html" aria-hidden="true">x^2</span></span>"#
        );
    }

    #[test]
    fn test_display_math_wrapped() {
        let node = SourceMathRenderer.render("\n\\sum_i i\n", true);
        let html = to_html(&[node]);
        assert!(html.starts_with(r#"<span class="katex-display"><span class="katex">"#));
        assert!(html.contains(">\\sum_i i<"));
    }
}
