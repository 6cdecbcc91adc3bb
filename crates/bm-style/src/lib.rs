//! Style resolution and CSS inlining for bm.
//!
//! Rendered fragments are pasted into editors that ignore `<style>` blocks, so
//! every matching declaration is copied onto the element it applies to. The
//! fragment is wrapped in a `<section id="bm-md">` container first so theme
//! selectors can be scoped to it.
//!
//! # Example
//!
//! ```
//! use bm_style::{StyleResolver, StyleSelection, apply_styles};
//!
//! let resolver = StyleResolver::new();
//! let styles = resolver.resolve(&StyleSelection {
//!     custom_css: Some("#bm-md p { color: red }"),
//!     ..StyleSelection::default()
//! });
//! let styled = apply_styles("<p>hi</p>", &styles);
//! assert_eq!(
//!     styled.html,
//!     r#"<section id="bm-md"><p style="color: red;">hi</p></section>"#
//! );
//! ```

mod cascade;
mod error;
mod index;
mod selector;
mod syntax;
mod themes;

use bm_tree::{HtmlParser, to_html};

pub use cascade::Inliner;
pub use error::StyleError;
pub use selector::{Combinator, PseudoElement, Selector, Specificity};
pub use syntax::{Declaration, Rule, Stylesheet, parse_declarations, parse_stylesheet};
pub use themes::{
    BuiltinThemes, DirectorySource, MATH_CSS, ResolvedStyles, SheetKind, StyleResolver,
    StyleSelection, StylesheetCache, StylesheetSource,
};

/// Id of the container element wrapped around inlined fragments.
pub const CONTAINER_ID: &str = "bm-md";

/// Wrap a fragment in the styling container.
#[must_use]
pub fn wrap_fragment(html: &str) -> String {
    format!("<section id=\"{CONTAINER_ID}\">{html}</section>")
}

/// Wrap `html` in the container and inline `css` into it.
pub fn inline_css(html: &str, css: &str) -> Result<String, StyleError> {
    let sheet = parse_stylesheet(css)?;
    let mut nodes = HtmlParser::new().parse(&wrap_fragment(html))?;
    Inliner::new(&sheet).apply(&mut nodes);
    Ok(to_html(&nodes))
}

/// What [`apply_styles`] did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InlineOutcome {
    /// No stylesheets: the fragment was returned as given.
    Skipped,
    /// Styles were inlined into the wrapped fragment.
    Inlined,
    /// Inlining failed; the wrapped fragment is returned without styles.
    Fallback,
}

/// A styled fragment.
#[derive(Clone, Debug)]
pub struct Styled {
    pub html: String,
    pub outcome: InlineOutcome,
}

/// Inline resolved styles into a fragment.
///
/// With no stylesheets the fragment is returned unchanged and unwrapped.
/// Inlining failures are logged and degrade to the wrapped, unstyled
/// fragment.
pub fn apply_styles(html: &str, styles: &ResolvedStyles) -> Styled {
    if styles.is_empty() {
        return Styled {
            html: html.to_owned(),
            outcome: InlineOutcome::Skipped,
        };
    }
    match inline_css(html, &styles.css()) {
        Ok(html) => Styled {
            html,
            outcome: InlineOutcome::Inlined,
        },
        Err(e) => {
            tracing::warn!(error = %e, "CSS inlining failed, returning unstyled fragment");
            Styled {
                html: wrap_fragment(html),
                outcome: InlineOutcome::Fallback,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn custom(css: &str) -> ResolvedStyles {
        StyleResolver::new().resolve(&StyleSelection {
            custom_css: Some(css),
            ..StyleSelection::default()
        })
    }

    #[test]
    fn test_no_styles_skips_inlining() {
        let styled = apply_styles("<p>x</p>", &ResolvedStyles::default());
        assert_eq!(styled.outcome, InlineOutcome::Skipped);
        assert_eq!(styled.html, "<p>x</p>");
    }

    #[test]
    fn test_container_scoped_rules_apply() {
        let styled = apply_styles("<p>x</p>", &custom("#bm-md { color: #333 } #bm-md > p { margin: 0 }"));
        assert_eq!(styled.outcome, InlineOutcome::Inlined);
        assert_eq!(
            styled.html,
            "<section id=\"bm-md\" style=\"color: #333;\"><p style=\"margin: 0;\">x</p></section>"
        );
    }

    #[test]
    fn test_malformed_css_falls_back_to_wrapped_fragment() {
        let styled = apply_styles("<p>x</p>", &custom("p { color: red"));
        assert_eq!(styled.outcome, InlineOutcome::Fallback);
        assert_eq!(styled.html, "<section id=\"bm-md\"><p>x</p></section>");
    }

    #[test]
    fn test_inlining_is_idempotent_across_runs() {
        let styles = StyleResolver::new().resolve(&StyleSelection {
            markdown_style: Some("professional"),
            code_theme: Some("kimbie-dark"),
            ..StyleSelection::default()
        });
        let html = "<h2>T</h2><blockquote><p>a</p><p>b</p></blockquote><table><tr><th>k</th></tr></table>";
        assert_eq!(apply_styles(html, &styles).html, apply_styles(html, &styles).html);
    }

    #[test]
    fn test_builtin_theme_styles_headings() {
        let styles = StyleResolver::new().resolve(&StyleSelection {
            markdown_style: Some("professional"),
            ..StyleSelection::default()
        });
        let styled = apply_styles("<h2>T</h2>", &styles);
        assert!(styled.html.contains("<h2 style=\""));
        assert!(styled.html.contains("border-left: 4px solid #1f4e79;"));
    }
}
