//! Syntax highlighting for fenced code blocks.
//!
//! Highlighters produce tree nodes rather than HTML strings so their output
//! passes through the sanitizer like everything else.

use bm_tree::{HtmlParser, Node};
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Class prefix for highlight spans, shared with the code themes.
pub const CLASS_PREFIX: &str = "hljs-";

/// Highlights code into tree nodes.
///
/// # Example
///
/// ```
/// use bm_renderer::CodeHighlighter;
/// use bm_tree::{Element, Node};
///
/// struct Upper;
///
/// impl CodeHighlighter for Upper {
///     fn highlight(&self, code: &str, _language: &str) -> Option<Vec<Node>> {
///         Some(vec![Element::new("span").with_text(code.to_uppercase()).into()])
///     }
/// }
/// ```
pub trait CodeHighlighter: Send + Sync {
    /// Highlight `code` written in `language`.
    ///
    /// Returns `None` for unknown languages; the block is then rendered as
    /// plain text.
    fn highlight(&self, code: &str, language: &str) -> Option<Vec<Node>>;
}

/// Highlighter backed by syntect's bundled grammars.
///
/// Scopes become space separated `hljs-` classes (`hljs-keyword`,
/// `hljs-string`, ...).
pub struct SyntectHighlighter {
    syntaxes: SyntaxSet,
}

impl SyntectHighlighter {
    /// Load the bundled syntax definitions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
        }
    }
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeHighlighter for SyntectHighlighter {
    fn highlight(&self, code: &str, language: &str) -> Option<Vec<Node>> {
        let syntax = self.syntaxes.find_syntax_by_token(language)?;
        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            &self.syntaxes,
            ClassStyle::SpacedPrefixed {
                prefix: CLASS_PREFIX,
            },
        );
        for line in LinesWithEndings::from(code) {
            if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
                tracing::debug!(language, error = %e, "Highlighting failed");
                return None;
            }
        }
        match HtmlParser::new().parse(&generator.finalize()) {
            Ok(nodes) => Some(nodes),
            Err(e) => {
                tracing::debug!(language, error = %e, "Cannot read highlighter output");
                None
            }
        }
    }
}

/// Highlighter that never highlights.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHighlighter;

impl CodeHighlighter for NoHighlighter {
    fn highlight(&self, _code: &str, _language: &str) -> Option<Vec<Node>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use bm_tree::{text_content, to_html};

    use super::*;

    #[test]
    fn test_known_language_gets_prefixed_classes() {
        let nodes = SyntectHighlighter::new()
            .highlight("fn main() {}\n", "rust")
            .unwrap();
        let html = to_html(&nodes);
        assert!(html.contains("class=\"hljs-"), "{html}");
        assert_eq!(text_content(&nodes), "fn main() {}\n");
    }

    #[test]
    fn test_unknown_language_is_not_highlighted() {
        assert!(
            SyntectHighlighter::new()
                .highlight("x", "no-such-language")
                .is_none()
        );
    }

    #[test]
    fn test_markup_in_code_survives_as_text() {
        let nodes = SyntectHighlighter::new()
            .highlight("<b>&amp;</b>\n", "html")
            .unwrap();
        assert_eq!(text_content(&nodes), "<b>&amp;</b>\n");
    }
}
