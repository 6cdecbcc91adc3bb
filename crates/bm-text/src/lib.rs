//! Plain-text extraction and lint auto-fix for markdown.
//!
//! Both entry points share the markdown parser with `bm-renderer` but not
//! its pipeline, and both reject input above [`MAX_INPUT_SIZE`].
//!
//! # Example
//!
//! ```
//! let text = bm_text::extract("**Bold** text with [link](https://example.com).").unwrap();
//! assert_eq!(text, "Bold text with link.");
//!
//! let fixed = bm_text::lint("Intro\n# Title\ntext   ").unwrap();
//! assert_eq!(fixed, "Intro\n\n# Title\n\ntext\n");
//! ```

mod error;
mod extract;
mod fence;
mod lint;

pub use error::TextError;
pub use lint::{Fix, LintReport, Rule};

/// Input size cap (5 MiB).
pub const MAX_INPUT_SIZE: usize = 5 * 1024 * 1024;

fn check_size(markdown: &str) -> Result<(), TextError> {
    if markdown.len() > MAX_INPUT_SIZE {
        return Err(TextError::InputTooLarge {
            size: markdown.len(),
            limit: MAX_INPUT_SIZE,
        });
    }
    Ok(())
}

/// Plain text of a markdown document.
pub fn extract(markdown: &str) -> Result<String, TextError> {
    check_size(markdown)?;
    Ok(extract::extract_text(markdown))
}

/// Auto-fixed markdown.
pub fn lint(markdown: &str) -> Result<String, TextError> {
    lint_report(markdown).map(|report| report.output)
}

/// Auto-fixed markdown with the list of applied fixes.
pub fn lint_report(markdown: &str) -> Result<LintReport, TextError> {
    check_size(markdown)?;
    Ok(lint::lint_markdown(markdown))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oversized_input_rejected() {
        let big = "a".repeat(MAX_INPUT_SIZE + 1);
        assert!(matches!(extract(&big), Err(TextError::InputTooLarge { .. })));
        assert!(matches!(lint(&big), Err(TextError::InputTooLarge { .. })));
    }

    #[test]
    fn test_lint_report_lists_rules() {
        let report = lint_report("#Title\ntext").unwrap();
        let codes: Vec<_> = report.fixes.iter().map(|f| f.rule.code()).collect();
        assert_eq!(codes, vec!["MD018", "MD022", "MD047"]);
    }
}
