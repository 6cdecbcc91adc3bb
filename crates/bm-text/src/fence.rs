//! Line classification for the linter.
//!
//! Fenced code and a leading frontmatter block are protected: rules must
//! not rewrite them. Fences use backticks or tildes (three or more); the
//! closing fence uses the same character and is at least as long.

/// What a line is, as far as the rules care.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum LineRole {
    /// Ordinary markdown.
    Text,
    /// Opening code fence.
    FenceOpen,
    /// Content of a fenced code block.
    Code,
    /// Closing code fence.
    FenceClose,
    /// Leading YAML/TOML block, delimiters included.
    Frontmatter,
}

impl LineRole {
    /// Lines the rules may rewrite.
    pub(crate) fn is_text(self) -> bool {
        self == Self::Text
    }
}

/// Classify every line of a document.
pub(crate) fn classify<S: AsRef<str>>(lines: &[S]) -> Vec<LineRole> {
    let mut roles = Vec::with_capacity(lines.len());
    let mut start = 0;

    if let Some(delimiter) = lines
        .first()
        .map(|l| l.as_ref().trim_end())
        .filter(|l| *l == "---" || *l == "+++")
        && let Some(end) = lines
            .iter()
            .skip(1)
            .position(|l| l.as_ref().trim_end() == delimiter)
    {
        start = end + 2;
        roles.resize(start, LineRole::Frontmatter);
    }

    let mut fence: Option<(char, usize)> = None;
    for line in &lines[start..] {
        let trimmed = line.as_ref().trim_start();
        let role = match fence {
            Some((ch, len)) if is_closing_fence(trimmed, ch, len) => {
                fence = None;
                LineRole::FenceClose
            }
            Some(_) => LineRole::Code,
            None => match opening_fence(trimmed) {
                Some(found) => {
                    fence = Some(found);
                    LineRole::FenceOpen
                }
                None => LineRole::Text,
            },
        };
        roles.push(role);
    }
    roles
}

fn opening_fence(trimmed: &str) -> Option<(char, usize)> {
    let first = trimmed.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let count = trimmed.chars().take_while(|&c| c == first).count();
    // Backtick info strings cannot contain backticks
    if count < 3 || (first == '`' && trimmed[count..].contains('`')) {
        return None;
    }
    Some((first, count))
}

fn is_closing_fence(trimmed: &str, ch: char, min_len: usize) -> bool {
    let count = trimmed.chars().take_while(|&c| c == ch).count();
    count >= min_len && trimmed[count..].chars().all(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use LineRole::{Code, FenceClose, FenceOpen, Frontmatter, Text};

    #[test]
    fn test_backtick_fence() {
        assert_eq!(
            classify(&["a", "```rust", "fn main() {}", "```", "b"]),
            vec![Text, FenceOpen, Code, FenceClose, Text]
        );
    }

    #[test]
    fn test_tilde_fence_needs_matching_char_and_length() {
        assert_eq!(
            classify(&["~~~~", "```", "~~~", "~~~~~", "x"]),
            vec![FenceOpen, Code, Code, FenceClose, Text]
        );
    }

    #[test]
    fn test_inline_code_is_not_a_fence() {
        assert_eq!(classify(&["```a` b```", "``x``"]), vec![Text, Text]);
    }

    #[test]
    fn test_indented_fence_in_list() {
        assert_eq!(
            classify(&["- item", "  ```", "  code", "  ```"]),
            vec![Text, FenceOpen, Code, FenceClose]
        );
    }

    #[test]
    fn test_frontmatter_protected() {
        assert_eq!(
            classify(&["---", "# not a heading", "---", "# Title"]),
            vec![Frontmatter, Frontmatter, Frontmatter, Text]
        );
    }

    #[test]
    fn test_unterminated_frontmatter_is_text() {
        assert_eq!(classify(&["---", "a"]), vec![Text, Text]);
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        assert_eq!(classify(&["```", "a", "b"]), vec![FenceOpen, Code, Code]);
    }
}
