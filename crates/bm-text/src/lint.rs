//! markdownlint-style auto-fix.
//!
//! Rules run as passes over the document's lines. Fenced code and a leading
//! frontmatter block are never rewritten. Passes that insert or drop lines
//! re-classify before the next pass.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::fence::{LineRole, classify};

/// Spaces replacing one hard tab.
const TAB_WIDTH: usize = 4;

/// Trailing spaces that encode a hard line break.
const BREAK_SPACES: usize = 2;

static ATX_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}#{1,6}(?:[ \t]|$)").expect("invalid heading regex"));

static MISSING_HEADING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})([^#\s])").expect("invalid heading space regex"));

static EXTRA_HEADING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]{2,}(\S)").expect("invalid heading space regex"));

static INDENTED_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {1,3}(#{1,6}(?:[ \t]|$))").expect("invalid indent regex"));

static BLOCKQUOTE_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( {0,3}>+) {2,}(\S)").expect("invalid blockquote regex"));

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(?:[-*+]|1[.)])[ \t]+\S").expect("invalid list item regex")
});

static ANY_LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*+]|\d{1,9}[.)])(?:[ \t]|$)").expect("invalid list item regex")
});

static THEMATIC_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$")
        .expect("invalid thematic break regex")
});

/// A fixable rule, named after its markdownlint id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    /// MD009: trailing spaces.
    TrailingSpaces,
    /// MD010: hard tabs.
    HardTabs,
    /// MD012: multiple consecutive blank lines.
    MultipleBlanks,
    /// MD018: no space after hash on ATX heading.
    NoSpaceAfterHash,
    /// MD019: multiple spaces after hash on ATX heading.
    MultipleSpacesAfterHash,
    /// MD022: headings surrounded by blank lines.
    BlanksAroundHeadings,
    /// MD023: headings start at the beginning of the line.
    IndentedHeading,
    /// MD027: multiple spaces after blockquote symbol.
    BlockquoteSpaces,
    /// MD031: fenced code surrounded by blank lines.
    BlanksAroundFences,
    /// MD032: lists surrounded by blank lines.
    BlanksAroundLists,
    /// MD047: file ends with a single newline.
    FinalNewline,
}

impl Rule {
    /// Every rule, in the order passes run.
    pub const ALL: [Self; 11] = [
        Self::HardTabs,
        Self::TrailingSpaces,
        Self::NoSpaceAfterHash,
        Self::MultipleSpacesAfterHash,
        Self::IndentedHeading,
        Self::BlockquoteSpaces,
        Self::BlanksAroundHeadings,
        Self::BlanksAroundFences,
        Self::BlanksAroundLists,
        Self::MultipleBlanks,
        Self::FinalNewline,
    ];

    /// markdownlint rule id.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::TrailingSpaces => "MD009",
            Self::HardTabs => "MD010",
            Self::MultipleBlanks => "MD012",
            Self::NoSpaceAfterHash => "MD018",
            Self::MultipleSpacesAfterHash => "MD019",
            Self::BlanksAroundHeadings => "MD022",
            Self::IndentedHeading => "MD023",
            Self::BlockquoteSpaces => "MD027",
            Self::BlanksAroundFences => "MD031",
            Self::BlanksAroundLists => "MD032",
            Self::FinalNewline => "MD047",
        }
    }

    /// Short description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::TrailingSpaces => "trailing spaces",
            Self::HardTabs => "hard tabs",
            Self::MultipleBlanks => "multiple consecutive blank lines",
            Self::NoSpaceAfterHash => "no space after hash on heading",
            Self::MultipleSpacesAfterHash => "multiple spaces after hash on heading",
            Self::BlanksAroundHeadings => "headings should be surrounded by blank lines",
            Self::IndentedHeading => "headings must start at the beginning of the line",
            Self::BlockquoteSpaces => "multiple spaces after blockquote symbol",
            Self::BlanksAroundFences => "fenced code should be surrounded by blank lines",
            Self::BlanksAroundLists => "lists should be surrounded by blank lines",
            Self::FinalNewline => "file should end with a single newline",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.description())
    }
}

/// One applied fix. `line` is 1-based in the text the pass saw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fix {
    pub rule: Rule,
    pub line: usize,
}

/// Fixed text plus the fixes applied to get there.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LintReport {
    pub output: String,
    pub fixes: Vec<Fix>,
}

impl LintReport {
    /// Whether the input was already clean.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.fixes.is_empty()
    }
}

/// Line-based fixer.
struct Linter {
    lines: Vec<String>,
    newline: &'static str,
    fixes: Vec<Fix>,
}

impl Linter {
    fn new(markdown: &str) -> Self {
        let newline = if markdown.contains("\r\n") { "\r\n" } else { "\n" };
        Self {
            lines: markdown.lines().map(str::to_owned).collect(),
            newline,
            fixes: Vec::new(),
        }
    }

    fn record(&mut self, rule: Rule, index: usize) {
        self.fixes.push(Fix {
            rule,
            line: index + 1,
        });
    }

    fn run(mut self, original: &str) -> LintReport {
        if original.trim().is_empty() {
            let fixes = if original.is_empty() {
                Vec::new()
            } else {
                vec![Fix {
                    rule: Rule::MultipleBlanks,
                    line: 1,
                }]
            };
            return LintReport {
                output: String::new(),
                fixes,
            };
        }
        for rule in Rule::ALL {
            match rule {
                Rule::HardTabs => self.rewrite_lines(rule, fix_hard_tabs),
                Rule::TrailingSpaces => self.rewrite_lines(rule, fix_trailing_spaces),
                Rule::NoSpaceAfterHash => self.rewrite_lines(rule, |l| {
                    // `#tag#` style hashtags are not headings
                    if l.trim_end().ends_with('#') {
                        return None;
                    }
                    replace_first(&MISSING_HEADING_SPACE, l, "$1 $2")
                }),
                Rule::MultipleSpacesAfterHash => self.rewrite_lines(rule, |l| {
                    replace_first(&EXTRA_HEADING_SPACE, l, "$1 $2")
                }),
                Rule::IndentedHeading => self.fix_indented_headings(),
                Rule::BlockquoteSpaces => self.rewrite_lines(rule, |l| {
                    replace_first(&BLOCKQUOTE_SPACES, l, "$1 $2")
                }),
                Rule::BlanksAroundHeadings => self.surround(rule, |role, line| {
                    let heading = role.is_text() && ATX_HEADING.is_match(line);
                    (heading, heading)
                }),
                Rule::BlanksAroundFences => self.surround(rule, |role, _| {
                    (role == LineRole::FenceOpen, role == LineRole::FenceClose)
                }),
                Rule::BlanksAroundLists => self.fix_list_starts(),
                Rule::MultipleBlanks => self.collapse_blanks(),
                Rule::FinalNewline => {}
            }
        }

        let mut output = self.lines.join(self.newline);
        output.push_str(self.newline);
        let doubled = self.newline.repeat(2);
        if !original.ends_with(self.newline) || original.ends_with(&doubled) {
            let line = self.lines.len();
            self.record(Rule::FinalNewline, line.saturating_sub(1));
        }
        tracing::debug!(fixes = self.fixes.len(), "Lint finished");
        LintReport {
            output,
            fixes: self.fixes,
        }
    }

    /// Apply `fix` to every text line; `None` means unchanged.
    fn rewrite_lines(&mut self, rule: Rule, fix: impl Fn(&str) -> Option<String>) {
        let roles = classify(&self.lines);
        for index in 0..self.lines.len() {
            if !roles[index].is_text() {
                continue;
            }
            if let Some(fixed) = fix(&self.lines[index]) {
                self.lines[index] = fixed;
                self.record(rule, index);
            }
        }
    }

    fn fix_indented_headings(&mut self) {
        let roles = classify(&self.lines);
        for index in 0..self.lines.len() {
            // Indented lines after content may belong to a list item
            let after_break = index == 0 || self.lines[index - 1].trim().is_empty();
            if !roles[index].is_text() || !after_break {
                continue;
            }
            if let Some(fixed) = replace_first(&INDENTED_HEADING, &self.lines[index], "$1") {
                self.lines[index] = fixed;
                self.record(Rule::IndentedHeading, index);
            }
        }
    }

    /// Ensure blank lines before and/or after lines picked by `wants`.
    fn surround(&mut self, rule: Rule, wants: impl Fn(LineRole, &str) -> (bool, bool)) {
        let roles = classify(&self.lines);
        let mut out: Vec<String> = Vec::with_capacity(self.lines.len());
        let mut blank_after = false;
        for (index, line) in std::mem::take(&mut self.lines).into_iter().enumerate() {
            let (before, after) = wants(roles[index], &line);
            let needs_blank = (before || blank_after)
                && !line.trim().is_empty()
                && out.last().is_some_and(|prev| !prev.trim().is_empty())
                && (index == 0 || roles[index - 1] != LineRole::Frontmatter);
            if needs_blank {
                out.push(String::new());
                self.record(rule, index);
            }
            blank_after = after;
            out.push(line);
        }
        self.lines = out;
    }

    fn fix_list_starts(&mut self) {
        let roles = classify(&self.lines);
        let mut out: Vec<String> = Vec::with_capacity(self.lines.len());
        for (index, line) in std::mem::take(&mut self.lines).into_iter().enumerate() {
            let starts_list = roles[index].is_text()
                && LIST_ITEM.is_match(&line)
                && !THEMATIC_BREAK.is_match(&line)
                && index > 0
                && roles[index - 1].is_text()
                && out.last().is_some_and(|prev| is_paragraph_line(prev));
            if starts_list {
                out.push(String::new());
                self.record(Rule::BlanksAroundLists, index);
            }
            out.push(line);
        }
        self.lines = out;
    }

    fn collapse_blanks(&mut self) {
        let roles = classify(&self.lines);
        let mut out: Vec<String> = Vec::with_capacity(self.lines.len());
        for (index, line) in std::mem::take(&mut self.lines).into_iter().enumerate() {
            let blank = line.trim().is_empty();
            let repeated = blank
                && roles[index].is_text()
                && out.last().is_none_or(|prev| prev.trim().is_empty());
            if repeated {
                self.record(Rule::MultipleBlanks, index);
                continue;
            }
            out.push(line);
        }
        while out.last().is_some_and(|l| l.trim().is_empty()) {
            out.pop();
        }
        self.lines = out;
    }
}

/// Whether `line` can be the last line of a paragraph a list interrupts.
fn is_paragraph_line(line: &str) -> bool {
    !line.trim().is_empty()
        && !line.starts_with([' ', '\t'])
        && !ANY_LIST_ITEM.is_match(line)
        && !ATX_HEADING.is_match(line)
        && !line.trim_start().starts_with(['>', '|', '<'])
}

fn replace_first(re: &Regex, line: &str, replacement: &str) -> Option<String> {
    re.is_match(line)
        .then(|| re.replacen(line, 1, replacement).into_owned())
}

fn fix_hard_tabs(line: &str) -> Option<String> {
    line.contains('\t')
        .then(|| line.replace('\t', &" ".repeat(TAB_WIDTH)))
}

fn fix_trailing_spaces(line: &str) -> Option<String> {
    let trimmed = line.trim_end();
    let trailing = &line[trimmed.len()..];
    if trailing.is_empty() {
        return None;
    }
    let is_break = !trimmed.is_empty()
        && trailing.len() == BREAK_SPACES
        && trailing.chars().all(|c| c == ' ');
    (!is_break).then(|| trimmed.to_owned())
}

/// Fix `markdown` and report what changed.
pub(crate) fn lint_markdown(markdown: &str) -> LintReport {
    Linter::new(markdown).run(markdown)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn fix(markdown: &str) -> String {
        lint_markdown(markdown).output
    }

    fn rules(markdown: &str) -> Vec<&'static str> {
        let mut codes: Vec<_> = lint_markdown(markdown)
            .fixes
            .iter()
            .map(|f| f.rule.code())
            .collect();
        codes.dedup();
        codes
    }

    #[test]
    fn test_valid_markdown_unchanged() {
        let markdown = "# 标题\n\n这是正确格式的段落。\n\n- 列表项一\n- 列表项二\n";
        let report = lint_markdown(markdown);
        assert_eq!(report.output, markdown);
        assert!(report.is_clean(), "{:?}", report.fixes);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(fix(""), "");
        assert!(lint_markdown("").is_clean());
    }

    #[test]
    fn test_trailing_whitespace_removed() {
        assert_eq!(fix("这是一行文本   \n第二行"), "这是一行文本\n第二行\n");
    }

    #[test]
    fn test_two_space_break_kept() {
        let markdown = "line one  \nline two\n";
        assert_eq!(fix(markdown), markdown);
    }

    #[test]
    fn test_hard_tabs_replaced() {
        assert_eq!(fix("- a\n\t- b\n"), "- a\n    - b\n");
        assert_eq!(rules("- a\n\t- b\n"), vec!["MD010"]);
    }

    #[test]
    fn test_multiple_blank_lines_collapsed() {
        assert_eq!(fix("段落一\n\n\n\n段落二"), "段落一\n\n段落二\n");
    }

    #[test]
    fn test_blank_line_before_heading() {
        assert_eq!(fix("段落内容\n# 标题"), "段落内容\n\n# 标题\n");
    }

    #[test]
    fn test_blank_line_after_heading() {
        assert_eq!(fix("# 标题\n内容\n"), "# 标题\n\n内容\n");
    }

    #[test]
    fn test_heading_hash_spacing() {
        assert_eq!(fix("#Title\n"), "# Title\n");
        assert_eq!(fix("##   Title\n"), "## Title\n");
        assert_eq!(fix("#######x\n"), "#######x\n");
    }

    #[test]
    fn test_indented_heading() {
        assert_eq!(fix("  # Title\n"), "# Title\n");
    }

    #[test]
    fn test_indented_heading_in_list_keeps_indent() {
        assert_eq!(fix("- item\n  # inside\n"), "- item\n\n  # inside\n");
    }

    #[test]
    fn test_hashtag_line_not_a_heading() {
        let markdown = "#话题#\n";
        assert_eq!(fix(markdown), markdown);
    }

    #[test]
    fn test_blockquote_spacing() {
        assert_eq!(fix(">   quote\n"), "> quote\n");
    }

    #[test]
    fn test_blank_lines_around_fences() {
        assert_eq!(
            fix("text\n```js\nconst x = 1\n```\nmore\n"),
            "text\n\n```js\nconst x = 1\n```\n\nmore\n"
        );
    }

    #[test]
    fn test_fenced_content_never_modified() {
        let markdown = "```\n#no space  \n\n\n\tx\n```\n";
        assert_eq!(fix(markdown), markdown);
    }

    #[test]
    fn test_blank_line_before_list() {
        assert_eq!(fix("Intro\n- a\n- b\n"), "Intro\n\n- a\n- b\n");
        assert_eq!(fix("Intro\n2. not a list\n"), "Intro\n2. not a list\n");
    }

    #[test]
    fn test_thematic_break_not_a_list() {
        let markdown = "Text\n\n* * *\n";
        assert_eq!(fix(markdown), markdown);
    }

    #[test]
    fn test_final_newline() {
        assert_eq!(fix("text"), "text\n");
        assert_eq!(fix("text\n\n\n"), "text\n");
        assert_eq!(rules("text"), vec!["MD047"]);
    }

    #[test]
    fn test_crlf_preserved() {
        assert_eq!(fix("a\r\n# b\r\n"), "a\r\n\r\n# b\r\n");
    }

    #[test]
    fn test_frontmatter_untouched() {
        let markdown = "---\n#comment\ntitle: x   \n---\n\n# Title\n";
        assert_eq!(fix(markdown), markdown);
    }

    #[test]
    fn test_rule_display() {
        assert_eq!(Rule::TrailingSpaces.to_string(), "MD009 trailing spaces");
    }
}
