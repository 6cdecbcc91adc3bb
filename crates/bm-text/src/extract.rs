//! Markdown to plain text.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

/// Separator owed before the next piece of text.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Break {
    Cell,
    Line,
    Block,
}

/// Collects text content from parser events.
#[derive(Default)]
struct TextCollector {
    out: String,
    pending: Option<Break>,
    image_depth: usize,
    metadata: bool,
}

impl TextCollector {
    fn request(&mut self, brk: Break) {
        self.pending = Some(self.pending.map_or(brk, |p| p.max(brk)));
    }

    fn push(&mut self, text: &str) {
        if self.image_depth > 0 || self.metadata || text.is_empty() {
            return;
        }
        if let Some(brk) = self.pending.take()
            && !self.out.is_empty()
        {
            self.out.push_str(match brk {
                Break::Cell => "\t",
                Break::Line => "\n",
                Break::Block => "\n\n",
            });
        }
        self.out.push_str(text);
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(&tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) | Event::Code(text) | Event::InlineMath(text) => self.push(&text),
            Event::DisplayMath(text) => {
                self.request(Break::Line);
                self.push(text.trim());
                self.request(Break::Line);
            }
            Event::SoftBreak | Event::HardBreak => self.request(Break::Line),
            Event::Html(_)
            | Event::InlineHtml(_)
            | Event::FootnoteReference(_)
            | Event::TaskListMarker(_)
            | Event::Rule => {}
        }
    }

    fn start_tag(&mut self, tag: &Tag<'_>) {
        match tag {
            Tag::Paragraph
            | Tag::Heading { .. }
            | Tag::BlockQuote(_)
            | Tag::CodeBlock(_)
            | Tag::List(_)
            | Tag::Table(_)
            | Tag::FootnoteDefinition(_)
            | Tag::DefinitionList => self.request(Break::Block),
            Tag::Item | Tag::TableHead | Tag::TableRow | Tag::DefinitionListTitle => {
                self.request(Break::Line);
            }
            Tag::TableCell => self.request(Break::Cell),
            Tag::Image { .. } => self.image_depth += 1,
            Tag::MetadataBlock(_) => self.metadata = true,
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::CodeBlock => {
                let trimmed = self.out.trim_end_matches(['\n', '\r']).len();
                self.out.truncate(trimmed);
                self.request(Break::Block);
            }
            TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::BlockQuote(_)
            | TagEnd::List(_)
            | TagEnd::Table => self.request(Break::Block),
            TagEnd::Image => self.image_depth = self.image_depth.saturating_sub(1),
            TagEnd::MetadataBlock(_) => self.metadata = false,
            _ => {}
        }
    }
}

/// Plain text of a markdown document.
///
/// Blocks are separated by blank lines; list items and table rows sit on
/// their own lines with cells tab-separated. Link text is kept, URLs and
/// images are dropped, code keeps its content without fences.
pub(crate) fn extract_text(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_MATH
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
        | Options::ENABLE_PLUSES_DELIMITED_METADATA_BLOCKS;

    let mut collector = TextCollector::default();
    for event in Parser::new_ext(markdown, options) {
        collector.process_event(event);
    }
    collector.out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_paragraphs_separated_by_blank_line() {
        assert_eq!(
            extract_text("First paragraph.\n\nSecond paragraph."),
            "First paragraph.\n\nSecond paragraph."
        );
    }

    #[test]
    fn test_list_items_on_own_lines() {
        assert_eq!(extract_text("- item one\n- item two"), "item one\nitem two");
    }

    #[test]
    fn test_formatting_removed() {
        assert_eq!(
            extract_text("**Bold** text with [link](https://example.com)."),
            "Bold text with link."
        );
    }

    #[test]
    fn test_headings_without_hashes() {
        assert_eq!(extract_text("# 一级标题\n\n## 二级标题"), "一级标题\n\n二级标题");
    }

    #[test]
    fn test_images_dropped() {
        let text = extract_text("这是一张 ![示例图片](https://example.com/img.png) 图片");
        assert!(!text.contains("!["));
        assert!(!text.contains("https://example.com"));
        assert!(!text.contains("示例图片"));
        assert!(text.starts_with("这是一张"));
    }

    #[test]
    fn test_blockquote_markers_dropped() {
        assert_eq!(
            extract_text("> 这是一段引用\n>\n> 引用第二行"),
            "这是一段引用\n\n引用第二行"
        );
    }

    #[test]
    fn test_code_without_fences() {
        assert_eq!(extract_text("```javascript\nconst x = 1\n```"), "const x = 1");
    }

    #[test]
    fn test_table_rows_on_own_lines() {
        assert_eq!(extract_text("| a | b |\n|---|---|\n| 1 | 2 |"), "a\tb\n1\t2");
    }

    #[test]
    fn test_frontmatter_skipped() {
        assert_eq!(extract_text("---\ntitle: x\n---\n\nBody"), "Body");
    }

    #[test]
    fn test_soft_break_kept_as_newline() {
        assert_eq!(extract_text("a\nb"), "a\nb");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_text(""), "");
    }

    #[test]
    fn test_unicode_preserved() {
        let text = extract_text("你好世界 🎉 **加粗中文**");
        assert_eq!(text, "你好世界 🎉 加粗中文");
    }
}
