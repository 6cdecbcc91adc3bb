//! Markdown to document tree.
//!
//! Parser events are folded into an owned tree with a stack of open
//! elements. Raw HTML is tokenized and its tags are pushed onto the same
//! stack, so `<kbd>`...`</kbd>` split across inline events nests around the
//! markdown between them. A raw element left open when its enclosing
//! markdown element ends is closed with it.

use std::sync::LazyLock;

use bm_tree::{Element, HtmlParser, Node, Token};
use pulldown_cmark::{
    CodeBlockKind, Event, HeadingLevel, LinkType, MetadataBlockKind, Options, Parser, Tag, TagEnd,
};

use regex::Regex;

use crate::alerts::alert_container;
use crate::document::{Document, Frontmatter, FrontmatterKind};
use crate::highlight::{CodeHighlighter, SyntectHighlighter};
use crate::math::{MathRenderer, SourceMathRenderer};
use crate::state::{CodeBlockState, FootnoteState, ImageState, TableState, label_slug};

/// Opening tag of an element whose body is not markup.
static RAW_TEXT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(script|style)\b").expect("invalid raw text regex"));

/// Prefix applied to generated ids so they cannot clobber page globals.
pub const CLOBBER_PREFIX: &str = "user-content-";

/// Extensions enabled for full documents.
#[must_use]
pub fn document_options() -> Options {
    inline_options()
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_GFM
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
        | Options::ENABLE_PLUSES_DELIMITED_METADATA_BLOCKS
}

/// Extensions enabled for metadata values.
fn inline_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_MATH
}

/// Markdown parser producing [`Document`] trees.
///
/// Code blocks and math are handed to pluggable renderers while the tree
/// is built.
pub struct MarkdownParser {
    highlighter: Box<dyn CodeHighlighter>,
    math: Box<dyn MathRenderer>,
}

impl MarkdownParser {
    /// Create a parser with the syntect highlighter and source math renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_renderers(Box::new(SyntectHighlighter::new()), Box::new(SourceMathRenderer))
    }

    /// Create a parser with custom code and math renderers.
    #[must_use]
    pub fn with_renderers(highlighter: Box<dyn CodeHighlighter>, math: Box<dyn MathRenderer>) -> Self {
        Self { highlighter, math }
    }

    /// Parse a full document.
    ///
    /// `footnote_label` is the heading of the GFM footnote section.
    pub fn parse(&self, markdown: &str, footnote_label: &str) -> Document {
        self.parse_with(markdown, document_options(), footnote_label)
    }

    /// Parse a short snippet such as a metadata value.
    ///
    /// A snippet that is a single paragraph yields the paragraph's children.
    /// `has_math` is set when the snippet rendered any math.
    pub fn parse_inline(&self, markdown: &str) -> Document {
        let mut doc = self.parse_with(markdown, inline_options(), "");
        if doc.nodes.len() == 1 && doc.nodes[0].is_element("p") {
            if let Some(Node::Element(p)) = doc.nodes.pop() {
                doc.nodes = p.children;
            }
        }
        doc
    }

    fn parse_with(&self, markdown: &str, options: Options, footnote_label: &str) -> Document {
        let mut builder = DocumentBuilder::new(self.highlighter.as_ref(), self.math.as_ref());
        for event in Parser::new_ext(markdown, options) {
            builder.process_event(event);
        }
        builder.finish(footnote_label)
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

enum Origin {
    Markdown,
    Raw,
    /// Footnote definition body, collected out of band.
    Footnote(String),
}

struct Frame {
    element: Element,
    origin: Origin,
}

struct DocumentBuilder<'r> {
    root: Vec<Node>,
    stack: Vec<Frame>,
    /// Code block content state.
    code: CodeBlockState,
    /// Table structure state.
    table: TableState,
    /// Image alt text capture state.
    image: ImageState,
    /// GFM footnote references and definitions.
    footnotes: FootnoteState,
    /// Metadata block being collected.
    metadata: Option<(FrontmatterKind, String)>,
    frontmatter: Option<Frontmatter>,
    /// Buffered HTML block, tokenized as a whole.
    html_block: Option<String>,
    /// Inline `<script>`/`<style>` whose body is being skipped.
    raw_text: Option<String>,
    has_math: bool,
    html: HtmlParser,
    highlighter: &'r dyn CodeHighlighter,
    math: &'r dyn MathRenderer,
}

impl<'r> DocumentBuilder<'r> {
    fn new(highlighter: &'r dyn CodeHighlighter, math: &'r dyn MathRenderer) -> Self {
        Self {
            root: Vec::new(),
            stack: Vec::new(),
            code: CodeBlockState::default(),
            table: TableState::default(),
            image: ImageState::default(),
            footnotes: FootnoteState::default(),
            metadata: None,
            frontmatter: None,
            html_block: None,
            raw_text: None,
            has_math: false,
            html: HtmlParser::new(),
            highlighter,
            math,
        }
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline_code(&code),
            Event::Html(html) | Event::InlineHtml(html) => self.raw_html(&html),
            Event::InlineMath(tex) => self.math(&tex, false),
            Event::DisplayMath(tex) => self.math(&tex, true),
            Event::FootnoteReference(label) => self.footnote_reference(&label),
            Event::SoftBreak => self.soft_break(),
            Event::HardBreak => self.hard_break(),
            Event::Rule => self.append(Element::new("hr").into()),
            Event::TaskListMarker(checked) => self.task_list_marker(checked),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn start_tag(&mut self, tag: Tag<'_>) {
        if self.image.is_active() {
            // Alt text is plain; nested markup contributes only its text
            if let Tag::Image {
                dest_url, title, ..
            } = tag
            {
                self.image.start(dest_url.into_string(), title.into_string());
            }
            return;
        }

        match tag {
            Tag::Paragraph => self.open(Element::new("p")),
            Tag::Heading { level, .. } => self.open(Element::new(heading_tag(level))),
            Tag::BlockQuote(Some(kind)) => self.open(alert_container(kind)),
            Tag::BlockQuote(None) => self.open(Element::new("blockquote")),
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => fence_language(&info),
                    CodeBlockKind::Indented => None,
                };
                self.code.start(language);
            }
            Tag::HtmlBlock => self.html_block = Some(String::new()),
            Tag::List(Some(start)) => {
                let mut list = Element::new("ol");
                if start != 1 {
                    list.attrs.set("start", start.to_string());
                }
                self.open(list);
            }
            Tag::List(None) => self.open(Element::new("ul")),
            Tag::Item => self.open(Element::new("li")),
            Tag::FootnoteDefinition(label) => self.stack.push(Frame {
                element: Element::new("li"),
                origin: Origin::Footnote(label.into_string()),
            }),
            Tag::DefinitionList => self.open(Element::new("dl")),
            Tag::DefinitionListTitle => self.open(Element::new("dt")),
            Tag::DefinitionListDefinition => self.open(Element::new("dd")),
            Tag::Table(alignments) => {
                self.table.start(alignments);
                self.open(Element::new("table"));
            }
            Tag::TableHead => {
                self.table.start_head();
                self.open(Element::new("thead"));
                self.open(Element::new("tr"));
            }
            Tag::TableRow => {
                if self.table.start_row() {
                    self.open(Element::new("tbody"));
                }
                self.open(Element::new("tr"));
            }
            Tag::TableCell => {
                let mut cell = Element::new(if self.table.is_in_head() { "th" } else { "td" });
                if let Some(align) = self.table.current_alignment() {
                    cell.attrs.set("align", align);
                }
                self.open(cell);
            }
            Tag::Emphasis => self.open(Element::new("em")),
            Tag::Strong => self.open(Element::new("strong")),
            Tag::Strikethrough => self.open(Element::new("del")),
            Tag::Superscript => self.open(Element::new("sup")),
            Tag::Subscript => self.open(Element::new("sub")),
            Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            } => {
                let href = if link_type == LinkType::Email {
                    format!("mailto:{dest_url}")
                } else {
                    dest_url.into_string()
                };
                let mut link = Element::new("a").with_attr("href", href);
                if !title.is_empty() {
                    link.attrs.set("title", title.into_string());
                }
                self.open(link);
            }
            Tag::Image {
                dest_url, title, ..
            } => self.image.start(dest_url.into_string(), title.into_string()),
            Tag::MetadataBlock(kind) => {
                let kind = match kind {
                    MetadataBlockKind::YamlStyle => FrontmatterKind::Yaml,
                    MetadataBlockKind::PlusesStyle => FrontmatterKind::Toml,
                };
                self.metadata = Some((kind, String::new()));
            }
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        if self.image.is_active() && tag != TagEnd::Image {
            return;
        }
        if matches!(
            tag,
            TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::TableCell | TagEnd::Item
        ) {
            self.raw_text = None;
        }

        match tag {
            TagEnd::CodeBlock => self.code_block(),
            TagEnd::HtmlBlock => {
                if let Some(html) = self.html_block.take() {
                    self.raw_html(&html);
                }
            }
            TagEnd::FootnoteDefinition => {
                if let Some(Frame {
                    element,
                    origin: Origin::Footnote(label),
                }) = self.close_frame()
                {
                    self.footnotes.define(&label, element.children);
                }
            }
            TagEnd::TableHead => {
                self.close_and_append(); // tr
                self.close_and_append(); // thead
                self.table.end_head();
            }
            TagEnd::Table => {
                if self.table.has_body() {
                    self.close_and_append();
                }
                self.close_and_append();
            }
            TagEnd::TableCell => {
                self.close_and_append();
                self.table.next_cell();
            }
            TagEnd::Image => {
                if let Some((src, title, alt)) = self.image.end() {
                    let mut img = Element::new("img").with_attr("src", src).with_attr("alt", alt);
                    if !title.is_empty() {
                        img.attrs.set("title", title);
                    }
                    self.append(img.into());
                }
            }
            TagEnd::MetadataBlock(_) => {
                if let Some((kind, source)) = self.metadata.take() {
                    self.frontmatter = Some(Frontmatter { kind, source });
                }
            }
            TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::BlockQuote(_)
            | TagEnd::List(_)
            | TagEnd::Item
            | TagEnd::DefinitionList
            | TagEnd::DefinitionListTitle
            | TagEnd::DefinitionListDefinition
            | TagEnd::TableRow
            | TagEnd::Emphasis
            | TagEnd::Strong
            | TagEnd::Strikethrough
            | TagEnd::Superscript
            | TagEnd::Subscript
            | TagEnd::Link => self.close_and_append(),
        }
    }

    fn text(&mut self, text: &str) {
        // Priority: code > metadata > skipped raw text > image > normal text
        if self.code.is_active() {
            self.code.push_str(text);
        } else if let Some((_, source)) = &mut self.metadata {
            source.push_str(text);
        } else if self.raw_text.is_some() {
            // Script or style body
        } else if self.image.is_active() {
            self.image.push_str(text);
        } else {
            self.append(Node::text(text));
        }
    }

    fn inline_code(&mut self, code: &str) {
        if self.image.is_active() {
            self.image.push_str(code);
        } else {
            self.append(Element::new("code").with_text(code).into());
        }
    }

    fn math(&mut self, tex: &str, display: bool) {
        if self.image.is_active() {
            self.image.push_str(tex);
            return;
        }
        self.has_math = true;
        let node = self.math.render(tex, display);
        self.append(node);
    }

    fn soft_break(&mut self) {
        if self.image.is_active() {
            self.image.push_str(" ");
        } else {
            self.append(Node::text("\n"));
        }
    }

    fn hard_break(&mut self) {
        if self.image.is_active() {
            self.image.push_str(" ");
            return;
        }
        self.append(Element::new("br").into());
        self.append(Node::text("\n"));
    }

    fn task_list_marker(&mut self, checked: bool) {
        if let Some(index) = self.stack.iter().rposition(|f| f.element.is("li")) {
            self.stack[index].element.add_class("task-list-item");
            if let Some(list) = index.checked_sub(1).map(|i| &mut self.stack[i].element) {
                list.add_class("contains-task-list");
            }
        }
        let mut input = Element::new("input").with_attr("type", "checkbox");
        if checked {
            input.attrs.set("checked", "");
        }
        input.attrs.set("disabled", "");
        self.append(input.into());
        self.append(Node::text(" "));
    }

    fn footnote_reference(&mut self, label: &str) {
        let (number, occurrence) = self.footnotes.reference(label);
        let slug = label_slug(label);
        let id = if occurrence == 1 {
            format!("{CLOBBER_PREFIX}fnref-{slug}")
        } else {
            format!("{CLOBBER_PREFIX}fnref-{slug}-{occurrence}")
        };
        let link = Element::new("a")
            .with_attr("href", format!("#{CLOBBER_PREFIX}fn-{slug}"))
            .with_attr("id", id)
            .with_attr("data-footnote-ref", "")
            .with_attr("aria-describedby", format!("{CLOBBER_PREFIX}footnote-label"))
            .with_text(number.to_string());
        self.append(Element::new("sup").with_child(link).into());
    }

    fn code_block(&mut self) {
        let (language, content) = self.code.end();
        let mut code = Element::new("code");
        let mut body = None;
        if let Some(language) = language {
            code.add_class(format!("language-{language}"));
            body = self.highlighter.highlight(&content, &language);
            if body.is_some() {
                code.add_class("hljs");
            }
        }
        match body {
            Some(nodes) => code.children = nodes,
            None if !content.is_empty() => code.children.push(Node::Text(content)),
            None => {}
        }
        self.append(Element::new("pre").with_child(code).into());
    }

    fn raw_html(&mut self, html: &str) {
        if let Some(block) = &mut self.html_block {
            block.push_str(html);
            return;
        }
        if let Some(tag) = &self.raw_text {
            if html.to_ascii_lowercase().contains(&format!("</{tag}")) {
                self.raw_text = None;
            }
            return;
        }
        if self.image.is_active() {
            return;
        }
        self.raw_text = unclosed_raw_text(html);
        match self.html.tokenize(html) {
            Ok(tokens) => {
                for token in tokens {
                    self.raw_token(token);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable raw HTML kept as text");
                self.append(Node::text(html));
            }
        }
    }

    fn raw_token(&mut self, token: Token) {
        match token {
            Token::Open {
                tag,
                attrs,
                self_closing,
            } => {
                let element = Element {
                    tag,
                    attrs,
                    children: Vec::new(),
                };
                if self_closing {
                    self.append(element.into());
                } else {
                    self.stack.push(Frame {
                        element,
                        origin: Origin::Raw,
                    });
                }
            }
            Token::Close { tag } => {
                // Raw end tags only reach raw elements above the innermost
                // markdown element
                let depth = self
                    .stack
                    .iter()
                    .rev()
                    .take_while(|f| matches!(f.origin, Origin::Raw))
                    .position(|f| f.element.tag == tag);
                if let Some(depth) = depth {
                    for _ in 0..=depth {
                        self.close_raw();
                    }
                }
            }
            Token::Text(text) => self.append(Node::Text(text)),
        }
    }

    fn open(&mut self, element: Element) {
        self.stack.push(Frame {
            element,
            origin: Origin::Markdown,
        });
    }

    /// Close raw elements still open on top, then pop the innermost
    /// markdown frame.
    fn close_frame(&mut self) -> Option<Frame> {
        while matches!(self.stack.last(), Some(f) if matches!(f.origin, Origin::Raw)) {
            self.close_raw();
        }
        self.stack.pop()
    }

    fn close_and_append(&mut self) {
        if let Some(frame) = self.close_frame() {
            self.append(frame.element.into());
        }
    }

    fn close_raw(&mut self) {
        if let Some(frame) = self.stack.pop() {
            self.append(frame.element.into());
        }
    }

    fn append(&mut self, node: Node) {
        let children = match self.stack.last_mut() {
            Some(frame) => &mut frame.element.children,
            // Whitespace between top-level blocks is insignificant
            None if node.is_whitespace_text() => return,
            None => &mut self.root,
        };
        match (children.last_mut(), node) {
            (_, Node::Text(text)) if text.is_empty() => {}
            (Some(Node::Text(last)), Node::Text(text)) => last.push_str(&text),
            (_, node) => children.push(node),
        }
    }

    fn finish(mut self, footnote_label: &str) -> Document {
        while let Some(frame) = self.stack.pop() {
            match frame.origin {
                Origin::Footnote(label) => self.footnotes.define(&label, frame.element.children),
                Origin::Markdown | Origin::Raw => self.append(frame.element.into()),
            }
        }

        let definitions = self.footnotes.take_referenced();
        if !definitions.is_empty() {
            self.root.push(footnote_section(definitions, footnote_label).into());
        }

        Document {
            nodes: self.root,
            frontmatter: self.frontmatter,
            has_math: self.has_math,
        }
    }
}

fn footnote_section(definitions: Vec<(String, usize, Vec<Node>)>, label: &str) -> Element {
    let mut list = Element::new("ol");
    for (name, number, mut children) in definitions {
        let slug = label_slug(&name);
        let backref = Element::new("a")
            .with_attr("href", format!("#{CLOBBER_PREFIX}fnref-{slug}"))
            .with_attr("data-footnote-backref", "")
            .with_attr("aria-label", format!("Back to reference {number}"))
            .with_class("data-footnote-backref")
            .with_text("\u{21a9}");
        // The back-reference joins the trailing paragraph when there is one
        match children.last_mut().and_then(Node::as_element_mut) {
            Some(p) if p.is("p") => {
                p.children.push(Node::text(" "));
                p.children.push(backref.into());
            }
            _ => children.push(backref.into()),
        }
        list.children.push(
            Element::new("li")
                .with_attr("id", format!("{CLOBBER_PREFIX}fn-{slug}"))
                .with_children(children)
                .into(),
        );
    }

    Element::new("section")
        .with_class("footnotes")
        .with_attr("data-footnotes", "")
        .with_child(
            Element::new("h2")
                .with_class("sr-only")
                .with_attr("id", format!("{CLOBBER_PREFIX}footnote-label"))
                .with_text(label),
        )
        .with_child(list)
}

/// Name of a script/style element opened but not closed in `html`.
fn unclosed_raw_text(html: &str) -> Option<String> {
    let open = RAW_TEXT_OPEN.captures_iter(html).last()?;
    let tag = open[1].to_ascii_lowercase();
    let rest = html[open.get(0)?.end()..].to_ascii_lowercase();
    (!rest.contains(&format!("</{tag}"))).then_some(tag)
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

/// Language token of a fence info string (` ```rust,ignore title=x `).
fn fence_language(info: &str) -> Option<String> {
    info.split(|c: char| c.is_whitespace() || c == ',' || c == '{')
        .next()
        .filter(|lang| !lang.is_empty())
        .map(str::to_owned)
}
