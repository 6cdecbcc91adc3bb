//! State structs tracking context while folding parser events into a tree.

use std::collections::HashMap;

use bm_tree::Node;
use pulldown_cmark::Alignment;

/// State for tracking code block content.
#[derive(Default)]
pub struct CodeBlockState {
    /// Whether we're inside a code block.
    active: bool,
    /// Language of current code block (e.g., "rust", "python").
    language: Option<String>,
    /// Buffer for code block content.
    buffer: String,
}

impl CodeBlockState {
    /// Start a new code block with optional language.
    pub fn start(&mut self, language: Option<String>) {
        self.active = true;
        self.language = language;
        self.buffer.clear();
    }

    /// End the current code block and return (language, content).
    pub fn end(&mut self) -> (Option<String>, String) {
        self.active = false;
        (self.language.take(), std::mem::take(&mut self.buffer))
    }

    /// Check if we're inside a code block.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Append text to the code block buffer.
    pub fn push_str(&mut self, text: &str) {
        self.buffer.push_str(text);
    }
}

/// State for tracking table structure.
#[derive(Default)]
pub struct TableState {
    /// Whether we're inside the table header row.
    in_head: bool,
    /// Whether a `tbody` has been opened for the current table.
    has_body: bool,
    /// Column alignments for current table.
    alignments: Vec<Alignment>,
    /// Current column index in table row.
    cell_index: usize,
}

impl TableState {
    /// Start a new table with column alignments.
    pub fn start(&mut self, alignments: Vec<Alignment>) {
        self.alignments = alignments;
        self.in_head = false;
        self.has_body = false;
        self.cell_index = 0;
    }

    /// Start the table header row.
    pub fn start_head(&mut self) {
        self.in_head = true;
        self.cell_index = 0;
    }

    /// End the table header row.
    pub fn end_head(&mut self) {
        self.in_head = false;
    }

    /// Start a body row. Returns `true` if this is the first one.
    pub fn start_row(&mut self) -> bool {
        self.cell_index = 0;
        !std::mem::replace(&mut self.has_body, true)
    }

    /// Whether body rows were seen.
    pub fn has_body(&self) -> bool {
        self.has_body
    }

    /// Move to the next cell.
    pub fn next_cell(&mut self) {
        self.cell_index += 1;
    }

    /// Check if we're in the table header.
    pub fn is_in_head(&self) -> bool {
        self.in_head
    }

    /// Get the `align` attribute value for the current cell.
    pub fn current_alignment(&self) -> Option<&'static str> {
        match self.alignments.get(self.cell_index) {
            Some(Alignment::Left) => Some("left"),
            Some(Alignment::Center) => Some("center"),
            Some(Alignment::Right) => Some("right"),
            Some(Alignment::None) | None => None,
        }
    }
}

/// State for tracking image alt text capture.
#[derive(Default)]
pub struct ImageState {
    /// Nesting depth; images inside alt text are flattened.
    depth: usize,
    /// Buffer for alt text.
    alt_text: String,
    /// Pending image data (src, title) waiting for alt text.
    pending: Option<(String, String)>,
}

impl ImageState {
    /// Start capturing image alt text.
    pub fn start(&mut self, src: String, title: String) {
        if self.depth == 0 {
            self.alt_text.clear();
            self.pending = Some((src, title));
        }
        self.depth += 1;
    }

    /// End an image. Returns `(src, title, alt)` when the outermost one
    /// closes.
    pub fn end(&mut self) -> Option<(String, String, String)> {
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 {
            return None;
        }
        let (src, title) = self.pending.take()?;
        Some((src, title, std::mem::take(&mut self.alt_text)))
    }

    /// Check if we're inside an image.
    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    /// Append text to the alt text buffer.
    pub fn push_str(&mut self, text: &str) {
        self.alt_text.push_str(text);
    }
}

/// GFM footnote references and definitions.
///
/// Definitions are collected out of band and emitted as a trailing section
/// in order of first reference. Unreferenced definitions are dropped.
#[derive(Default)]
pub struct FootnoteState {
    /// Labels in order of first reference.
    order: Vec<String>,
    /// Reference count per label.
    refs: HashMap<String, usize>,
    /// Finished definitions by label.
    definitions: HashMap<String, Vec<Node>>,
}

impl FootnoteState {
    /// Record a reference. Returns `(number, occurrence)`, both 1-based.
    pub fn reference(&mut self, label: &str) -> (usize, usize) {
        let label = normalize_label(label);
        let count = self.refs.entry(label.clone()).or_default();
        *count += 1;
        let occurrence = *count;
        let number = match self.order.iter().position(|l| *l == label) {
            Some(index) => index + 1,
            None => {
                self.order.push(label);
                self.order.len()
            }
        };
        (number, occurrence)
    }

    /// Store a finished definition. The first definition of a label wins.
    pub fn define(&mut self, label: &str, children: Vec<Node>) {
        self.definitions
            .entry(normalize_label(label))
            .or_insert(children);
    }

    /// Referenced definitions in reference order: `(label, number, children)`.
    pub fn take_referenced(&mut self) -> Vec<(String, usize, Vec<Node>)> {
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .enumerate()
            .filter_map(|(index, label)| {
                let children = self.definitions.remove(&label)?;
                Some((label, index + 1, children))
            })
            .collect()
    }
}

/// Footnote labels match case-insensitively.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Turn a footnote label into an id-safe slug.
pub fn label_slug(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for c in normalize_label(label).chars() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug
}
