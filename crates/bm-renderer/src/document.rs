//! Parsed document passed between stages.

use bm_tree::{Node, to_html};

/// Syntax of a leading metadata block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrontmatterKind {
    /// `---` delimited YAML.
    Yaml,
    /// `+++` delimited TOML.
    Toml,
}

impl FrontmatterKind {
    /// Language name used for the fallback code block.
    #[must_use]
    pub fn language(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Toml => "toml",
        }
    }
}

/// Raw metadata block found at the start of the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frontmatter {
    pub kind: FrontmatterKind,
    pub source: String,
}

/// Document tree plus the facts stages need about it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    /// Top-level nodes in document order.
    pub nodes: Vec<Node>,
    /// Leading metadata block, not yet part of `nodes`.
    pub frontmatter: Option<Frontmatter>,
    /// Whether any math was rendered.
    pub has_math: bool,
}

impl Document {
    /// Serialize the tree.
    #[must_use]
    pub fn to_html(&self) -> String {
        to_html(&self.nodes)
    }
}
