//! Markdown to paste-ready HTML for rich-text publishing platforms.
//!
//! One parsed document is rewritten differently per destination: WeChat
//! strips foreign links and collapses whitespace, Zhihu drops form
//! controls, Juejin and plain HTML take the common output.
//!
//! # Architecture
//!
//! The [`Renderer`] runs a fixed sequence over a [`Document`] tree:
//! - [`MarkdownParser`]: `pulldown-cmark` events folded into a `bm-tree`
//!   node tree, with pluggable [`CodeHighlighter`] and [`MathRenderer`]
//! - [`Sanitizer`]: allow-list filter for tags, attributes and URL schemes
//! - normalizers: [`FrontmatterTable`], [`ExternalLinks`], [`FigureWrapper`],
//!   [`ListItemUnwrap`]
//! - the platform's [`PlatformAdapter`] stages
//! - [`FootnoteRewriter`] for link footnotes, when enabled and allowed
//! - serialization, then CSS inlining through `bm-style`
//!
//! Every rewrite is a [`Stage`]; adapters are ordered lists of stages.
//!
//! # Example
//!
//! ```
//! use bm_renderer::{Platform, RenderRequest, Renderer};
//!
//! let renderer = Renderer::new();
//! let request = RenderRequest::new("[a](https://x.test) and [b](https://x.test)")
//!     .with_new_window(false);
//! let html = renderer.render(&request).unwrap();
//! assert_eq!(html.matches("[1]").count(), 2);
//!
//! let wechat = renderer
//!     .render(&request.clone().with_platform(Platform::Wechat))
//!     .unwrap();
//! assert!(!wechat.contains("href=\"https://x.test\""));
//! ```

mod adapters;
mod alerts;
mod document;
mod error;
mod highlight;
mod markdown;
mod math;
mod pipeline;
mod request;
mod sanitize;
mod stages;
mod state;

pub use adapters::{AdapterTable, PlatformAdapter, WECHAT_ALLOWED_HOSTS};
pub use document::{Document, Frontmatter, FrontmatterKind};
pub use error::{ParseError, RenderError, StageError};
pub use highlight::{CodeHighlighter, NoHighlighter, SyntectHighlighter};
pub use markdown::MarkdownParser;
pub use math::{MathRenderer, SourceMathRenderer};
pub use pipeline::{PipelineState, RenderOutput, Renderer, render};
pub use request::{MAX_INPUT_SIZE, Platform, RenderRequest, UnknownPlatform};
pub use sanitize::{SanitizePolicy, Sanitizer};
pub use stages::{
    CodeWhitespace, ExternalLinks, FigureWrapper, FootnoteLink, FootnoteRewriter,
    FrontmatterTable, LinkIndex, ListItemUnwrap, ReferenceStyle, Stage, StageContext,
    TaskListGlyphs, UnwrapScope,
};

pub use bm_style::InlineOutcome;
