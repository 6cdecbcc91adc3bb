//! Tree rewrite stages.
//!
//! Each stage is a value implementing [`Stage`]; platform adapters are
//! ordered lists of them. Stages mutate the document in place and report
//! recoverable problems through [`StageContext::warn`].

mod code_whitespace;
mod external_links;
mod figure;
mod footnotes;
mod frontmatter;
mod lists;
mod task_list;

use std::fmt;

pub use code_whitespace::CodeWhitespace;
pub use external_links::ExternalLinks;
pub use figure::FigureWrapper;
pub use footnotes::{FootnoteLink, FootnoteRewriter, LinkIndex, ReferenceStyle};
pub use frontmatter::FrontmatterTable;
pub use lists::{ListItemUnwrap, UnwrapScope};
pub use task_list::TaskListGlyphs;

use crate::document::Document;
use crate::error::RenderError;
use crate::markdown::MarkdownParser;
use crate::request::RenderRequest;
use crate::sanitize::Sanitizer;

/// A single tree rewrite.
///
/// # Example
///
/// ```
/// use bm_renderer::{Document, RenderError, Stage, StageContext};
/// use bm_tree::for_each_element_mut;
///
/// struct DropTitles;
///
/// impl Stage for DropTitles {
///     fn name(&self) -> &'static str {
///         "drop-titles"
///     }
///
///     fn apply(&self, doc: &mut Document, _ctx: &mut StageContext<'_>) -> Result<(), RenderError> {
///         for_each_element_mut(&mut doc.nodes, &mut |el| {
///             el.attrs.remove("title");
///         });
///         Ok(())
///     }
/// }
/// ```
pub trait Stage: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Rewrite the document.
    ///
    /// Problems confined to one node should be recovered from and reported
    /// with [`StageContext::warn`]; an `Err` aborts the render.
    fn apply(&self, doc: &mut Document, ctx: &mut StageContext<'_>) -> Result<(), RenderError>;
}

/// Per-call context shared by all stages of one render.
pub struct StageContext<'a> {
    /// The request being rendered.
    pub request: &'a RenderRequest,
    /// Parser for markdown fragments produced by stages.
    pub parser: &'a MarkdownParser,
    /// Sanitizer for nodes created from user content after sanitizing.
    pub sanitizer: &'a Sanitizer,
    warnings: Vec<String>,
}

impl<'a> StageContext<'a> {
    #[must_use]
    pub fn new(
        request: &'a RenderRequest,
        parser: &'a MarkdownParser,
        sanitizer: &'a Sanitizer,
    ) -> Self {
        Self {
            request,
            parser,
            sanitizer,
            warnings: Vec::new(),
        }
    }

    /// Log and record a recovered problem.
    pub fn warn(&mut self, stage: &str, message: impl fmt::Display) {
        tracing::warn!(stage, "{message}");
        self.warnings.push(format!("{stage}: {message}"));
    }

    /// Warnings recorded so far.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Take ownership of the recorded warnings.
    #[must_use]
    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use bm_tree::{parse_fragment, to_html};

    use super::*;
    use crate::highlight::NoHighlighter;
    use crate::math::SourceMathRenderer;

    /// Run `stage` over an HTML fragment and serialize the result.
    pub fn run(stage: &dyn Stage, html: &str, request: &RenderRequest) -> (String, Vec<String>) {
        let parser =
            MarkdownParser::with_renderers(Box::new(NoHighlighter), Box::new(SourceMathRenderer));
        let sanitizer = Sanitizer::default();
        let mut ctx = StageContext::new(request, &parser, &sanitizer);
        let mut doc = Document {
            nodes: parse_fragment(html).unwrap(),
            ..Document::default()
        };
        stage.apply(&mut doc, &mut ctx).unwrap();
        (to_html(&doc.nodes), ctx.into_warnings())
    }

    /// Run `stage` with a default request.
    pub fn apply(stage: &dyn Stage, html: &str) -> String {
        run(stage, html, &RenderRequest::default()).0
    }
}
