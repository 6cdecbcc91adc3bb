//! Render pipeline orchestrator.
//!
//! A render runs strictly in order: parse, sanitize, normalize, platform
//! adapter, link footnotes, stringify, style. Each step is logged as a
//! [`PipelineState`] transition. Recoverable problems become warnings on
//! the [`RenderOutput`]; anything else (including a panic inside a stage)
//! moves the run to [`PipelineState::Failed`] and returns a single
//! [`RenderError`].

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;
use std::time::Instant;

use bm_style::{InlineOutcome, StyleResolver, StyleSelection, apply_styles};

use crate::adapters::AdapterTable;
use crate::document::Document;
use crate::error::{ParseError, RenderError};
use crate::markdown::MarkdownParser;
use crate::request::{MAX_INPUT_SIZE, RenderRequest};
use crate::sanitize::Sanitizer;
use crate::stages::{
    ExternalLinks, FigureWrapper, FootnoteRewriter, FrontmatterTable, ListItemUnwrap, Stage,
    StageContext, UnwrapScope,
};

/// Position of a render run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Parsed,
    Sanitized,
    Normalized,
    Adapted,
    Footnoted,
    Stringified,
    Styled,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Parsed => "parsed",
            Self::Sanitized => "sanitized",
            Self::Normalized => "normalized",
            Self::Adapted => "adapted",
            Self::Footnoted => "footnoted",
            Self::Stringified => "stringified",
            Self::Styled => "styled",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful render.
#[derive(Clone, Debug)]
pub struct RenderOutput {
    /// Final HTML fragment.
    pub html: String,
    /// Whether styles were inlined, skipped, or fell back.
    pub inlined: InlineOutcome,
    /// Recovered stage problems, as `stage: message`.
    pub warnings: Vec<String>,
}

/// Markdown to HTML renderer.
///
/// Holds everything shared between calls: the parser and its code and math
/// renderers, the sanitizer, the platform adapter table and the stylesheet
/// cache. All of it is read-only during a render, so one renderer can serve
/// concurrent calls.
pub struct Renderer {
    parser: MarkdownParser,
    sanitizer: Sanitizer,
    normalizers: Vec<Box<dyn Stage>>,
    adapters: AdapterTable,
    footnotes: FootnoteRewriter,
    styles: StyleResolver,
    max_input_size: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// Create a renderer with built-in themes and default adapters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parser: MarkdownParser::new(),
            sanitizer: Sanitizer::default(),
            normalizers: vec![
                Box::new(FrontmatterTable),
                Box::new(ExternalLinks),
                Box::new(FigureWrapper),
                Box::new(ListItemUnwrap::new(UnwrapScope::SoleParagraph)),
            ],
            adapters: AdapterTable::new(),
            footnotes: FootnoteRewriter::linked(),
            styles: StyleResolver::new(),
            max_input_size: MAX_INPUT_SIZE,
        }
    }

    /// Use a custom markdown parser.
    #[must_use]
    pub fn parser(mut self, parser: MarkdownParser) -> Self {
        self.parser = parser;
        self
    }

    /// Use a custom sanitizer.
    #[must_use]
    pub fn sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Set hosts whose links survive the WeChat adapter.
    #[must_use]
    pub fn allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.adapters = AdapterTable::with_allowed_hosts(hosts);
        self
    }

    /// Use a custom style resolver.
    #[must_use]
    pub fn styles(mut self, styles: StyleResolver) -> Self {
        self.styles = styles;
        self
    }

    /// Set the input size cap in bytes.
    #[must_use]
    pub fn max_input_size(mut self, limit: usize) -> Self {
        self.max_input_size = limit;
        self
    }

    /// The style resolver, for listing available themes.
    #[must_use]
    pub fn style_resolver(&self) -> &StyleResolver {
        &self.styles
    }

    /// The platform adapter table.
    #[must_use]
    pub fn adapters(&self) -> &AdapterTable {
        &self.adapters
    }

    /// Render a request to an HTML string.
    pub fn render(&self, request: &RenderRequest) -> Result<String, RenderError> {
        self.render_detailed(request).map(|output| output.html)
    }

    /// Render UTF-8 bytes with the options of `request`.
    ///
    /// The size cap is checked before decoding.
    pub fn render_bytes(
        &self,
        markdown: &[u8],
        mut request: RenderRequest,
    ) -> Result<RenderOutput, RenderError> {
        self.check_size(markdown.len())?;
        request.markdown = std::str::from_utf8(markdown)
            .map_err(ParseError::from)?
            .to_owned();
        self.render_detailed(&request)
    }

    /// Render a request, reporting warnings and the inlining outcome.
    pub fn render_detailed(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        self.check_size(request.markdown.len())?;

        let mut run = Run::new(request);
        match self.execute(request, &mut run) {
            Ok(output) => {
                run.advance(PipelineState::Done);
                Ok(output)
            }
            Err(e) => {
                run.fail(&e);
                Err(e)
            }
        }
    }

    fn check_size(&self, size: usize) -> Result<(), RenderError> {
        if size > self.max_input_size {
            return Err(RenderError::InputTooLarge {
                size,
                limit: self.max_input_size,
            });
        }
        Ok(())
    }

    fn execute(&self, request: &RenderRequest, run: &mut Run) -> Result<RenderOutput, RenderError> {
        let mut doc = guarded("parse", || {
            Ok(self.parser.parse(&request.markdown, &request.footnote_label))
        })?;
        run.advance(PipelineState::Parsed);

        let mut ctx = StageContext::new(request, &self.parser, &self.sanitizer);

        run_stage(&self.sanitizer, &mut doc, &mut ctx)?;
        run.advance(PipelineState::Sanitized);

        for stage in &self.normalizers {
            run_stage(stage.as_ref(), &mut doc, &mut ctx)?;
        }
        run.advance(PipelineState::Normalized);

        for stage in self.adapters.stages(request.platform) {
            run_stage(stage.as_ref(), &mut doc, &mut ctx)?;
        }
        run.advance(PipelineState::Adapted);

        if request.enable_footnote_links && request.platform.allows_footnote_links() {
            run_stage(&self.footnotes, &mut doc, &mut ctx)?;
        } else {
            tracing::debug!(platform = %request.platform, "Skipping link footnotes");
        }
        run.advance(PipelineState::Footnoted);

        let html = guarded("stringify", || Ok(doc.to_html()))?;
        run.advance(PipelineState::Stringified);

        let (html, inlined) = self.style(&html, request, doc.has_math);
        run.advance(PipelineState::Styled);

        Ok(RenderOutput {
            html,
            inlined,
            warnings: ctx.into_warnings(),
        })
    }

    /// Inline the requested styles, or return `html` untouched when nothing
    /// was requested and no math was rendered.
    fn style(&self, html: &str, request: &RenderRequest, has_math: bool) -> (String, InlineOutcome) {
        let requested = [&request.markdown_style, &request.code_theme, &request.custom_css]
            .into_iter()
            .any(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()));
        if !requested && !has_math {
            return (html.to_owned(), InlineOutcome::Skipped);
        }

        let styles = self.styles.resolve(&StyleSelection {
            markdown_style: request.markdown_style.as_deref(),
            code_theme: request.code_theme.as_deref(),
            custom_css: request.custom_css.as_deref(),
            math: has_math,
        });
        let styled = apply_styles(html, &styles);
        (styled.html, styled.outcome)
    }
}

/// Render with a process-wide default [`Renderer`].
pub fn render(request: &RenderRequest) -> Result<String, RenderError> {
    static DEFAULT: LazyLock<Renderer> = LazyLock::new(Renderer::new);
    DEFAULT.render(request)
}

/// State tracker for one render call.
struct Run {
    state: PipelineState,
    started: Instant,
    platform: String,
}

impl Run {
    fn new(request: &RenderRequest) -> Self {
        Self {
            state: PipelineState::Idle,
            started: Instant::now(),
            platform: request.platform.to_string(),
        }
    }

    fn advance(&mut self, next: PipelineState) {
        tracing::debug!(
            platform = %self.platform,
            from = %self.state,
            to = %next,
            elapsed_us = self.started.elapsed().as_micros(),
            "Pipeline transition"
        );
        self.state = next;
    }

    fn fail(&mut self, error: &RenderError) {
        tracing::warn!(platform = %self.platform, state = %self.state, error = %error, "Render failed");
        self.state = PipelineState::Failed;
    }
}

fn run_stage(
    stage: &dyn Stage,
    doc: &mut Document,
    ctx: &mut StageContext<'_>,
) -> Result<(), RenderError> {
    let started = Instant::now();
    let result = guarded(stage.name(), || stage.apply(doc, ctx));
    tracing::debug!(
        stage = stage.name(),
        elapsed_us = started.elapsed().as_micros(),
        "Stage finished"
    );
    result
}

/// Run `f`, turning a panic into [`RenderError::Pipeline`].
fn guarded<T>(
    stage: &'static str,
    f: impl FnOnce() -> Result<T, RenderError>,
) -> Result<T, RenderError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(RenderError::Pipeline {
            stage,
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::request::Platform;

    struct Explode;

    impl Stage for Explode {
        fn name(&self) -> &'static str {
            "explode"
        }

        fn apply(&self, _doc: &mut Document, _ctx: &mut StageContext<'_>) -> Result<(), RenderError> {
            panic!("boom")
        }
    }

    #[test]
    fn test_plain_render_skips_styles() {
        let output = Renderer::new()
            .render_detailed(&RenderRequest::new("Hello *world*"))
            .unwrap();
        assert_eq!(output.html, "<p>Hello <em>world</em></p>");
        assert_eq!(output.inlined, InlineOutcome::Skipped);
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_size_cap_checked_before_parsing() {
        let renderer = Renderer::new().max_input_size(4);
        let err = renderer.render(&RenderRequest::new("12345")).unwrap_err();
        assert!(matches!(err, RenderError::InputTooLarge { size: 5, limit: 4 }));
    }

    #[test]
    fn test_render_bytes_rejects_invalid_utf8() {
        let err = Renderer::new()
            .render_bytes(&[0x66, 0xff, 0x6f], RenderRequest::default())
            .unwrap_err();
        assert!(matches!(err, RenderError::Parse(ParseError::Encoding(_))));
    }

    #[test]
    fn test_render_bytes_uses_request_options() {
        let output = Renderer::new()
            .render_bytes(
                b"[a](https://x.test)",
                RenderRequest::default().with_footnote_links(false).with_new_window(false),
            )
            .unwrap();
        assert_eq!(output.html, r#"<p><a href="https://x.test">a</a></p>"#);
    }

    #[test]
    fn test_panicking_stage_becomes_pipeline_error() {
        let mut renderer = Renderer::new();
        renderer.normalizers.push(Box::new(Explode));
        let err = renderer.render(&RenderRequest::new("x")).unwrap_err();
        match err {
            RenderError::Pipeline { stage, message } => {
                assert_eq!(stage, "explode");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_footnotes_skipped_for_wechat_generic_rewriter() {
        let html = Renderer::new()
            .render(&RenderRequest::new("[a](https://x.test)").with_platform(Platform::Wechat))
            .unwrap();
        assert!(!html.contains("footnote-links"));
        assert!(html.contains(r#"<section class="footnotes" data-footnotes="">"#));
    }

    #[test]
    fn test_math_triggers_styling() {
        let output = Renderer::new()
            .render_detailed(&RenderRequest::new("$x$"))
            .unwrap();
        assert_eq!(output.inlined, InlineOutcome::Inlined);
        assert!(output.html.starts_with(r#"<section id="bm-md""#));
    }

    #[test]
    fn test_unknown_theme_only_is_wrapped_without_styles() {
        let output = Renderer::new()
            .render_detailed(&RenderRequest::new("x").with_markdown_style("missing"))
            .unwrap();
        assert_eq!(output.inlined, InlineOutcome::Skipped);
        assert_eq!(output.html, "<p>x</p>");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Footnoted.to_string(), "footnoted");
    }
}
