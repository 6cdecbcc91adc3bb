//! `bm render` command implementation.

use std::path::{Path, PathBuf};

use bm_config::{CliSettings, Config};
use bm_renderer::{InlineOutcome, Platform, RenderOutput, RenderRequest, Renderer};
use bm_style::StyleResolver;
use clap::Args;
use rayon::prelude::*;

use super::read_input_bytes;
use crate::error::CliError;
use crate::output::{Output, write_document};

/// Platform value that renders every target.
const ALL_PLATFORMS: &str = "all";

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Markdown file (default: read stdin).
    file: Option<PathBuf>,

    /// Target platform: html, wechat, zhihu, juejin, or all (overrides config).
    #[arg(short, long)]
    platform: Option<String>,

    /// Typography theme id (overrides config).
    #[arg(short, long)]
    style: Option<String>,

    /// Syntax highlight theme id (overrides config).
    #[arg(long)]
    code_theme: Option<String>,

    /// Custom CSS file appended after the themes (overrides config).
    #[arg(long, value_name = "FILE")]
    css: Option<PathBuf>,

    /// Do not collect links into a reference list.
    #[arg(long)]
    no_footnotes: bool,

    /// Do not add `target="_blank"` to external links.
    #[arg(long)]
    same_window: bool,

    /// Write HTML to a file instead of stdout. With `--platform all`, one
    /// file per platform is written next to it as `<stem>.<platform>.<ext>`.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover bm.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Which platforms one invocation renders.
#[derive(Debug, PartialEq, Eq)]
enum Targets {
    One(Platform),
    All,
}

impl RenderArgs {
    /// Execute the render command.
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let all = self
            .platform
            .as_deref()
            .is_some_and(|p| p.trim().eq_ignore_ascii_case(ALL_PLATFORMS));

        let cli_settings = CliSettings {
            markdown_style: self.style.clone(),
            code_theme: self.code_theme.clone(),
            custom_css: self.css.clone(),
            platform: if all { None } else { self.platform.clone() },
            enable_footnote_links: self.no_footnotes.then_some(false),
            open_links_in_new_window: self.same_window.then_some(false),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let targets = if all {
            Targets::All
        } else {
            Targets::One(config.render.platform.parse()?)
        };

        let renderer = build_renderer(&config);
        let request = build_request(&config)?;
        let markdown = read_input_bytes(self.file.as_deref())?;

        match targets {
            Targets::One(platform) => {
                let rendered = renderer.render_bytes(&markdown, request.with_platform(platform))?;
                report(output, platform, &rendered);
                write_document(self.output.as_deref(), &rendered.html)?;
            }
            Targets::All => {
                let rendered = render_all(&renderer, &markdown, &request)?;
                for (platform, out) in &rendered {
                    report(output, *platform, out);
                }
                write_all(output, self.output.as_deref(), &rendered)?;
            }
        }
        Ok(())
    }
}

/// Renderer configured from `[wechat]`, `[themes]` and `[limits]`.
fn build_renderer(config: &Config) -> Renderer {
    Renderer::new()
        .allowed_hosts(config.wechat.allowed_hosts.iter().cloned())
        .styles(StyleResolver::with_directories(&config.themes_resolved.dirs))
        .max_input_size(config.limits.max_input_bytes)
}

/// Request options from `[render]`; the markdown is filled in per render.
fn build_request(config: &Config) -> Result<RenderRequest, CliError> {
    let render = &config.render;
    let mut request = RenderRequest::default()
        .with_footnote_links(render.enable_footnote_links)
        .with_new_window(render.open_links_in_new_window)
        .with_footnote_label(render.footnote_label.as_str())
        .with_reference_title(render.reference_title.as_str());
    request.markdown_style.clone_from(&render.markdown_style);
    request.code_theme.clone_from(&render.code_theme);
    if let Some(path) = &render.custom_css {
        request.custom_css = Some(std::fs::read_to_string(path)?);
    }
    Ok(request)
}

/// Render every platform in parallel over independent trees.
fn render_all(
    renderer: &Renderer,
    markdown: &[u8],
    request: &RenderRequest,
) -> Result<Vec<(Platform, RenderOutput)>, CliError> {
    Platform::ALL
        .par_iter()
        .map(|&platform| {
            renderer
                .render_bytes(markdown, request.clone().with_platform(platform))
                .map(|out| (platform, out))
                .map_err(CliError::from)
        })
        .collect()
}

fn report(output: &Output, platform: Platform, rendered: &RenderOutput) {
    for warning in &rendered.warnings {
        output.warning(&format!("{platform}: {warning}"));
    }
    if rendered.inlined == InlineOutcome::Fallback {
        output.warning(&format!("{platform}: styles could not be inlined, output is unstyled"));
    }
}

fn write_all(
    output: &Output,
    path: Option<&Path>,
    rendered: &[(Platform, RenderOutput)],
) -> Result<(), CliError> {
    match path {
        Some(path) => {
            for (platform, out) in rendered {
                let target = platform_path(path, *platform);
                std::fs::write(&target, &out.html)?;
                output.success(&format!("Wrote {}", target.display()));
            }
        }
        None => write_document(None, &combine(rendered))?,
    }
    Ok(())
}

/// `out/post.html` becomes `out/post.wechat.html`.
fn platform_path(path: &Path, platform: Platform) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{platform}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{platform}"),
    };
    path.with_file_name(name)
}

/// Every platform's HTML on stdout, each preceded by a marker comment.
fn combine(rendered: &[(Platform, RenderOutput)]) -> String {
    let mut combined = String::new();
    for (platform, out) in rendered {
        combined.push_str("<!-- bm:platform=");
        combined.push_str(platform.as_str());
        combined.push_str(" -->\n");
        combined.push_str(&out.html);
        combined.push('\n');
    }
    combined
}
