//! Render request and target platforms.

use std::fmt;
use std::str::FromStr;

/// Default cap on input size (5 MiB).
pub const MAX_INPUT_SIZE: usize = 5 * 1024 * 1024;

/// Publishing destination.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Generic web output.
    #[default]
    Html,
    /// WeChat official account editor. Strips foreign links and form
    /// controls, collapses whitespace.
    Wechat,
    /// Zhihu article editor.
    Zhihu,
    /// Juejin article editor.
    Juejin,
}

impl Platform {
    /// Every platform, in display order.
    pub const ALL: [Self; 4] = [Self::Html, Self::Wechat, Self::Zhihu, Self::Juejin];

    /// Lowercase identifier used on the command line and in config.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Wechat => "wechat",
            Self::Zhihu => "zhihu",
            Self::Juejin => "juejin",
        }
    }

    /// Whether the generic footnote rewriter may run for this platform.
    ///
    /// WeChat runs its own strict rewriter instead.
    #[must_use]
    pub fn allows_footnote_links(self) -> bool {
        !matches!(self, Self::Wechat)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized platform names.
#[derive(Debug, thiserror::Error)]
#[error("unknown platform '{0}', expected one of: html, wechat, zhihu, juejin")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPlatform(s.to_owned()))
    }
}

/// Input of a single render call.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct RenderRequest {
    /// Markdown source.
    pub markdown: String,
    /// Typography theme id.
    pub markdown_style: Option<String>,
    /// Syntax highlight theme id.
    pub code_theme: Option<String>,
    /// Extra CSS appended after the themes.
    pub custom_css: Option<String>,
    /// Collect external links into a numbered reference list.
    pub enable_footnote_links: bool,
    /// Add `target="_blank"` to external links.
    pub open_links_in_new_window: bool,
    /// Destination.
    pub platform: Platform,
    /// Heading of the GFM footnote section.
    pub footnote_label: String,
    /// Heading of the link reference list.
    pub reference_title: String,
}

impl RenderRequest {
    /// Create a request with default options.
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            ..Self::default()
        }
    }

    /// Set the destination platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Set the typography theme.
    #[must_use]
    pub fn with_markdown_style(mut self, id: impl Into<String>) -> Self {
        self.markdown_style = Some(id.into());
        self
    }

    /// Set the syntax highlight theme.
    #[must_use]
    pub fn with_code_theme(mut self, id: impl Into<String>) -> Self {
        self.code_theme = Some(id.into());
        self
    }

    /// Set custom CSS.
    #[must_use]
    pub fn with_custom_css(mut self, css: impl Into<String>) -> Self {
        self.custom_css = Some(css.into());
        self
    }

    /// Enable or disable the link reference list.
    #[must_use]
    pub fn with_footnote_links(mut self, enabled: bool) -> Self {
        self.enable_footnote_links = enabled;
        self
    }

    /// Enable or disable `target="_blank"` on external links.
    #[must_use]
    pub fn with_new_window(mut self, enabled: bool) -> Self {
        self.open_links_in_new_window = enabled;
        self
    }

    /// Set the reference list heading.
    #[must_use]
    pub fn with_reference_title(mut self, title: impl Into<String>) -> Self {
        self.reference_title = title.into();
        self
    }

    /// Set the footnote section heading.
    #[must_use]
    pub fn with_footnote_label(mut self, label: impl Into<String>) -> Self {
        self.footnote_label = label.into();
        self
    }
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            markdown: String::new(),
            markdown_style: None,
            code_theme: None,
            custom_css: None,
            enable_footnote_links: true,
            open_links_in_new_window: true,
            platform: Platform::Html,
            footnote_label: "Footnotes".to_owned(),
            reference_title: "References".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parse_case_insensitive() {
        assert_eq!("WeChat".parse::<Platform>().unwrap(), Platform::Wechat);
        assert_eq!(" html ".parse::<Platform>().unwrap(), Platform::Html);
        assert!("medium".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_display_roundtrips() {
        for platform in Platform::ALL {
            assert_eq!(platform.to_string().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn test_request_defaults() {
        let request = RenderRequest::new("# x");
        assert!(request.enable_footnote_links);
        assert!(request.open_links_in_new_window);
        assert_eq!(request.platform, Platform::Html);
        assert_eq!(request.reference_title, "References");
    }

    #[test]
    fn test_only_wechat_forbids_generic_footnotes() {
        assert!(!Platform::Wechat.allows_footnote_links());
        assert!(Platform::Html.allows_footnote_links());
        assert!(Platform::Zhihu.allows_footnote_links());
    }
}
