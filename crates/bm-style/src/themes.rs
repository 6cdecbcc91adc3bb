//! Stylesheet registry, lookup sources and memoization.
//!
//! Two kinds of named stylesheets exist: markdown styles (typography) and
//! code themes (syntax highlighting). Lookups go through a list of
//! [`StylesheetSource`]s, first hit wins, and are memoized per id in a
//! [`StylesheetCache`]. Every markdown style is served with the shared reset
//! sheet in front of it.
//!
//! The built-in markdown styles are a small curated set; further styles are
//! plain CSS files picked up by a [`DirectorySource`]. All highlight themes
//! are built in.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::StyleError;

const RESET_CSS: &str = include_str!("../themes/reset.css");

/// Stylesheet for rendered math, added whenever a document contains math.
pub const MATH_CSS: &str = include_str!("../themes/math.css");

const MARKDOWN_STYLES: &[(&str, &str)] = &[
    ("ayu-light", include_str!("../themes/markdown/ayu-light.css")),
    ("newsprint", include_str!("../themes/markdown/newsprint.css")),
    ("professional", include_str!("../themes/markdown/professional.css")),
];

const CODE_THEMES: &[(&str, &str)] = &[
    ("catppuccin-frappe", include_str!("../themes/code/catppuccin-frappe.css")),
    ("catppuccin-latte", include_str!("../themes/code/catppuccin-latte.css")),
    ("catppuccin-macchiato", include_str!("../themes/code/catppuccin-macchiato.css")),
    ("catppuccin-mocha", include_str!("../themes/code/catppuccin-mocha.css")),
    ("kimbie-dark", include_str!("../themes/code/kimbie-dark.css")),
    ("kimbie-light", include_str!("../themes/code/kimbie-light.css")),
    ("panda-syntax-dark", include_str!("../themes/code/panda-syntax-dark.css")),
    ("panda-syntax-light", include_str!("../themes/code/panda-syntax-light.css")),
    ("paraiso-dark", include_str!("../themes/code/paraiso-dark.css")),
    ("paraiso-light", include_str!("../themes/code/paraiso-light.css")),
    ("rose-pine", include_str!("../themes/code/rose-pine.css")),
    ("rose-pine-dawn", include_str!("../themes/code/rose-pine-dawn.css")),
    ("tokyo-night-dark", include_str!("../themes/code/tokyo-night-dark.css")),
    ("tokyo-night-light", include_str!("../themes/code/tokyo-night-light.css")),
];

/// Category of a named stylesheet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SheetKind {
    /// Typography theme.
    Markdown,
    /// Syntax-highlighting theme.
    Code,
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markdown => f.write_str("markdown style"),
            Self::Code => f.write_str("code theme"),
        }
    }
}

/// Lookup of named stylesheets.
pub trait StylesheetSource: Send + Sync {
    /// Load a stylesheet by id. `Ok(None)` means this source does not know it.
    fn load(&self, kind: SheetKind, id: &str) -> Result<Option<String>, StyleError>;

    /// Ids this source can serve.
    fn ids(&self, kind: SheetKind) -> Vec<String>;
}

/// Stylesheets compiled into the binary.
pub struct BuiltinThemes;

impl BuiltinThemes {
    fn table(kind: SheetKind) -> &'static [(&'static str, &'static str)] {
        match kind {
            SheetKind::Markdown => MARKDOWN_STYLES,
            SheetKind::Code => CODE_THEMES,
        }
    }
}

impl StylesheetSource for BuiltinThemes {
    fn load(&self, kind: SheetKind, id: &str) -> Result<Option<String>, StyleError> {
        Ok(Self::table(kind)
            .iter()
            .find(|(name, _)| *name == id)
            .map(|(_, css)| (*css).to_owned()))
    }

    fn ids(&self, kind: SheetKind) -> Vec<String> {
        Self::table(kind)
            .iter()
            .map(|(name, _)| (*name).to_owned())
            .collect()
    }
}

/// Stylesheets read from a directory.
///
/// Markdown styles live at `<dir>/<id>.css`, code themes at
/// `<dir>/code/<id>.css`.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn kind_dir(&self, kind: SheetKind) -> PathBuf {
        match kind {
            SheetKind::Markdown => self.dir.clone(),
            SheetKind::Code => self.dir.join("code"),
        }
    }
}

fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl StylesheetSource for DirectorySource {
    fn load(&self, kind: SheetKind, id: &str) -> Result<Option<String>, StyleError> {
        if !is_safe_id(id) {
            return Ok(None);
        }
        let path = self.kind_dir(kind).join(format!("{id}.css"));
        match std::fs::read_to_string(&path) {
            Ok(css) => Ok(Some(css)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StyleError::Io { path, source }),
        }
    }

    fn ids(&self, kind: SheetKind) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.kind_dir(kind)) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("css") {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?;
                is_safe_id(stem).then(|| stem.to_owned())
            })
            .collect()
    }
}

type CacheKey = (SheetKind, String);

/// Memoized stylesheet lookups.
///
/// Entries are inserted once and never replaced. Concurrent first accesses
/// may both compute the value; the first insert wins and both callers see the
/// same content. Only found sheets are stored; a miss is recomputed on the
/// next lookup so arbitrary ids cannot grow the cache.
#[derive(Default)]
pub struct StylesheetCache {
    entries: RwLock<HashMap<CacheKey, Arc<str>>>,
}

impl StylesheetCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value, computing and inserting it if absent.
    pub fn get_or_insert_with(
        &self,
        kind: SheetKind,
        id: &str,
        load: impl FnOnce() -> Option<String>,
    ) -> Option<Arc<str>> {
        let key = (kind, id.to_owned());
        if let Some(hit) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Some(Arc::clone(hit));
        }

        let value: Arc<str> = Arc::from(load()?);
        Some(Arc::clone(
            self.entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key)
                .or_insert(value),
        ))
    }

    /// Number of cached ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which stylesheets a render asks for.
#[derive(Clone, Copy, Debug, Default)]
pub struct StyleSelection<'a> {
    pub markdown_style: Option<&'a str>,
    pub code_theme: Option<&'a str>,
    pub custom_css: Option<&'a str>,
    /// Whether the document rendered any math.
    pub math: bool,
}

/// Stylesheets resolved for one render, in cascade order.
#[derive(Clone, Debug, Default)]
pub struct ResolvedStyles {
    sheets: Vec<Arc<str>>,
}

impl ResolvedStyles {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    /// Concatenated stylesheet text.
    #[must_use]
    pub fn css(&self) -> String {
        let mut css = String::new();
        for sheet in &self.sheets {
            css.push_str(sheet);
            css.push('\n');
        }
        css
    }
}

/// Resolves style ids to stylesheet text.
pub struct StyleResolver {
    sources: Vec<Box<dyn StylesheetSource>>,
    cache: StylesheetCache,
}

impl StyleResolver {
    /// Resolver serving only the built-in themes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_sources(vec![Box::new(BuiltinThemes)])
    }

    /// Resolver searching `dirs` in order before the built-in themes.
    #[must_use]
    pub fn with_directories<P: AsRef<Path>>(dirs: &[P]) -> Self {
        let mut sources: Vec<Box<dyn StylesheetSource>> = dirs
            .iter()
            .map(|dir| Box::new(DirectorySource::new(dir.as_ref())) as Box<dyn StylesheetSource>)
            .collect();
        sources.push(Box::new(BuiltinThemes));
        Self::with_sources(sources)
    }

    #[must_use]
    pub fn with_sources(sources: Vec<Box<dyn StylesheetSource>>) -> Self {
        Self {
            sources,
            cache: StylesheetCache::new(),
        }
    }

    /// Look up a stylesheet by id. Unknown ids and unreadable files are
    /// logged and yield `None`.
    pub fn lookup(&self, kind: SheetKind, id: &str) -> Option<Arc<str>> {
        let found = self.cache.get_or_insert_with(kind, id, || {
            for source in &self.sources {
                match source.load(kind, id) {
                    Ok(Some(css)) => {
                        return Some(match kind {
                            SheetKind::Markdown => format!("{RESET_CSS}\n{css}"),
                            SheetKind::Code => css,
                        });
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, %kind, id, "Failed to load stylesheet"),
                }
            }
            None
        });
        if found.is_none() {
            tracing::warn!(%kind, id, "Unknown stylesheet id, ignoring");
        }
        found
    }

    /// Resolve a selection into the ordered sheet list: markdown style, code
    /// theme, math, custom CSS.
    pub fn resolve(&self, selection: &StyleSelection<'_>) -> ResolvedStyles {
        let mut sheets = Vec::new();
        if let Some(id) = selection.markdown_style.filter(|id| !id.is_empty())
            && let Some(css) = self.lookup(SheetKind::Markdown, id)
        {
            sheets.push(css);
        }
        if let Some(id) = selection.code_theme.filter(|id| !id.is_empty())
            && let Some(css) = self.lookup(SheetKind::Code, id)
        {
            sheets.push(css);
        }
        if selection.math {
            sheets.push(Arc::from(MATH_CSS));
        }
        if let Some(css) = selection.custom_css.filter(|css| !css.trim().is_empty()) {
            sheets.push(Arc::from(css));
        }
        ResolvedStyles { sheets }
    }

    /// All ids available for a kind, sorted and deduplicated.
    pub fn available(&self, kind: SheetKind) -> Vec<String> {
        let mut ids: Vec<String> = self.sources.iter().flat_map(|s| s.ids(kind)).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// The memoization cache.
    #[must_use]
    pub fn cache(&self) -> &StylesheetCache {
        &self.cache
    }
}

impl Default for StyleResolver {
    fn default() -> Self {
        Self::new()
    }
}
