//! Error types for style resolution and inlining.

use std::path::PathBuf;

/// Error while loading or inlining stylesheets.
///
/// Callers on the render path log these and continue with the un-inlined
/// fragment; they are never surfaced as a render failure.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StyleError {
    /// Stylesheet could not be tokenized.
    #[error("CSS syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// The fragment to inline could not be re-parsed.
    #[error("cannot parse fragment for inlining")]
    Markup(#[from] bm_tree::TreeError),

    /// A theme file exists but could not be read.
    #[error("failed to read stylesheet {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
