//! CLI error types.

use bm_config::ConfigError;
use bm_renderer::{RenderError, UnknownPlatform};
use bm_text::TextError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("{0}")]
    Text(#[from] TextError),

    #[error("{0}")]
    Platform(#[from] UnknownPlatform),

    #[error("{0}")]
    Validation(String),
}
