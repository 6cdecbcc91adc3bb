//! Error types for the render pipeline.

/// Error returned by a render call.
///
/// Stage and inlining failures are recovered inside the pipeline and only
/// show up as warnings; anything here means no output was produced.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RenderError {
    /// Input exceeds the configured size cap.
    #[error("input is {size} bytes, limit is {limit} bytes")]
    InputTooLarge { size: usize, limit: usize },

    /// Markdown could not be turned into a document tree.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A stage failed in a way it could not recover from.
    #[error("{stage} stage failed: {message}")]
    Pipeline { stage: &'static str, message: String },
}

/// Error while reading the input document.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Byte input is not valid UTF-8.
    #[error("input is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Recoverable failure inside a single stage.
///
/// The stage leaves the offending node untouched and the pipeline carries
/// on; the error is logged and reported as a warning.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StageError {
    /// YAML frontmatter is not valid YAML.
    #[error("invalid YAML frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML frontmatter is not valid TOML.
    #[error("invalid TOML frontmatter: {0}")]
    Toml(#[from] toml::de::Error),

    /// Frontmatter parsed but its top level is not a key/value mapping.
    #[error("frontmatter is not a mapping")]
    NotAMapping,

    /// A nested frontmatter value could not be written out as JSON.
    #[error("frontmatter value cannot be displayed: {0}")]
    NestedValue(#[from] serde_json::Error),
}
