//! Error types for markup parsing.

/// Error while tokenizing an HTML fragment.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TreeError {
    /// The reader could not make sense of the markup.
    #[error("malformed markup")]
    Xml(#[from] quick_xml::Error),

    /// Tag or text bytes were not valid in the source encoding.
    #[error("encoding error")]
    Encoding(#[from] quick_xml::encoding::EncodingError),
}
