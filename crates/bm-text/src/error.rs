//! Error types for text entry points.

/// Error returned by [`extract`](crate::extract) and [`lint`](crate::lint).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TextError {
    /// Input exceeds the size cap.
    #[error("input is {size} bytes, limit is {limit} bytes")]
    InputTooLarge { size: usize, limit: usize },
}
