//! Error types for composition helpers.

/// Result alias for composition operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors raised while preparing composition input.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// The requested programming language is not in the packaged list.
    #[error("unknown programming language `{id}`")]
    UnknownLanguage {
        /// Identifier that was looked up.
        id: String,
    },

    /// Composition produced no text.
    #[error("composed prompt is empty")]
    EmptyComposition,
}
