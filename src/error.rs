use thiserror::Error;

/// Failures of the retrieval core. Zero matches is never one of these.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// The catalog artifact is missing or malformed. Fatal to startup.
    #[error("recipe catalog unavailable: {reason}")]
    DataUnavailable { reason: String },

    /// The query could not be embedded. Recoverable per query.
    #[error("could not embed query: {reason}")]
    EmbeddingFailure { reason: String },

    #[error("requested {requested} recipes but only {available} are available")]
    InsufficientCandidates { requested: usize, available: usize },
}

impl RecipeError {
    pub fn data_unavailable(reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            reason: reason.into(),
        }
    }

    pub fn embedding_failure(reason: impl Into<String>) -> Self {
        Self::EmbeddingFailure {
            reason: reason.into(),
        }
    }
}
