//! Error types for the engine.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while orchestrating analysis and exports.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to spawn analysis process '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Analysis process exited with code {code:?} without a result")]
    ExitedWithoutResult { code: Option<i32> },

    #[error("Analysis process exited with code {code:?} after emitting a result")]
    NonZeroExit { code: Option<i32> },

    #[error("Analysis result payload is malformed: {0}")]
    MalformedResult(#[source] serde_json::Error),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {0} is already in a terminal state")]
    JobAlreadyTerminal(String),

    #[error("Media error: {0}")]
    Media(#[from] clipsmith_media::MediaError),

    #[error("Store error: {0}")]
    Store(#[from] clipsmith_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid export request: {0}")]
    InvalidExport(String),
}

impl EngineError {
    pub fn invalid_export(message: impl Into<String>) -> Self {
        Self::InvalidExport(message.into())
    }
}
