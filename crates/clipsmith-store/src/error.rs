//! Error types for the job store.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting job records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job already exists: {0}")]
    DuplicateJob(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
