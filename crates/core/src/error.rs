// Central Error Type for the Application

use thiserror::Error;

use crate::port::analyzer::AnalysisError;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Submission validation failed. Surfaced as HTTP 400, never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Job-store backend unavailable or rejected the operation. Callers
    /// retry boundedly (see `application::retry`).
    #[error("database error: {0}")]
    Database(String),

    /// Queue transport unavailable. The worker pauses briefly and continues.
    #[error("queue error: {0}")]
    Queue(String),

    /// A conditional state transition found the row in an incompatible state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a bounded retry at the call site is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Queue(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
