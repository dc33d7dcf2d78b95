//! Error types for askflow.
//!
//! One enum covers every error category in the workspace: configuration,
//! I/O, language models, retrieval adapters, prompts and the workflow itself.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for askflow.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Language model provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Retrieval adapter errors (documents, knowledge base, code host, web)
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Workflow execution errors (routing faults, unrecoverable stage failures)
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// An external call exceeded its deadline
    #[error("{operation} timed out after {}s", .after.as_secs_f64())]
    Timeout { operation: String, after: Duration },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        AppError::Timeout {
            operation: operation.into(),
            after,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
