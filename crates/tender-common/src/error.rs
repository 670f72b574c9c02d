//! Error types shared across the tender workspace

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised while parsing or converting shared types
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid completion status: {0}")]
    InvalidCompletionStatus(String),

    #[error("Invalid session status: {0}")]
    InvalidSessionStatus(String),

    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CommonError {
    /// Create an invalid timestamp error
    pub fn invalid_timestamp(value: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
