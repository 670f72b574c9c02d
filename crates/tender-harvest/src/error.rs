//! Error types for the harvester
//!
//! Transient network failures never show up here: the retrying client absorbs
//! them and reports exhaustion as `Ok(None)`. Everything below is either a
//! terminal request failure, a rejected record, or a local I/O problem.

use thiserror::Error;

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Record rejected by the business-rule gate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("notice id is missing")]
    MissingId,

    #[error("notice id '{0}' is too short")]
    IdTooShort(String),

    #[error("invalid notice title: '{0}'")]
    InvalidTitle(String),
}

/// Comprehensive error type for harvest operations
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Upstream rejected the request (4xx other than 429); never retried
    #[error("Request rejected by upstream ({context}): HTTP {status}: {body}")]
    Terminal {
        context: String,
        status: u16,
        body: String,
    },

    /// Exchange failed in a way the retry policy does not cover
    #[error("Unexpected failure during {context}: {message}")]
    Unexpected { context: String, message: String },

    /// Client construction or other non-exchange HTTP failure
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Checkpoint store failure
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Failed to acquire store lock: {0}")]
    Lock(String),

    /// Record failed validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid harvest configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shared type conversion failed
    #[error(transparent)]
    Common(#[from] tender_common::CommonError),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl HarvestError {
    /// Create a terminal request error, truncating the body for logs
    pub fn terminal(context: impl Into<String>, status: u16, body: &str) -> Self {
        Self::Terminal {
            context: context.into(),
            status,
            body: body.chars().take(200).collect(),
        }
    }

    /// Create an unexpected exchange error
    pub fn unexpected(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Unexpected {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error aborted a single request rather than local work
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            HarvestError::Terminal { .. } | HarvestError::Unexpected { .. } | HarvestError::Http(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_body_is_truncated() {
        let body = "x".repeat(500);
        let err = HarvestError::terminal("list page 1", 400, &body);
        match err {
            HarvestError::Terminal { status, body, .. } => {
                assert_eq!(status, 400);
                assert_eq!(body.len(), 200);
            },
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_request_failure_classification() {
        assert!(HarvestError::terminal("detail", 404, "").is_request_failure());
        assert!(HarvestError::unexpected("detail", "bad json").is_request_failure());
        assert!(!HarvestError::config("max_pages").is_request_failure());
        assert!(!HarvestError::from(ValidationError::MissingId).is_request_failure());
    }
}
