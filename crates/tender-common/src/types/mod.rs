//! Common types used across the tender workspace

use crate::error::{CommonError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

/// Title assigned when the upstream record carries none.
///
/// A notice holding this title never passes validation.
pub const TITLE_PLACEHOLDER: &str = "no-title";

/// Organization assigned when the upstream record carries none
pub const ORGANIZATION_PLACEHOLDER: &str = "no-organization";

/// Category assigned when the upstream record carries none
pub const CATEGORY_PLACEHOLDER: &str = "no-category";

// ============================================================================
// Notice
// ============================================================================

/// Canonical, normalized bid notice.
///
/// Every upstream payload shape is mapped onto this one record before it is
/// validated and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    /// Stable notice identifier (primary key in the store)
    pub id: String,

    /// Notice title
    pub title: String,

    /// Announcing organization
    pub organization: String,

    /// Procurement category (goods, works, services, ...)
    pub category: String,

    /// Bidding method
    pub method: Option<String>,

    /// Closing date, `YYYY-MM-DD` when recognized
    pub due_date: Option<String>,

    /// Posting date, `YYYY-MM-DD` when recognized
    pub announce_date: Option<String>,

    /// Budget as reported upstream, empty when unknown
    pub budget: String,

    /// Demanding organization
    pub counterparty: Option<String>,

    /// Public detail page URL derived from `id`
    pub detail_url: String,

    /// Original upstream payload, kept for audit and replay
    pub raw_payload: JsonValue,
}

impl Notice {
    /// Minimal completeness check: an identifier and a title are present
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.title.is_empty()
    }

    /// Whether the title is the placeholder assigned to untitled records
    pub fn has_placeholder_title(&self) -> bool {
        self.title == TITLE_PLACEHOLDER
    }

    /// Serialize the raw payload for storage
    pub fn raw_payload_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.raw_payload)?)
    }
}

// ============================================================================
// Checkpoint / Session Status
// ============================================================================

/// Outcome recorded in the completion ledger for one notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    Success,
    Failed,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Success => "SUCCESS",
            CompletionStatus::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for CompletionStatus {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(CompletionStatus::Success),
            "FAILED" => Ok(CompletionStatus::Failed),
            other => Err(CommonError::InvalidCompletionStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a harvest session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Running,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "RUNNING",
            SessionStatus::Completed => "COMPLETED",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(SessionStatus::Running),
            "COMPLETED" => Ok(SessionStatus::Completed),
            other => Err(CommonError::InvalidSessionStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Run Statistics
// ============================================================================

/// Counters accumulated during one harvest run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Raw records found across all fetched pages
    pub found: u64,
    /// Notices newly persisted
    pub collected: u64,
    /// Duplicates and records without a usable identifier
    pub skipped: u64,
    /// Validation and persistence failures
    pub errors: u64,
    /// Pages fetched successfully
    pub pages_processed: u64,
    /// Pages whose fetch failed
    pub pages_failed: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentage of found records that were collected, if any were found
    pub fn success_rate(&self) -> Option<f64> {
        if self.found == 0 {
            return None;
        }
        Some(self.collected as f64 / self.found as f64 * 100.0)
    }

    /// Emit the end-of-run summary
    pub fn log_summary(&self) {
        info!(
            pages_processed = self.pages_processed,
            pages_failed = self.pages_failed,
            found = self.found,
            collected = self.collected,
            skipped = self.skipped,
            errors = self.errors,
            success_rate = self.success_rate().map(|r| format!("{:.1}%", r)),
            "Harvest run summary"
        );
    }
}

/// Persisted record of one harvest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSession {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    /// `None` while the session is still running
    pub finished_at: Option<DateTime<Utc>>,
    pub stats: RunStats,
    pub status: SessionStatus,
}

/// Parse an RFC 3339 timestamp as stored in the database
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| CommonError::invalid_timestamp(value, e))
}
