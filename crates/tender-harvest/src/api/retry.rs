//! Retry policy for upstream requests
//!
//! One policy value is shared by every request a client makes. Response
//! classes map to actions:
//!
//! | Response              | Action                                          |
//! |-----------------------|-------------------------------------------------|
//! | 200                   | parse body                                      |
//! | 429                   | wait `Retry-After` (or default), same attempt   |
//! | 5xx / transport error | back off `min(base^attempt, cap)`, next attempt |
//! | other 4xx             | terminal, no retry                              |
//! | anything else         | unexpected, no retry                            |

use crate::config::env_parse;
use crate::error::{HarvestError, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;

/// Immutable retry/backoff settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, counting the first one
    pub max_attempts: u32,

    /// Exponential backoff base in seconds
    pub backoff_base_secs: u64,

    /// Upper bound for a single backoff wait
    pub backoff_cap: Duration,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Wait used for a 429 without a usable `Retry-After`
    pub rate_limit_wait: Duration,

    /// Rate-limit waits allowed per request before giving up
    pub max_rate_limit_waits: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 2,
            backoff_cap: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            rate_limit_wait: Duration::from_secs(60),
            max_rate_limit_waits: 5,
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let secs = self.backoff_base_secs.saturating_pow(attempt);
        Duration::from_secs(secs).min(self.backoff_cap)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(HarvestError::config("max_attempts must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(HarvestError::config("request timeout must be non-zero"));
        }
        Ok(())
    }

    /// Default policy with `HARVEST_MAX_ATTEMPTS` and `HARVEST_TIMEOUT_SECS`
    /// applied when set
    pub fn from_env() -> Result<Self> {
        let mut policy = Self::default();
        if let Some(attempts) = env_parse("HARVEST_MAX_ATTEMPTS")? {
            policy.max_attempts = attempts;
        }
        if let Some(secs) = env_parse::<u64>("HARVEST_TIMEOUT_SECS")? {
            policy.request_timeout = Duration::from_secs(secs);
        }
        policy.validate()?;
        Ok(policy)
    }
}

/// How a response status is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    RateLimited,
    ServerError,
    ClientError,
    Unexpected,
}

pub fn classify_status(status: StatusCode) -> StatusClass {
    if status == StatusCode::OK {
        StatusClass::Success
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        StatusClass::RateLimited
    } else if status.is_server_error() {
        StatusClass::ServerError
    } else if status.is_client_error() {
        StatusClass::ClientError
    } else {
        StatusClass::Unexpected
    }
}

/// `Retry-After` in whole seconds; HTTP-date values are ignored
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Transport failures worth another attempt
pub fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
