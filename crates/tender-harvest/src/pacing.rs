//! Waiting between requests
//!
//! Backoff, rate-limit waits and politeness delays all go through a
//! [`Sleeper`], so the run can be paced by the tokio timer in production and
//! observed without waiting in tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Something that can pause the current task
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Records every requested wait and returns immediately.
///
/// Used for dry runs and tests; clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// All waits requested so far, in order
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Sum of all waits requested so far
    pub fn total(&self) -> Duration {
        self.waits().iter().sum()
    }

    pub fn clear(&self) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.clear();
        }
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_sleeper_shares_log_between_clones() {
        let sleeper = RecordingSleeper::new();
        let clone = sleeper.clone();

        clone.sleep(Duration::from_secs(2)).await;
        sleeper.sleep(Duration::from_millis(500)).await;

        assert_eq!(
            sleeper.waits(),
            vec![Duration::from_secs(2), Duration::from_millis(500)]
        );
        assert_eq!(clone.total(), Duration::from_millis(2500));

        sleeper.clear();
        assert!(clone.waits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_waits_on_timer() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(3)).await;
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
