//! Harvest run orchestration
//!
//! One run walks list pages `1..=max_pages` strictly in order. For each row:
//! normalize, skip if already checkpointed, optionally enrich from the detail
//! endpoint, validate, persist. Failures are contained at the smallest scope
//! that makes sense:
//!
//! - a page that cannot be fetched counts as a failed page
//! - a row that cannot be normalized or is already done counts as skipped
//! - a row that fails validation or persistence counts as an error
//! - a failed detail call leaves the row unenriched
//!
//! Only a store failure outside `save` ends the run early, and the session
//! row is closed with the counters gathered so far before the error returns.

use crate::api::ListingSource;
use crate::config::HarvestConfig;
use crate::error::Result;
use crate::normalize::{self, Normalizer};
use crate::pacing::{Sleeper, TokioSleeper};
use crate::storage::{Store, StoreStats};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tender_common::types::{Notice, RunStats};
use tracing::{debug, error, info, warn};

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session_id: i64,
    pub stats: RunStats,
    /// Notices persisted during this run, in processing order
    pub collected: Vec<Notice>,
}

/// Run counters next to store-wide totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedStats {
    pub run: RunStats,
    pub store: StoreStats,
}

/// Drives harvest runs against one listing source and one store
pub struct Harvester<S> {
    source: S,
    store: Store,
    normalizer: Normalizer,
    sleeper: Arc<dyn Sleeper>,
}

impl<S: ListingSource> Harvester<S> {
    pub fn new(source: S, store: Store, normalizer: Normalizer) -> Self {
        Self {
            source,
            store,
            normalizer,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper used for politeness delays
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Execute one run.
    ///
    /// The session row is always finalized once it has been opened, including
    /// when the run aborts.
    pub async fn run(&self, config: &HarvestConfig) -> Result<RunOutcome> {
        config.validate()?;

        let session_id = self.store.start_session()?;
        info!(
            session_id,
            max_pages = config.max_pages,
            records_per_page = config.records_per_page,
            fetch_details = config.fetch_details,
            lookback_days = config.lookback_days,
            "Starting harvest run"
        );

        let mut stats = RunStats::new();
        let mut collected = Vec::new();
        let walked = self.walk_pages(config, &mut stats, &mut collected).await;

        let finished = self.store.finish_session(session_id, &stats);
        stats.log_summary();

        if let Err(e) = walked {
            error!(session_id, error = %e, "Harvest run aborted");
            if let Err(finish_err) = finished {
                error!(session_id, error = %finish_err, "Failed to finalize aborted session");
            }
            return Err(e);
        }
        finished?;

        Ok(RunOutcome {
            session_id,
            stats,
            collected,
        })
    }

    /// Run counters alongside the store's aggregate counts
    pub fn combined_stats(&self, run: &RunStats) -> Result<CombinedStats> {
        Ok(CombinedStats {
            run: *run,
            store: self.store.get_stats()?,
        })
    }

    async fn walk_pages(
        &self,
        config: &HarvestConfig,
        stats: &mut RunStats,
        collected: &mut Vec<Notice>,
    ) -> Result<()> {
        for page in 1..=config.max_pages {
            self.process_page(page, config, stats, collected).await?;

            if page < config.max_pages {
                debug!(delay_ms = config.page_delay.as_millis() as u64, "Waiting before next page");
                self.sleeper.sleep(config.page_delay).await;
            }
        }
        Ok(())
    }

    async fn process_page(
        &self,
        page: u32,
        config: &HarvestConfig,
        stats: &mut RunStats,
        collected: &mut Vec<Notice>,
    ) -> Result<()> {
        info!(page, max_pages = config.max_pages, "Fetching list page");

        let response = match self
            .source
            .fetch_list(page, config.records_per_page, config.lookback_days)
            .await
        {
            Ok(Some(response)) => response,
            Ok(None) => {
                warn!(page, "List page unavailable after retries");
                stats.pages_failed += 1;
                return Ok(());
            },
            Err(e) => {
                error!(page, error = %e, "List page request failed");
                stats.pages_failed += 1;
                return Ok(());
            },
        };
        stats.pages_processed += 1;

        let rows = self.normalizer.extract_list(&response);
        if rows.is_empty() {
            warn!(page, "No notices on page");
            return Ok(());
        }
        info!(page, count = rows.len(), "Found notices");
        stats.found += rows.len() as u64;

        let total = rows.len();
        for (idx, raw) in rows.iter().enumerate() {
            self.process_notice(raw, idx + 1, total, config, stats, collected)
                .await?;
        }
        Ok(())
    }

    async fn process_notice(
        &self,
        raw: &Value,
        idx: usize,
        total: usize,
        config: &HarvestConfig,
        stats: &mut RunStats,
        collected: &mut Vec<Notice>,
    ) -> Result<()> {
        let Some(notice) = self.normalizer.transform(raw) else {
            debug!(idx, total, "Skipping row without identifier");
            stats.skipped += 1;
            return Ok(());
        };

        // A lookup failure means the checkpoint is unreadable; stop the run
        if self.store.is_already_done(&notice.id)? {
            debug!(idx, total, id = %notice.id, "Already collected, skipping");
            stats.skipped += 1;
            return Ok(());
        }

        let notice = if config.fetch_details {
            self.enrich_from_detail(notice, config.detail_delay).await
        } else {
            notice
        };

        if let Err(e) = normalize::validate(&notice) {
            warn!(idx, total, id = %notice.id, error = %e, "Notice failed validation");
            stats.errors += 1;
            return Ok(());
        }

        match self.store.save(&notice) {
            Ok(()) => {
                debug!(idx, total, id = %notice.id, "Collected notice");
                stats.collected += 1;
                collected.push(notice);
            },
            Err(e) => {
                error!(idx, total, id = %notice.id, error = %e, "Failed to persist notice");
                stats.errors += 1;
            },
        }
        Ok(())
    }

    async fn enrich_from_detail(&self, notice: Notice, delay: Duration) -> Notice {
        let detail = self.source.fetch_detail(&notice.id).await;
        self.sleeper.sleep(delay).await;

        match detail {
            Ok(Some(detail)) => {
                debug!(id = %notice.id, "Enriched notice from detail");
                self.normalizer.enrich(notice, &detail)
            },
            Ok(None) => {
                warn!(id = %notice.id, "Detail unavailable after retries");
                notice
            },
            Err(e) => {
                warn!(id = %notice.id, error = %e, "Detail request failed");
                notice
            },
        }
    }
}
