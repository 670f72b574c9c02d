//! Harvest run configuration
//!
//! Controls how much of the listing is walked and how politely. Everything is
//! validated before the first request leaves the process.

use crate::error::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Harvest Configuration Constants
// ============================================================================

/// Largest page size the listing endpoint accepts
pub const MAX_RECORDS_PER_PAGE: u32 = 100;

/// Longest posting window, in days, a run may request
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// Default pause between consecutive list pages
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);

/// Default pause after each detail request
pub const DEFAULT_DETAIL_DELAY: Duration = Duration::from_millis(500);

/// Settings for one harvest run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Number of list pages to walk, starting at page 1
    pub max_pages: u32,

    /// Records requested per page (1..=100)
    pub records_per_page: u32,

    /// Whether to call the detail endpoint for each new notice
    pub fetch_details: bool,

    /// Posting window, in days before today (0..=3650)
    pub lookback_days: u32,

    /// Politeness delay between pages
    pub page_delay: Duration,

    /// Politeness delay after each detail call
    pub detail_delay: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_pages: 1,
            records_per_page: 10,
            fetch_details: false,
            lookback_days: 30,
            page_delay: DEFAULT_PAGE_DELAY,
            detail_delay: DEFAULT_DETAIL_DELAY,
        }
    }
}

impl HarvestConfig {
    /// Create new config with builder pattern
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_pages < 1 {
            return Err(HarvestError::config("max_pages must be at least 1"));
        }

        if self.records_per_page < 1 || self.records_per_page > MAX_RECORDS_PER_PAGE {
            return Err(HarvestError::config(format!(
                "records_per_page must be between 1 and {}, got {}",
                MAX_RECORDS_PER_PAGE, self.records_per_page
            )));
        }

        if self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(HarvestError::config(format!(
                "lookback_days must be at most {}, got {}",
                MAX_LOOKBACK_DAYS, self.lookback_days
            )));
        }

        Ok(())
    }

    /// Load configuration from environment variables, then validate it
    ///
    /// Environment variables:
    /// - `HARVEST_MAX_PAGES`
    /// - `HARVEST_RECORDS_PER_PAGE`
    /// - `HARVEST_FETCH_DETAILS` (true/false)
    /// - `HARVEST_LOOKBACK_DAYS`
    /// - `HARVEST_PAGE_DELAY_MS`
    /// - `HARVEST_DETAIL_DELAY_MS`
    pub fn from_env() -> Result<Self> {
        let default = Self::default();

        let config = Self {
            max_pages: env_parse("HARVEST_MAX_PAGES")?.unwrap_or(default.max_pages),
            records_per_page: env_parse("HARVEST_RECORDS_PER_PAGE")?
                .unwrap_or(default.records_per_page),
            fetch_details: env_parse("HARVEST_FETCH_DETAILS")?.unwrap_or(default.fetch_details),
            lookback_days: env_parse("HARVEST_LOOKBACK_DAYS")?.unwrap_or(default.lookback_days),
            page_delay: env_parse("HARVEST_PAGE_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(default.page_delay),
            detail_delay: env_parse("HARVEST_DETAIL_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(default.detail_delay),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Read and parse an optional environment variable
pub(crate) fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| HarvestError::config(format!("{}='{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}

/// Builder for HarvestConfig; `build` validates
#[derive(Debug, Default)]
pub struct HarvestConfigBuilder {
    max_pages: Option<u32>,
    records_per_page: Option<u32>,
    fetch_details: Option<bool>,
    lookback_days: Option<u32>,
    page_delay: Option<Duration>,
    detail_delay: Option<Duration>,
}

impl HarvestConfigBuilder {
    pub fn max_pages(mut self, pages: u32) -> Self {
        self.max_pages = Some(pages);
        self
    }

    pub fn records_per_page(mut self, records: u32) -> Self {
        self.records_per_page = Some(records);
        self
    }

    pub fn fetch_details(mut self, fetch: bool) -> Self {
        self.fetch_details = Some(fetch);
        self
    }

    pub fn lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = Some(days);
        self
    }

    pub fn page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    pub fn detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = Some(delay);
        self
    }

    pub fn build(self) -> Result<HarvestConfig> {
        let default = HarvestConfig::default();

        let config = HarvestConfig {
            max_pages: self.max_pages.unwrap_or(default.max_pages),
            records_per_page: self.records_per_page.unwrap_or(default.records_per_page),
            fetch_details: self.fetch_details.unwrap_or(default.fetch_details),
            lookback_days: self.lookback_days.unwrap_or(default.lookback_days),
            page_delay: self.page_delay.unwrap_or(default.page_delay),
            detail_delay: self.detail_delay.unwrap_or(default.detail_delay),
        };

        config.validate()?;
        Ok(config)
    }
}
