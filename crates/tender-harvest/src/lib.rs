//! Tender Harvest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Incremental, resumable harvester for public bid notices.
//!
//! # Overview
//!
//! - **API client**: retrying POST client for the listing and detail endpoints
//!   ([`api`])
//! - **Normalization**: raw rows to [`Notice`](tender_common::Notice) plus the
//!   validation gate ([`normalize`])
//! - **Checkpoint store**: SQLite records, per-id completion and run sessions
//!   ([`storage`])
//! - **Pipeline**: page walk with dedup, enrichment and failure containment
//!   ([`pipeline`])
//!
//! # Example
//!
//! ```no_run
//! use tender_harvest::api::{endpoints::DEFAULT_BASE_URL, ApiClient, RetryPolicy};
//! use tender_harvest::{HarvestConfig, Harvester, Normalizer, Store};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ApiClient::new(DEFAULT_BASE_URL, RetryPolicy::default())?;
//!     let store = Store::open("./data/tenders.db")?;
//!     let harvester = Harvester::new(client, store, Normalizer::default());
//!
//!     let outcome = harvester.run(&HarvestConfig::default()).await?;
//!     println!("collected {} notices", outcome.stats.collected);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod normalize;
pub mod pacing;
pub mod pipeline;
pub mod storage;

// Re-export commonly used types
pub use config::HarvestConfig;
pub use error::{HarvestError, Result, ValidationError};
pub use normalize::Normalizer;
pub use pipeline::{CombinedStats, Harvester, RunOutcome};
pub use storage::{ExportFormat, Store, StoreStats};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default location of the checkpoint database
pub const DEFAULT_DB_PATH: &str = "./data/tenders.db";

/// Harvest public bid notices into a local checkpoint store
#[derive(Parser, Debug)]
#[command(name = "tender-harvest")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Checkpoint database path
    #[arg(long, env = "HARVEST_DB_PATH", default_value = DEFAULT_DB_PATH, global = true)]
    pub db_path: PathBuf,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Walk the listing and store new notices
    Run {
        /// Upstream host
        #[arg(long, env = "HARVEST_BASE_URL", default_value = api::endpoints::DEFAULT_BASE_URL)]
        base_url: String,

        /// Number of list pages to walk (overrides HARVEST_MAX_PAGES)
        #[arg(short, long)]
        pages: Option<u32>,

        /// Records per page, 1 to 100 (overrides HARVEST_RECORDS_PER_PAGE)
        #[arg(short = 'n', long)]
        per_page: Option<u32>,

        /// Fetch the detail of every new notice
        #[arg(short, long)]
        details: bool,

        /// Posting window in days (overrides HARVEST_LOOKBACK_DAYS)
        #[arg(short, long)]
        lookback_days: Option<u32>,

        /// Write JSON and CSV exports here after the run
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },

    /// Export every stored notice
    Export {
        /// Output format (json, csv)
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Output file (defaults to a timestamped name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show store totals and failed notice ids
    Stats {
        /// Also show this session
        #[arg(short, long)]
        session: Option<i64>,
    },
}
