//! `tender-harvest run` command implementation

use crate::api::{ApiClient, RetryPolicy};
use crate::config::HarvestConfig;
use crate::error::Result;
use crate::normalize::Normalizer;
use crate::pipeline::Harvester;
use crate::storage::{ExportFormat, Store};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Command-line overrides applied on top of the environment configuration
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub base_url: String,
    pub db_path: PathBuf,
    pub pages: Option<u32>,
    pub per_page: Option<u32>,
    pub details: bool,
    pub lookback_days: Option<u32>,
    pub export_dir: Option<PathBuf>,
}

impl RunArgs {
    /// Environment configuration with command-line values layered on top
    pub fn harvest_config(&self) -> Result<HarvestConfig> {
        let mut config = HarvestConfig::from_env()?;
        if let Some(pages) = self.pages {
            config.max_pages = pages;
        }
        if let Some(per_page) = self.per_page {
            config.records_per_page = per_page;
        }
        if self.details {
            config.fetch_details = true;
        }
        if let Some(days) = self.lookback_days {
            config.lookback_days = days;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run one harvest and print its summary
pub async fn run(args: RunArgs) -> Result<()> {
    let config = args.harvest_config()?;
    let policy = RetryPolicy::from_env()?;

    let client = ApiClient::new(&args.base_url, policy)?;
    let store = Store::open(&args.db_path)?;
    let normalizer = Normalizer::new(client.base_url().to_string());
    let harvester = Harvester::new(client, store, normalizer);

    let outcome = harvester.run(&config).await?;
    let combined = harvester.combined_stats(&outcome.stats)?;

    let stats = combined.run;
    println!("{}", "Harvest complete:".cyan().bold());
    println!("  Session:          {}", outcome.session_id);
    println!("  Pages processed:  {}", stats.pages_processed);
    println!("  Pages failed:     {}", stats.pages_failed);
    println!("  Found:            {}", stats.found);
    println!("  Collected:        {}", stats.collected.to_string().green());
    println!("  Skipped:          {}", stats.skipped);
    println!("  Errors:           {}", stats.errors.to_string().red());
    if let Some(rate) = stats.success_rate() {
        println!("  Success rate:     {:.1}%", rate);
    }
    println!();
    println!("{}", "Store totals:".cyan().bold());
    println!("  Records:          {}", combined.store.total_records);
    println!("  Successful:       {}", combined.store.successful);
    println!("  Failed:           {}", combined.store.failed);

    if let Some(dir) = &args.export_dir {
        export_both(harvester.store(), dir)?;
    }

    Ok(())
}

fn export_both(store: &Store, dir: &Path) -> Result<()> {
    for format in [ExportFormat::Json, ExportFormat::Csv] {
        let path = dir.join(format.default_filename());
        let rows = store.export_all(format, &path)?;
        info!(%format, path = %path.display(), rows, "Wrote export");
        println!("  Exported {} rows to {}", rows, path.display());
    }
    Ok(())
}
