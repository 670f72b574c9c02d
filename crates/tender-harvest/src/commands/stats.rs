//! `tender-harvest stats` command implementation

use crate::error::Result;
use crate::storage::Store;
use colored::Colorize;
use std::path::Path;

/// Print store totals, failed ids and optionally one session
pub async fn run(db_path: &Path, session: Option<i64>) -> Result<()> {
    let store = Store::open(db_path)?;
    let stats = store.get_stats()?;

    println!("{}", "Store totals:".cyan().bold());
    println!("  Records:     {}", stats.total_records);
    println!("  Successful:  {}", stats.successful);
    println!("  Failed:      {}", stats.failed);

    let failed = store.failed_ids()?;
    if !failed.is_empty() {
        println!();
        println!("{}", "Failed notices:".red().bold());
        for id in &failed {
            println!("  {}", id);
        }
    }

    if let Some(session_id) = session {
        println!();
        match store.session(session_id)? {
            Some(session) => {
                println!("{} {}", "Session".cyan().bold(), session.id);
                println!("  Status:           {}", session.status);
                println!("  Started:          {}", session.started_at);
                match session.finished_at {
                    Some(finished) => println!("  Finished:         {}", finished),
                    None => println!("  Finished:         -"),
                }
                println!("  Pages processed:  {}", session.stats.pages_processed);
                println!("  Pages failed:     {}", session.stats.pages_failed);
                println!("  Found:            {}", session.stats.found);
                println!("  Collected:        {}", session.stats.collected);
                println!("  Skipped:          {}", session.stats.skipped);
                println!("  Errors:           {}", session.stats.errors);
            },
            None => println!("Session {} not found.", session_id),
        }
    }

    Ok(())
}
