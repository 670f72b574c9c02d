//! Tender Harvest - Main entry point

use anyhow::Context;
use clap::Parser;
use std::process;
use tender_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tender_harvest::commands::{self, run::RunArgs};
use tender_harvest::{Cli, Commands};
use tracing::error;

#[tokio::main]
async fn main() {
    // Pick up .env before clap reads env-backed arguments
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Info };
    let base_config = || {
        LogConfig::builder()
            .level(level)
            .output(LogOutput::Console)
            .log_file_prefix("tender-harvest")
            .build()
    };

    // Environment variables take precedence over flags
    let log_config = base_config().merge_env().unwrap_or_else(|_| base_config());

    let guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    };

    if let Err(e) = execute_command(cli).await {
        let message = format!("{e:#}");
        error!(error = %message, "Command failed");
        eprintln!("Error: {}", message);
        drop(guard);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            base_url,
            pages,
            per_page,
            details,
            lookback_days,
            export_dir,
        } => commands::run::run(RunArgs {
            base_url,
            db_path: cli.db_path,
            pages,
            per_page,
            details,
            lookback_days,
            export_dir,
        })
        .await
        .context("harvest run failed"),

        Commands::Export { format, output } => {
            let path = commands::export::run(&cli.db_path, format, output)
                .await
                .with_context(|| format!("export from {} failed", cli.db_path.display()))?;
            tracing::debug!(path = %path.display(), "Export finished");
            Ok(())
        },

        Commands::Stats { session } => commands::stats::run(&cli.db_path, session)
            .await
            .with_context(|| format!("reading stats from {} failed", cli.db_path.display())),
    }
}
