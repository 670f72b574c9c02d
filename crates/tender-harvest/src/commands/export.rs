//! `tender-harvest export` command implementation

use crate::error::Result;
use crate::storage::{ExportFormat, Store};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Export every stored notice, returning the file written
pub async fn run(db_path: &Path, format: ExportFormat, output: Option<PathBuf>) -> Result<PathBuf> {
    let store = Store::open(db_path)?;
    let output = output.unwrap_or_else(|| PathBuf::from(format.default_filename()));

    let rows = store.export_all(format, &output)?;

    if rows == 0 {
        println!("{}", "No stored notices; wrote an empty export.".yellow());
    }
    println!(
        "{} {} rows to {}",
        "Exported".green().bold(),
        rows,
        output.display()
    );

    Ok(output)
}
