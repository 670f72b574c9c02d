//! Full dumps of the `records` table

use crate::error::Result;
use crate::storage::schema::RECORD_COLUMNS;
use rusqlite::Connection;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// UTF-8 byte-order mark so spreadsheet tools detect the encoding
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pretty-printed JSON array
    Json,
    /// BOM-prefixed CSV with a header row
    Csv,
}

impl ExportFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// Get default filename for this format
    pub fn default_filename(&self) -> String {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        format!("tenders-{}.{}", timestamp, self.extension())
    }

    pub fn as_str(&self) -> &str {
        self.extension()
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(format!("Invalid export format: {}. Valid formats: json, csv", s)),
        }
    }
}

/// One `records` row as stored
#[derive(Debug, Clone)]
pub(crate) struct RecordRow {
    id: String,
    title: String,
    organization: String,
    category: String,
    method: Option<String>,
    due_date: Option<String>,
    announce_date: Option<String>,
    budget: String,
    counterparty: Option<String>,
    detail_url: String,
    raw_payload: String,
    created_at: String,
}

impl RecordRow {
    fn to_json(&self) -> Value {
        // Payloads are written by the store, but keep unparseable text as-is
        let payload = serde_json::from_str(&self.raw_payload)
            .unwrap_or_else(|_| Value::String(self.raw_payload.clone()));

        serde_json::json!({
            "id": self.id,
            "title": self.title,
            "organization": self.organization,
            "category": self.category,
            "method": self.method,
            "due_date": self.due_date,
            "announce_date": self.announce_date,
            "budget": self.budget,
            "counterparty": self.counterparty,
            "detail_url": self.detail_url,
            "raw_payload": payload,
            "created_at": self.created_at,
        })
    }

    fn to_csv_record(&self) -> [&str; 12] {
        [
            &self.id,
            &self.title,
            &self.organization,
            &self.category,
            self.method.as_deref().unwrap_or_default(),
            self.due_date.as_deref().unwrap_or_default(),
            self.announce_date.as_deref().unwrap_or_default(),
            &self.budget,
            self.counterparty.as_deref().unwrap_or_default(),
            &self.detail_url,
            &self.raw_payload,
            &self.created_at,
        ]
    }
}

/// Every record in insertion order
pub(crate) fn load_rows(conn: &Connection) -> Result<Vec<RecordRow>> {
    let sql = format!("SELECT {} FROM records ORDER BY rowid", RECORD_COLUMNS.join(", "));
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map([], |row| {
            Ok(RecordRow {
                id: row.get(0)?,
                title: row.get(1)?,
                organization: row.get(2)?,
                category: row.get(3)?,
                method: row.get(4)?,
                due_date: row.get(5)?,
                announce_date: row.get(6)?,
                budget: row.get(7)?,
                counterparty: row.get(8)?,
                detail_url: row.get(9)?,
                raw_payload: row.get(10)?,
                created_at: row.get(11)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Write rows in the given format, creating parent directories as needed
pub(crate) fn write_rows(rows: &[RecordRow], format: ExportFormat, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match format {
        ExportFormat::Json => write_json(rows, path),
        ExportFormat::Csv => write_csv(rows, path),
    }
}

fn write_json(rows: &[RecordRow], path: &Path) -> Result<()> {
    let values: Vec<Value> = rows.iter().map(RecordRow::to_json).collect();

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &values)?;
    writer.flush()?;
    Ok(())
}

fn write_csv(rows: &[RecordRow], path: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(RECORD_COLUMNS)?;
    for row in rows {
        writer.write_record(row.to_csv_record())?;
    }
    writer.flush()?;
    Ok(())
}
