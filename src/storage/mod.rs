//! Dataset files
//!
//! Per-run and canonical datasets share one CSV layout:
//! `headline,url,time,summary,tags`, UTF-8 with a byte-order mark so that
//! spreadsheet tools pick up the encoding.

pub mod merge;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::models::NewsRecord;
use crate::utils::error::StorageError;

pub use merge::{discover_run_files, merge, CanonicalDataset};

/// Column order of every dataset file
pub const HEADER: [&str; 5] = ["headline", "url", "time", "summary", "tags"];

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One row as stored, before cleaning
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawRow {
    pub headline: String,
    pub url: String,
    pub time: String,
    pub summary: String,
    pub tags: String,
}

impl From<&NewsRecord> for RawRow {
    fn from(record: &NewsRecord) -> Self {
        Self {
            headline: record.headline.clone(),
            url: record.url.clone(),
            time: record.time_string(),
            summary: record.summary.clone(),
            tags: record.tags_string(),
        }
    }
}

/// Write `records` to `path`, replacing any existing file
///
/// Rows are staged in a temporary file next to `path` and renamed over it
/// once complete, so a failed write leaves the previous file intact.
///
/// # Errors
///
/// Returns `StorageError` if the file cannot be created or written
pub fn write_records(path: &Path, records: &[NewsRecord]) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;

    let mut staged = NamedTempFile::new_in(dir).map_err(|e| StorageError::io(dir, e))?;
    staged
        .write_all(BOM)
        .map_err(|e| StorageError::io(staged.path(), e))?;

    let mut writer = csv::Writer::from_writer(staged.as_file_mut());
    writer
        .write_record(HEADER)
        .map_err(|e| StorageError::csv(path, e))?;

    for record in records {
        let row = RawRow::from(record);
        writer
            .write_record([&row.headline, &row.url, &row.time, &row.summary, &row.tags])
            .map_err(|e| StorageError::csv(path, e))?;
    }

    writer.flush().map_err(|e| StorageError::io(path, e))?;
    drop(writer);

    staged
        .persist(path)
        .map_err(|e| StorageError::io(path, e.error))?;
    Ok(())
}

/// Read every row of a dataset file
///
/// Columns are matched by header name, missing columns read as empty and
/// an optional byte-order mark is ignored. Rows that do not decode are
/// logged and skipped.
///
/// # Errors
///
/// Returns `StorageError` if the file cannot be read or has no header
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>, StorageError> {
    let bytes = fs::read(path).map_err(|e| StorageError::io(path, e))?;
    let body = bytes.strip_prefix(BOM).unwrap_or(&bytes[..]);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body);

    let headers = reader
        .headers()
        .map_err(|e| StorageError::csv(path, e))?
        .clone();
    if headers.is_empty() || !headers.iter().any(|h| h == "url") {
        return Err(StorageError::MissingColumn {
            path: path.to_path_buf(),
            column: "url",
        });
    }

    let mut rows = Vec::new();
    for (line, result) in reader.deserialize::<RawRow>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => tracing::warn!(path = %path.display(), line = line + 2, error = %e, "Skipping unreadable row"),
        }
    }

    Ok(rows)
}

/// File name of a per-run dataset generated at `stamp`
pub fn run_file_name(prefix: &str, stamp: NaiveDateTime) -> String {
    format!("{prefix}{}.csv", stamp.format("%Y%m%d_%H%M%S"))
}

/// Write one run's records into `dir`
///
/// Returns `Ok(None)` without touching the disk when there is nothing to
/// write. A run landing on an existing file name gets a numeric suffix.
///
/// # Errors
///
/// Returns `StorageError` if the file cannot be written
pub fn write_run_file(
    dir: &Path,
    prefix: &str,
    records: &[NewsRecord],
    stamp: NaiveDateTime,
) -> Result<Option<PathBuf>, StorageError> {
    if records.is_empty() {
        tracing::warn!(dir = %dir.display(), "No records, skipping per-run file");
        return Ok(None);
    }

    let mut path = dir.join(run_file_name(prefix, stamp));
    let mut suffix = 1;
    while path.exists() {
        let name = format!("{prefix}{}_{suffix}.csv", stamp.format("%Y%m%d_%H%M%S"));
        path = dir.join(name);
        suffix += 1;
    }

    write_records(&path, records)?;
    tracing::info!(path = %path.display(), records = records.len(), "Saved per-run file");
    Ok(Some(path))
}
