//! Merge per-run datasets into the canonical dataset
//!
//! Rows from every input file are folded together in file order, keyed by
//! url with the first-seen row kept. The cleaning pass runs after
//! deduplication and drops rows without a usable time, headline or summary.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{NewsRecord, TIME_FORMAT};
use crate::storage::{read_rows, write_records, RawRow};
use crate::utils::error::StorageError;

/// Deduplicated, cleaned records in first-seen order
#[derive(Debug, Clone, Default)]
pub struct CanonicalDataset {
    records: Vec<NewsRecord>,
    index: HashMap<String, usize>,
}

impl CanonicalDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record unless its url is already present; returns whether it
    /// was added
    pub fn insert(&mut self, record: NewsRecord) -> bool {
        if self.index.contains_key(&record.url) {
            return false;
        }
        self.index.insert(record.url.clone(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn get(&self, url: &str) -> Option<&NewsRecord> {
        self.index.get(url).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NewsRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[NewsRecord] {
        &self.records
    }

    /// Write the dataset to `path`, replacing the previous file
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Empty` for an empty dataset, leaving any
    /// existing file untouched
    pub fn persist(&self, path: &Path) -> Result<(), StorageError> {
        if self.is_empty() {
            return Err(StorageError::Empty);
        }
        write_records(path, &self.records)?;
        tracing::info!(path = %path.display(), records = self.len(), "Saved canonical dataset");
        Ok(())
    }
}

/// Per-run files in `dir` whose names start with `prefix`, sorted by name
///
/// # Errors
///
/// Returns `StorageError::Io` if the directory cannot be listed
pub fn discover_run_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, StorageError> {
    let entries = fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".csv"))
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Fold `files` into one canonical dataset
///
/// A file that cannot be read is logged and skipped.
pub fn merge(files: &[PathBuf]) -> CanonicalDataset {
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique: Vec<RawRow> = Vec::new();
    let mut total = 0usize;

    for path in files {
        let rows = match read_rows(path) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable dataset file");
                continue;
            }
        };
        tracing::debug!(path = %path.display(), rows = rows.len(), "Read dataset file");

        for row in rows {
            total += 1;
            let url = row.url.trim();
            if url.is_empty() || !seen.insert(url.to_string()) {
                continue;
            }
            unique.push(row);
        }
    }

    let mut dataset = CanonicalDataset::new();
    let mut dropped = 0usize;
    for row in unique {
        match clean(row) {
            Some(record) => {
                dataset.insert(record);
            }
            None => dropped += 1,
        }
    }

    tracing::info!(
        files = files.len(),
        rows = total,
        unique = dataset.len() + dropped,
        dropped,
        kept = dataset.len(),
        "Merged dataset files"
    );

    dataset
}

/// Turn a stored row into a record, or `None` if it fails cleaning
fn clean(row: RawRow) -> Option<NewsRecord> {
    let time = parse_stored_time(&row.time)?;
    let headline = row.headline.trim();
    let summary = row.summary.trim();
    if headline.is_empty() || summary.is_empty() {
        return None;
    }

    Some(NewsRecord {
        headline: headline.to_string(),
        url: row.url.trim().to_string(),
        time: Some(time),
        summary: summary.to_string(),
        tags: NewsRecord::split_tags(&row.tags),
    })
}

/// Parse a stored timestamp; older files may lack seconds or the clock
fn parse_stored_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
