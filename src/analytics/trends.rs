//! Daily volume and tag frequency over the canonical dataset
//!
//! This module provides:
//! - Per-day record counts (the trend line)
//! - Tag frequencies, most frequent first
//! - A CSV export of the daily counts

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::NewsRecord;
use crate::utils::error::StorageError;

/// One row of the trend export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

/// Aggregates over a set of records
#[derive(Debug, Clone, Default)]
pub struct TrendSummary {
    /// Records per calendar day, ascending by date
    daily: BTreeMap<NaiveDate, usize>,

    /// Tag frequencies, descending by count then ascending by tag
    tags: Vec<(String, usize)>,

    /// Records with a time
    dated: usize,
}

impl TrendSummary {
    /// Aggregate `records`; records without a time are not counted per day
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a NewsRecord>) -> Self {
        let mut daily: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        let mut tag_counts: HashMap<&'a str, usize> = HashMap::new();
        let mut dated = 0;

        for record in records {
            if let Some(time) = record.time {
                *daily.entry(time.date()).or_default() += 1;
                dated += 1;
            }
            for tag in &record.tags {
                *tag_counts.entry(tag.as_str()).or_default() += 1;
            }
        }

        let mut tags: Vec<(String, usize)> = tag_counts
            .into_iter()
            .map(|(tag, count)| (tag.to_string(), count))
            .collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self { daily, tags, dated }
    }

    pub fn daily(&self) -> impl Iterator<Item = DailyCount> + '_ {
        self.daily
            .iter()
            .map(|(&date, &count)| DailyCount { date, count })
    }

    pub fn days(&self) -> usize {
        self.daily.len()
    }

    pub fn dated_records(&self) -> usize {
        self.dated
    }

    /// Busiest day; the earliest one wins a tie
    pub fn peak_day(&self) -> Option<DailyCount> {
        self.daily()
            .fold(None, |best: Option<DailyCount>, day| match best {
                Some(b) if b.count >= day.count => Some(b),
                _ => Some(day),
            })
    }

    /// The `n` most frequent tags
    pub fn top_tags(&self, n: usize) -> &[(String, usize)] {
        &self.tags[..n.min(self.tags.len())]
    }

    /// Export the daily counts as `date,count`
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the file cannot be written
    pub fn write_daily_csv(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let mut writer = csv::Writer::from_path(path).map_err(|e| StorageError::csv(path, e))?;
        for row in self.daily() {
            writer
                .serialize(row)
                .map_err(|e| StorageError::csv(path, e))?;
        }
        writer.flush().map_err(|e| StorageError::io(path, e))?;

        tracing::info!(path = %path.display(), days = self.days(), "Saved daily trend");
        Ok(())
    }
}
