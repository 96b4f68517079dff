// Core data structures for the sinafeed collector

use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Format of absolute timestamps in records and dataset files
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Delimiter joining tags in dataset files
pub const TAG_DELIMITER: char = ',';

/// One listing entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewsRecord {
    pub headline: String,
    pub url: String, // identity key
    pub time: Option<NaiveDateTime>,
    pub summary: String,
    pub tags: Vec<String>,
}

impl NewsRecord {
    /// Time rendered as `%Y-%m-%d %H:%M:%S`, empty when unresolved
    pub fn time_string(&self) -> String {
        self.time
            .map(|t| t.format(TIME_FORMAT).to_string())
            .unwrap_or_default()
    }

    /// Tags joined with the dataset delimiter
    pub fn tags_string(&self) -> String {
        self.tags.join(&TAG_DELIMITER.to_string())
    }

    /// Split a delimited tag string, dropping empty segments
    pub fn split_tags(raw: &str) -> Vec<String> {
        raw.split(TAG_DELIMITER)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether this record is older than `cutoff`; an unresolved time counts
    /// as the earliest possible instant
    pub fn predates(&self, cutoff: NaiveDateTime) -> bool {
        self.time.map_or(true, |t| t < cutoff)
    }
}

/// Why a crawl stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Last entry on a page predates the cutoff
    CutoffReached,
    /// No clickable next-page control, or the click did not render a page
    PaginationExhausted,
    /// Advancing produced a page that was already seen
    NoProgress,
    /// Configured page limit hit
    PageLimit,
    /// Seed page never rendered the listing
    LoadTimeout,
    /// Rendering session failed outright
    RenderFailed(String),
}

impl StopReason {
    /// Content-driven or structural stop, as opposed to a failure
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::LoadTimeout | Self::RenderFailed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CutoffReached => "cutoff_reached",
            Self::PaginationExhausted => "pagination_exhausted",
            Self::NoProgress => "no_progress",
            Self::PageLimit => "page_limit",
            Self::LoadTimeout => "load_timeout",
            Self::RenderFailed(_) => "render_failed",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RenderFailed(detail) => write!(f, "render_failed: {detail}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of crawling one source
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub records: Vec<NewsRecord>,
    pub pages: usize,
    pub stop: StopReason,
}

impl CrawlOutcome {
    pub fn is_success(&self) -> bool {
        self.stop.is_success()
    }
}

/// Per-source state for one crawl
#[derive(Debug, Clone)]
pub struct CrawlState {
    cutoff: NaiveDateTime,
    visited: HashSet<String>,
    records: Vec<NewsRecord>,
    pages: usize,
}

impl CrawlState {
    /// Create new crawl state
    pub fn new(cutoff: NaiveDateTime) -> Self {
        Self {
            cutoff,
            visited: HashSet::new(),
            records: Vec::new(),
            pages: 0,
        }
    }

    /// SHA-256 hex digest of rendered markup
    pub fn signature(markup: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(markup.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Whether this markup was already rendered during the crawl
    pub fn has_visited(&self, markup: &str) -> bool {
        self.visited.contains(&Self::signature(markup))
    }

    /// Record a page and its records; returns true when the page's last
    /// record predates the cutoff
    pub fn absorb_page(&mut self, markup: &str, page_records: Vec<NewsRecord>) -> bool {
        self.visited.insert(Self::signature(markup));
        self.pages += 1;

        let reached = page_records
            .last()
            .is_some_and(|last| last.predates(self.cutoff));

        self.records.extend(page_records);
        reached
    }

    pub fn cutoff(&self) -> NaiveDateTime {
        self.cutoff
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn records(&self) -> &[NewsRecord] {
        &self.records
    }

    /// Consume the state into an outcome
    pub fn finish(self, stop: StopReason) -> CrawlOutcome {
        CrawlOutcome {
            records: self.records,
            pages: self.pages,
            stop,
        }
    }
}
