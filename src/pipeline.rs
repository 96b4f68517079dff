//! End-to-end run: crawl every source, save the run, merge, analyze
//!
//! ```text
//! sources ──▶ ListCrawler ──▶ per-run file ──▶ merge ──▶ canonical file ──▶ trends
//! ```
//!
//! Failures are downgraded as they surface: a source whose session cannot be
//! launched is skipped, and a run that yields nothing to save or merge stops
//! early, leaving the previous canonical dataset as it was.

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use tracing::Instrument;

use crate::analytics::TrendSummary;
use crate::config::{Config, SourceConfig};
use crate::crawler::{Launcher, ListCrawler};
use crate::error::{Error, Result};
use crate::models::{NewsRecord, StopReason};
use crate::storage::{discover_run_files, merge, write_run_file};

/// How many tags the run summary logs
const TOP_TAGS: usize = 10;

/// Outcome of one source
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub name: String,
    pub url: String,
    pub records: usize,
    pub pages: usize,
    /// `None` when no session could be launched
    pub stop: Option<StopReason>,
}

/// Summary of a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub sources: Vec<SourceReport>,
    pub run_file: Option<PathBuf>,
    /// Canonical record count, when the canonical file was written
    pub merged: Option<usize>,
    pub trends: Option<TrendSummary>,
}

impl PipelineReport {
    pub fn total_records(&self) -> usize {
        self.sources.iter().map(|s| s.records).sum()
    }
}

/// Pipeline over sessions created by `L`
pub struct Pipeline<L: Launcher> {
    config: Config,
    launcher: L,
    crawler: ListCrawler,
    clock: fn() -> NaiveDateTime,
}

/// Log a failure the pipeline downgrades to a skip
fn log_failure(err: &Error, message: &str) {
    tracing::error!(
        error = %err,
        category = err.category().label(),
        recoverable = err.is_recoverable(),
        "{message}"
    );
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl<L: Launcher> Pipeline<L> {
    /// Create a pipeline
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration does not validate and
    /// `Error::Parse` if a configured selector does not parse
    pub fn new(config: Config, launcher: L) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::config(format!("{e:#}")))?;
        let crawler = ListCrawler::new(&config)?;
        Ok(Self {
            config,
            launcher,
            crawler,
            clock: local_now,
        })
    }

    /// Replace the clock used for relative times and run file names
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self.crawler = self.crawler.with_clock(clock);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Crawl all sources, save the run and merge
    pub async fn run(&self) -> PipelineReport {
        let mut report = PipelineReport::default();
        let cutoff = self.config.cutoff();
        let mut records: Vec<NewsRecord> = Vec::new();

        tracing::info!(
            sources = self.config.sources.len(),
            cutoff = %cutoff,
            "Pipeline started"
        );

        for (i, source) in self.config.sources.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.crawler.source_delay()).await;
            }

            let span = tracing::info_span!("source", name = %source.name);
            let (source_report, mut found) = self.crawl_source(source, cutoff).instrument(span).await;
            report.sources.push(source_report);
            records.append(&mut found);
        }

        if records.is_empty() {
            tracing::error!("No records from any source, stopping before merge");
            return report;
        }

        let storage = &self.config.storage;
        match write_run_file(&storage.data_dir, &storage.run_prefix, &records, (self.clock)()) {
            Ok(path) => report.run_file = path,
            Err(e) => log_failure(&e.into(), "Failed to save per-run file"),
        }

        self.merge_stage(&mut report);
        report
    }

    /// Re-merge the per-run files already on disk
    pub fn merge_only(&self) -> PipelineReport {
        let mut report = PipelineReport::default();
        self.merge_stage(&mut report);
        report
    }

    async fn crawl_source(
        &self,
        source: &SourceConfig,
        cutoff: NaiveDateTime,
    ) -> (SourceReport, Vec<NewsRecord>) {
        let mut report = SourceReport {
            name: source.name.clone(),
            url: source.url.clone(),
            records: 0,
            pages: 0,
            stop: None,
        };

        tracing::info!(url = %source.url, "Crawling source");

        let mut session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => {
                log_failure(&e.into(), "Failed to launch rendering session, skipping source");
                return (report, Vec::new());
            }
        };

        let outcome = self.crawler.crawl(&mut session, &source.url, cutoff).await;
        report.records = outcome.records.len();
        report.pages = outcome.pages;
        report.stop = Some(outcome.stop);

        if outcome.records.is_empty() {
            tracing::warn!("Source produced no records");
        }

        (report, outcome.records)
    }

    fn merge_stage(&self, report: &mut PipelineReport) {
        let storage = &self.config.storage;

        let files = match discover_run_files(&storage.data_dir, &storage.run_prefix) {
            Ok(files) if files.is_empty() => {
                tracing::error!(dir = %storage.data_dir.display(), "No dataset files to merge");
                return;
            }
            Ok(files) => files,
            Err(e) => {
                log_failure(&e.into(), "Failed to list dataset files");
                return;
            }
        };

        let dataset = merge(&files);
        if dataset.is_empty() {
            tracing::error!(files = files.len(), "No valid records after merge, keeping previous dataset");
            return;
        }

        if let Err(e) = dataset.persist(&self.config.merged_path()) {
            log_failure(&e.into(), "Failed to save canonical dataset, keeping previous dataset");
            return;
        }
        report.merged = Some(dataset.len());

        let trends = TrendSummary::from_records(dataset.iter());
        if let Err(e) = trends.write_daily_csv(&self.config.trend_path()) {
            let err = Error::from(e);
            tracing::warn!(error = %err, category = err.category().label(), "Failed to save daily trend");
        }

        if let Some(peak) = trends.peak_day() {
            tracing::info!(date = %peak.date, count = peak.count, days = trends.days(), "Busiest day");
        }
        for (tag, count) in trends.top_tags(TOP_TAGS) {
            tracing::info!(tag = %tag, count, "Top tag");
        }

        report.trends = Some(trends);
    }
}
