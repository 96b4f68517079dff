//! Listing crawler with cutoff-driven pagination
//!
//! Drives one rendering session through successive listing pages until the
//! last entry on a page predates the cutoff, the next-page control runs
//! out, the page stops changing, or the page limit is hit. The crawl never
//! fails outright: every error becomes a [`StopReason`] and whatever was
//! gathered so far is returned.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::time::Instant;
use tracing::instrument;

use crate::config::Config;
use crate::crawler::render::Renderer;
use crate::crawler::wait::{wait_for, Condition};
use crate::models::{CrawlOutcome, CrawlState, StopReason};
use crate::parser::ListingParser;
use crate::utils::error::{ParseError, RenderError};

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Paginating listing crawler
#[derive(Debug, Clone)]
pub struct ListCrawler {
    parser: ListingParser,
    card_selector: String,
    next_selector: String,
    load_timeout: Duration,
    next_timeout: Duration,
    page_timeout: Duration,
    poll_interval: Duration,
    max_pages: usize,
    debug_pages: usize,
    debug_file: Option<PathBuf>,
    clock: fn() -> NaiveDateTime,
}

impl ListCrawler {
    /// Create a crawler from configuration
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidSelector` if a listing selector does not parse
    pub fn new(config: &Config) -> Result<Self, ParseError> {
        let crawler = &config.crawler;

        Ok(Self {
            parser: ListingParser::new(&config.selectors)?,
            card_selector: config.selectors.card.clone(),
            next_selector: config.selectors.next_page.clone(),
            load_timeout: crawler.load_timeout(),
            next_timeout: crawler.next_timeout(),
            page_timeout: crawler.page_timeout(),
            poll_interval: crawler.poll_interval(),
            max_pages: crawler.max_pages,
            debug_pages: crawler.debug_pages,
            debug_file: crawler.debug_file.clone(),
            clock: local_now,
        })
    }

    /// Replace the clock relative timestamps are resolved against
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Crawl one source starting at `seed`
    ///
    /// The session is closed before returning, whatever the outcome.
    #[instrument(level = "info", skip_all, fields(seed = %seed))]
    pub async fn crawl<R: Renderer + ?Sized>(
        &self,
        renderer: &mut R,
        seed: &str,
        cutoff: NaiveDateTime,
    ) -> CrawlOutcome {
        let mut state = CrawlState::new(cutoff);
        self.reset_snapshots();
        let stop = self.drive(renderer, seed, &mut state).await;

        if let Err(e) = renderer.close().await {
            tracing::warn!(error = %e, "Failed to close rendering session");
        }

        if stop.is_success() {
            tracing::info!(
                pages = state.pages(),
                records = state.records().len(),
                stop = %stop,
                "Crawl finished"
            );
        } else {
            tracing::error!(
                pages = state.pages(),
                records = state.records().len(),
                stop = %stop,
                "Crawl aborted"
            );
        }

        state.finish(stop)
    }

    async fn drive<R: Renderer + ?Sized>(
        &self,
        renderer: &mut R,
        seed: &str,
        state: &mut CrawlState,
    ) -> StopReason {
        if let Err(stop) = self.load_seed(renderer, seed).await {
            return stop;
        }

        let mut markup = match renderer.current_markup().await {
            Ok(markup) => markup,
            Err(e) => return StopReason::RenderFailed(e.to_string()),
        };

        loop {
            let page = state.pages() + 1;
            self.snapshot(page, &markup);

            let records = self.parser.parse(&markup, (self.clock)());
            tracing::info!(page, records = records.len(), "Page collected");

            if state.absorb_page(&markup, records) {
                tracing::info!(page, cutoff = %state.cutoff(), "Reached entries older than cutoff");
                return StopReason::CutoffReached;
            }

            if self.max_pages > 0 && state.pages() >= self.max_pages {
                tracing::info!(max_pages = self.max_pages, "Page limit reached");
                return StopReason::PageLimit;
            }

            let advanced = self.advance(renderer, &markup).await;
            markup = match advanced {
                Ok(next) if state.has_visited(&next) => {
                    tracing::warn!(page, "Next page was already visited");
                    return StopReason::NoProgress;
                }
                Ok(next) => next,
                Err(stop) => return stop,
            };
        }
    }

    /// Load the seed page and wait for the listing, sharing one deadline
    async fn load_seed<R: Renderer + ?Sized>(
        &self,
        renderer: &mut R,
        seed: &str,
    ) -> Result<(), StopReason> {
        let start = Instant::now();

        match tokio::time::timeout(self.load_timeout, renderer.load(seed)).await {
            Err(_) => {
                tracing::error!(timeout_secs = self.load_timeout.as_secs(), "Seed page load timed out");
                return Err(StopReason::LoadTimeout);
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Seed page failed to load");
                return Err(StopReason::RenderFailed(e.to_string()));
            }
            Ok(Ok(())) => {}
        }

        let remaining = self.load_timeout.saturating_sub(start.elapsed());
        match wait_for(
            renderer,
            Condition::Present(&self.card_selector),
            remaining,
            self.poll_interval,
        )
        .await
        {
            Ok(()) => Ok(()),
            Err(e @ RenderError::Timeout { .. }) => {
                tracing::error!(error = %e, "Listing never appeared on seed page");
                Err(StopReason::LoadTimeout)
            }
            Err(e) => {
                tracing::error!(error = %e, "Seed page failed while waiting for listing");
                Err(StopReason::RenderFailed(e.to_string()))
            }
        }
    }

    /// Click through to the next page and return its markup
    async fn advance<R: Renderer + ?Sized>(
        &self,
        renderer: &mut R,
        current: &str,
    ) -> Result<String, StopReason> {
        let next = self.next_selector.as_str();

        if let Err(e) = wait_for(
            renderer,
            Condition::Clickable(next),
            self.next_timeout,
            self.poll_interval,
        )
        .await
        {
            tracing::info!(reason = %e, "No next-page control");
            return Err(StopReason::PaginationExhausted);
        }

        if let Err(e) = renderer.click(next).await {
            tracing::warn!(error = %e, "Next-page click failed");
            return Err(StopReason::PaginationExhausted);
        }

        let start = Instant::now();
        if let Err(e) = wait_for(
            renderer,
            Condition::Present(&self.card_selector),
            self.page_timeout,
            self.poll_interval,
        )
        .await
        {
            tracing::warn!(error = %e, "Listing missing after pagination");
            return Err(StopReason::PaginationExhausted);
        }

        let remaining = self.page_timeout.saturating_sub(start.elapsed());
        if wait_for(renderer, Condition::Changed(current), remaining, self.poll_interval)
            .await
            .is_err()
        {
            tracing::warn!("Next page rendered identical content");
            return Err(StopReason::NoProgress);
        }

        renderer.current_markup().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to read page markup");
            StopReason::RenderFailed(e.to_string())
        })
    }

    /// Empty the debug file so it only holds this crawl's leading pages
    fn reset_snapshots(&self) {
        let Some(path) = &self.debug_file else {
            return;
        };
        if let Err(e) = File::create(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to reset snapshot file");
        }
    }

    /// Append the first few pages to the debug file when one is configured
    fn snapshot(&self, page: usize, markup: &str) {
        let Some(path) = &self.debug_file else {
            return;
        };
        if page > self.debug_pages {
            return;
        }

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "<!-- page {page} -->\n{markup}"));

        match result {
            Ok(()) => tracing::debug!(page, path = %path.display(), "Saved page snapshot"),
            Err(e) => tracing::warn!(page, path = %path.display(), error = %e, "Failed to save page snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 9)
            .unwrap()
            .and_hms_opt(19, 32, 0)
            .unwrap()
    }

    fn cutoff() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn page(times: &[&str], has_next: bool) -> String {
        let cards: String = times
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    r#"<div class="feed-card-item"><h2><a href="https://news.sina.com.cn/{t}/{i}.shtml">新闻{i}</a></h2><div class="feed-card-time">{t}</div></div>"#
                )
            })
            .collect();
        let next = if has_next {
            r#"<span class="pagebox_next"><a href="?page=next">下一页</a></span>"#
        } else {
            ""
        };
        format!(
            r#"<html><body><div class="feed-card-content">{cards}</div><div class="feed-card-page">{next}</div></body></html>"#
        )
    }

    /// Serves a fixed list of pages; a click moves to the next one
    struct Pages {
        pages: Vec<String>,
        index: usize,
        loaded: bool,
        clicks: usize,
        closed: bool,
    }

    impl Pages {
        fn new(pages: Vec<String>) -> Self {
            Self {
                pages,
                index: 0,
                loaded: false,
                clicks: 0,
                closed: false,
            }
        }

        fn current(&self) -> Result<&str, RenderError> {
            if !self.loaded {
                return Err(RenderError::NoPage);
            }
            Ok(&self.pages[self.index])
        }
    }

    #[async_trait]
    impl Renderer for Pages {
        async fn load(&mut self, _url: &str) -> Result<(), RenderError> {
            self.loaded = true;
            Ok(())
        }

        async fn current_markup(&mut self) -> Result<String, RenderError> {
            self.current().map(str::to_string)
        }

        async fn has_element(&mut self, _selector: &str) -> Result<bool, RenderError> {
            Ok(self.current()?.contains("feed-card-item"))
        }

        async fn is_clickable(&mut self, _selector: &str) -> Result<bool, RenderError> {
            Ok(self.current()?.contains("pagebox_next"))
        }

        async fn click(&mut self, selector: &str) -> Result<(), RenderError> {
            self.clicks += 1;
            if self.index + 1 >= self.pages.len() {
                return Err(RenderError::NotClickable(selector.to_string()));
            }
            self.index += 1;
            Ok(())
        }

        async fn close(&mut self) -> Result<(), RenderError> {
            self.closed = true;
            Ok(())
        }
    }

    fn crawler() -> ListCrawler {
        ListCrawler::new(&Config::default())
            .unwrap()
            .with_clock(fixed_now)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_cutoff_page() {
        let mut renderer = Pages::new(vec![
            page(&["1小时前", "2小时前"], true),
            page(&["3月5日 10:00", "2025-02-20 08:00"], true),
            page(&["2025-02-01 08:00"], true),
        ]);

        let outcome = crawler().crawl(&mut renderer, "seed", cutoff()).await;

        assert_eq!(outcome.stop, StopReason::CutoffReached);
        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(renderer.clicks, 1);
        assert!(renderer.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_without_next_control() {
        let mut renderer = Pages::new(vec![page(&["1小时前"], false)]);

        let outcome = crawler().crawl(&mut renderer, "seed", cutoff()).await;

        assert_eq!(outcome.stop, StopReason::PaginationExhausted);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(renderer.clicks, 0);
        assert!(renderer.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_limit() {
        let mut config = Config::default();
        config.crawler.max_pages = 1;
        let crawler = ListCrawler::new(&config).unwrap().with_clock(fixed_now);

        let mut renderer = Pages::new(vec![
            page(&["1小时前"], true),
            page(&["2小时前"], true),
        ]);
        let outcome = crawler.crawl(&mut renderer, "seed", cutoff()).await;

        assert_eq!(outcome.stop, StopReason::PageLimit);
        assert_eq!(outcome.pages, 1);
        assert_eq!(renderer.clicks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revisited_page_is_no_progress() {
        let first = page(&["1小时前"], true);
        let mut renderer = Pages::new(vec![
            first.clone(),
            page(&["2小时前"], true),
            first,
        ]);

        let outcome = crawler().crawl(&mut renderer, "seed", cutoff()).await;

        assert_eq!(outcome.stop, StopReason::NoProgress);
        assert_eq!(outcome.pages, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_snapshots_limited() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.html");

        let mut config = Config::default();
        config.crawler.debug_pages = 1;
        config.crawler.debug_file = Some(path.clone());
        let crawler = ListCrawler::new(&config).unwrap().with_clock(fixed_now);

        let mut renderer = Pages::new(vec![
            page(&["1小时前"], true),
            page(&["2小时前"], false),
        ]);
        crawler.crawl(&mut renderer, "seed", cutoff()).await;

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<!-- page 1 -->"));
        assert!(!written.contains("<!-- page 2 -->"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_file_restarts_each_crawl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.html");
        std::fs::write(&path, "<!-- page 1 -->\nstale").unwrap();

        let mut config = Config::default();
        config.crawler.debug_pages = 2;
        config.crawler.debug_file = Some(path.clone());
        let crawler = ListCrawler::new(&config).unwrap().with_clock(fixed_now);

        for _ in 0..3 {
            let mut renderer = Pages::new(vec![
                page(&["1小时前"], true),
                page(&["2小时前"], false),
            ]);
            crawler.crawl(&mut renderer, "seed", cutoff()).await;
        }

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.matches("<!-- page 1 -->").count(), 1);
        assert_eq!(written.matches("<!-- page 2 -->").count(), 1);
        assert!(!written.contains("stale"));
    }
}
