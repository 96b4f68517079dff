//! Configuration management for the sinafeed collector
//!
//! This module handles loading and validating configuration from a TOML file
//! or from environment variables overlaid on the defaults.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Crawl loop configuration
    pub crawler: CrawlerConfig,

    /// Listing pages to collect
    pub sources: Vec<SourceConfig>,

    /// CSS selectors describing the listing markup
    pub selectors: SelectorConfig,

    /// Rendering backend
    pub renderer: RendererConfig,

    /// HTTP fetch settings (used by the HTTP renderer)
    pub http: HttpConfig,

    /// Dataset file locations
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Crawl loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Entries published before this date end the crawl
    pub cutoff_date: NaiveDate,

    /// Bound for the seed page to render, in seconds
    pub load_timeout_secs: u64,

    /// Bound for the next-page control to become clickable, in seconds
    pub next_timeout_secs: u64,

    /// Bound for a page to render after advancing, in seconds
    pub page_timeout_secs: u64,

    /// Interval between condition probes, in milliseconds
    pub poll_interval_ms: u64,

    /// Maximum pages per source (0 = unlimited)
    pub max_pages: usize,

    /// Number of leading page snapshots written to `debug_file`
    pub debug_pages: usize,

    /// Optional file receiving raw page snapshots
    pub debug_file: Option<PathBuf>,

    /// Pause between consecutive sources, in milliseconds
    pub source_delay_ms: u64,
}

/// A listing page to crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Short name used in logs
    pub name: String,

    /// Seed URL of the listing
    pub url: String,
}

/// CSS selectors describing the listing markup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// One listing card
    pub card: String,

    /// Heading anchor inside a card (text = headline, href = url)
    pub headline: String,

    /// Publication time element inside a card
    pub time: String,

    /// Summary anchor inside a card
    pub summary: String,

    /// Tag links inside a card
    pub tags: String,

    /// "Next page" control
    pub next_page: String,

    /// Only urls on this domain (or its subdomains) are kept
    pub domain: String,
}

/// Which rendering backend drives the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Plain HTTP fetches, links followed by href
    Http,
    /// Headless Chrome (requires the `chrome` feature)
    Chrome,
}

/// Rendering backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Backend to use
    pub kind: RendererKind,

    /// Run the browser without a window
    pub headless: bool,

    /// Explicit browser executable
    pub executable: Option<PathBuf>,
}

/// HTTP fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Requests per second
    pub rate_limit: u32,

    /// Retry attempts on 429/5xx and transport errors
    pub max_retries: u32,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Base delay for exponential backoff, in milliseconds
    pub base_delay_ms: u64,
}

/// Dataset file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding per-run and canonical files
    pub data_dir: PathBuf,

    /// Filename prefix of per-run files
    pub run_prefix: String,

    /// Canonical dataset filename inside `data_dir`
    pub merged_file: String,

    /// Daily trend filename inside `data_dir`
    pub trend_file: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,

    /// Optional log file, written in addition to stderr
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from defaults overlaid with `SINAFEED_*` values
    /// returned by `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("SINAFEED_CUTOFF_DATE") {
            config.crawler.cutoff_date = NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                .with_context(|| format!("Invalid SINAFEED_CUTOFF_DATE: {v}"))?;
        }

        if let Some(v) = lookup("SINAFEED_SOURCES") {
            config.sources = parse_sources(&v)?;
        }

        if let Some(v) = lookup("SINAFEED_MAX_PAGES").and_then(|v| v.parse().ok()) {
            config.crawler.max_pages = v;
        }

        if let Some(v) = lookup("SINAFEED_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(v);
        }

        if let Some(v) = lookup("SINAFEED_RENDERER") {
            config.renderer.kind = match v.to_lowercase().as_str() {
                "http" => RendererKind::Http,
                "chrome" => RendererKind::Chrome,
                other => anyhow::bail!("Unknown SINAFEED_RENDERER: {other}"),
            };
        }

        if let Some(v) = lookup("SINAFEED_LOG_LEVEL") {
            config.logging.level = v;
        }

        if let Some(v) = lookup("SINAFEED_LOG_FORMAT") {
            config.logging.format = v;
        }

        if let Some(v) = lookup("SINAFEED_LOG_FILE") {
            config.logging.file = if v.is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            anyhow::bail!("at least one source must be configured");
        }

        for source in &self.sources {
            url::Url::parse(&source.url)
                .with_context(|| format!("source `{}` has an invalid url", source.name))?;
        }

        if self.crawler.load_timeout_secs == 0
            || self.crawler.next_timeout_secs == 0
            || self.crawler.page_timeout_secs == 0
        {
            anyhow::bail!("crawler timeouts must be greater than 0");
        }

        if self.crawler.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }

        if self.selectors.domain.trim().is_empty() {
            anyhow::bail!("selectors.domain must not be empty");
        }

        if self.http.rate_limit == 0 {
            anyhow::bail!("http.rate_limit must be greater than 0");
        }

        if self.storage.run_prefix.is_empty() {
            anyhow::bail!("storage.run_prefix must not be empty");
        }

        if self.storage.merged_file.starts_with(&self.storage.run_prefix) {
            anyhow::bail!("storage.merged_file must not start with the per-run prefix");
        }

        Ok(())
    }

    /// Cutoff as a timestamp (midnight of the cutoff date)
    #[must_use]
    pub fn cutoff(&self) -> NaiveDateTime {
        self.crawler.cutoff_date.and_time(NaiveTime::MIN)
    }

    /// Path of the canonical dataset
    #[must_use]
    pub fn merged_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.merged_file)
    }

    /// Path of the daily trend file
    #[must_use]
    pub fn trend_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.trend_file)
    }
}

impl CrawlerConfig {
    /// Bound for the seed page
    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// Bound for the next-page control
    #[must_use]
    pub fn next_timeout(&self) -> Duration {
        Duration::from_secs(self.next_timeout_secs)
    }

    /// Bound for a page after advancing
    #[must_use]
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    /// Probe interval
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Pause between sources
    #[must_use]
    pub fn source_delay(&self) -> Duration {
        Duration::from_millis(self.source_delay_ms)
    }
}

impl HttpConfig {
    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parse `name=url` pairs separated by `;`
fn parse_sources(raw: &str) -> Result<Vec<SourceConfig>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, url) = entry
                .split_once('=')
                .with_context(|| format!("Expected name=url, got `{entry}`"))?;
            Ok(SourceConfig {
                name: name.trim().to_string(),
                url: url.trim().to_string(),
            })
        })
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            sources: vec![SourceConfig::default()],
            selectors: SelectorConfig::default(),
            renderer: RendererConfig::default(),
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            cutoff_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap_or_default(),
            load_timeout_secs: 20,
            next_timeout_secs: 5,
            page_timeout_secs: 10,
            poll_interval_ms: 250,
            max_pages: 0,
            debug_pages: 2,
            debug_file: None,
            source_delay_ms: 2000,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: String::from("sina"),
            url: String::from("https://news.sina.com.cn/china/"),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: String::from("div.feed-card-content div.feed-card-item"),
            headline: String::from("h2 a"),
            time: String::from("div.feed-card-time"),
            summary: String::from("a.feed-card-txt-summary"),
            tags: String::from("div.feed-card-tags a"),
            next_page: String::from("div.feed-card-page .pagebox_next a"),
            domain: String::from("sina.com.cn"),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            kind: RendererKind::Http,
            headless: true,
            executable: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            rate_limit: 2,
            max_retries: 3,
            request_timeout_secs: 30,
            base_delay_ms: 1000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            run_prefix: String::from("news_data_"),
            merged_file: String::from("merged_news_data.csv"),
            trend_file: String::from("daily_trend.csv"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
            file: Some(PathBuf::from("logs/scrape.log")),
        }
    }
}
