//! sinafeed - incremental Sina News listing collector
//!
//! Crawls paginated news listings back to a cutoff date, resolves the
//! human-readable timestamps they carry, and merges every run into one
//! deduplicated dataset.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Rendering sessions, bounded waits and the paginating crawler
//! - [`parser`] - Listing extraction and relative-time resolution
//! - [`models`] - Core data structures and types
//! - [`storage`] - Dataset files and the merge/dedup store
//! - [`analytics`] - Daily counts and tag frequencies
//! - [`pipeline`] - Sources to canonical dataset, end to end
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use sinafeed::config::Config;
//! use sinafeed::crawler::HttpLauncher;
//! use sinafeed::pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let launcher = HttpLauncher::new(config.http.clone());
//!     let report = Pipeline::new(config, launcher)?.run().await;
//!     println!("collected {} records", report.total_records());
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{HttpLauncher, Launcher, ListCrawler, Renderer};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{CrawlOutcome, CrawlState, NewsRecord, StopReason};
    pub use crate::parser::{ListingParser, TimeResolver};
    pub use crate::pipeline::{Pipeline, PipelineReport};
    pub use crate::storage::CanonicalDataset;
}

// Direct re-exports for convenience
pub use models::{CrawlOutcome, NewsRecord, StopReason};
