//! Listing crawl: rendering sessions, bounded waits and pagination
//!
//! This module drives rendering sessions through paginated listing pages.
//! The HTTP session is always available; the headless Chrome session is
//! compiled in with the `chrome` feature.

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod fetcher;
pub mod list;
pub mod render;
pub mod wait;

#[cfg(feature = "chrome")]
pub use chrome::{ChromeLauncher, ChromeRenderer};
pub use fetcher::SinaFetcher;
pub use list::ListCrawler;
pub use render::{HttpLauncher, HttpRenderer, Launcher, Renderer};
pub use wait::{wait_for, Condition};
