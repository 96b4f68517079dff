//! HTML parsing and data extraction
//!
//! This module handles parsing Sina News listing pages and resolving the
//! human-readable timestamps they carry.

pub mod listing;
pub mod selectors;
pub mod time;

// Re-export main parser and public types
pub use listing::ListingParser;
pub use selectors::ListingSelectors;
pub use time::{resolve, TimeResolver};
