//! Compiled CSS selectors for listing pages
//!
//! Selectors come from configuration, so they are parsed once when the
//! parser is built instead of at compile time.

use scraper::Selector;

use crate::config::SelectorConfig;
use crate::utils::error::ParseError;

/// Selectors for one listing layout
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub card: Selector,
    pub headline: Selector,
    pub time: Selector,
    pub summary: Selector,
    pub tags: Selector,
}

impl ListingSelectors {
    /// Compile every selector in `config`
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidSelector` naming the first selector that
    /// does not parse
    pub fn from_config(config: &SelectorConfig) -> Result<Self, ParseError> {
        Ok(Self {
            card: compile(&config.card)?,
            headline: compile(&config.headline)?,
            time: compile(&config.time)?,
            summary: compile(&config.summary)?,
            tags: compile(&config.tags)?,
        })
    }
}

/// Parse one selector, mapping failures to `ParseError`
pub fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}
