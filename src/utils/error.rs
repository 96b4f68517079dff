//! Error types for the sinafeed collector
//!
//! This module defines the domain error types used throughout the application.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server error with status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts exceeded")]
    MaxRetriesExceeded,

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised by a rendering session
#[derive(Error, Debug)]
pub enum RenderError {
    /// Underlying fetch failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// A bounded wait expired
    #[error("Timed out after {waited_ms} ms waiting for {what}")]
    Timeout { what: String, waited_ms: u128 },

    /// The requested element is not on the page
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The element exists but cannot be activated
    #[error("Element not clickable: {0}")]
    NotClickable(String),

    /// Selector handed to the session does not parse
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// No page has been loaded into the session yet
    #[error("No page loaded")]
    NoPage,

    /// Browser could not be started or talked to
    #[error("Browser error: {0}")]
    Browser(String),
}

/// Errors that can occur while extracting a listing card
#[derive(Error, Debug)]
pub enum ParseError {
    /// No cards matched on the page
    #[error("No listing cards found")]
    NoCards,

    /// Heading anchor missing inside a card
    #[error("Headline anchor not found in card")]
    HeadlineNotFound,

    /// Heading anchor has no href
    #[error("Headline anchor has no href")]
    MissingHref,

    /// A configured CSS selector does not parse
    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Errors raised by dataset files
#[derive(Error, Debug)]
pub enum StorageError {
    /// File system error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV content
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A required column is absent from the header
    #[error("{path} has no `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },

    /// Nothing to persist
    #[error("Empty dataset")]
    Empty,
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}
