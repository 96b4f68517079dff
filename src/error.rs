//! Unified error handling for the sinafeed crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust
//! use sinafeed::error::Error;
//!
//! fn handle_error(err: &Error) {
//!     if err.is_recoverable() {
//!         eprintln!("Skipping: {err}");
//!     } else {
//!         eprintln!("Fatal error ({}): {err}", err.category().label());
//!     }
//! }
//!
//! handle_error(&Error::config("cutoff_date is empty"));
//! ```

use thiserror::Error;

pub use crate::utils::error::{FetchError, ParseError, RenderError, StorageError};

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout)
    Network,
    /// Browser or rendering session errors
    Rendering,
    /// Parsing and data extraction errors
    Parsing,
    /// Dataset file errors
    Storage,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    /// Short label used in log fields
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Rendering => "rendering",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Config => "config",
        }
    }
}

/// Unified error type for the sinafeed crate
#[derive(Error, Debug)]
pub enum Error {
    /// Rendering session errors, including the fetches behind them
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Dataset file errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the failed unit can be skipped or retried on a later run
    ///
    /// Unrecoverable errors repeat for every source until the setup changes.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Render(RenderError::Fetch(FetchError::InvalidUrl(_))) => false,
            Self::Render(RenderError::Browser(_) | RenderError::InvalidSelector(_)) => false,
            Self::Render(_) => true,
            Self::Parse(ParseError::InvalidSelector { .. }) => false,
            Self::Parse(_) => true,
            Self::Storage(_) => true,
            Self::Config(_) => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Render(RenderError::Fetch(_)) => ErrorCategory::Network,
            Self::Render(RenderError::InvalidSelector(_)) => ErrorCategory::Config,
            Self::Render(_) => ErrorCategory::Rendering,
            Self::Parse(ParseError::InvalidSelector { .. }) => ErrorCategory::Config,
            Self::Parse(_) => ErrorCategory::Parsing,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
