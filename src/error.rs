//! Unified error handling for the topic-journal crate
//!
//! Domain modules keep their own error types ([`SearchError`],
//! [`SchedulerError`]); this module folds them into a single [`Error`] for
//! callers that cross module boundaries, such as the CLI.
//!
//! # Usage
//!
//! ```rust,ignore
//! use topic_journal::error::{DomainError, Error};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retrying ({}): {err}", err.category());
//!     } else {
//!         eprintln!("Fatal error: {err}");
//!     }
//! }
//! ```

use std::fmt;
use std::io;
use thiserror::Error;

pub use crate::scheduler::error::SchedulerError;
pub use crate::search::SearchError;

/// Common interface for the crate's error types
pub trait DomainError: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// HTTP, timeout, rate limit
    Network,
    /// Spend limit reached
    Budget,
    /// Database and filesystem
    Storage,
    /// Invalid settings
    Config,
    /// Scheduling and dispatch
    Scheduler,
    /// Journal rendering
    Journal,
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Budget => "budget",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Journal => "journal",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the topic-journal crate
#[derive(Error, Debug)]
pub enum Error {
    /// Search API errors
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Scheduler and dispatch errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Template rendering errors
    #[error("Journal error: {0}")]
    Journal(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DomainError for SearchError {
    fn is_recoverable(&self) -> bool {
        self.is_transient()
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::BudgetExceeded => ErrorCategory::Budget,
            _ => ErrorCategory::Network,
        }
    }
}

impl DomainError for SchedulerError {
    fn is_recoverable(&self) -> bool {
        SchedulerError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::StoreFailure { .. } => ErrorCategory::Storage,
            _ if self.is_configuration() => ErrorCategory::Config,
            _ => ErrorCategory::Scheduler,
        }
    }
}

impl DomainError for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Search(e) => DomainError::is_recoverable(e),
            Self::Scheduler(e) => DomainError::is_recoverable(e),
            Self::Database(_) => false,
            Self::Io(_) => true,
            Self::Journal(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Search(e) => e.category(),
            Self::Scheduler(e) => e.category(),
            Self::Database(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Journal(_) => ErrorCategory::Journal,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

impl From<handlebars::RenderError> for Error {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Journal(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: format!("{err:#}"),
            source: Some(err.into()),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
