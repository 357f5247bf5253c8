//! Error types for the search client

use thiserror::Error;

/// Errors returned by a search query
#[derive(Error, Debug)]
pub enum SearchError {
    /// Usage reached the cap for the current window; no request was sent
    #[error("Budget limit reached")]
    BudgetExceeded,

    /// Non-success status other than 429
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Connection or timeout failures on every attempt
    #[error("Max retries exceeded: {reason}")]
    MaxRetriesExceeded { reason: String },

    /// Rate limited (429) on every attempt
    #[error("Failed to get response after retries")]
    RetriesExhausted,

    /// Success response without the expected fields
    #[error("Response processing error: {reason}")]
    ResponseShape { reason: String },

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl SearchError {
    /// Create a response shape error
    pub fn shape(reason: impl Into<String>) -> Self {
        Self::ResponseShape {
            reason: reason.into(),
        }
    }

    /// Transient network conditions, as opposed to rejected or malformed calls
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::MaxRetriesExceeded { .. } | Self::RetriesExhausted
        )
    }
}
