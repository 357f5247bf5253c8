//! Knowledge-search API access
//!
//! - [`client`]: the HTTP client with retry and pacing
//! - [`budget`]: rolling usage budget
//! - [`citations`]: reference extraction from response text

pub mod budget;
pub mod citations;
pub mod client;
pub mod error;

pub use budget::{BudgetTracker, UsageStats};
pub use citations::extract_citations;
pub use client::{SearchBackend, SearchClient, SearchRequest, SearchResponse, DEFAULT_SYSTEM_MESSAGE};
pub use error::SearchError;
