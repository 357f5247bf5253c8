//! topic-journal - Scheduled research journal
//!
//! Runs a knowledge-search query for every tracked topic on a recurring
//! schedule and writes the answers as Markdown journal entries, staying
//! within a daily spend budget.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`clock`] - Injectable wall clock
//! - [`models`] - Topics, schedule settings, status and log entries
//! - [`storage`] - Persistence (SQLite and in-memory)
//! - [`search`] - Budget-tracked search API client with retry
//! - [`journal`] - Markdown entry generation and tag extraction
//! - [`scheduler`] - Next-run calculation, batch processing and dispatch
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use topic_journal::clock::system_clock;
//! use topic_journal::config::Config;
//! use topic_journal::journal::MarkdownJournal;
//! use topic_journal::scheduler::{SchedulerService, TopicProcessor};
//! use topic_journal::search::SearchClient;
//! use topic_journal::storage::create_sqlite_store;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let clock = system_clock();
//!     let store = create_sqlite_store(&config.storage.database_path)?;
//!     let search = SearchClient::new(&config.api, &config.budget, clock.clone())?;
//!     let journal = MarkdownJournal::new(&config.journal.output_dir)?;
//!
//!     let processor = TopicProcessor::new(store, Arc::new(search), Arc::new(journal), clock);
//!     let service = SchedulerService::new(Arc::new(processor), 2, 16);
//!     service.start().await?;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod journal;
pub mod models;
pub mod scheduler;
pub mod search;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::{Clock, SharedClock};
    pub use crate::config::Config;
    pub use crate::error::{DomainError, Error, ErrorCategory, Result};
    pub use crate::journal::{JournalGenerator, MarkdownJournal};
    pub use crate::models::{LogEntry, NewTopic, Schedule, Status, Topic, TopicEdit, TopicId};
    pub use crate::scheduler::{SchedulerService, TopicProcessor};
    pub use crate::search::{SearchBackend, SearchClient};
    pub use crate::storage::{JournalStore, SharedStore};
}

pub use models::{LogEntry, NewTopic, Schedule, Status, Topic, TopicEdit, TopicId};
