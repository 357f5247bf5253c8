//! Journal entry generation
//!
//! The processor hands each successful search response to a
//! [`JournalGenerator`]; [`MarkdownJournal`] is the file-backed one.
//! [`index`] reads written entries back for listings and statistics.

pub mod index;
pub mod markdown;
pub mod tags;

use anyhow::Result;
use chrono::NaiveDateTime;

use crate::models::Topic;
use crate::search::SearchResponse;

pub use index::{journal_stats, list_entries, JournalEntrySummary, JournalStats};
pub use markdown::MarkdownJournal;
pub use tags::extract_tags;

/// Turns a search response into a journal artifact
pub trait JournalGenerator: Send + Sync {
    /// Write the entry and return its identifier (a file name for Markdown)
    fn generate(
        &self,
        topic: &Topic,
        response: &SearchResponse,
        generated_at: NaiveDateTime,
    ) -> Result<String>;
}
