//! Persistence for topics, schedule, status and the activity log
//!
//! SQLite backs the binary; the in-memory store backs tests.

pub mod repository;

pub use repository::{
    create_memory_store, create_sqlite_store, JournalStore, MemoryStore, SharedStore,
    SqliteStore,
};
