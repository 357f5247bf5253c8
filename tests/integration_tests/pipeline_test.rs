//! Pipeline integration tests
//!
//! Tests the complete store → search → journal flow with SQLite and
//! Markdown files on disk.

use std::sync::Arc;
use tempfile::TempDir;

use topic_journal::journal::{journal_stats, MarkdownJournal};
use topic_journal::models::{NewTopic, TopicEdit, TopicStatus};
use topic_journal::scheduler::TopicProcessor;
use topic_journal::storage::{create_sqlite_store, JournalStore};

use crate::common::{fixture_clock, fixture_time, ScriptedSearch};

#[tokio::test]
async fn test_batch_writes_markdown_and_persists_state() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("data").join("journal.db");
    let out_dir = temp_dir.path().join("journal");

    let store = create_sqlite_store(&db_path).unwrap();
    store
        .create_topic(
            &NewTopic::new("Quantum Computing", "quantum error correction")
                .with_tags(vec!["physics".to_string()]),
            fixture_time(),
        )
        .unwrap();
    store
        .create_topic(&NewTopic::new("Rust Async", "tokio releases"), fixture_time())
        .unwrap();

    let journal = MarkdownJournal::new(&out_dir).unwrap();
    let processor = TopicProcessor::new(
        store.clone(),
        Arc::new(ScriptedSearch::new()),
        Arc::new(journal),
        fixture_clock(),
    );

    let report = processor.run_batch().await.unwrap();
    assert_eq!(report.completed(), 2);

    let quantum = std::fs::read_to_string(out_dir.join("quantum-computing.md")).unwrap();
    assert!(quantum.starts_with("# Quantum Computing"));
    assert!(quantum.contains("> quantum error correction"));
    assert!(quantum.contains("_Updated 2024-03-14 10:00:00_"));
    assert!(quantum.contains("Findings for quantum error correction"));

    assert!(out_dir.join("rust-async.md").exists());

    let topic = store.get_topic(1).unwrap().unwrap();
    assert_eq!(topic.status, TopicStatus::Completed);
    assert_eq!(topic.last_updated, Some(fixture_time()));
    assert_eq!(topic.tags, vec!["physics"]);
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("journal.db");

    {
        let store = create_sqlite_store(&db_path).unwrap();
        store
            .create_topic(&NewTopic::new("Alpha", "latest on alpha"), fixture_time())
            .unwrap();

        let processor = TopicProcessor::new(
            store,
            Arc::new(ScriptedSearch::new()),
            Arc::new(MarkdownJournal::new(&temp_dir.path().join("out")).unwrap()),
            fixture_clock(),
        );
        processor.run_batch().await.unwrap();
    }

    let reopened = create_sqlite_store(&db_path).unwrap();
    let status = reopened.get_status().unwrap();
    assert_eq!(status.last_run_time, Some(fixture_time()));
    assert_eq!(status.api_calls_this_month, 1);
    assert_eq!(
        reopened.recent_logs(1).unwrap()[0].message,
        "Successfully updated research for Alpha"
    );
}

#[tokio::test]
async fn test_edited_topic_drives_next_run() {
    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().join("journal");
    let store = create_sqlite_store(temp_dir.path().join("journal.db")).unwrap();
    store
        .create_topic(&NewTopic::new("Rust Async", "tokio releases"), fixture_time())
        .unwrap();

    let mut topic = store.get_topic(1).unwrap().unwrap();
    topic.apply_edit(&TopicEdit {
        name: Some("Async Rust".into()),
        query: Some("async closures".into()),
        tags: None,
    });
    store.update_topic(&topic).unwrap();

    let search = Arc::new(ScriptedSearch::new());
    let processor = TopicProcessor::new(
        store.clone(),
        search.clone(),
        Arc::new(MarkdownJournal::new(&out_dir).unwrap()),
        fixture_clock(),
    );
    processor.run_batch().await.unwrap();

    assert_eq!(search.requests(), vec!["async closures"]);
    assert!(out_dir.join("async-rust.md").exists());

    let stats = journal_stats(&out_dir).unwrap();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.topics.get("Async Rust"), Some(&1));
    assert_eq!(stats.last_updated, Some(fixture_time()));
}
