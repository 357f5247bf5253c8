//! Batch run tests
//!
//! Verify that a batch visits every topic, isolates failures, records
//! last-run and next-run, and never overlaps with a manual run.

use std::sync::Arc;
use std::time::Duration;

use topic_journal::models::{LogLevel, Schedule, TopicStatus};
use topic_journal::scheduler::{FailureStage, RunKind, TopicOutcome};
use topic_journal::storage::JournalStore;

use crate::common::{
    at, fixture_clock, fixture_time, processor_over, processor_with, seeded_store, FaultyStore,
    RecordingJournal, ScriptedSearch,
};

#[tokio::test]
async fn test_batch_isolates_failing_topic() {
    let store = seeded_store(&["Alpha", "Beta", "Gamma"]);
    let search = Arc::new(ScriptedSearch::new().failing_on("beta"));
    let journal = Arc::new(RecordingJournal::new());
    let processor = processor_with(store.clone(), search.clone(), journal.clone(), fixture_clock());

    let report = processor.run_batch().await.unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.completed(), 2);
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.outcomes[1],
        TopicOutcome::Failed {
            topic_id: 2,
            stage: FailureStage::Search,
            ..
        }
    ));

    // Every topic was queried, in order
    assert_eq!(
        search.requests(),
        vec!["latest on alpha", "latest on beta", "latest on gamma"]
    );
    assert_eq!(journal.generated(), vec!["Alpha", "Gamma"]);

    assert_eq!(store.get_topic(1).unwrap().unwrap().status, TopicStatus::Completed);
    assert_eq!(store.get_topic(2).unwrap().unwrap().status, TopicStatus::Error);
    assert_eq!(store.get_topic(3).unwrap().unwrap().status, TopicStatus::Completed);

    let status = store.get_status().unwrap();
    assert_eq!(status.last_run_time, Some(fixture_time()));
    assert_eq!(status.next_run_time, Some(at(2024, 3, 15, 9, 0)));
    assert_eq!(report.next_run, status.next_run_time);
    // Failed calls are counted too
    assert_eq!(status.api_calls_this_month, 3);
}

#[tokio::test]
async fn test_batch_logs_each_outcome() {
    let store = seeded_store(&["Alpha", "Beta"]);
    let search = Arc::new(ScriptedSearch::new().failing_on("beta"));
    let processor = processor_with(
        store.clone(),
        search,
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );

    processor.run_batch().await.unwrap();

    let logs = store.recent_logs(10).unwrap();
    assert_eq!(logs.len(), 2);

    // Newest first
    assert_eq!(logs[0].topic_id, Some(2));
    assert_eq!(logs[0].level, LogLevel::Error);
    assert_eq!(
        logs[0].message,
        "API error: API error 500: upstream unavailable"
    );

    assert_eq!(logs[1].topic_id, Some(1));
    assert_eq!(logs[1].level, LogLevel::Success);
    assert_eq!(logs[1].message, "Successfully updated research for Alpha");
}

#[tokio::test]
async fn test_journal_failure_marks_topic_error() {
    let store = seeded_store(&["Alpha", "Beta"]);
    let journal = Arc::new(RecordingJournal::new().failing_for("Beta"));
    let processor = processor_with(
        store.clone(),
        Arc::new(ScriptedSearch::new()),
        journal,
        fixture_clock(),
    );

    let report = processor.run_batch().await.unwrap();

    assert!(matches!(
        report.outcomes[1],
        TopicOutcome::Failed {
            stage: FailureStage::Journal,
            ..
        }
    ));
    assert_eq!(store.get_topic(2).unwrap().unwrap().status, TopicStatus::Error);
    assert!(store.get_topic(2).unwrap().unwrap().last_updated.is_none());

    let latest = &store.recent_logs(1).unwrap()[0];
    assert_eq!(latest.level, LogLevel::Error);
    assert_eq!(
        latest.message,
        "Error during scheduled update: template render failed"
    );
    assert_eq!(store.get_status().unwrap().api_calls_this_month, 2);
}

#[tokio::test]
async fn test_manual_journal_failure_message() {
    let store = seeded_store(&["Alpha"]);
    let processor = processor_with(
        store.clone(),
        Arc::new(ScriptedSearch::new()),
        Arc::new(RecordingJournal::new().failing_for("Alpha")),
        fixture_clock(),
    );

    let outcome = processor.process_topic(1, RunKind::Manual).await;

    assert!(!outcome.is_completed());
    assert_eq!(
        store.recent_logs(1).unwrap()[0].message,
        "Error in manual search: template render failed"
    );
}

#[tokio::test]
async fn test_empty_batch_warns_and_keeps_next_run() {
    let store = seeded_store(&[]);
    let processor = processor_with(
        store.clone(),
        Arc::new(ScriptedSearch::new()),
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );

    let report = processor.run_batch().await.unwrap();

    assert!(report.outcomes.is_empty());
    assert!(report.next_run.is_none());

    let status = store.get_status().unwrap();
    assert_eq!(status.last_run_time, Some(fixture_time()));
    assert!(status.next_run_time.is_none());

    let logs = store.recent_logs(5).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Warning);
    assert_eq!(logs[0].message, "No topics found for scheduled update");
    assert!(logs[0].topic_id.is_none());
}

#[tokio::test]
async fn test_next_run_follows_stored_schedule() {
    let store = seeded_store(&["Alpha"]);
    store
        .update_schedule(&Schedule::new("weekly", "08:00"))
        .unwrap();

    let processor = processor_with(
        store.clone(),
        Arc::new(ScriptedSearch::new()),
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );

    let report = processor.run_batch().await.unwrap();

    // Thursday 2024-03-14 -> Monday 2024-03-18
    assert_eq!(report.next_run, Some(at(2024, 3, 18, 8, 0)));
    assert_eq!(
        store.get_status().unwrap().next_run_time,
        Some(at(2024, 3, 18, 8, 0))
    );
}

#[tokio::test]
async fn test_next_run_uses_clock_at_batch_end() {
    let store = seeded_store(&["Alpha"]);
    store
        .update_schedule(&Schedule::new("daily", "10:30"))
        .unwrap();

    let clock = fixture_clock();
    let processor = processor_with(
        store.clone(),
        Arc::new(ScriptedSearch::new()),
        Arc::new(RecordingJournal::new()),
        clock.clone(),
    );

    // A batch started at 10:00 finishing after 10:30 schedules tomorrow
    clock.set(at(2024, 3, 14, 10, 45));
    let report = processor.run_batch().await.unwrap();

    assert_eq!(report.next_run, Some(at(2024, 3, 15, 10, 30)));
}

#[tokio::test]
async fn test_manual_and_batch_runs_never_overlap() {
    let store = seeded_store(&["Alpha", "Beta", "Gamma"]);
    let search = Arc::new(ScriptedSearch::new().with_delay(Duration::from_millis(20)));
    let processor = processor_with(
        store.clone(),
        search.clone(),
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );

    let (report, manual) = tokio::join!(processor.run_batch(), processor.run_single_topic(2));

    assert_eq!(report.unwrap().completed(), 3);
    assert!(manual.unwrap().is_completed());
    assert_eq!(search.requests().len(), 4);
    assert_eq!(search.max_in_flight(), 1);
    assert_eq!(store.get_status().unwrap().api_calls_this_month, 4);
}

#[tokio::test]
async fn test_deleted_topic_skipped_by_manual_run() {
    let store = seeded_store(&["Alpha"]);
    let search = Arc::new(ScriptedSearch::new());
    let processor = processor_with(
        store.clone(),
        search.clone(),
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );

    assert!(store.delete_topic(1).unwrap());
    assert!(processor.run_single_topic(1).await.is_none());
    assert!(search.requests().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_runs_keep_every_status_write() {
    let store = Arc::new(
        FaultyStore::wrap(seeded_store(&["Alpha", "Beta"]))
            .with_status_delay(Duration::from_millis(40)),
    );
    let search = Arc::new(ScriptedSearch::new());
    let processor = processor_over(
        store.clone(),
        search.clone(),
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );

    let manual = tokio::spawn({
        let processor = processor.clone();
        async move { processor.run_single_topic(2).await }
    });
    let batch = tokio::spawn({
        let processor = processor.clone();
        async move { processor.run_batch().await }
    });

    let manual = manual.await.unwrap().unwrap();
    let batch = batch.await.unwrap().unwrap();
    assert!(manual.is_completed());
    assert_eq!(batch.completed(), 2);
    assert_eq!(search.requests().len(), 3);

    let status = store.get_status().unwrap();
    assert_eq!(status.api_calls_this_month, 3);
    assert_eq!(status.last_run_time, Some(fixture_time()));
    assert_eq!(status.next_run_time, Some(at(2024, 3, 15, 9, 0)));
}

#[tokio::test]
async fn test_store_failure_leaves_topic_errored() {
    // Call 1 marks processing; call 2 (recording completion) fails
    let store = Arc::new(FaultyStore::wrap(seeded_store(&["Alpha"])).failing_topic_update(2));
    let journal = Arc::new(RecordingJournal::new());
    let processor = processor_over(
        store.clone(),
        Arc::new(ScriptedSearch::new()),
        journal.clone(),
        fixture_clock(),
    );

    let outcome = processor.process_topic(1, RunKind::Scheduled).await;

    assert!(matches!(
        outcome,
        TopicOutcome::Failed {
            topic_id: 1,
            stage: FailureStage::Store,
            ..
        }
    ));
    assert_eq!(journal.generated(), vec!["Alpha"]);
    assert_eq!(store.get_topic(1).unwrap().unwrap().status, TopicStatus::Error);

    let logs = store.recent_logs(1).unwrap();
    assert_eq!(logs[0].level, LogLevel::Error);
    assert!(logs[0]
        .message
        .starts_with("Error during scheduled update: disk I/O error"));
}
