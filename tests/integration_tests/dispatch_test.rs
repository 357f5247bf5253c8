//! Manual dispatcher tests

use std::sync::Arc;
use std::time::Duration;

use topic_journal::models::TopicStatus;
use topic_journal::scheduler::{ManualDispatcher, SchedulerError};
use topic_journal::storage::JournalStore;

use crate::common::{fixture_clock, processor_with, seeded_store, RecordingJournal, ScriptedSearch};

#[tokio::test]
async fn test_submitted_run_completes_before_shutdown_returns() {
    let store = seeded_store(&["Alpha", "Beta"]);
    let search = Arc::new(ScriptedSearch::new());
    let processor = processor_with(
        store.clone(),
        search.clone(),
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );

    let dispatcher = ManualDispatcher::new(processor, 2, 4);
    dispatcher.submit(2).unwrap();
    dispatcher.shutdown().await;

    assert_eq!(search.requests(), vec!["latest on beta"]);
    assert_eq!(store.get_topic(2).unwrap().unwrap().status, TopicStatus::Completed);
    assert_eq!(store.get_topic(1).unwrap().unwrap().status, TopicStatus::Pending);

    let messages: Vec<String> = store
        .recent_logs(10)
        .unwrap()
        .into_iter()
        .rev()
        .map(|l| l.message)
        .collect();
    assert_eq!(
        messages,
        vec![
            "Manual search started for topic: Beta",
            "Successfully updated research for Beta"
        ]
    );
}

#[tokio::test]
async fn test_pending_counts_queued_runs() {
    let store = seeded_store(&["Alpha", "Beta"]);
    let processor = processor_with(
        store,
        Arc::new(ScriptedSearch::new()),
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );

    let dispatcher = ManualDispatcher::new(processor, 1, 4);
    assert_eq!(dispatcher.capacity(), 4);
    assert_eq!(dispatcher.pending(), 0);

    // Workers have not been polled yet on this single-threaded runtime
    dispatcher.submit(1).unwrap();
    dispatcher.submit(2).unwrap();
    assert_eq!(dispatcher.pending(), 2);

    dispatcher.shutdown().await;
    assert_eq!(dispatcher.pending(), 0);
}

#[tokio::test]
async fn test_full_queue_is_reported() {
    let store = seeded_store(&["Alpha", "Beta"]);
    let search = Arc::new(ScriptedSearch::new().with_delay(Duration::from_millis(10)));
    let processor = processor_with(
        store,
        search.clone(),
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );

    let dispatcher = ManualDispatcher::new(processor, 1, 1);
    dispatcher.submit(1).unwrap();

    let err = dispatcher.submit(2).unwrap_err();
    assert!(matches!(err, SchedulerError::DispatchQueueFull { capacity: 1 }));
    assert!(err.is_recoverable());

    dispatcher.shutdown().await;
    assert_eq!(search.requests(), vec!["latest on alpha"]);
}

#[tokio::test]
async fn test_submit_after_shutdown_fails() {
    let processor = processor_with(
        seeded_store(&["Alpha"]),
        Arc::new(ScriptedSearch::new()),
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );

    let dispatcher = ManualDispatcher::new(processor, 1, 4);
    dispatcher.shutdown().await;

    let err = dispatcher.submit(1).unwrap_err();
    assert!(matches!(err, SchedulerError::DispatcherClosed));
}

#[tokio::test]
async fn test_dispatched_runs_are_serialized() {
    let store = seeded_store(&["Alpha", "Beta", "Gamma"]);
    let search = Arc::new(ScriptedSearch::new().with_delay(Duration::from_millis(10)));
    let processor = processor_with(
        store.clone(),
        search.clone(),
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );

    let dispatcher = ManualDispatcher::new(processor, 3, 8);
    for id in 1..=3 {
        dispatcher.submit(id).unwrap();
    }
    dispatcher.shutdown().await;

    assert_eq!(search.requests().len(), 3);
    assert_eq!(search.max_in_flight(), 1);
    assert_eq!(store.get_status().unwrap().api_calls_this_month, 3);
}
