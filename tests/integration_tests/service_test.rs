//! Scheduler service tests

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;

use topic_journal::error::{DomainError, Error, ErrorCategory};
use topic_journal::models::{LogLevel, Schedule, TopicStatus};
use topic_journal::scheduler::{SchedulerError, SchedulerService, SCHEDULED_JOB_ID};
use topic_journal::storage::{JournalStore, MemoryStore};

use crate::common::{
    at, fixture_clock, processor_with, seeded_store, RecordingJournal, ScriptedSearch,
};

fn service_over(store: Arc<MemoryStore>, search: Arc<ScriptedSearch>) -> SchedulerService {
    let processor = processor_with(
        store,
        search,
        Arc::new(RecordingJournal::new()),
        fixture_clock(),
    );
    SchedulerService::new(processor, 1, 4)
}

#[tokio::test]
async fn test_start_persists_next_run() {
    let store = seeded_store(&["Alpha"]);
    let service = service_over(store.clone(), Arc::new(ScriptedSearch::new()));

    let next_run = service.start().await.unwrap();

    assert_eq!(next_run, at(2024, 3, 15, 9, 0));
    assert_eq!(store.get_status().unwrap().next_run_time, Some(next_run));

    let trigger = service.trigger_status().await;
    assert!(trigger.is_running);
    assert_eq!(trigger.job_id.as_deref(), Some(SCHEDULED_JOB_ID));
    assert_eq!(trigger.cron.as_deref(), Some("0 9 * * *"));
    assert_eq!(trigger.trigger.as_deref(), Some("daily at 09:00"));

    service.shutdown().await;
    assert!(!service.trigger_status().await.is_running);
}

#[tokio::test]
async fn test_start_twice_keeps_single_job() {
    let store = seeded_store(&["Alpha"]);
    let service = service_over(store, Arc::new(ScriptedSearch::new()));

    service.start().await.unwrap();
    service.start().await.unwrap();

    let trigger = service.trigger_status().await;
    assert!(trigger.is_running);
    assert_eq!(trigger.job_id.as_deref(), Some(SCHEDULED_JOB_ID));

    service.shutdown().await;
}

#[tokio::test]
async fn test_update_schedule_reconfigures() {
    let store = seeded_store(&["Alpha"]);
    let service = service_over(store.clone(), Arc::new(ScriptedSearch::new()));
    service.start().await.unwrap();

    let schedule = Schedule::new("weekly", "18:30");
    let next_run = service.update_schedule(&schedule).await.unwrap();

    // Thursday 2024-03-14 -> Monday 2024-03-18
    assert_eq!(next_run, at(2024, 3, 18, 18, 30));
    assert_eq!(store.get_schedule().unwrap(), schedule);
    assert_eq!(store.get_status().unwrap().next_run_time, Some(next_run));

    let trigger = service.trigger_status().await;
    assert!(trigger.is_running);
    assert_eq!(trigger.cron.as_deref(), Some("30 18 * * 1"));

    service.shutdown().await;
}

#[tokio::test]
async fn test_monthly_schedule_next_run() {
    let store = seeded_store(&["Alpha"]);
    let service = service_over(store, Arc::new(ScriptedSearch::new()));

    let next_run = service
        .update_schedule(&Schedule::new("monthly", "06:15"))
        .await
        .unwrap();

    assert_eq!(next_run, at(2024, 4, 1, 6, 15));
    service.shutdown().await;
}

#[tokio::test]
async fn test_malformed_schedule_falls_back_to_defaults() {
    let store = seeded_store(&["Alpha"]);
    store
        .update_schedule(&Schedule::new("hourly", "25:99"))
        .unwrap();
    let service = service_over(store.clone(), Arc::new(ScriptedSearch::new()));

    let next_run = service.start().await.unwrap();

    assert_eq!(next_run, at(2024, 3, 15, 9, 0));
    // Stored settings are left as entered
    assert_eq!(store.get_schedule().unwrap().frequency, "hourly");

    service.shutdown().await;
}

#[tokio::test]
async fn test_run_now_unknown_topic() {
    let service = service_over(seeded_store(&["Alpha"]), Arc::new(ScriptedSearch::new()));

    let err = service.run_now(99).unwrap_err();
    assert!(matches!(err, SchedulerError::TopicNotFound { id: 99 }));

    let unified: Error = err.into();
    assert_eq!(unified.category(), ErrorCategory::Scheduler);
    assert!(!unified.is_recoverable());

    service.shutdown().await;
}

#[tokio::test]
async fn test_run_now_processes_topic() {
    let store = seeded_store(&["Alpha", "Beta"]);
    let search = Arc::new(ScriptedSearch::new());
    let service = service_over(store.clone(), search.clone());

    service.run_now(1).unwrap();
    service.shutdown().await;

    assert_eq!(search.requests(), vec!["latest on alpha"]);
    assert_eq!(store.get_topic(1).unwrap().unwrap().status, TopicStatus::Completed);
    assert_eq!(service.pending_manual_runs(), 0);
}

#[tokio::test]
async fn test_run_batch_now_and_status_report() {
    let store = seeded_store(&["Alpha", "Beta", "Gamma"]);
    let search = Arc::new(ScriptedSearch::new().failing_on("gamma"));
    let service = service_over(store, search);

    let report = service.run_batch_now().await.unwrap();
    assert_eq!(report.completed(), 2);

    let status = service.status_report(2).unwrap();
    assert_eq!(status.status.api_calls_this_month, 3);
    assert_eq!(status.status.next_run_time, Some(at(2024, 3, 15, 9, 0)));
    assert_eq!(status.logs.len(), 2);
    assert_eq!(status.logs[0].level, LogLevel::Error);
    assert_eq!(status.logs[1].level, LogLevel::Success);

    service.shutdown().await;
}

#[tokio::test]
async fn test_timer_fires_batch() {
    let store = seeded_store(&["Alpha"]);
    let search = Arc::new(ScriptedSearch::new());
    let clock = fixture_clock();
    let processor = processor_with(
        store.clone(),
        search.clone(),
        Arc::new(RecordingJournal::new()),
        clock.clone(),
    );
    let service = SchedulerService::new(processor, 1, 4);

    // 100ms before tomorrow's 09:00 run
    let just_before = at(2024, 3, 15, 9, 0) - ChronoDuration::milliseconds(100);
    clock.set(just_before);

    service.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(search.requests(), vec!["latest on alpha"]);
    assert_eq!(store.get_status().unwrap().last_run_time, Some(just_before));
    assert_eq!(store.get_topic(1).unwrap().unwrap().status, TopicStatus::Completed);

    service.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_timer() {
    let store = seeded_store(&["Alpha"]);
    let search = Arc::new(ScriptedSearch::new());
    let clock = fixture_clock();
    let processor = processor_with(
        store,
        search.clone(),
        Arc::new(RecordingJournal::new()),
        clock.clone(),
    );
    let service = SchedulerService::new(processor, 1, 4);

    clock.set(at(2024, 3, 15, 9, 0) - ChronoDuration::milliseconds(200));
    service.start().await.unwrap();
    service.shutdown().await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(search.requests().is_empty());
}

#[tokio::test]
async fn test_sync_picks_up_schedule_written_elsewhere() {
    let store = seeded_store(&["Alpha"]);
    let service = service_over(store.clone(), Arc::new(ScriptedSearch::new()));
    service.start().await.unwrap();

    // Nothing changed since start
    assert_eq!(service.sync_schedule().await.unwrap(), None);

    // Another process sharing the database rewrites the settings
    store
        .update_schedule(&Schedule::new("weekly", "18:30"))
        .unwrap();

    let next_run = service.sync_schedule().await.unwrap();
    assert_eq!(next_run, Some(at(2024, 3, 18, 18, 30)));
    assert_eq!(store.get_status().unwrap().next_run_time, next_run);

    let trigger = service.trigger_status().await;
    assert!(trigger.is_running);
    assert_eq!(trigger.cron.as_deref(), Some("30 18 * * 1"));

    assert_eq!(service.sync_schedule().await.unwrap(), None);
    service.shutdown().await;
}

#[tokio::test]
async fn test_synced_schedule_drives_the_timer() {
    let store = seeded_store(&["Alpha"]);
    let search = Arc::new(ScriptedSearch::new());
    let clock = fixture_clock();
    let processor = processor_with(
        store.clone(),
        search.clone(),
        Arc::new(RecordingJournal::new()),
        clock.clone(),
    );
    let service = SchedulerService::new(processor, 1, 4);

    // Daily 09:00 would not fire for almost a day
    service.start().await.unwrap();

    let just_before = at(2024, 3, 14, 10, 30) - ChronoDuration::milliseconds(100);
    clock.set(just_before);
    store
        .update_schedule(&Schedule::new("daily", "10:30"))
        .unwrap();
    assert_eq!(
        service.sync_schedule().await.unwrap(),
        Some(at(2024, 3, 14, 10, 30))
    );

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(search.requests(), vec!["latest on alpha"]);

    service.shutdown().await;
}
