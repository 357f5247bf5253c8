//! Common test utilities

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use topic_journal::clock::ManualClock;
use topic_journal::journal::JournalGenerator;
use topic_journal::models::{
    LogEntry, NewLogEntry, NewTopic, Schedule, Status, Topic, TopicId,
};
use topic_journal::scheduler::TopicProcessor;
use topic_journal::search::{SearchBackend, SearchError, SearchRequest, SearchResponse, UsageStats};
use topic_journal::storage::{JournalStore, MemoryStore, SharedStore};

/// Thursday 2024-03-14 10:00
pub fn fixture_time() -> NaiveDateTime {
    at(2024, 3, 14, 10, 0)
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

pub fn fixture_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(fixture_time()))
}

/// Store holding one topic per name, ids assigned in order from 1
pub fn seeded_store(names: &[&str]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for name in names {
        let query = format!("latest on {}", name.to_lowercase());
        store
            .create_topic(&NewTopic::new(*name, query), fixture_time())
            .unwrap();
    }
    store
}

/// Search fake answering from the request text
///
/// Queries containing a failing marker return an API error. An optional
/// delay makes each call yield so overlapping pipelines would be observable.
pub struct ScriptedSearch {
    failing: HashSet<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            delay: None,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fail every query whose text contains `marker`
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.failing.insert(marker.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Query texts in call order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of queries observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for ScriptedSearch {
    async fn query(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.text.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.iter().any(|m| request.text.contains(m.as_str())) {
            return Err(SearchError::Api {
                status: 500,
                body: "upstream unavailable".into(),
            });
        }

        SearchResponse::from_json(serde_json::json!({
            "id": "req-1",
            "model": "sonar",
            "choices": [{"message": {"content": format!("Findings for {}", request.text)}}]
        }))
    }

    fn usage_stats(&self) -> UsageStats {
        UsageStats {
            request_count: self.requests.lock().unwrap().len() as u64,
            usage: 0.0,
            budget: 5.0,
            window_start: fixture_time(),
        }
    }
}

/// Journal fake recording generated topics; fails for listed names
pub struct RecordingJournal {
    failing: HashSet<String>,
    generated: Mutex<Vec<String>>,
}

impl RecordingJournal {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            generated: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_for(mut self, topic_name: &str) -> Self {
        self.failing.insert(topic_name.to_string());
        self
    }

    pub fn generated(&self) -> Vec<String> {
        self.generated.lock().unwrap().clone()
    }
}

impl JournalGenerator for RecordingJournal {
    fn generate(
        &self,
        topic: &Topic,
        _response: &SearchResponse,
        _at: NaiveDateTime,
    ) -> Result<String> {
        if self.failing.contains(&topic.name) {
            bail!("template render failed");
        }
        self.generated.lock().unwrap().push(topic.name.clone());
        Ok(format!("journal/{}.md", topic.name.to_lowercase()))
    }
}

/// Processor over the given fakes with the fixture clock
pub fn processor_with(
    store: Arc<MemoryStore>,
    search: Arc<ScriptedSearch>,
    journal: Arc<RecordingJournal>,
    clock: Arc<ManualClock>,
) -> Arc<TopicProcessor> {
    Arc::new(TopicProcessor::new(store, search, journal, clock))
}

/// Processor over any store
pub fn processor_over(
    store: SharedStore,
    search: Arc<ScriptedSearch>,
    journal: Arc<RecordingJournal>,
    clock: Arc<ManualClock>,
) -> Arc<TopicProcessor> {
    Arc::new(TopicProcessor::new(store, search, journal, clock))
}

/// Memory store wrapper with injectable slowness and failures
///
/// A status delay sleeps inside each status change, widening the window in
/// which a non-atomic read-modify-write would lose a concurrent update.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    status_delay: Option<Duration>,
    fail_topic_update_call: Option<usize>,
    topic_updates: AtomicUsize,
}

impl FaultyStore {
    pub fn wrap(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            status_delay: None,
            fail_topic_update_call: None,
            topic_updates: AtomicUsize::new(0),
        }
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = Some(delay);
        self
    }

    /// Fail the `call`-th `update_topic` (1-based); other calls go through
    pub fn failing_topic_update(mut self, call: usize) -> Self {
        self.fail_topic_update_call = Some(call);
        self
    }
}

impl JournalStore for FaultyStore {
    fn list_topics(&self) -> Result<Vec<Topic>> {
        self.inner.list_topics()
    }

    fn get_topic(&self, id: TopicId) -> Result<Option<Topic>> {
        self.inner.get_topic(id)
    }

    fn create_topic(&self, topic: &NewTopic, created_at: NaiveDateTime) -> Result<Topic> {
        self.inner.create_topic(topic, created_at)
    }

    fn update_topic(&self, topic: &Topic) -> Result<()> {
        let call = self.topic_updates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_topic_update_call == Some(call) {
            return Err(anyhow!("disk I/O error"));
        }
        self.inner.update_topic(topic)
    }

    fn delete_topic(&self, id: TopicId) -> Result<bool> {
        self.inner.delete_topic(id)
    }

    fn get_schedule(&self) -> Result<Schedule> {
        self.inner.get_schedule()
    }

    fn update_schedule(&self, schedule: &Schedule) -> Result<()> {
        self.inner.update_schedule(schedule)
    }

    fn get_status(&self) -> Result<Status> {
        self.inner.get_status()
    }

    fn update_status(&self, status: &Status) -> Result<()> {
        self.inner.update_status(status)
    }

    fn append_log(&self, entry: &NewLogEntry) -> Result<LogEntry> {
        self.inner.append_log(entry)
    }

    fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.inner.recent_logs(limit)
    }

    fn modify_status(&self, change: &mut dyn FnMut(&mut Status)) -> Result<Status> {
        let delay = self.status_delay;
        self.inner.modify_status(&mut |status: &mut Status| {
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            change(status);
        })
    }
}
