//! Topic batch processor
//!
//! A topic pipeline is: mark processing, query the search API, count the
//! call, generate the journal entry, record the outcome. Pipelines never
//! overlap: batch runs and manual runs share one lock, taken once per topic.
//! A failing topic is recorded and skipped; it never stops the batch.

use anyhow::Result;
use chrono::NaiveDateTime;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::schedule::ResolvedSchedule;
use crate::clock::SharedClock;
use crate::journal::JournalGenerator;
use crate::models::{LogLevel, NewLogEntry, Status, Topic, TopicId, TopicStatus};
use crate::search::{SearchBackend, SearchRequest};
use crate::storage::SharedStore;

/// Tokens requested per topic
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Per-topic system message
pub fn system_message_for(topic_name: &str) -> String {
    format!(
        "You are a research assistant specializing in {topic_name}. \
         Provide a comprehensive summary of the latest developments, research, \
         and important information on this topic. Include citations to reliable \
         sources. Be factual, objective, and thorough."
    )
}

/// What started a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Scheduled,
    Manual,
}

impl RunKind {
    fn failure_message(&self, err: &dyn fmt::Display) -> String {
        match self {
            Self::Scheduled => format!("Error during scheduled update: {err}"),
            Self::Manual => format!("Error in manual search: {err}"),
        }
    }
}

/// Pipeline stage that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Search,
    Journal,
    Store,
}

/// Result of one topic pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum TopicOutcome {
    Completed {
        topic_id: TopicId,
        artifact: String,
    },
    Failed {
        topic_id: TopicId,
        stage: FailureStage,
        reason: String,
    },
}

impl TopicOutcome {
    pub fn topic_id(&self) -> TopicId {
        match self {
            Self::Completed { topic_id, .. } | Self::Failed { topic_id, .. } => *topic_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Result of one batch run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// When the batch started (also stored as last-run)
    pub started_at: NaiveDateTime,

    /// One outcome per topic, in processing order
    pub outcomes: Vec<TopicOutcome>,

    /// Next run persisted at the end; `None` when there was nothing to do
    pub next_run: Option<NaiveDateTime>,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }
}

/// Runs topic pipelines against the store, search backend and journal
pub struct TopicProcessor {
    store: SharedStore,
    search: Arc<dyn SearchBackend>,
    journal: Arc<dyn JournalGenerator>,
    clock: SharedClock,
    max_tokens: u32,
    model: Option<String>,
    pipeline: Mutex<()>,
}

impl TopicProcessor {
    pub fn new(
        store: SharedStore,
        search: Arc<dyn SearchBackend>,
        journal: Arc<dyn JournalGenerator>,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            search,
            journal,
            clock,
            max_tokens: DEFAULT_MAX_TOKENS,
            model: None,
            pipeline: Mutex::new(()),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Query with a specific model instead of the client's default
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Process every topic, then persist the next run
    ///
    /// # Errors
    ///
    /// Only store failures outside the per-topic pipelines surface here:
    /// recording last-run, listing topics, or persisting next-run.
    pub async fn run_batch(&self) -> Result<BatchReport> {
        let started_at = self.clock.now();
        info!(started_at = %started_at, "Starting scheduled update");

        self.store
            .modify_status(&mut |s: &mut Status| s.last_run_time = Some(started_at))?;

        let topics = self.store.list_topics()?;

        if topics.is_empty() {
            warn!("No topics found for scheduled update");
            self.store.append_log(&NewLogEntry::new(
                self.clock.now(),
                LogLevel::Warning,
                "No topics found for scheduled update",
            ))?;
            return Ok(BatchReport {
                started_at,
                outcomes: Vec::new(),
                next_run: None,
            });
        }

        let mut outcomes = Vec::with_capacity(topics.len());
        for topic in topics {
            outcomes.push(self.process_topic(topic.id, RunKind::Scheduled).await);
        }

        let schedule = self.store.get_schedule()?;
        let next_run = ResolvedSchedule::from_settings(&schedule).next_run(self.clock.now());
        self.store
            .modify_status(&mut |s: &mut Status| s.next_run_time = Some(next_run))?;

        let report = BatchReport {
            started_at,
            outcomes,
            next_run: Some(next_run),
        };

        info!(
            completed = report.completed(),
            failed = report.failed(),
            next_run = %next_run,
            "Scheduled update finished"
        );

        Ok(report)
    }

    /// Manual run for one topic; a missing topic is logged, not raised
    pub async fn run_single_topic(&self, topic_id: TopicId) -> Option<TopicOutcome> {
        let topic = match self.store.get_topic(topic_id) {
            Ok(Some(topic)) => topic,
            Ok(None) => {
                error!(topic_id = topic_id, "Topic not found");
                return None;
            }
            Err(e) => {
                error!(topic_id = topic_id, error = %e, "Failed to load topic");
                return None;
            }
        };

        info!(topic_id = topic_id, topic = %topic.name, "Running manual search");
        self.log_best_effort(
            topic_id,
            LogLevel::Info,
            format!("Manual search started for topic: {}", topic.name),
        );

        Some(self.process_topic(topic_id, RunKind::Manual).await)
    }

    /// One pipeline under the exclusive section
    pub async fn process_topic(&self, topic_id: TopicId, kind: RunKind) -> TopicOutcome {
        let _guard = self.pipeline.lock().await;

        match self.run_pipeline(topic_id, kind).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(topic_id = topic_id, error = %e, "Error processing topic");
                self.mark_error_best_effort(topic_id);
                self.log_best_effort(topic_id, LogLevel::Error, kind.failure_message(&e));
                TopicOutcome::Failed {
                    topic_id,
                    stage: FailureStage::Store,
                    reason: format!("{e:#}"),
                }
            }
        }
    }

    async fn run_pipeline(&self, topic_id: TopicId, kind: RunKind) -> Result<TopicOutcome> {
        let mut topic: Topic = self
            .store
            .get_topic(topic_id)?
            .ok_or_else(|| anyhow::anyhow!("Topic {topic_id} no longer exists"))?;

        info!(topic_id = topic_id, topic = %topic.name, "Processing topic");

        topic.status = TopicStatus::Processing;
        self.store.update_topic(&topic)?;

        let mut request = SearchRequest::new(topic.query.clone())
            .with_system_message(system_message_for(&topic.name))
            .with_max_tokens(self.max_tokens);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let result = self.search.query(&request).await;

        if let Err(e) = self
            .store
            .modify_status(&mut |s: &mut Status| s.api_calls_this_month += 1)
        {
            warn!(topic_id = topic_id, error = %e, "Failed to count API call");
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(topic_id = topic_id, error = %e, "API error for topic");
                topic.status = TopicStatus::Error;
                self.store.update_topic(&topic)?;
                self.append_log(topic_id, LogLevel::Error, format!("API error: {e}"))?;
                return Ok(TopicOutcome::Failed {
                    topic_id,
                    stage: FailureStage::Search,
                    reason: e.to_string(),
                });
            }
        };

        let now = self.clock.now();
        match self.journal.generate(&topic, &response, now) {
            Ok(artifact) => {
                topic.status = TopicStatus::Completed;
                topic.last_updated = Some(now);
                self.store.update_topic(&topic)?;
                self.append_log(
                    topic_id,
                    LogLevel::Success,
                    format!("Successfully updated research for {}", topic.name),
                )?;
                info!(topic_id = topic_id, artifact = %artifact, "Successfully processed topic");
                Ok(TopicOutcome::Completed { topic_id, artifact })
            }
            Err(e) => {
                error!(topic_id = topic_id, error = %e, "Error generating journal");
                topic.status = TopicStatus::Error;
                self.store.update_topic(&topic)?;
                self.append_log(topic_id, LogLevel::Error, kind.failure_message(&e))?;
                Ok(TopicOutcome::Failed {
                    topic_id,
                    stage: FailureStage::Journal,
                    reason: format!("{e:#}"),
                })
            }
        }
    }

    fn append_log(&self, topic_id: TopicId, level: LogLevel, message: String) -> Result<()> {
        self.store
            .append_log(&NewLogEntry::new(self.clock.now(), level, message).for_topic(topic_id))?;
        Ok(())
    }

    /// Leave no topic in `processing` after a failed pipeline
    fn mark_error_best_effort(&self, topic_id: TopicId) {
        match self.store.get_topic(topic_id) {
            Ok(Some(mut topic)) if topic.status == TopicStatus::Processing => {
                topic.status = TopicStatus::Error;
                if let Err(e) = self.store.update_topic(&topic) {
                    warn!(topic_id = topic_id, error = %e, "Failed to mark topic as errored");
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(topic_id = topic_id, error = %e, "Failed to reload topic after error");
            }
        }
    }

    fn log_best_effort(&self, topic_id: TopicId, level: LogLevel, message: String) {
        if let Err(e) = self.append_log(topic_id, level, message) {
            warn!(topic_id = topic_id, error = %e, "Failed to write log entry");
        }
    }
}
