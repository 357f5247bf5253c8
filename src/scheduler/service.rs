//! Scheduling service
//!
//! One owned value wiring the processor, trigger and dispatcher together.
//! Callers share it behind an `Arc`.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::dispatch::ManualDispatcher;
use super::error::{SchedulerError, SchedulerResult};
use super::processor::{BatchReport, TopicProcessor};
use super::trigger::{ScheduleTrigger, TriggerStatus};
use crate::error::Result;
use crate::models::{LogEntry, Schedule, Status, TopicId};

/// Status plus recent activity
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: Status,
    pub logs: Vec<LogEntry>,
}

/// Owns the scheduling components
pub struct SchedulerService {
    processor: Arc<TopicProcessor>,
    trigger: ScheduleTrigger,
    dispatcher: ManualDispatcher,
}

impl SchedulerService {
    /// Build the service; must be called from within a tokio runtime
    pub fn new(processor: Arc<TopicProcessor>, workers: usize, queue_capacity: usize) -> Self {
        Self {
            trigger: ScheduleTrigger::new(Arc::clone(&processor)),
            dispatcher: ManualDispatcher::new(Arc::clone(&processor), workers, queue_capacity),
            processor,
        }
    }

    pub fn processor(&self) -> &Arc<TopicProcessor> {
        &self.processor
    }

    /// Load the stored schedule, configure the recurring job and start it
    pub async fn start(&self) -> Result<NaiveDateTime> {
        let schedule = self
            .processor
            .store()
            .get_schedule()
            .map_err(|e| SchedulerError::store("get_schedule", e))?;

        let next_run = self.trigger.configure(&schedule).await?;
        self.trigger.start().await;

        info!(
            frequency = %schedule.frequency,
            time_of_day = %schedule.time_of_day,
            "Scheduler started successfully"
        );
        Ok(next_run)
    }

    /// Persist new settings and reconfigure the recurring job
    pub async fn update_schedule(&self, schedule: &Schedule) -> Result<NaiveDateTime> {
        self.processor
            .store()
            .update_schedule(schedule)
            .map_err(|e| SchedulerError::store("update_schedule", e))?;

        let next_run = self.trigger.configure(schedule).await?;
        info!(
            frequency = %schedule.frequency,
            time_of_day = %schedule.time_of_day,
            "Updated scheduler with new settings"
        );
        Ok(next_run)
    }

    /// Reconfigure when the stored schedule differs from the running job
    ///
    /// Picks up settings written by another process sharing the database.
    /// Returns the new next run, or `None` when nothing changed.
    pub async fn sync_schedule(&self) -> Result<Option<NaiveDateTime>> {
        let stored = self
            .processor
            .store()
            .get_schedule()
            .map_err(|e| SchedulerError::store("get_schedule", e))?;

        if self.trigger.configured_schedule().await.as_ref() == Some(&stored) {
            debug!("Stored schedule unchanged");
            return Ok(None);
        }

        let next_run = self.trigger.configure(&stored).await?;
        info!(
            frequency = %stored.frequency,
            time_of_day = %stored.time_of_day,
            "Picked up changed schedule"
        );
        Ok(Some(next_run))
    }

    /// Queue a manual run for an existing topic
    pub fn run_now(&self, topic_id: TopicId) -> SchedulerResult<()> {
        let exists = self
            .processor
            .store()
            .get_topic(topic_id)
            .map_err(|e| SchedulerError::store("get_topic", e))?
            .is_some();

        if !exists {
            return Err(SchedulerError::topic_not_found(topic_id));
        }

        self.dispatcher.submit(topic_id)
    }

    /// Run a batch on the caller's task
    pub async fn run_batch_now(&self) -> Result<BatchReport> {
        Ok(self.processor.run_batch().await?)
    }

    /// Status plus the `limit` newest log entries
    pub fn status_report(&self, limit: usize) -> Result<StatusReport> {
        let store = self.processor.store();
        Ok(StatusReport {
            status: store.get_status()?,
            logs: store.recent_logs(limit)?,
        })
    }

    pub async fn trigger_status(&self) -> TriggerStatus {
        self.trigger.status().await
    }

    /// Manual runs waiting in the queue
    pub fn pending_manual_runs(&self) -> usize {
        self.dispatcher.pending()
    }

    /// Stop the timer and drain queued manual runs
    pub async fn shutdown(&self) {
        self.trigger.stop().await;
        self.dispatcher.shutdown().await;
        info!("Scheduler shut down");
    }
}
