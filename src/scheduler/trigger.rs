//! Recurring trigger for scheduled batch runs
//!
//! [`ScheduleTrigger`] keeps a job table with at most one entry,
//! [`SCHEDULED_JOB_ID`]. Each running job owns a timer task that sleeps until
//! the next fire instant and then spawns the batch as a task of its own, so
//! replacing or stopping the job never cancels a batch already in flight.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::error::{SchedulerError, SchedulerResult};
use super::processor::TopicProcessor;
use super::schedule::{Frequency, ResolvedSchedule, MONTHLY_RUN_DAY};
use crate::models::{Schedule, Status};

/// Name of the single recurring job
pub const SCHEDULED_JOB_ID: &str = "scheduled_update";

// ============================================================================
// Recurring Trigger
// ============================================================================

/// Fire rule derived from schedule settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurringTrigger {
    schedule: ResolvedSchedule,
}

impl RecurringTrigger {
    /// Build from stored settings, defaulting malformed values
    pub fn from_settings(schedule: &Schedule) -> Self {
        Self {
            schedule: ResolvedSchedule::from_settings(schedule),
        }
    }

    pub fn schedule(&self) -> ResolvedSchedule {
        self.schedule
    }

    /// Five-field cron rendering (minute hour day-of-month month day-of-week)
    pub fn cron_expression(&self) -> String {
        let time = self.schedule.time;
        match self.schedule.frequency {
            Frequency::Daily => format!("{} {} * * *", time.minute, time.hour),
            Frequency::Weekly => format!("{} {} * * 1", time.minute, time.hour),
            Frequency::Monthly => {
                format!("{} {} {} * *", time.minute, time.hour, MONTHLY_RUN_DAY)
            }
        }
    }

    /// Next fire strictly after `now`
    pub fn next_fire(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.schedule.next_run(now)
    }
}

impl fmt::Display for RecurringTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.schedule, f)
    }
}

// ============================================================================
// Job Table
// ============================================================================

/// A configured job and, while started, its timer task
struct ScheduledJob {
    settings: Schedule,
    trigger: RecurringTrigger,
    timer: Option<JoinHandle<()>>,
}

impl ScheduledJob {
    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct JobTable {
    running: bool,
    jobs: HashMap<String, ScheduledJob>,
}

// ============================================================================
// Schedule Trigger
// ============================================================================

/// Holds the recurring job and fires batches on the processor
pub struct ScheduleTrigger {
    processor: Arc<TopicProcessor>,
    table: Mutex<JobTable>,
}

impl ScheduleTrigger {
    pub fn new(processor: Arc<TopicProcessor>) -> Self {
        Self {
            processor,
            table: Mutex::new(JobTable::default()),
        }
    }

    /// Replace the recurring job and persist the resulting next run
    ///
    /// The old job is removed and the new one added under the table lock, so
    /// a fire never sees a half-configured table.
    pub async fn configure(&self, schedule: &Schedule) -> SchedulerResult<NaiveDateTime> {
        let trigger = RecurringTrigger::from_settings(schedule);

        {
            let mut table = self.table.lock().await;

            if let Some(mut previous) = table.jobs.remove(SCHEDULED_JOB_ID) {
                previous.stop_timer();
            }

            let timer = table.running.then(|| self.spawn_timer(trigger));
            table.jobs.insert(
                SCHEDULED_JOB_ID.to_string(),
                ScheduledJob {
                    settings: schedule.clone(),
                    trigger,
                    timer,
                },
            );
        }

        info!(
            trigger = %trigger,
            cron = %trigger.cron_expression(),
            "Scheduled update configured"
        );

        let next_run = trigger.next_fire(self.processor.clock().now());
        self.processor
            .store()
            .modify_status(&mut |s: &mut Status| s.next_run_time = Some(next_run))
            .map_err(|e| SchedulerError::store("update_status", e))?;

        info!(next_run = %next_run, "Updated next run time");
        Ok(next_run)
    }

    /// Start executing configured jobs; a no-op when already running
    pub async fn start(&self) {
        let mut table = self.table.lock().await;
        if table.running {
            debug!("Trigger already running");
            return;
        }
        table.running = true;

        let triggers: Vec<(String, RecurringTrigger)> = table
            .jobs
            .iter()
            .filter(|(_, job)| job.timer.is_none())
            .map(|(id, job)| (id.clone(), job.trigger))
            .collect();

        for (id, trigger) in triggers {
            let timer = self.spawn_timer(trigger);
            if let Some(job) = table.jobs.get_mut(&id) {
                job.timer = Some(timer);
            }
        }

        info!(jobs = table.jobs.len(), "Trigger started");
    }

    /// Stop all timers; batches already running finish on their own
    pub async fn stop(&self) {
        let mut table = self.table.lock().await;
        table.running = false;
        for job in table.jobs.values_mut() {
            job.stop_timer();
        }
        info!("Trigger stopped");
    }

    /// Settings the recurring job was last configured with
    pub async fn configured_schedule(&self) -> Option<Schedule> {
        let table = self.table.lock().await;
        table.jobs.get(SCHEDULED_JOB_ID).map(|job| job.settings.clone())
    }

    /// Check if trigger is running
    pub async fn is_running(&self) -> bool {
        self.table.lock().await.running
    }

    /// Get trigger status
    pub async fn status(&self) -> TriggerStatus {
        let table = self.table.lock().await;
        let job = table.jobs.get(SCHEDULED_JOB_ID);
        let now = self.processor.clock().now();

        TriggerStatus {
            is_running: table.running,
            job_id: job.map(|_| SCHEDULED_JOB_ID.to_string()),
            trigger: job.map(|j| j.trigger.to_string()),
            cron: job.map(|j| j.trigger.cron_expression()),
            next_fire: job.map(|j| j.trigger.next_fire(now)),
        }
    }

    fn spawn_timer(&self, trigger: RecurringTrigger) -> JoinHandle<()> {
        let processor = Arc::clone(&self.processor);
        tokio::spawn(run_timer(processor, trigger))
    }
}

/// Sleep until each fire instant and hand the batch to its own task
async fn run_timer(processor: Arc<TopicProcessor>, trigger: RecurringTrigger) {
    let mut last_fire: Option<NaiveDateTime> = None;

    loop {
        let now = processor.clock().now();
        // Never fire twice for the same instant if the wall clock lags the timer
        let reference = last_fire.map_or(now, |fired| fired.max(now));
        let fire_at = trigger.next_fire(reference);
        let wait = (fire_at - now).to_std().unwrap_or_default();

        debug!(fire_at = %fire_at, wait_secs = wait.as_secs(), "Timer sleeping");
        tokio::time::sleep(wait).await;
        last_fire = Some(fire_at);

        info!(job = SCHEDULED_JOB_ID, fire_at = %fire_at, "Running scheduled update");
        let batch_processor = Arc::clone(&processor);
        tokio::spawn(async move {
            if let Err(e) = batch_processor.run_batch().await {
                error!(error = %e, "Scheduled update failed");
            }
        });
    }
}

/// Trigger status information
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerStatus {
    pub is_running: bool,
    pub job_id: Option<String>,
    pub trigger: Option<String>,
    pub cron: Option<String>,
    pub next_fire: Option<NaiveDateTime>,
}

impl TriggerStatus {
    /// Format as display string
    pub fn display(&self) -> String {
        let mut output = String::from("Trigger Status\n");
        output.push_str(&format!("{:-<40}\n", ""));
        output.push_str(&format!("Running: {}\n", self.is_running));

        match (&self.job_id, &self.trigger, &self.cron) {
            (Some(id), Some(trigger), Some(cron)) => {
                output.push_str(&format!("Job: {id}\n"));
                output.push_str(&format!("Trigger: {trigger}\n"));
                output.push_str(&format!("Cron: {cron}\n"));
            }
            _ => output.push_str("Job: none\n"),
        }

        if let Some(next) = self.next_fire {
            output.push_str(&format!("Next Fire: {}\n", next.format("%Y-%m-%d %H:%M")));
        }

        output
    }
}

// ============================================================================
// Tests
// ============================================================================
