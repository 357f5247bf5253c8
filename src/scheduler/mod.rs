//! Research scheduling
//!
//! Turns stored schedule settings into recurring batch runs and accepts
//! manual runs for single topics.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  SchedulerService                    │
//! │  ┌────────────────┐          ┌───────────────────┐   │
//! │  │ScheduleTrigger │          │ ManualDispatcher  │   │
//! │  │ (timer task)   │          │ (queue + workers) │   │
//! │  └───────┬────────┘          └─────────┬─────────┘   │
//! │          │ run_batch                   │ run_single  │
//! │          └──────────────┬──────────────┘             │
//! │                  ┌──────▼───────┐                    │
//! │                  │TopicProcessor│ one pipeline       │
//! │                  │              │ at a time          │
//! │                  └──────┬───────┘                    │
//! └─────────────────────────┼────────────────────────────┘
//!              ┌────────────┼────────────┐
//!              ▼            ▼            ▼
//!          JournalStore  SearchBackend  JournalGenerator
//! ```
//!
//! # Modules
//!
//! - [`schedule`] - Frequency, time of day and next-run calculation
//! - [`processor`] - Per-topic pipeline and batch runs
//! - [`trigger`] - Recurring job with a timer task
//! - [`dispatch`] - Bounded queue for manual runs
//! - [`service`] - Wiring of the above
//! - [`error`] - Scheduler error type
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use topic_journal::scheduler::{SchedulerService, TopicProcessor};
//!
//! let processor = Arc::new(TopicProcessor::new(store, search, journal, clock));
//! let service = SchedulerService::new(processor, 2, 16);
//!
//! let next_run = service.start().await?;
//! println!("Next run at {next_run}");
//!
//! service.run_now(topic_id)?;
//! service.shutdown().await;
//! ```

pub mod dispatch;
pub mod error;
pub mod processor;
pub mod schedule;
pub mod service;
pub mod trigger;

pub use dispatch::ManualDispatcher;
pub use error::{SchedulerError, SchedulerResult};
pub use processor::{
    system_message_for, BatchReport, FailureStage, RunKind, TopicOutcome, TopicProcessor,
    DEFAULT_MAX_TOKENS,
};
pub use schedule::{
    calculate_next_run, next_run, Frequency, ResolvedSchedule, TimeOfDay, DEFAULT_TIME_OF_DAY,
    MONTHLY_RUN_DAY, WEEKLY_RUN_WEEKDAY,
};
pub use service::{SchedulerService, StatusReport};
pub use trigger::{RecurringTrigger, ScheduleTrigger, TriggerStatus, SCHEDULED_JOB_ID};
