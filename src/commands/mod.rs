pub mod manage;
pub mod run;

// Re-export command functions for convenience
pub use manage::{
    journal_list, journal_stats_report, schedule_show, status, topic_add, topic_edit, topic_list,
    topic_remove, usage,
};
pub use run::{run_batch, run_topic, schedule_set, serve};
