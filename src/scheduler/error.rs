//! Error types for the scheduler module

use std::fmt;

use crate::models::TopicId;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Time-of-day string could not be parsed
    InvalidTimeOfDay {
        value: String,
    },

    /// Frequency string is not one of daily/weekly/monthly
    UnknownFrequency {
        value: String,
    },

    /// Topic does not exist
    TopicNotFound {
        id: TopicId,
    },

    /// Manual-run queue has no free slot
    DispatchQueueFull {
        capacity: usize,
    },

    /// Dispatcher was shut down
    DispatcherClosed,

    /// Store read or write failed
    StoreFailure {
        operation: String,
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimeOfDay { value } => {
                write!(f, "Invalid time format '{}'. Expected HH:MM", value)
            }
            Self::UnknownFrequency { value } => {
                write!(
                    f,
                    "Unrecognized frequency '{}'. Valid options: daily, weekly, monthly",
                    value
                )
            }
            Self::TopicNotFound { id } => {
                write!(f, "Topic not found: {}", id)
            }
            Self::DispatchQueueFull { capacity } => {
                write!(f, "Manual run queue is full ({} pending)", capacity)
            }
            Self::DispatcherClosed => {
                write!(f, "Manual run dispatcher is shut down")
            }
            Self::StoreFailure { operation, reason } => {
                write!(f, "Store error during '{}': {}", operation, reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create an invalid time-of-day error
    pub fn invalid_time(value: impl Into<String>) -> Self {
        Self::InvalidTimeOfDay {
            value: value.into(),
        }
    }

    /// Create an unknown frequency error
    pub fn unknown_frequency(value: impl Into<String>) -> Self {
        Self::UnknownFrequency {
            value: value.into(),
        }
    }

    /// Create a topic-not-found error
    pub fn topic_not_found(id: TopicId) -> Self {
        Self::TopicNotFound { id }
    }

    /// Create a store error with context
    pub fn store(operation: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::StoreFailure {
            operation: operation.into(),
            reason: err.to_string(),
        }
    }

    /// Check if the error is a configuration problem that falls back to defaults
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidTimeOfDay { .. } | Self::UnknownFrequency { .. }
        )
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DispatchQueueFull { .. } | Self::StoreFailure { .. }
        )
    }
}
