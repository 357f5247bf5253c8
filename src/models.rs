// Core data structures for the research journal

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic identifier (SQLite rowid)
pub type TopicId = i64;

/// Processing state of a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl TopicStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Parse a stored status; unknown values read back as `Pending`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "processing" | "active" => Self::Processing,
            "completed" => Self::Completed,
            "error" => Self::Error,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named research query tracked by the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: TopicStatus,
    pub created_at: NaiveDateTime,
    pub last_updated: Option<NaiveDateTime>,
}

impl Topic {
    /// Tags joined for single-column storage
    pub fn tags_csv(&self) -> String {
        self.tags.join(",")
    }

    /// Apply user edits; status and timestamps are left alone
    pub fn apply_edit(&mut self, edit: &TopicEdit) {
        if let Some(name) = &edit.name {
            self.name = name.clone();
        }
        if let Some(query) = &edit.query {
            self.query = query.clone();
        }
        if let Some(tags) = &edit.tags {
            self.tags = tags.clone();
        }
    }
}

/// User edits to an existing topic; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicEdit {
    pub name: Option<String>,
    pub query: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl TopicEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.query.is_none() && self.tags.is_none()
    }
}

/// Fields for creating a topic
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTopic {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewTopic {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Split a comma-separated tag column into trimmed, non-empty tags
pub fn parse_tags(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// User-configured recurrence, stored exactly as entered
///
/// `frequency` and `time_of_day` stay raw strings here; the scheduler
/// resolves them (with safe defaults) when it needs to compute a run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub frequency: String,
    pub time_of_day: String,
    #[serde(default)]
    pub email_notifications: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            frequency: "daily".to_string(),
            time_of_day: "09:00".to_string(),
            email_notifications: false,
        }
    }
}

impl Schedule {
    pub fn new(frequency: impl Into<String>, time_of_day: impl Into<String>) -> Self {
        Self {
            frequency: frequency.into(),
            time_of_day: time_of_day.into(),
            email_notifications: false,
        }
    }
}

/// Overall application state tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Active,
    Paused,
    Error,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "paused" => Self::Paused,
            "error" => Self::Error,
            _ => Self::Active,
        }
    }
}

/// Singleton run status
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Status {
    pub last_run_time: Option<NaiveDateTime>,
    pub next_run_time: Option<NaiveDateTime>,
    pub api_calls_this_month: u64,
    pub state: RunState,
}

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "success" => Some(Self::Success),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only activity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub topic_id: Option<TopicId>,
    pub level: LogLevel,
    pub message: String,
}

/// A log entry before the store assigns its id
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    pub timestamp: NaiveDateTime,
    pub topic_id: Option<TopicId>,
    pub level: LogLevel,
    pub message: String,
}

impl NewLogEntry {
    pub fn new(timestamp: NaiveDateTime, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            topic_id: None,
            level,
            message: message.into(),
        }
    }

    pub fn for_topic(mut self, topic_id: TopicId) -> Self {
        self.topic_id = Some(topic_id);
        self
    }
}
