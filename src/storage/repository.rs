//! Store abstraction for topics, schedule, status and logs
//!
//! The scheduler only talks to [`JournalStore`]. Two implementations ship:
//!
//! ```text
//!              ┌──────────────────────────────┐
//!              │  TopicProcessor / Service    │
//!              └──────────────────────────────┘
//!                             │
//!                             ▼
//!              ┌──────────────────────────────┐
//!              │        JournalStore          │
//!              └──────────────────────────────┘
//!                    │                │
//!                    ▼                ▼
//!           ┌──────────────┐  ┌──────────────┐
//!           │ SqliteStore  │  │ MemoryStore  │
//!           └──────────────┘  └──────────────┘
//! ```
//!
//! Schedule and Status are singletons: the SQLite schema seeds one row of
//! each, and reads always return a value.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::models::{
    parse_tags, LogEntry, LogLevel, NewLogEntry, NewTopic, RunState, Schedule, Status, Topic,
    TopicId, TopicStatus,
};

const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// ============================================================================
// Store Trait
// ============================================================================

/// Persistent store consumed by the scheduler
pub trait JournalStore: Send + Sync {
    /// All topics in id order
    fn list_topics(&self) -> Result<Vec<Topic>>;

    /// Topic by id
    fn get_topic(&self, id: TopicId) -> Result<Option<Topic>>;

    /// Insert a topic with `pending` status
    fn create_topic(&self, topic: &NewTopic, created_at: NaiveDateTime) -> Result<Topic>;

    /// Overwrite an existing topic
    fn update_topic(&self, topic: &Topic) -> Result<()>;

    /// Remove a topic; `false` when it did not exist
    fn delete_topic(&self, id: TopicId) -> Result<bool>;

    /// Singleton schedule settings
    fn get_schedule(&self) -> Result<Schedule>;

    /// Replace the schedule settings
    fn update_schedule(&self, schedule: &Schedule) -> Result<()>;

    /// Singleton run status
    fn get_status(&self) -> Result<Status>;

    /// Replace the run status
    fn update_status(&self, status: &Status) -> Result<()>;

    /// Append a log entry
    fn append_log(&self, entry: &NewLogEntry) -> Result<LogEntry>;

    /// The `limit` newest log entries, newest first
    fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>>;

    /// Apply `change` to the status and persist it as one atomic step
    ///
    /// Concurrent callers each see the other's committed change; no field
    /// written by one caller is overwritten with a stale value by another.
    fn modify_status(&self, change: &mut dyn FnMut(&mut Status)) -> Result<Status>;
}

/// Thread-safe shared store
pub type SharedStore = Arc<dyn JournalStore>;

fn format_instant(instant: NaiveDateTime) -> String {
    instant.format(INSTANT_FORMAT).to_string()
}

fn read_instant(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, INSTANT_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn read_optional_instant(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => read_instant(row, idx).map(Some),
        None => Ok(None),
    }
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`JournalStore`]
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }

    /// Create database schema and seed the singleton rows
    fn create_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS topic (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    query TEXT NOT NULL,
                    tags TEXT,
                    created_at TEXT NOT NULL,
                    last_updated TEXT,
                    status TEXT NOT NULL DEFAULT 'pending'
                );

                CREATE TABLE IF NOT EXISTS schedule (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    frequency TEXT NOT NULL DEFAULT 'daily',
                    time_of_day TEXT NOT NULL DEFAULT '09:00',
                    email_notifications INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS status (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    last_run_time TEXT,
                    next_run_time TEXT,
                    api_calls_this_month INTEGER NOT NULL DEFAULT 0,
                    status TEXT NOT NULL DEFAULT 'active'
                );

                CREATE TABLE IF NOT EXISTS log (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp TEXT NOT NULL,
                    topic_id INTEGER,
                    status TEXT NOT NULL,
                    message TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_log_timestamp
                    ON log(timestamp);

                INSERT OR IGNORE INTO schedule (id) VALUES (1);
                INSERT OR IGNORE INTO status (id) VALUES (1);
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    fn map_topic(row: &Row<'_>) -> rusqlite::Result<Topic> {
        let tags: Option<String> = row.get(3)?;
        let status: String = row.get(6)?;
        Ok(Topic {
            id: row.get(0)?,
            name: row.get(1)?,
            query: row.get(2)?,
            tags: tags.as_deref().map(parse_tags).unwrap_or_default(),
            created_at: read_instant(row, 4)?,
            last_updated: read_optional_instant(row, 5)?,
            status: TopicStatus::parse(&status),
        })
    }

    fn read_status(conn: &Connection) -> Result<Status> {
        conn.query_row(
            "SELECT last_run_time, next_run_time, api_calls_this_month, status
             FROM status WHERE id = 1",
            [],
            |row| {
                let calls: i64 = row.get(2)?;
                let state: String = row.get(3)?;
                Ok(Status {
                    last_run_time: read_optional_instant(row, 0)?,
                    next_run_time: read_optional_instant(row, 1)?,
                    api_calls_this_month: u64::try_from(calls).unwrap_or(0),
                    state: RunState::parse(&state),
                })
            },
        )
        .context("Failed to load status")
    }

    fn write_status(conn: &Connection, status: &Status) -> Result<()> {
        let calls = i64::try_from(status.api_calls_this_month).unwrap_or(i64::MAX);
        conn.execute(
            "INSERT INTO status (id, last_run_time, next_run_time, api_calls_this_month, status)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                last_run_time = excluded.last_run_time,
                next_run_time = excluded.next_run_time,
                api_calls_this_month = excluded.api_calls_this_month,
                status = excluded.status",
            params![
                status.last_run_time.map(format_instant),
                status.next_run_time.map(format_instant),
                calls,
                status.state.as_str()
            ],
        )
        .context("Failed to save status")?;
        Ok(())
    }

    fn map_log(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
        let level: String = row.get(3)?;
        Ok(LogEntry {
            id: row.get(0)?,
            timestamp: read_instant(row, 1)?,
            topic_id: row.get(2)?,
            level: LogLevel::parse(&level).unwrap_or(LogLevel::Info),
            message: row.get(4)?,
        })
    }
}

impl JournalStore for SqliteStore {
    fn list_topics(&self) -> Result<Vec<Topic>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, query, tags, created_at, last_updated, status
             FROM topic ORDER BY id",
        )?;

        let topics = stmt
            .query_map([], Self::map_topic)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list topics")?;

        Ok(topics)
    }

    fn get_topic(&self, id: TopicId) -> Result<Option<Topic>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, query, tags, created_at, last_updated, status
             FROM topic WHERE id = ?1",
            params![id],
            Self::map_topic,
        )
        .optional()
        .with_context(|| format!("Failed to load topic {id}"))
    }

    fn create_topic(&self, topic: &NewTopic, created_at: NaiveDateTime) -> Result<Topic> {
        let conn = self.lock()?;
        let tags = topic.tags.join(",");
        conn.execute(
            "INSERT INTO topic (name, query, tags, created_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                topic.name,
                topic.query,
                tags,
                format_instant(created_at),
                TopicStatus::Pending.as_str()
            ],
        )
        .context("Failed to insert topic")?;

        Ok(Topic {
            id: conn.last_insert_rowid(),
            name: topic.name.clone(),
            query: topic.query.clone(),
            tags: topic.tags.clone(),
            status: TopicStatus::Pending,
            created_at,
            last_updated: None,
        })
    }

    fn update_topic(&self, topic: &Topic) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE topic
                 SET name = ?2, query = ?3, tags = ?4, last_updated = ?5, status = ?6
                 WHERE id = ?1",
                params![
                    topic.id,
                    topic.name,
                    topic.query,
                    topic.tags_csv(),
                    topic.last_updated.map(format_instant),
                    topic.status.as_str()
                ],
            )
            .with_context(|| format!("Failed to update topic {}", topic.id))?;

        if changed == 0 {
            anyhow::bail!("Topic {} does not exist", topic.id);
        }
        Ok(())
    }

    fn delete_topic(&self, id: TopicId) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM topic WHERE id = ?1", params![id])
            .with_context(|| format!("Failed to delete topic {id}"))?;
        Ok(changed > 0)
    }

    fn get_schedule(&self) -> Result<Schedule> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT frequency, time_of_day, email_notifications FROM schedule WHERE id = 1",
            [],
            |row| {
                Ok(Schedule {
                    frequency: row.get(0)?,
                    time_of_day: row.get(1)?,
                    email_notifications: row.get(2)?,
                })
            },
        )
        .context("Failed to load schedule")
    }

    fn update_schedule(&self, schedule: &Schedule) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO schedule (id, frequency, time_of_day, email_notifications)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                frequency = excluded.frequency,
                time_of_day = excluded.time_of_day,
                email_notifications = excluded.email_notifications",
            params![
                schedule.frequency,
                schedule.time_of_day,
                schedule.email_notifications
            ],
        )
        .context("Failed to save schedule")?;
        Ok(())
    }

    fn get_status(&self) -> Result<Status> {
        let conn = self.lock()?;
        Self::read_status(&conn)
    }

    fn update_status(&self, status: &Status) -> Result<()> {
        let conn = self.lock()?;
        Self::write_status(&conn, status)
    }

    fn modify_status(&self, change: &mut dyn FnMut(&mut Status)) -> Result<Status> {
        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front, so other processes
        // sharing the file cannot interleave between the read and the write
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin status transaction")?;

        let mut status = Self::read_status(&tx)?;
        change(&mut status);
        Self::write_status(&tx, &status)?;

        tx.commit().context("Failed to commit status")?;
        Ok(status)
    }

    fn append_log(&self, entry: &NewLogEntry) -> Result<LogEntry> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO log (timestamp, topic_id, status, message) VALUES (?1, ?2, ?3, ?4)",
            params![
                format_instant(entry.timestamp),
                entry.topic_id,
                entry.level.as_str(),
                entry.message
            ],
        )
        .context("Failed to append log entry")?;

        Ok(LogEntry {
            id: conn.last_insert_rowid(),
            timestamp: entry.timestamp,
            topic_id: entry.topic_id,
            level: entry.level,
            message: entry.message.clone(),
        })
    }

    fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, topic_id, status, message
             FROM log ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;

        let logs = stmt
            .query_map(params![limit], Self::map_log)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load log entries")?;

        Ok(logs)
    }
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    topics: BTreeMap<TopicId, Topic>,
    next_topic_id: TopicId,
    schedule: Schedule,
    status: Status,
    logs: Vec<LogEntry>,
}

/// In-memory implementation of [`JournalStore`]
///
/// Useful for testing without database dependencies.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store with default schedule and status
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))
    }

    /// Number of log entries
    pub fn log_count(&self) -> usize {
        self.lock().map(|s| s.logs.len()).unwrap_or(0)
    }
}

impl JournalStore for MemoryStore {
    fn list_topics(&self) -> Result<Vec<Topic>> {
        Ok(self.lock()?.topics.values().cloned().collect())
    }

    fn get_topic(&self, id: TopicId) -> Result<Option<Topic>> {
        Ok(self.lock()?.topics.get(&id).cloned())
    }

    fn create_topic(&self, topic: &NewTopic, created_at: NaiveDateTime) -> Result<Topic> {
        let mut state = self.lock()?;
        state.next_topic_id += 1;
        let created = Topic {
            id: state.next_topic_id,
            name: topic.name.clone(),
            query: topic.query.clone(),
            tags: topic.tags.clone(),
            status: TopicStatus::Pending,
            created_at,
            last_updated: None,
        };
        state.topics.insert(created.id, created.clone());
        Ok(created)
    }

    fn update_topic(&self, topic: &Topic) -> Result<()> {
        let mut state = self.lock()?;
        match state.topics.get_mut(&topic.id) {
            Some(existing) => {
                *existing = topic.clone();
                Ok(())
            }
            None => anyhow::bail!("Topic {} does not exist", topic.id),
        }
    }

    fn delete_topic(&self, id: TopicId) -> Result<bool> {
        Ok(self.lock()?.topics.remove(&id).is_some())
    }

    fn get_schedule(&self) -> Result<Schedule> {
        Ok(self.lock()?.schedule.clone())
    }

    fn update_schedule(&self, schedule: &Schedule) -> Result<()> {
        self.lock()?.schedule = schedule.clone();
        Ok(())
    }

    fn get_status(&self) -> Result<Status> {
        Ok(self.lock()?.status.clone())
    }

    fn update_status(&self, status: &Status) -> Result<()> {
        self.lock()?.status = status.clone();
        Ok(())
    }

    fn modify_status(&self, change: &mut dyn FnMut(&mut Status)) -> Result<Status> {
        let mut state = self.lock()?;
        change(&mut state.status);
        Ok(state.status.clone())
    }

    fn append_log(&self, entry: &NewLogEntry) -> Result<LogEntry> {
        let mut state = self.lock()?;
        let logged = LogEntry {
            id: state.logs.len() as i64 + 1,
            timestamp: entry.timestamp,
            topic_id: entry.topic_id,
            level: entry.level,
            message: entry.message.clone(),
        };
        state.logs.push(logged.clone());
        Ok(logged)
    }

    fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let state = self.lock()?;
        let mut logs = state.logs.clone();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        logs.truncate(limit);
        Ok(logs)
    }
}

// ============================================================================
// Shared Store Constructors
// ============================================================================

/// Create a shared SQLite store
pub fn create_sqlite_store(path: impl AsRef<Path>) -> Result<SharedStore> {
    Ok(Arc::new(SqliteStore::new(path)?))
}

/// Create a shared in-memory store
pub fn create_memory_store() -> SharedStore {
    Arc::new(MemoryStore::new())
}

// ============================================================================
// Tests
// ============================================================================
