//! Configuration management for topic-journal
//!
//! Configuration comes from defaults, environment variables or a TOML file.
//! Every section has serde defaults, so a file only needs the keys it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::utils::retry::BackoffPolicy;

/// Default chat-completions endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";

/// Upper bound for the per-attempt timeout
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// Upper bound for the budget window (one year)
pub const MAX_WINDOW_HOURS: u64 = 24 * 365;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Search API configuration
    pub api: ApiConfig,

    /// Usage budget configuration
    pub budget: BudgetConfig,

    /// Topic processing configuration
    pub processing: ProcessingConfig,

    /// Database configuration
    pub storage: StorageConfig,

    /// Journal output configuration
    pub journal: JournalConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Search API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Chat-completions endpoint URL
    pub endpoint: String,

    /// Bearer token
    pub api_key: String,

    /// Model name used when a request does not name one
    pub model: String,

    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,

    /// Total attempts per query, including the first
    pub max_attempts: u32,

    /// Exponential backoff growth factor
    pub backoff_factor: f64,

    /// Backoff time unit in milliseconds
    pub backoff_unit_ms: u64,

    /// Client-side pacing; 0 disables it
    pub requests_per_minute: u32,
}

/// Usage budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Spending cap per window, in currency units
    pub daily_budget: f64,

    /// Flat estimated cost of one successful call
    pub cost_per_call: f64,

    /// Window length in hours
    pub window_hours: u64,
}

/// Topic processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Max tokens requested per topic
    pub max_tokens: u32,

    /// Manual-run worker count
    pub dispatch_workers: usize,

    /// Manual-run queue capacity
    pub dispatch_queue: usize,

    /// How often `serve` re-reads the stored schedule, in seconds
    pub schedule_poll_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub database_path: PathBuf,
}

/// Journal output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Directory the Markdown entries are written to
    pub output_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from(DEFAULT_ENDPOINT),
            api_key: String::new(),
            model: String::from("sonar"),
            timeout_secs: 30,
            max_attempts: 3,
            backoff_factor: 1.5,
            backoff_unit_ms: 1000,
            requests_per_minute: 0,
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_budget: 5.0,
            cost_per_call: 0.01,
            window_hours: 24,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1500,
            dispatch_workers: 2,
            dispatch_queue: 16,
            schedule_poll_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/research_journal.db"),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("journal"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// Read and parse an environment variable, keeping `default` when unset or invalid
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let api_key = std::env::var("TOPIC_JOURNAL_API_KEY")
            .or_else(|_| std::env::var("PERPLEXITY_API_KEY"))
            .unwrap_or_default();

        Ok(Self {
            api: ApiConfig {
                endpoint: env_or("TOPIC_JOURNAL_ENDPOINT", defaults.api.endpoint),
                api_key,
                model: env_or("TOPIC_JOURNAL_MODEL", defaults.api.model),
                timeout_secs: env_or("TOPIC_JOURNAL_TIMEOUT", defaults.api.timeout_secs),
                max_attempts: env_or("TOPIC_JOURNAL_MAX_ATTEMPTS", defaults.api.max_attempts),
                backoff_factor: env_or("TOPIC_JOURNAL_BACKOFF_FACTOR", defaults.api.backoff_factor),
                backoff_unit_ms: defaults.api.backoff_unit_ms,
                requests_per_minute: env_or(
                    "TOPIC_JOURNAL_REQUESTS_PER_MINUTE",
                    defaults.api.requests_per_minute,
                ),
            },
            budget: BudgetConfig {
                daily_budget: env_or("TOPIC_JOURNAL_DAILY_BUDGET", defaults.budget.daily_budget),
                cost_per_call: env_or("TOPIC_JOURNAL_COST_PER_CALL", defaults.budget.cost_per_call),
                window_hours: defaults.budget.window_hours,
            },
            processing: ProcessingConfig {
                max_tokens: env_or("TOPIC_JOURNAL_MAX_TOKENS", defaults.processing.max_tokens),
                dispatch_workers: env_or("TOPIC_JOURNAL_WORKERS", defaults.processing.dispatch_workers),
                dispatch_queue: env_or("TOPIC_JOURNAL_QUEUE", defaults.processing.dispatch_queue),
                schedule_poll_secs: env_or(
                    "TOPIC_JOURNAL_SCHEDULE_POLL",
                    defaults.processing.schedule_poll_secs,
                ),
            },
            storage: StorageConfig {
                database_path: env_or("TOPIC_JOURNAL_DB_PATH", defaults.storage.database_path),
            },
            journal: JournalConfig {
                output_dir: env_or("TOPIC_JOURNAL_OUTPUT_DIR", defaults.journal.output_dir),
            },
            logging: LoggingConfig {
                level: env_or("TOPIC_JOURNAL_LOG_LEVEL", defaults.logging.level),
                format: env_or("TOPIC_JOURNAL_LOG_FORMAT", defaults.logging.format),
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api.endpoint)
            .with_context(|| format!("Invalid API endpoint: {}", self.api.endpoint))?;

        if self.api.timeout_secs == 0 || self.api.timeout_secs > MAX_TIMEOUT_SECS {
            anyhow::bail!("timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}");
        }

        if self.api.max_attempts == 0 {
            anyhow::bail!("max_attempts must be greater than 0");
        }

        if self.api.backoff_factor < 1.0 {
            anyhow::bail!("backoff_factor must be at least 1.0");
        }

        if self.budget.daily_budget <= 0.0 {
            anyhow::bail!("daily_budget must be positive");
        }

        if self.budget.cost_per_call < 0.0 {
            anyhow::bail!("cost_per_call must not be negative");
        }

        if self.budget.window_hours == 0 || self.budget.window_hours > MAX_WINDOW_HOURS {
            anyhow::bail!("window_hours must be between 1 and {MAX_WINDOW_HOURS}");
        }

        if self.processing.dispatch_workers == 0 {
            anyhow::bail!("dispatch_workers must be greater than 0");
        }

        if self.processing.dispatch_queue == 0 {
            anyhow::bail!("dispatch_queue must be greater than 0");
        }

        if self.processing.schedule_poll_secs == 0 {
            anyhow::bail!("schedule_poll_secs must be greater than 0");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Backoff policy for the search client
    #[must_use]
    pub fn backoff_policy(&self) -> BackoffPolicy {
        self.api.backoff_policy()
    }
}

impl BudgetConfig {
    /// Budget window, capped at [`MAX_WINDOW_HOURS`]
    #[must_use]
    pub fn window(&self) -> chrono::Duration {
        let hours = self.window_hours.min(MAX_WINDOW_HOURS);
        chrono::Duration::hours(i64::try_from(hours).unwrap_or(0))
    }
}

impl ProcessingConfig {
    /// Schedule poll interval as Duration
    #[must_use]
    pub fn schedule_poll(&self) -> Duration {
        Duration::from_secs(self.schedule_poll_secs.max(1))
    }
}

impl ApiConfig {
    /// Backoff policy described by this section
    #[must_use]
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.max_attempts, self.backoff_factor)
            .with_unit(Duration::from_millis(self.backoff_unit_ms))
    }
}
