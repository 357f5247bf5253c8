//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod retry;

use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

/// Sanitize filename by replacing anything outside `[A-Za-z0-9_.-]`
pub fn sanitize_filename(filename: &str) -> String {
    static INVALID_CHARS: OnceLock<Regex> = OnceLock::new();

    let re = INVALID_CHARS.get_or_init(|| Regex::new(r"[^\w\-.]").expect("Invalid regex pattern"));

    re.replace_all(filename, "_").to_string()
}

/// Lowercase, hyphen-separated file stem for a topic name
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase().replace(' ', "-");
    let sanitized = sanitize_filename(&lowered);
    if sanitized.is_empty() {
        String::from("untitled")
    } else {
        sanitized
    }
}

/// Truncate text to at most `max_chars` characters, appending "..."
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Human-friendly rendering of a run instant relative to `now`
pub fn format_relative(instant: Option<NaiveDateTime>, now: NaiveDateTime) -> String {
    let Some(dt) = instant else {
        return String::from("Not scheduled");
    };

    let clock = dt.format("%I:%M %p");
    let today = now.date();
    let day = dt.date();

    if day == today {
        return format!("Today at {clock}");
    }

    if day == today + Duration::days(1) {
        return format!("Tomorrow at {clock}");
    }

    let days_ahead = (day - today).num_days();
    if (0..7).contains(&days_ahead) {
        return format!("{} at {clock}", dt.format("%A"));
    }

    format!("{} at {clock}", dt.format("%Y-%m-%d"))
}
