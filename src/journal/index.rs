//! Listing and statistics over written journal entries
//!
//! Entries are read back from the output directory rather than the store,
//! so files produced by earlier runs (or removed topics) are still counted.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

const UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One Markdown entry found on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalEntrySummary {
    pub filename: String,
    pub title: String,
    pub updated: Option<NaiveDateTime>,
    pub tags: Vec<String>,
}

/// Aggregate counts over all entries
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JournalStats {
    pub total_entries: usize,
    pub topics: BTreeMap<String, usize>,
    pub tags: BTreeMap<String, usize>,
    pub last_updated: Option<NaiveDateTime>,
}

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"`([^`]+)`").expect("Invalid regex pattern"))
}

/// Title-cased name derived from a slug file name
fn title_from_filename(filename: &str) -> String {
    let stem = filename.strip_suffix(".md").unwrap_or(filename);
    stem.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Read title, timestamp and tags out of a rendered entry
///
/// Entries from custom templates may lack any of these; the title then
/// comes from the file name and the rest stays empty.
pub fn parse_entry(filename: &str, markdown: &str) -> JournalEntrySummary {
    let mut title = None;
    let mut updated = None;
    let mut tags = Vec::new();

    for line in markdown.lines() {
        let line = line.trim();

        if title.is_none() {
            if let Some(heading) = line.strip_prefix("# ") {
                title = Some(heading.trim().to_string());
                continue;
            }
        }

        if updated.is_none() {
            if let Some(stamp) = line
                .strip_prefix("_Updated ")
                .and_then(|rest| rest.strip_suffix('_'))
            {
                updated = NaiveDateTime::parse_from_str(stamp, UPDATED_FORMAT).ok();
                continue;
            }
        }

        if tags.is_empty() {
            if let Some(list) = line.strip_prefix("Tags:") {
                tags = tag_pattern()
                    .captures_iter(list)
                    .map(|c| c[1].to_string())
                    .collect();
            }
        }

        // Tags sit above the separator; the body is free text
        if line == "---" {
            break;
        }
    }

    JournalEntrySummary {
        filename: filename.to_string(),
        title: title.unwrap_or_else(|| title_from_filename(filename)),
        updated,
        tags,
    }
}

/// All `.md` entries in `dir`, sorted by file name
///
/// A missing directory means no entries yet.
pub fn list_entries(dir: &Path) -> Result<Vec<JournalEntrySummary>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let listing = fs::read_dir(dir)
        .with_context(|| format!("Failed to read journal directory: {}", dir.display()))?;

    for item in listing {
        let item = item.context("Failed to read journal directory entry")?;
        let path = item.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }

        let filename = item.file_name().to_string_lossy().into_owned();
        let markdown = match fs::read_to_string(&path) {
            Ok(markdown) => markdown,
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "Skipping unreadable journal entry");
                continue;
            }
        };

        let mut entry = parse_entry(&filename, &markdown);
        if entry.updated.is_none() {
            entry.updated = item
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(|modified| DateTime::<Local>::from(modified).naive_local());
        }
        entries.push(entry);
    }

    entries.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(entries)
}

/// Entry, per-topic and per-tag counts for `dir`
pub fn journal_stats(dir: &Path) -> Result<JournalStats> {
    let entries = list_entries(dir)?;
    let mut stats = JournalStats {
        total_entries: entries.len(),
        ..JournalStats::default()
    };

    for entry in entries {
        *stats.topics.entry(entry.title).or_default() += 1;
        for tag in entry.tags {
            *stats.tags.entry(tag).or_default() += 1;
        }
        stats.last_updated = stats.last_updated.max(entry.updated);
    }

    Ok(stats)
}
