//! Markdown journal entries rendered with Handlebars
//!
//! Each topic owns one file, `<slug>.md`, rewritten on every successful run.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use handlebars::Handlebars;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::index::{journal_stats, list_entries, JournalEntrySummary, JournalStats};
use super::tags::extract_tags;
use super::JournalGenerator;
use crate::models::Topic;
use crate::search::SearchResponse;
use crate::utils::slugify;

/// Default journal entry template
const DEFAULT_TEMPLATE: &str = include_str!("../../templates/journal_entry.hbs");

const TEMPLATE_NAME: &str = "journal_entry";

/// Template data for rendering
#[derive(Debug, Serialize)]
struct EntryTemplateData<'a> {
    title: &'a str,
    query: &'a str,
    timestamp: String,
    content: &'a str,
    citations: &'a [String],
    tags: Vec<String>,
}

/// Journal generator writing Markdown files
pub struct MarkdownJournal<'a> {
    /// Handlebars template engine
    handlebars: Handlebars<'a>,

    /// Output directory
    output_dir: PathBuf,
}

impl<'a> MarkdownJournal<'a> {
    /// Create a journal with the built-in template
    pub fn new(output_dir: &Path) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars
            .register_template_string(TEMPLATE_NAME, DEFAULT_TEMPLATE)
            .context("Failed to register default journal template")?;

        fs::create_dir_all(output_dir).context("Failed to create journal directory")?;

        Ok(Self {
            handlebars,
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Create with custom template file
    pub fn with_template(output_dir: &Path, template_path: &Path) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars
            .register_template_file(TEMPLATE_NAME, template_path)
            .with_context(|| {
                format!("Failed to register template: {}", template_path.display())
            })?;

        fs::create_dir_all(output_dir).context("Failed to create journal directory")?;

        Ok(Self {
            handlebars,
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Render an entry to a Markdown string
    pub fn render(
        &self,
        topic: &Topic,
        response: &SearchResponse,
        generated_at: NaiveDateTime,
    ) -> Result<String> {
        let data = EntryTemplateData {
            title: &topic.name,
            query: &topic.query,
            timestamp: generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            content: &response.content,
            citations: &response.citations,
            tags: extract_tags(&response.content, &topic.name),
        };

        self.handlebars
            .render(TEMPLATE_NAME, &data)
            .context("Failed to render journal template")
    }

    /// File name used for a topic
    pub fn filename(topic: &Topic) -> String {
        format!("{}.md", slugify(&topic.name))
    }

    /// Get output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Entries written so far
    pub fn entries(&self) -> Result<Vec<JournalEntrySummary>> {
        list_entries(&self.output_dir)
    }

    /// Counts over the entries written so far
    pub fn stats(&self) -> Result<JournalStats> {
        journal_stats(&self.output_dir)
    }
}

impl JournalGenerator for MarkdownJournal<'_> {
    fn generate(
        &self,
        topic: &Topic,
        response: &SearchResponse,
        generated_at: NaiveDateTime,
    ) -> Result<String> {
        tracing::info!(topic_id = topic.id, topic = %topic.name, "Generating journal entry");

        let markdown = self.render(topic, response, generated_at)?;
        let filename = Self::filename(topic);
        let filepath = self.output_dir.join(&filename);

        let mut file = File::create(&filepath)
            .with_context(|| format!("Failed to create file: {}", filepath.display()))?;

        file.write_all(markdown.as_bytes())
            .with_context(|| format!("Failed to write to file: {}", filepath.display()))?;

        tracing::debug!(path = %filepath.display(), "Journal entry written");
        Ok(filename)
    }
}
