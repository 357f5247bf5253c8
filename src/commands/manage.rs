use anyhow::Result;
use chrono::Local;

use topic_journal::config::Config;
use topic_journal::journal::{journal_stats, list_entries};
use topic_journal::models::{parse_tags, NewTopic, TopicEdit, TopicId};
use topic_journal::scheduler::ResolvedSchedule;
use topic_journal::storage::{create_sqlite_store, JournalStore};
use topic_journal::utils::{format_relative, truncate_text};

pub fn topic_add(
    config: &Config,
    name: String,
    query: String,
    tags: Option<String>,
) -> Result<()> {
    let store = create_sqlite_store(&config.storage.database_path)?;

    let tags = tags.as_deref().map(parse_tags).unwrap_or_default();
    let topic = NewTopic::new(name, query).with_tags(tags);
    let created = store.create_topic(&topic, Local::now().naive_local())?;

    println!("Added topic #{}: {}", created.id, created.name);
    Ok(())
}

pub fn topic_list(config: &Config) -> Result<()> {
    let store = create_sqlite_store(&config.storage.database_path)?;
    let topics = store.list_topics()?;

    if topics.is_empty() {
        println!("No topics yet. Add one with `topic-journal topic add <name> <query>`");
        return Ok(());
    }

    println!(
        "{:<5} {:<24} {:<11} {:<18} Query",
        "ID", "Name", "Status", "Last Updated"
    );
    println!("{:-<90}", "");
    for topic in topics {
        let updated = topic
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<5} {:<24} {:<11} {:<18} {}",
            topic.id,
            truncate_text(&topic.name, 24),
            topic.status.as_str(),
            updated,
            truncate_text(&topic.query, 40)
        );
    }

    Ok(())
}

pub fn topic_edit(config: &Config, id: TopicId, edit: TopicEdit) -> Result<()> {
    if edit.is_empty() {
        anyhow::bail!("Nothing to change; pass --name, --query or --tags");
    }

    let store = create_sqlite_store(&config.storage.database_path)?;
    let mut topic = store
        .get_topic(id)?
        .ok_or_else(|| anyhow::anyhow!("Topic not found: {id}"))?;

    topic.apply_edit(&edit);
    store.update_topic(&topic)?;

    tracing::info!(topic_id = id, topic = %topic.name, "Updated topic");
    println!("Updated topic #{}: {}", topic.id, topic.name);
    Ok(())
}

pub fn topic_remove(config: &Config, id: TopicId) -> Result<()> {
    let store = create_sqlite_store(&config.storage.database_path)?;

    if store.delete_topic(id)? {
        println!("Removed topic #{id}");
    } else {
        anyhow::bail!("Topic not found: {id}");
    }

    Ok(())
}

pub fn schedule_show(config: &Config) -> Result<()> {
    let store = create_sqlite_store(&config.storage.database_path)?;
    let schedule = store.get_schedule()?;
    let resolved = ResolvedSchedule::from_settings(&schedule);
    let now = Local::now().naive_local();

    println!("Schedule: {resolved}");
    println!("Stored:   frequency={} time={}", schedule.frequency, schedule.time_of_day);
    println!("Next run: {}", format_relative(Some(resolved.next_run(now)), now));

    Ok(())
}

pub fn status(config: &Config, limit: usize) -> Result<()> {
    let store = create_sqlite_store(&config.storage.database_path)?;
    let status = store.get_status()?;
    let now = Local::now().naive_local();

    println!("Research Journal Status");
    println!("=======================");
    println!("State:          {}", status.state.as_str());
    println!(
        "Last run:       {}",
        status
            .last_run_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("Next run:       {}", format_relative(status.next_run_time, now));
    println!("API calls:      {}", status.api_calls_this_month);

    let logs = store.recent_logs(limit)?;
    if !logs.is_empty() {
        println!("\nRecent activity:");
        for entry in logs {
            println!(
                "  {} [{:<7}] {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.level.as_str(),
                entry.message
            );
        }
    }

    Ok(())
}

pub fn usage(config: &Config) -> Result<()> {
    let store = create_sqlite_store(&config.storage.database_path)?;
    let status = store.get_status()?;

    let budget = &config.budget;
    let calls_per_window = if budget.cost_per_call > 0.0 {
        (budget.daily_budget / budget.cost_per_call).floor().to_string()
    } else {
        "unlimited".to_string()
    };

    println!("Search API Usage");
    println!("================");
    println!("Calls recorded:    {}", status.api_calls_this_month);
    println!(
        "Budget per window: ${:.2} over {}h",
        budget.daily_budget, budget.window_hours
    );
    println!("Cost per call:     ${:.4}", budget.cost_per_call);
    println!("Calls per window:  {calls_per_window}");

    Ok(())
}

pub fn journal_list(config: &Config) -> Result<()> {
    let entries = list_entries(&config.journal.output_dir)?;

    if entries.is_empty() {
        println!("No journal entries in {}", config.journal.output_dir.display());
        return Ok(());
    }

    println!("{:<32} {:<24} {:<18} Tags", "File", "Topic", "Updated");
    println!("{:-<90}", "");
    for entry in entries {
        let updated = entry
            .updated
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "{:<32} {:<24} {:<18} {}",
            truncate_text(&entry.filename, 32),
            truncate_text(&entry.title, 24),
            updated,
            entry.tags.join(", ")
        );
    }

    Ok(())
}

pub fn journal_stats_report(config: &Config) -> Result<()> {
    let stats = journal_stats(&config.journal.output_dir)?;

    println!("Journal Statistics");
    println!("==================");
    println!("Entries:      {}", stats.total_entries);
    println!(
        "Last updated: {}",
        stats
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string())
    );

    if !stats.topics.is_empty() {
        println!("\nTopics:");
        for (topic, count) in &stats.topics {
            println!("  {topic:<30} {count}");
        }
    }

    if !stats.tags.is_empty() {
        let mut tags: Vec<(&String, &usize)> = stats.tags.iter().collect();
        tags.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        println!("\nTags:");
        for (tag, count) in tags {
            println!("  {tag:<30} {count}");
        }
    }

    Ok(())
}
