use anyhow::{Context, Result};
use std::sync::Arc;

use topic_journal::clock::{system_clock, SharedClock};
use topic_journal::config::Config;
use topic_journal::journal::MarkdownJournal;
use topic_journal::models::{Schedule, TopicId};
use topic_journal::scheduler::{
    Frequency, SchedulerService, TimeOfDay, TopicOutcome, TopicProcessor,
};
use topic_journal::search::SearchClient;
use topic_journal::storage::create_sqlite_store;
use topic_journal::utils::format_relative;

/// Wire store, search client, journal and scheduler from configuration
fn build_service(config: &Config, clock: SharedClock) -> Result<SchedulerService> {
    if config.api.api_key.is_empty() {
        tracing::warn!("No API key configured; search requests will be rejected");
    }

    let store = create_sqlite_store(&config.storage.database_path)?;
    let search = SearchClient::new(&config.api, &config.budget, clock.clone())
        .context("Failed to create search client")?;
    let journal = MarkdownJournal::new(&config.journal.output_dir)?;

    let processor = TopicProcessor::new(store, Arc::new(search), Arc::new(journal), clock)
        .with_max_tokens(config.processing.max_tokens);

    Ok(SchedulerService::new(
        Arc::new(processor),
        config.processing.dispatch_workers,
        config.processing.dispatch_queue,
    ))
}

pub async fn serve(config: Config) -> Result<()> {
    let clock = system_clock();
    let service = build_service(&config, clock.clone())?;

    println!("Starting Research Journal Scheduler");
    println!("===================================");

    let next_run = service.start().await?;
    println!("Next run: {}", format_relative(Some(next_run), clock.now()));
    println!("{}", service.trigger_status().await.display());
    println!("Press Ctrl-C to stop");

    // Schedule changes made by `schedule set` land in the database; poll for them
    let period = config.processing.schedule_poll();
    let mut poll = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("Failed to listen for shutdown signal")?;
                break;
            }
            _ = poll.tick() => match service.sync_schedule().await {
                Ok(Some(next_run)) => {
                    println!("Schedule changed; next run: {}", format_relative(Some(next_run), clock.now()));
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to check stored schedule"),
            },
        }
    }

    println!("\nShutting down...");
    service.shutdown().await;

    Ok(())
}

pub async fn run_batch(config: Config) -> Result<()> {
    let service = build_service(&config, system_clock())?;

    println!("Running research update for all topics");
    println!("======================================");

    let report = service.run_batch_now().await?;

    for outcome in &report.outcomes {
        match outcome {
            TopicOutcome::Completed { topic_id, artifact } => {
                println!("  [ok]     #{topic_id} -> {artifact}");
            }
            TopicOutcome::Failed {
                topic_id,
                stage,
                reason,
            } => {
                println!("  [failed] #{topic_id} ({stage:?}): {reason}");
            }
        }
    }

    println!(
        "\nCompleted: {}  Failed: {}",
        report.completed(),
        report.failed()
    );
    match report.next_run {
        Some(next) => println!("Next run: {}", next.format("%Y-%m-%d %H:%M")),
        None => println!("No topics to process"),
    }

    service.shutdown().await;
    Ok(())
}

pub async fn run_topic(config: Config, id: TopicId) -> Result<()> {
    let service = build_service(&config, system_clock())?;

    service.run_now(id)?;
    println!("Manual search queued for topic #{id}");

    // Drains the queue before returning
    service.shutdown().await;

    let report = service.status_report(1)?;
    if let Some(entry) = report.logs.first() {
        println!("[{}] {}", entry.level, entry.message);
    }

    Ok(())
}

pub async fn schedule_set(config: &Config, frequency: String, time: String) -> Result<()> {
    let frequency: Frequency = frequency.parse()?;
    let time: TimeOfDay = time.parse()?;

    let clock = system_clock();
    let service = build_service(config, clock.clone())?;

    let schedule = Schedule::new(frequency.as_str(), time.to_string());
    let next_run = service.update_schedule(&schedule).await?;

    println!("Schedule updated: {frequency} at {time}");
    println!("Next run: {}", format_relative(Some(next_run), clock.now()));
    println!(
        "A running `serve` picks this up within {}s",
        config.processing.schedule_poll_secs
    );

    service.shutdown().await;
    Ok(())
}
