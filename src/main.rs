use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use topic_journal::config::Config;
use topic_journal::models::{parse_tags, TopicEdit};

mod commands;

#[derive(Parser)]
#[command(
    name = "topic-journal",
    version,
    about = "Scheduled research journal with budget-tracked knowledge search",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (environment variables are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted
    Serve,

    /// Run one batch over all topics now
    Run,

    /// Run a single topic now
    RunTopic {
        /// Topic ID
        id: i64,
    },

    /// Manage topics
    Topic {
        #[command(subcommand)]
        action: TopicAction,
    },

    /// Show or change the schedule
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Browse written journal entries
    Journal {
        #[command(subcommand)]
        action: JournalAction,
    },

    /// Show run status and recent activity
    Status {
        /// Number of log entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show recorded search API calls and budget settings
    Usage,
}

#[derive(Subcommand)]
enum TopicAction {
    /// Add a topic
    Add {
        /// Display name
        name: String,

        /// Search query text
        query: String,

        /// Comma-separated tags
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// List topics
    List,

    /// Change a topic's name, query or tags
    Edit {
        /// Topic ID
        id: i64,

        /// New display name
        #[arg(short, long)]
        name: Option<String>,

        /// New search query text
        #[arg(short, long)]
        query: Option<String>,

        /// New comma-separated tags (empty string clears them)
        #[arg(short, long)]
        tags: Option<String>,
    },

    /// Remove a topic
    Remove {
        /// Topic ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum JournalAction {
    /// List entries with their tags
    List,

    /// Entry counts per topic and tag
    Stats,
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Show the current schedule
    Show,

    /// Change the schedule
    Set {
        /// daily, weekly or monthly
        #[arg(short, long)]
        frequency: String,

        /// Time of day, HH:MM
        #[arg(short, long)]
        time: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("topic-journal starting");

    match cli.command {
        Commands::Serve => {
            tracing::info!("Starting serve command");
            commands::serve(config).await?;
        }

        Commands::Run => {
            tracing::info!("Starting run command");
            commands::run_batch(config).await?;
        }

        Commands::RunTopic { id } => {
            tracing::info!(topic_id = id, "Starting run-topic command");
            commands::run_topic(config, id).await?;
        }

        Commands::Topic { action } => match action {
            TopicAction::Add { name, query, tags } => {
                commands::topic_add(&config, name, query, tags)?;
            }
            TopicAction::List => commands::topic_list(&config)?,
            TopicAction::Edit {
                id,
                name,
                query,
                tags,
            } => {
                let edit = TopicEdit {
                    name,
                    query,
                    tags: tags.as_deref().map(parse_tags),
                };
                commands::topic_edit(&config, id, edit)?;
            }
            TopicAction::Remove { id } => commands::topic_remove(&config, id)?,
        },

        Commands::Schedule { action } => match action {
            ScheduleAction::Show => commands::schedule_show(&config)?,
            ScheduleAction::Set { frequency, time } => {
                commands::schedule_set(&config, frequency, time).await?;
            }
        },

        Commands::Journal { action } => match action {
            JournalAction::List => commands::journal_list(&config)?,
            JournalAction::Stats => commands::journal_stats_report(&config)?,
        },

        Commands::Status { limit } => commands::status(&config, limit)?,

        Commands::Usage => commands::usage(&config)?,
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("topic_journal=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!("topic_journal={level},warn"))
        })
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
