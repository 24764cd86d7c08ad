use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod adventure;
mod analysis;
mod commands;
mod config;
mod curriculum;
mod error;
mod identity;
mod matching;
mod progress;
mod session;
mod storage;
mod study;

/// vocab - local-first vocabulary trainer
/// Daily word queues, mastery sessions, and adventure-map progression
#[derive(Parser)]
#[command(name = "vocab")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Session queueing and progression engine for vocabulary practice", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, database, and default config
    Init,

    /// Import a word list from a JSON file
    Import {
        /// Path to the list bundle
        file: std::path::PathBuf,
    },

    /// Show learner progress and today's position in the curriculum
    Status,

    /// Preview a session queue without starting a session
    Queue {
        #[command(subcommand)]
        which: QueueCommand,
    },

    /// List weak words (many attempts, low correct rate)
    Weak {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Sample wrong choices for a word
    Distractors {
        /// Word id
        #[arg(long)]
        word: i64,
        #[arg(long, default_value = "3")]
        limit: usize,
    },

    /// Run an interactive session, reading answers from stdin
    Study {
        mode: StudyMode,
        /// Curriculum day (0-based, defaults to today)
        #[arg(long, allow_negative_numbers = true)]
        day: Option<i64>,
        /// Zone for zone-review (0-based)
        #[arg(long, default_value = "0")]
        zone: i64,
    },

    /// Inspect or adjust adventure-map progress
    Adventure {
        #[command(subcommand)]
        action: AdventureAction,
    },
}

#[derive(Subcommand)]
enum QueueCommand {
    /// Today's new words, walking the list from the day's start position
    New {
        #[arg(long, allow_negative_numbers = true)]
        day: Option<i64>,
        /// Explicit start position (overrides --day)
        #[arg(long, allow_negative_numbers = true)]
        start: Option<i64>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Words whose latest answer was wrong
    Review {
        /// Restrict to the words of one zone
        #[arg(long)]
        zone: Option<i64>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum AdventureAction {
    /// Show zones, days, and task completion
    Show,

    /// Mark one task of a day complete
    CompleteTask {
        #[arg(long)]
        day: i64,
        /// Task number 0-3 (new words, review, fill in the blank, multiple choice)
        #[arg(long)]
        task: usize,
    },

    /// Unlock a zone
    Unlock {
        #[arg(long)]
        zone: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StudyMode {
    New,
    Review,
    ZoneReview,
    Cloze,
    Mcq,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)  // stdout carries command output only
        .init();

    match cli.command {
        Commands::Init => {
            commands::init().await?;
        }
        Commands::Import { file } => {
            commands::import(&file).await?;
        }
        Commands::Status => {
            commands::show_status().await?;
        }
        Commands::Queue { which } => match which {
            QueueCommand::New { day, start, limit } => {
                commands::show_new_queue(day, start, limit).await?;
            }
            QueueCommand::Review { zone, limit } => {
                commands::show_review_queue(zone, limit).await?;
            }
        },
        Commands::Weak { limit } => {
            commands::show_weak_words(limit).await?;
        }
        Commands::Distractors { word, limit } => {
            commands::show_distractors(word, limit).await?;
        }
        Commands::Study { mode, day, zone } => {
            let kind = match mode {
                StudyMode::New => session::SessionKind::NewWords { day },
                StudyMode::Review => session::SessionKind::Review { day },
                StudyMode::ZoneReview => session::SessionKind::ZoneReview { zone },
                StudyMode::Cloze => session::SessionKind::Cloze { day },
                StudyMode::Mcq => session::SessionKind::Mcq { day },
            };
            study::run(kind).await?;
        }
        Commands::Adventure { action } => match action {
            AdventureAction::Show => {
                commands::show_adventure().await?;
            }
            AdventureAction::CompleteTask { day, task } => {
                commands::complete_task(day, task).await?;
            }
            AdventureAction::Unlock { zone } => {
                commands::unlock_zone(zone).await?;
            }
        },
    }

    Ok(())
}
