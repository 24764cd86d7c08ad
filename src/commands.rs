//! Non-interactive CLI commands
//!
//! Each command resolves the data directory, opens the store, and prints to
//! stdout. Logs go to stderr.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::adventure::DayTask;
use crate::analysis;
use crate::config::{Config, CONFIG_FILE};
use crate::error::EngineError;
use crate::identity::{Identity, LearnerClock};
use crate::session::{self, Engine};
use crate::storage::{self, ListBundle, Store, Word};

/// Open the store and configuration in the resolved data directory
pub fn open_workspace() -> Result<(PathBuf, Store, Config)> {
    let dir = storage::get_vocab_dir()?;
    let store = storage::open_in_dir(&dir)?;
    let config = Config::load(&dir.join(CONFIG_FILE))?;
    Ok((dir, store, config))
}

pub fn open_engine() -> Result<Engine> {
    let (_, store, config) = open_workspace()?;
    Ok(Engine::open(store, config)?)
}

fn describe(word: &Word) -> String {
    let mut line = word.lemma.clone();
    if let Some(pos) = word.pos.as_deref().filter(|p| !p.is_empty()) {
        line.push_str(&format!(" ({})", pos));
    }
    if let Some(definition) = word.definition.as_deref().filter(|d| !d.is_empty()) {
        line.push_str(&format!(" - {}", definition));
    }
    line
}

fn print_words(words: &[Word]) {
    for (i, word) in words.iter().enumerate() {
        println!("  {:>3}. [{}] {}", i + 1, word.id, describe(word));
    }
}

/// Create the data directory, database, default config, and learner identity
pub async fn init() -> Result<()> {
    let dir = storage::get_vocab_dir()?;
    let store = storage::open_in_dir(&dir)?;
    let created = Config::write_default(&dir.join(CONFIG_FILE))?;
    let config = Config::load(&dir.join(CONFIG_FILE))?;

    let clock = LearnerClock::from_config(&config.clock)?;
    let identity = Identity::load(&store, &clock)?;
    info!("Initialized data directory {:?}", dir);

    println!("✅ Initialized vocab data at {}", dir.display());
    println!("   Database: {}", store.db_path());
    if created {
        println!("   Config: {} (defaults written)", dir.join(CONFIG_FILE).display());
    } else {
        println!("   Config: {} (kept existing)", dir.join(CONFIG_FILE).display());
    }
    println!("   Learner: {}", identity.learner_id);
    println!("   Learning since: {}", identity.learning_start);
    Ok(())
}

pub async fn import(file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("cannot read {}", file.display()))?;
    let bundle: ListBundle =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a valid list bundle", file.display()))?;

    let (_, store, _) = open_workspace()?;
    let summary = store.import_list(&bundle)?;

    println!("✅ Imported list '{}' (id {})", bundle.name, summary.list_id);
    println!("   Words: {}", summary.words);
    println!("   Questions: {}", summary.questions);
    println!("   Contexts: {}", summary.contexts);
    println!("   Collocations: {}", summary.collocations);
    Ok(())
}

pub async fn show_status() -> Result<()> {
    let dir = storage::get_vocab_dir()?;

    println!("Vocab Status");
    println!("============");
    println!();

    if !dir.exists() {
        println!("Status: NOT INITIALIZED");
        println!("Run 'vocab init' to get started");
        return Ok(());
    }

    let (_, store, config) = open_workspace()?;
    println!("Data directory: {}", dir.display());

    let engine = match Engine::open(store, config) {
        Ok(engine) => engine,
        Err(EngineError::Initialization(msg)) => {
            println!("Word list: NONE ({})", msg);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let list = engine.list();
    let curriculum = engine.curriculum();
    let identity = engine.identity();
    let today = engine.today_day_index() as i64;
    let total_words = engine.store().count_words_in_list(list.id)?;
    let needs_review = session::build_review_queue(engine.store(), &identity.learner_id, list.id, total_words, None)?;
    let snapshot = engine.progress_snapshot()?;

    println!("Word list: {} ({} words)", list.name, total_words);
    println!("Learner: {}", identity.learner_id);
    println!("Learning since: {}", identity.learning_start);
    println!(
        "Today: day {} of {} ({}, day {} of {})",
        curriculum.global_day_number(today),
        curriculum.total_days(),
        curriculum.zone_title(curriculum.zone_index(today) as i64),
        curriculum.day_number_in_zone(today),
        curriculum.days_per_zone()
    );
    println!(
        "Next incomplete day: {}",
        engine.adventure().first_incomplete_day_index()? + 1
    );
    println!(
        "Current zone: {}",
        curriculum.zone_title(engine.adventure().first_incomplete_zone_index()? as i64)
    );
    println!();
    println!("Streak: {} days", snapshot.as_ref().map(|s| s.streak_days).unwrap_or(0));
    println!("XP: {}", engine.xp()?);
    println!("Mastered: {}", snapshot.as_ref().map(|s| s.mastered_count).unwrap_or(0));
    println!("Seen: {}", snapshot.as_ref().map(|s| s.total_seen).unwrap_or(0));
    println!("Needs review: {}", needs_review.len());

    engine.close().await;
    Ok(())
}

pub async fn show_new_queue(day: Option<i64>, start: Option<i64>, limit: Option<usize>) -> Result<()> {
    let engine = open_engine()?;
    let start = start.unwrap_or_else(|| engine.day_start_index(day));
    let limit = limit.unwrap_or(engine.config().session.new_words_per_day);

    let queue = session::build_new_word_queue(engine.store(), engine.list().id, limit, start)?;
    println!("New words from position {} ({} words):", start, queue.len());
    print_words(&queue);

    engine.close().await;
    Ok(())
}

pub async fn show_review_queue(zone: Option<i64>, limit: Option<usize>) -> Result<()> {
    let engine = open_engine()?;
    let settings = &engine.config().session;
    let learner = &engine.identity().learner_id;
    let list_id = engine.list().id;

    let queue = match zone {
        Some(zone) => {
            let ids = session::zone_word_ids(
                engine.store(),
                list_id,
                engine.curriculum(),
                zone,
                settings.new_words_per_day,
            )?;
            println!("Review queue for {}:", engine.curriculum().zone_title(zone));
            session::build_review_queue(
                engine.store(),
                learner,
                list_id,
                limit.unwrap_or(settings.zone_review_limit),
                Some(&ids),
            )?
        }
        None => {
            println!("Review queue:");
            session::build_review_queue(engine.store(), learner, list_id, limit.unwrap_or(settings.review_batch), None)?
        }
    };

    if queue.is_empty() {
        println!("  Nothing needs review");
    } else {
        print_words(&queue);
    }

    engine.close().await;
    Ok(())
}

pub async fn show_weak_words(limit: usize) -> Result<()> {
    let engine = open_engine()?;
    let learner = &engine.identity().learner_id;
    let list_id = engine.list().id;

    let words = session::build_weak_word_queue(engine.store(), learner, list_id, &engine.config().analysis, limit)?;
    if words.is_empty() {
        println!("No weak words yet");
        engine.close().await;
        return Ok(());
    }

    let records = engine
        .store()
        .fetch_outcome_records_for_words_in_list(learner, list_id, None)?;
    let stats = analysis::word_stats(&records);

    println!("Weak words:");
    for (i, word) in words.iter().enumerate() {
        let (correct, attempts) = stats
            .iter()
            .find(|s| s.word_id == word.id)
            .map(|s| (s.correct, s.attempts))
            .unwrap_or((0, 0));
        println!("  {:>3}. {} ({}/{} correct)", i + 1, word.lemma, correct, attempts);
    }

    engine.close().await;
    Ok(())
}

pub async fn show_distractors(word_id: i64, limit: usize) -> Result<()> {
    let engine = open_engine()?;
    let word = engine
        .store()
        .fetch_word_by_id(word_id)?
        .ok_or_else(|| anyhow::anyhow!("No word with id {}", word_id))?;

    let picked = session::fetch_distractors(engine.store(), engine.list().id, word.pos.as_deref(), word.id, limit)?;
    println!("Distractors for {}:", describe(&word));
    print_words(&picked);

    engine.close().await;
    Ok(())
}

pub async fn show_adventure() -> Result<()> {
    let engine = open_engine()?;
    let adventure = engine.adventure();
    let today = engine.today_day_index();

    println!("Adventure Map");
    println!("=============");
    for zone in adventure.zone_statuses()? {
        let marker = if zone.completed {
            "✅"
        } else if zone.unlocked {
            "🔓"
        } else {
            "🔒"
        };
        println!();
        println!("{} {}", marker, zone.title);

        for day in &zone.days {
            let tasks: Vec<String> = DayTask::ALL
                .iter()
                .map(|task| {
                    let mark = if day.tasks[task.index()] { "x" } else { " " };
                    format!("[{}] {}", mark, task.label())
                })
                .collect();
            let here = if day.day_index == today { " <- today" } else { "" };
            println!("   Day {:>2}: {}{}", day.day_index + 1, tasks.join("  "), here);
        }
    }

    engine.close().await;
    Ok(())
}

pub async fn complete_task(day: i64, task: usize) -> Result<()> {
    let engine = open_engine()?;
    engine.adventure().mark_day_task_completed(day, task)?;

    let day = engine.curriculum().clamp_day_index(day);
    println!("✅ Day {} task {} marked complete", day + 1, task);
    if engine.adventure().is_day_completed(day as i64)? {
        println!("   Day {} is complete", day + 1);
    }

    engine.close().await;
    Ok(())
}

pub async fn unlock_zone(zone: i64) -> Result<()> {
    let engine = open_engine()?;
    engine.adventure().unlock_zone(zone)?;
    println!("🔓 {} unlocked", engine.curriculum().zone_title(zone));

    engine.close().await;
    Ok(())
}
