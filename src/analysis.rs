//! Weak-word analysis
//!
//! Aggregates a learner's outcome history per word and picks the words with
//! enough attempts and a poor correct rate.

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::error::EngineResult;
use crate::storage::{OutcomeRecord, WordStore};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordStats {
    pub word_id: i64,
    pub attempts: i64,
    pub correct: i64,
}

impl WordStats {
    pub fn correct_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.correct as f64 / self.attempts as f64
    }
}

/// Per-word attempt and correct counts, ordered by word id
pub fn word_stats(records: &[OutcomeRecord]) -> Vec<WordStats> {
    let mut by_word: BTreeMap<i64, WordStats> = BTreeMap::new();
    for record in records {
        let stats = by_word.entry(record.word_id).or_insert(WordStats {
            word_id: record.word_id,
            attempts: 0,
            correct: 0,
        });
        stats.attempts += 1;
        if record.outcome.is_correct() {
            stats.correct += 1;
        }
    }
    by_word.into_values().collect()
}

/// Weak word ids, worst correct rate first, ties by word id
pub fn weak_words_from_records(
    records: &[OutcomeRecord],
    min_attempts: i64,
    max_correct_rate: f64,
    limit: usize,
) -> Vec<i64> {
    let mut weak: Vec<WordStats> = word_stats(records)
        .into_iter()
        .filter(|s| s.attempts >= min_attempts && s.correct_rate() < max_correct_rate)
        .collect();

    // Cross-multiplied to order by exact fraction
    weak.sort_by(|a, b| {
        (a.correct * b.attempts)
            .cmp(&(b.correct * a.attempts))
            .then(a.word_id.cmp(&b.word_id))
    });
    weak.truncate(limit);
    weak.into_iter().map(|s| s.word_id).collect()
}

pub fn weak_words<S: WordStore + ?Sized>(
    store: &S,
    learner_id: &str,
    list_id: i64,
    config: &AnalysisConfig,
    limit: usize,
) -> EngineResult<Vec<i64>> {
    let records = store.fetch_outcome_records_for_words_in_list(learner_id, list_id, None)?;
    let weak = weak_words_from_records(
        &records,
        config.weak_min_attempts,
        config.weak_max_correct_rate,
        limit,
    );
    debug!(
        "{} weak words out of {} outcome records in list {}",
        weak.len(),
        records.len(),
        list_id
    );
    Ok(weak)
}
