//! Session queue building
//!
//! New-word queues walk the list as a circular buffer from a start position;
//! review queues come from the outcome log. Both are deterministic for fixed
//! inputs. Only distractor picks are random.

use std::collections::HashSet;
use tracing::debug;

use crate::analysis;
use crate::config::AnalysisConfig;
use crate::curriculum::Curriculum;
use crate::error::EngineResult;
use crate::storage::{Word, WordStore};

pub mod logger;
pub mod mastery;
pub mod rounds;
pub mod runner;

pub use runner::{Card, Engine, Session, SessionItem, SessionKind, SessionStart, SessionSummary};

/// Non-negative start offset for any start index, negative ones included
pub fn wrap_offset(start_index: i64, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    start_index.rem_euclid(total as i64) as usize
}

/// `limit` words starting at `start_index`, wrapping past the end of the list.
///
/// The first pass runs from the offset to the end and then from the start up
/// to the offset, so it covers every word once. When `limit` exceeds the list
/// size, later passes repeat from the start of the list.
pub fn build_new_word_queue<S: WordStore + ?Sized>(
    store: &S,
    list_id: i64,
    limit: usize,
    start_index: i64,
) -> EngineResult<Vec<Word>> {
    let total = store.count_words_in_list(list_id)?;
    if total == 0 || limit == 0 {
        return Ok(Vec::new());
    }

    let offset = wrap_offset(start_index, total);
    let first_pass = limit.min(total);

    let mut queue = store.fetch_ordered_words(list_id, first_pass, offset)?;
    if queue.len() < first_pass {
        let wrapped = store.fetch_ordered_words(list_id, first_pass - queue.len(), 0)?;
        queue.extend(wrapped);
    }

    while queue.len() < limit {
        let repeat = store.fetch_ordered_words(list_id, limit - queue.len(), 0)?;
        if repeat.is_empty() {
            break;
        }
        queue.extend(repeat);
    }

    debug!(
        "New-word queue for list {}: {} words from offset {} of {}",
        list_id,
        queue.len(),
        offset,
        total
    );
    Ok(queue)
}

/// Words whose latest outcome is incorrect, most recently missed first.
///
/// `Some(&[])` means "restricted to nothing" and is always empty; `None`
/// considers the whole list.
pub fn build_review_queue<S: WordStore + ?Sized>(
    store: &S,
    learner_id: &str,
    list_id: i64,
    limit: usize,
    restrict_to: Option<&[i64]>,
) -> EngineResult<Vec<Word>> {
    if matches!(restrict_to, Some(ids) if ids.is_empty()) {
        return Ok(Vec::new());
    }
    store.fetch_needs_review(learner_id, list_id, restrict_to, limit)
}

/// Weak words as full word rows, worst first
pub fn build_weak_word_queue<S: WordStore + ?Sized>(
    store: &S,
    learner_id: &str,
    list_id: i64,
    config: &AnalysisConfig,
    limit: usize,
) -> EngineResult<Vec<Word>> {
    let ids = analysis::weak_words(store, learner_id, list_id, config, limit)?;
    let mut words = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(word) = store.fetch_word_by_id(id)? {
            words.push(word);
        }
    }
    Ok(words)
}

/// Wrong choices for a target: same part of speech first, then any word.
///
/// Never contains the target or the same word twice.
pub fn fetch_distractors<S: WordStore + ?Sized>(
    store: &S,
    list_id: i64,
    pos: Option<&str>,
    exclude_word_id: i64,
    limit: usize,
) -> EngineResult<Vec<Word>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::from([exclude_word_id]);
    let mut picked = Vec::with_capacity(limit);

    if let Some(pos) = pos.map(str::trim).filter(|p| !p.is_empty()) {
        for word in store.fetch_random_sample(list_id, exclude_word_id, Some(pos), limit)? {
            if seen.insert(word.id) {
                picked.push(word);
            }
        }
    }

    if picked.len() < limit {
        // Oversample so that re-drawn words cannot leave the backfill short
        let backfill = store.fetch_random_sample(list_id, exclude_word_id, None, limit + picked.len())?;
        for word in backfill {
            if picked.len() >= limit {
                break;
            }
            if seen.insert(word.id) {
                picked.push(word);
            }
        }
    }

    picked.truncate(limit);
    Ok(picked)
}

/// Distinct word ids introduced in a zone, in queue order
pub fn zone_word_ids<S: WordStore + ?Sized>(
    store: &S,
    list_id: i64,
    curriculum: &Curriculum,
    zone_index: i64,
    words_per_day: usize,
) -> EngineResult<Vec<i64>> {
    let zone = curriculum.clamp_zone_index(zone_index);
    let per_zone = curriculum.days_per_zone() * words_per_day;
    let start = (zone * per_zone) as i64;

    let mut seen = HashSet::new();
    Ok(build_new_word_queue(store, list_id, per_zone, start)?
        .into_iter()
        .map(|w| w.id)
        .filter(|id| seen.insert(*id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::seeded_store;
    use crate::storage::{Outcome, OutcomeRecord, Store};
    use chrono::{Duration, TimeZone, Utc};

    fn lemmas(words: &[Word]) -> Vec<String> {
        words.iter().map(|w| w.lemma.clone()).collect()
    }

    fn positions(words: &[Word]) -> Vec<usize> {
        words
            .iter()
            .map(|w| w.lemma.trim_start_matches('w').parse().unwrap())
            .collect()
    }

    fn log(store: &Store, list_id: i64, word_id: i64, outcome: Outcome, minute: i64) {
        store
            .append_outcome_record(&OutcomeRecord {
                id: 0,
                learner_id: "learner".to_string(),
                word_id,
                list_id: Some(list_id),
                outcome,
                duration_ms: 0,
                reviewed_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
                device_id: "device".to_string(),
            })
            .unwrap();
    }

    #[test]
    fn test_wrap_offset_handles_negative_start() {
        assert_eq!(wrap_offset(-1, 20), 19);
        assert_eq!(wrap_offset(-21, 20), 19);
        assert_eq!(wrap_offset(45, 20), 5);
        assert_eq!(wrap_offset(7, 0), 0);
    }

    #[test]
    fn test_wraparound_repeats_from_the_start() {
        let (store, list_id) = seeded_store(5);
        let queue = build_new_word_queue(&store, list_id, 7, 3).unwrap();
        assert_eq!(positions(&queue), vec![3, 4, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_queue_within_list_size_has_no_gaps() {
        let (store, list_id) = seeded_store(20);
        for start in [-45, -1, 0, 7, 19, 20, 33] {
            let queue = build_new_word_queue(&store, list_id, 20, start).unwrap();
            assert_eq!(queue.len(), 20);

            let offset = wrap_offset(start, 20);
            let expected: Vec<usize> = (0..20).map(|i| (offset + i) % 20).collect();
            assert_eq!(positions(&queue), expected, "start {}", start);

            let distinct: HashSet<i64> = queue.iter().map(|w| w.id).collect();
            assert_eq!(distinct.len(), 20);
        }
    }

    #[test]
    fn test_queue_is_deterministic() {
        let (store, list_id) = seeded_store(12);
        let a = build_new_word_queue(&store, list_id, 8, -3).unwrap();
        let b = build_new_word_queue(&store, list_id, 8, -3).unwrap();
        assert_eq!(lemmas(&a), lemmas(&b));
        assert_eq!(positions(&a)[0], 9);
    }

    #[test]
    fn test_empty_list_or_zero_limit() {
        let store = Store::in_memory().unwrap();
        assert!(build_new_word_queue(&store, 1, 10, 0).unwrap().is_empty());

        let (store, list_id) = seeded_store(3);
        assert!(build_new_word_queue(&store, list_id, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_review_queue_restriction() {
        let (store, list_id) = seeded_store(4);
        let ids: Vec<i64> = store.fetch_ordered_words(list_id, 4, 0).unwrap().iter().map(|w| w.id).collect();
        log(&store, list_id, ids[0], Outcome::Incorrect, 1);
        log(&store, list_id, ids[2], Outcome::Incorrect, 2);

        assert!(build_review_queue(&store, "learner", list_id, 10, Some(&[])).unwrap().is_empty());

        let all = build_review_queue(&store, "learner", list_id, 10, None).unwrap();
        assert_eq!(all.iter().map(|w| w.id).collect::<Vec<_>>(), vec![ids[2], ids[0]]);

        let zone = build_review_queue(&store, "learner", list_id, 10, Some(&ids[..2])).unwrap();
        assert_eq!(zone.iter().map(|w| w.id).collect::<Vec<_>>(), vec![ids[0]]);
    }

    #[test]
    fn test_weak_word_queue_returns_words() {
        let (store, list_id) = seeded_store(3);
        let ids: Vec<i64> = store.fetch_ordered_words(list_id, 3, 0).unwrap().iter().map(|w| w.id).collect();
        for minute in 0..3 {
            log(&store, list_id, ids[2], Outcome::Incorrect, minute);
        }

        let weak = build_weak_word_queue(&store, "learner", list_id, &AnalysisConfig::default(), 5).unwrap();
        assert_eq!(lemmas(&weak), vec!["w2"]);
    }

    #[test]
    fn test_distractors_prefer_same_part_of_speech() {
        let (store, list_id) = seeded_store(10);
        let target = store.fetch_ordered_words(list_id, 1, 0).unwrap().remove(0);

        let picked = fetch_distractors(&store, list_id, Some("noun"), target.id, 3).unwrap();
        assert_eq!(picked.len(), 3);
        assert!(picked.iter().all(|w| w.pos.as_deref() == Some("noun") && w.id != target.id));
    }

    #[test]
    fn test_distractors_backfill_without_duplicates() {
        let (store, list_id) = seeded_store(6);
        let target = store.fetch_ordered_words(list_id, 1, 0).unwrap().remove(0);

        // Only two other nouns exist, so three words come from the backfill
        for _ in 0..20 {
            let picked = fetch_distractors(&store, list_id, Some("noun"), target.id, 5).unwrap();
            assert_eq!(picked.len(), 5);
            let distinct: HashSet<i64> = picked.iter().map(|w| w.id).collect();
            assert_eq!(distinct.len(), 5);
            assert!(!distinct.contains(&target.id));
        }

        let small = fetch_distractors(&store, list_id, Some("adverb"), target.id, 10).unwrap();
        assert_eq!(small.len(), 5);
    }

    #[test]
    fn test_zone_word_ids() {
        let (store, list_id) = seeded_store(10);
        let curriculum = Curriculum::new(6, 2);

        // Two words a day, two days a zone: zone 1 starts at position 4
        let ids = zone_word_ids(&store, list_id, &curriculum, 1, 2).unwrap();
        let words: Vec<Word> = ids.iter().map(|id| store.fetch_word_by_id(*id).unwrap().unwrap()).collect();
        assert_eq!(positions(&words), vec![4, 5, 6, 7]);

        // Zone 2 wraps past the end of the list
        let ids = zone_word_ids(&store, list_id, &curriculum, 2, 3).unwrap();
        let words: Vec<Word> = ids.iter().map(|id| store.fetch_word_by_id(*id).unwrap().unwrap()).collect();
        assert_eq!(positions(&words), vec![2, 3, 4, 5, 6, 7]);
    }
}
