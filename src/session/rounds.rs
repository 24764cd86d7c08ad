//! Choice rounds built from a day's words: fill-in-the-blank (cloze) and
//! reading-passage multiple choice.

use rand::seq::SliceRandom;
use rand::thread_rng;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use super::fetch_distractors;
use crate::config::AnswerPolicy;
use crate::error::EngineResult;
use crate::matching::answer_matches_target_word;
use crate::storage::{Question, Word, WordStore};

pub const BLANK: &str = "____";

/// "______ blank" placeholders, then bare underscore runs
static BLANK_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)_{2,}\s*blank|_{2,}").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct ClozeRound {
    pub target: Word,
    pub context: String,
    pub choices: Vec<Word>,
}

impl ClozeRound {
    /// Context sentence with the target word blanked out
    pub fn prompt(&self) -> String {
        cloze_sentence(&self.context, &self.target.lemma)
    }

    pub fn correct_choice(&self) -> Option<usize> {
        self.choices.iter().position(|w| w.id == self.target.id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct McqRound {
    pub target: Word,
    pub question: Question,
}

impl McqRound {
    pub fn correct_choice(&self) -> Option<usize> {
        self.question.correct_option()
    }
}

/// Distinct words in queue order
pub fn unique_words(queue: &[Word]) -> Vec<Word> {
    let mut seen = HashSet::new();
    queue.iter().filter(|w| seen.insert(w.id)).cloned().collect()
}

/// Round targets: the first `count` distinct words, shuffled
pub fn pick_targets(queue: &[Word], count: usize) -> Vec<Word> {
    let mut targets = unique_words(queue);
    targets.truncate(count);
    targets.shuffle(&mut thread_rng());
    targets
}

/// Write the lemma into "______ blank" style placeholders
pub fn fill_blanks(context: &str, lemma: &str) -> String {
    let lemma = lemma.trim();
    let context = context.trim();
    if lemma.is_empty() {
        return context.to_string();
    }
    BLANK_PLACEHOLDER
        .replace_all(context, regex::NoExpand(lemma))
        .into_owned()
}

/// Replace existing placeholders with the lemma, then blank every whole-word
/// occurrence of the lemma
pub fn cloze_sentence(context: &str, lemma: &str) -> String {
    let lemma = lemma.trim();
    let context = context.trim();
    if lemma.is_empty() || context.is_empty() {
        return context.to_string();
    }

    let filled = fill_blanks(context, lemma);
    let pattern = format!(r"(?i)\b{}\b", regex::escape(lemma));
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(&filled, BLANK).into_owned(),
        Err(_) => filled,
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Example sentence, else a stored context sentence, else a question
/// passage, else the definition, else the lemma
fn cloze_context<S: WordStore + ?Sized>(store: &S, target: &Word) -> EngineResult<String> {
    if let Some(example) = non_blank(target.example.as_deref()) {
        return Ok(example.to_string());
    }
    let context = store.fetch_sat_context(target.id)?;
    if let Some(context) = non_blank(context.as_deref()) {
        return Ok(context.to_string());
    }
    let passage = store
        .fetch_questions_for_word(target.id, 1, false)?
        .into_iter()
        .find_map(|q| non_blank(q.passage.as_deref()).map(str::to_string));
    if let Some(passage) = passage {
        return Ok(passage);
    }
    Ok(non_blank(target.definition.as_deref())
        .unwrap_or(&target.lemma)
        .to_string())
}

pub fn build_cloze_rounds<S: WordStore + ?Sized>(
    store: &S,
    list_id: i64,
    day_queue: &[Word],
    rounds: usize,
    distractor_count: usize,
) -> EngineResult<Vec<ClozeRound>> {
    let mut out = Vec::new();
    for target in pick_targets(day_queue, rounds) {
        let context = cloze_context(store, &target)?;
        let mut choices = fetch_distractors(store, list_id, target.pos.as_deref(), target.id, distractor_count)?;
        choices.push(target.clone());
        choices.shuffle(&mut thread_rng());
        out.push(ClozeRound {
            target,
            context,
            choices,
        });
    }
    debug!("Built {} cloze rounds", out.len());
    Ok(out)
}

/// Questions for one target, preferring those whose answer names the word
pub fn questions_for_target<S: WordStore + ?Sized>(
    store: &S,
    target: &Word,
    fetch_limit: usize,
    verified_only: bool,
    policy: AnswerPolicy,
) -> EngineResult<Vec<Question>> {
    let fetched = store.fetch_questions_for_word(target.id, fetch_limit, verified_only)?;
    let preferred: Vec<Question> = fetched
        .iter()
        .filter(|q| answer_matches_target_word(&q.answer, &target.lemma, policy))
        .cloned()
        .collect();
    if preferred.is_empty() {
        Ok(fetched)
    } else {
        Ok(preferred)
    }
}

pub struct McqOptions {
    pub rounds: usize,
    pub fetch_per_word: usize,
    pub verified_only: bool,
    pub policy: AnswerPolicy,
}

pub fn build_mcq_rounds<S: WordStore + ?Sized>(
    store: &S,
    day_queue: &[Word],
    options: &McqOptions,
) -> EngineResult<Vec<McqRound>> {
    let mut seen = HashSet::new();
    let mut pool = Vec::new();
    for target in pick_targets(day_queue, options.rounds) {
        let questions = questions_for_target(
            store,
            &target,
            options.fetch_per_word,
            options.verified_only,
            options.policy,
        )?;
        for question in questions {
            if seen.insert(question.id.clone()) {
                pool.push(McqRound {
                    target: target.clone(),
                    question,
                });
            }
        }
    }

    pool.shuffle(&mut thread_rng());
    pool.truncate(options.rounds);
    debug!("Built {} multiple-choice rounds", pool.len());
    Ok(pool)
}
