//! Session lifecycle
//!
//! `Engine` owns the store handle and everything derived from configuration
//! at startup. A session is started, answered item by item, and finished;
//! finishing writes the audit record, folds the result into progress, marks
//! the day task and, for a zone review, unlocks the next zone. A session that
//! is dropped unfinished leaves its audit record open.

use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

use super::logger::{OutcomeLogger, OutcomeSink};
use super::mastery::MasteryTracker;
use super::rounds::{self, ClozeRound, McqOptions, McqRound};
use super::{build_new_word_queue, build_review_queue, zone_word_ids};
use crate::adventure::{AdventureProgress, DayTask};
use crate::config::Config;
use crate::curriculum::Curriculum;
use crate::error::{EngineError, EngineResult};
use crate::identity::{Identity, LearnerClock};
use crate::progress;
use crate::storage::contexts::COLLOCATION_LIMIT;
use crate::storage::{ListInfo, Outcome, ProgressSnapshot, Store, Word, WordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// First exposure to a day's words; misses repeat until mastered
    NewWords { day: Option<i64> },
    Review { day: Option<i64> },
    ZoneReview { zone: i64 },
    Cloze { day: Option<i64> },
    Mcq { day: Option<i64> },
}

impl SessionKind {
    pub fn name(&self) -> &'static str {
        match self {
            SessionKind::NewWords { .. } => "new words",
            SessionKind::Review { .. } => "review",
            SessionKind::ZoneReview { .. } => "zone review",
            SessionKind::Cloze { .. } => "fill in the blank",
            SessionKind::Mcq { .. } => "multiple choice",
        }
    }

    pub fn day_task(&self) -> Option<DayTask> {
        match self {
            SessionKind::NewWords { .. } => Some(DayTask::NewWords),
            SessionKind::Review { .. } => Some(DayTask::Review),
            SessionKind::Cloze { .. } => Some(DayTask::Cloze),
            SessionKind::Mcq { .. } => Some(DayTask::MultipleChoice),
            SessionKind::ZoneReview { .. } => None,
        }
    }

    fn repeat_until_mastered(&self) -> bool {
        matches!(self, SessionKind::NewWords { .. })
    }

    fn day(&self) -> Option<i64> {
        match *self {
            SessionKind::NewWords { day }
            | SessionKind::Review { day }
            | SessionKind::Cloze { day }
            | SessionKind::Mcq { day } => day,
            SessionKind::ZoneReview { .. } => None,
        }
    }
}

/// A flashcard with its context sentence and collocations
#[derive(Debug, Clone, Serialize)]
pub struct Card {
    #[serde(flatten)]
    pub word: Word,
    pub sat_context: Option<String>,
    pub collocations: Vec<String>,
}

impl Card {
    pub fn load<S: WordStore + ?Sized>(store: &S, word: Word) -> EngineResult<Self> {
        let sat_context = store
            .fetch_sat_context(word.id)?
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let collocations = store.fetch_collocations(word.id, COLLOCATION_LIMIT)?;
        Ok(Self {
            word,
            sat_context,
            collocations,
        })
    }

    /// Sentence for the front of the card: the example, else the context
    /// sentence with its blanks filled in
    pub fn front_sentence(&self) -> Option<String> {
        let example = self
            .word
            .example
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        match example {
            Some(example) => Some(example.to_string()),
            None => self
                .sat_context
                .as_deref()
                .map(|c| rounds::fill_blanks(c, &self.word.lemma)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionItem {
    Card(Card),
    Cloze(ClozeRound),
    Mcq(McqRound),
}

impl SessionItem {
    pub fn word(&self) -> &Word {
        match self {
            SessionItem::Card(card) => &card.word,
            SessionItem::Cloze(round) => &round.target,
            SessionItem::Mcq(round) => &round.target,
        }
    }

    /// Index of the right choice for choice rounds
    pub fn correct_choice(&self) -> Option<usize> {
        match self {
            SessionItem::Card(_) => None,
            SessionItem::Cloze(round) => round.correct_choice(),
            SessionItem::Mcq(round) => round.correct_choice(),
        }
    }

    pub fn choice_count(&self) -> usize {
        match self {
            SessionItem::Card(_) => 0,
            SessionItem::Cloze(round) => round.choices.len(),
            SessionItem::Mcq(round) => round.question.options.len(),
        }
    }
}

pub enum SessionStart {
    Started(Session),
    /// Nothing to study; carries a message for the learner
    NothingToDo(String),
}

pub struct Session {
    id: i64,
    kind: SessionKind,
    day_index: usize,
    items: Vec<SessionItem>,
    tracker: MasteryTracker,
    sink: OutcomeSink,
    shown_at: Instant,
}

impl Session {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn day_index(&self) -> usize {
        self.day_index
    }

    /// Items in the initial queue
    pub fn items_total(&self) -> usize {
        self.items.len()
    }

    pub fn current(&self) -> Option<&SessionItem> {
        self.tracker.current().and_then(|pos| self.items.get(pos))
    }

    pub fn is_finished(&self) -> bool {
        self.tracker.is_finished()
    }

    pub fn tracker(&self) -> &MasteryTracker {
        &self.tracker
    }

    /// Record the learner's answer to the current item and move on
    pub fn answer(&mut self, outcome: Outcome) -> EngineResult<()> {
        let word_id = self
            .current()
            .map(|item| item.word().id)
            .ok_or_else(|| EngineError::InvalidArgument(format!("session {} is already finished", self.id)))?;

        let duration_ms = self.shown_at.elapsed().as_millis() as i64;
        self.sink.submit(word_id, outcome, duration_ms);
        self.tracker.record(outcome);
        self.shown_at = Instant::now();
        Ok(())
    }

    /// Answer a choice round by option index
    pub fn choose(&mut self, choice: usize) -> EngineResult<Outcome> {
        let item = self
            .current()
            .ok_or_else(|| EngineError::InvalidArgument(format!("session {} is already finished", self.id)))?;
        if choice >= item.choice_count() {
            return Err(EngineError::InvalidArgument(format!(
                "choice {} out of range for this item",
                choice + 1
            )));
        }

        let outcome = if item.correct_choice() == Some(choice) {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        };
        self.answer(outcome)?;
        Ok(outcome)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: i64,
    pub kind: &'static str,
    pub items_total: usize,
    pub items_correct: usize,
    pub mastered: usize,
    pub unique_total: usize,
    pub snapshot: ProgressSnapshot,
    pub xp: i64,
    pub task_completed: Option<usize>,
    pub unlocked_zone: Option<usize>,
}

pub struct Engine {
    store: Store,
    config: Config,
    clock: LearnerClock,
    identity: Identity,
    curriculum: Curriculum,
    adventure: AdventureProgress,
    list: ListInfo,
    logger: OutcomeLogger,
}

impl Engine {
    /// Load identity and the default list, and start the outcome writer.
    ///
    /// Must be called inside a tokio runtime.
    pub fn open(store: Store, config: Config) -> EngineResult<Self> {
        let clock = LearnerClock::from_config(&config.clock)?;
        let identity = Identity::load(&store, &clock)?;
        let curriculum = Curriculum::from(&config.curriculum);
        let list = store.get_default_list(&config.content.default_list_name)?;
        let adventure = AdventureProgress::new(store.clone(), curriculum, config.curriculum.unlock_all_zones);
        let logger = OutcomeLogger::spawn(store.clone());

        info!("Engine ready for list '{}' (id {})", list.name, list.id);
        Ok(Self {
            store,
            config,
            clock,
            identity,
            curriculum,
            adventure,
            list,
            logger,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    pub fn adventure(&self) -> &AdventureProgress {
        &self.adventure
    }

    pub fn list(&self) -> &ListInfo {
        &self.list
    }

    pub fn today_day_index(&self) -> usize {
        self.identity.day_index_for(&self.curriculum, self.clock.today())
    }

    /// Curriculum day for an explicit index, or today's
    pub fn resolve_day(&self, day: Option<i64>) -> usize {
        match day {
            Some(day) => self.curriculum.clamp_day_index(day),
            None => self.today_day_index(),
        }
    }

    /// Queue start for a day's new words: the clamped day's fixed block
    pub fn day_start_index(&self, day: Option<i64>) -> i64 {
        let per_day = self.config.session.new_words_per_day;
        match day {
            Some(day) => (self.curriculum.clamp_day_index(day) * per_day) as i64,
            None => self
                .identity
                .daily_start_index(&self.curriculum, per_day, self.clock.today()) as i64,
        }
    }

    pub fn day_queue(&self, day: Option<i64>) -> EngineResult<Vec<Word>> {
        build_new_word_queue(
            &self.store,
            self.list.id,
            self.config.session.new_words_per_day,
            self.day_start_index(day),
        )
    }

    pub fn progress_snapshot(&self) -> EngineResult<Option<ProgressSnapshot>> {
        self.store.get_progress_snapshot(&self.identity.learner_id, self.list.id)
    }

    pub fn xp(&self) -> EngineResult<i64> {
        Ok(progress::xp(
            self.progress_snapshot()?.as_ref(),
            self.config.session.xp_per_correct,
        ))
    }

    fn cards(&self, words: Vec<Word>) -> EngineResult<Vec<SessionItem>> {
        words
            .into_iter()
            .map(|word| Ok(SessionItem::Card(Card::load(&self.store, word)?)))
            .collect()
    }

    fn session_items(&self, kind: SessionKind) -> EngineResult<Result<Vec<SessionItem>, String>> {
        let session = &self.config.session;
        let learner = &self.identity.learner_id;
        let list_id = self.list.id;

        let items = match kind {
            SessionKind::NewWords { day } => {
                let queue = self.day_queue(day)?;
                if queue.is_empty() {
                    return Ok(Err("The word list is empty.".to_string()));
                }
                self.cards(queue)?
            }
            SessionKind::Review { .. } => {
                let queue = build_review_queue(&self.store, learner, list_id, session.review_batch, None)?;
                if queue.is_empty() {
                    return Ok(Err("No words need review right now.".to_string()));
                }
                self.cards(queue)?
            }
            SessionKind::ZoneReview { zone } => {
                let zone = self.curriculum.clamp_zone_index(zone);
                let title = self.curriculum.zone_title(zone as i64);
                if !self.adventure.is_zone_unlocked(zone as i64)? {
                    return Ok(Err(format!("{} is still locked.", title)));
                }

                let ids = zone_word_ids(
                    &self.store,
                    list_id,
                    &self.curriculum,
                    zone as i64,
                    session.new_words_per_day,
                )?;
                if ids.is_empty() {
                    return Ok(Err(format!("{} has no words.", title)));
                }

                let queue = build_review_queue(&self.store, learner, list_id, session.zone_review_limit, Some(&ids))?;
                if queue.is_empty() {
                    // Nothing missed counts as a passed review
                    return Ok(Err(match self.unlock_next_zone(zone)? {
                        Some(next) => format!(
                            "No missed words in {}. {} unlocked.",
                            title,
                            self.curriculum.zone_title(next as i64)
                        ),
                        None => format!("No missed words in {}.", title),
                    }));
                }
                self.cards(queue)?
            }
            SessionKind::Cloze { day } => {
                let day_queue = self.day_queue(day)?;
                let built = rounds::build_cloze_rounds(
                    &self.store,
                    list_id,
                    &day_queue,
                    session.cloze_rounds,
                    session.distractor_count,
                )?;
                if built.is_empty() {
                    return Ok(Err("No rounds available.".to_string()));
                }
                built.into_iter().map(SessionItem::Cloze).collect()
            }
            SessionKind::Mcq { day } => {
                let day_queue = self.day_queue(day)?;
                let built = rounds::build_mcq_rounds(
                    &self.store,
                    &day_queue,
                    &McqOptions {
                        rounds: session.mcq_rounds,
                        fetch_per_word: session.mcq_fetch_per_word,
                        verified_only: session.questions_verified_only,
                        policy: self.config.matching.answer_policy,
                    },
                )?;
                if built.is_empty() {
                    return Ok(Err("No questions available for this day's words.".to_string()));
                }
                built.into_iter().map(SessionItem::Mcq).collect()
            }
        };
        Ok(Ok(items))
    }

    /// Build the queue for a session and open its audit record.
    ///
    /// Store and query failures are errors; an empty queue is
    /// `SessionStart::NothingToDo`.
    pub fn start_session(&self, kind: SessionKind) -> EngineResult<SessionStart> {
        let items = match self.session_items(kind)? {
            Ok(items) => items,
            Err(message) => {
                debug!("Nothing to do for {} session: {}", kind.name(), message);
                return Ok(SessionStart::NothingToDo(message));
            }
        };

        let learner = &self.identity.learner_id;
        self.store.ensure_progress_snapshot(learner, self.list.id)?;

        let started_at = self.clock.now();
        let id = self
            .store
            .create_session_record(learner, Some(self.list.id), items.len(), started_at)?;

        let day_index = match kind {
            SessionKind::ZoneReview { zone } => self.curriculum.zone_day_range(zone).start,
            _ => self.resolve_day(kind.day()),
        };
        let word_ids = items.iter().map(|item| item.word().id).collect();

        info!("Started {} session {} with {} items", kind.name(), id, items.len());
        Ok(SessionStart::Started(Session {
            id,
            kind,
            day_index,
            items,
            tracker: MasteryTracker::new(word_ids, kind.repeat_until_mastered()),
            sink: self.logger.sink(learner, &self.identity.device_id, Some(self.list.id)),
            shown_at: Instant::now(),
        }))
    }

    fn unlock_next_zone(&self, zone: usize) -> EngineResult<Option<usize>> {
        let next = zone + 1;
        if next >= self.curriculum.total_zones() {
            return Ok(None);
        }
        self.adventure.unlock_zone(next as i64)?;
        Ok(Some(next))
    }

    /// Close a completed session and apply its results.
    ///
    /// The audit record is closed last, so a failure while applying progress
    /// or day tasks leaves it open like an abandoned session.
    pub fn finish_session(&self, session: Session) -> EngineResult<SessionSummary> {
        if !session.is_finished() {
            return Err(EngineError::InvalidArgument(format!(
                "session {} still has items left",
                session.id
            )));
        }

        let tracker = &session.tracker;
        let ended_at = self.clock.now();

        let snapshot = progress::record_session_completion(
            &self.store,
            &self.clock,
            &self.identity.learner_id,
            self.list.id,
            tracker.processed(),
            tracker.correct(),
            ended_at,
        )?;

        let task_completed = match session.kind.day_task() {
            Some(task) => {
                self.adventure
                    .mark_day_task_completed(session.day_index as i64, task.index())?;
                Some(task.index())
            }
            None => None,
        };

        let unlocked_zone = match session.kind {
            SessionKind::ZoneReview { zone } => self.unlock_next_zone(self.curriculum.clamp_zone_index(zone))?,
            _ => None,
        };

        self.store
            .finalize_session_record(session.id, tracker.correct(), ended_at)?;

        info!(
            "Finished {} session {}: {}/{} correct",
            session.kind.name(),
            session.id,
            tracker.correct(),
            tracker.processed()
        );

        Ok(SessionSummary {
            session_id: session.id,
            kind: session.kind.name(),
            items_total: tracker.processed(),
            items_correct: tracker.correct(),
            mastered: tracker.mastered_count(),
            unique_total: tracker.unique_total(),
            xp: progress::xp(Some(&snapshot), self.config.session.xp_per_correct),
            snapshot,
            task_completed,
            unlocked_zone,
        })
    }

    /// Wait for queued outcomes to be written
    pub async fn flush_outcomes(&self) {
        self.logger.flush().await;
    }

    pub async fn close(self) {
        self.logger.shutdown().await;
    }
}
