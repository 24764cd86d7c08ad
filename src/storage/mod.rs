//! Storage module
//!
//! Learner data lives in a single SQLite file. All access goes through one
//! `Store` handle that owns the connection behind a mutex, so there is at
//! most one writer at a time and readers never observe a half-applied update.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

pub mod contexts;
pub mod kv;
pub mod outcomes;
pub mod progress;
pub mod questions;
pub mod words;

pub use outcomes::{Outcome, OutcomeRecord};
pub use progress::{ProgressDelta, ProgressSnapshot};
pub use questions::Question;
pub use words::{ListBundle, ListInfo, Word};

/// Database file name inside the data directory
pub const DB_FILE: &str = "vocab.sqlite";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT
);

CREATE TABLE IF NOT EXISTS lists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL,
    description TEXT,
    version INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS words (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lemma TEXT NOT NULL,
    pos TEXT,
    definition TEXT,
    example TEXT,
    image_filename TEXT
);

CREATE TABLE IF NOT EXISTS word_list (
    list_id INTEGER NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
    word_id INTEGER NOT NULL REFERENCES words(id) ON DELETE CASCADE,
    rank INTEGER,
    PRIMARY KEY (list_id, word_id)
);

-- Append-only; current need-review status is derived from the latest row
CREATE TABLE IF NOT EXISTS review_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    word_id INTEGER NOT NULL,
    list_id INTEGER,
    outcome TEXT NOT NULL CHECK (outcome IN ('correct', 'incorrect', 'skip')),
    duration_ms INTEGER NOT NULL DEFAULT 0,
    reviewed_at TEXT NOT NULL,
    device_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS session (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    list_id INTEGER,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    items_total INTEGER NOT NULL,
    items_correct INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS progress_snapshot (
    user_id TEXT NOT NULL,
    list_id INTEGER NOT NULL,
    mastered_count INTEGER NOT NULL DEFAULT 0,
    total_seen INTEGER NOT NULL DEFAULT 0,
    streak_days INTEGER NOT NULL DEFAULT 0,
    last_reviewed_at TEXT,
    version INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (user_id, list_id)
);

CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY,
    word_id INTEGER NOT NULL REFERENCES words(id) ON DELETE CASCADE,
    passage TEXT,
    question TEXT,
    option_a TEXT,
    option_b TEXT,
    option_c TEXT,
    option_d TEXT,
    answer TEXT,
    answer_verified INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sat_contexts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    word_id INTEGER NOT NULL REFERENCES words(id) ON DELETE CASCADE,
    context TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS collocations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    word_id INTEGER NOT NULL REFERENCES words(id) ON DELETE CASCADE,
    phrase TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_word_list_order ON word_list(list_id, rank, word_id);
CREATE INDEX IF NOT EXISTS idx_review_log_user_word ON review_log(user_id, word_id, reviewed_at);
CREATE INDEX IF NOT EXISTS idx_questions_word ON questions(word_id);
CREATE INDEX IF NOT EXISTS idx_sat_contexts_word ON sat_contexts(word_id);
CREATE INDEX IF NOT EXISTS idx_collocations_word ON collocations(word_id, id);
"#;

/// The narrow set of persistence operations the engine consumes.
///
/// Queue building, analysis, and progression are written against this trait;
/// `Store` is the SQLite implementation.
pub trait WordStore {
    fn get_default_list(&self, preferred_name: &str) -> EngineResult<ListInfo>;
    fn count_words_in_list(&self, list_id: i64) -> EngineResult<usize>;
    /// Ordered by (rank asc, word id asc); a missing rank sorts last
    fn fetch_ordered_words(&self, list_id: i64, limit: usize, offset: usize) -> EngineResult<Vec<Word>>;
    fn fetch_word_by_id(&self, word_id: i64) -> EngineResult<Option<Word>>;
    fn fetch_outcome_records_for_words_in_list(
        &self,
        learner_id: &str,
        list_id: i64,
        word_ids: Option<&[i64]>,
    ) -> EngineResult<Vec<OutcomeRecord>>;
    /// Words whose latest outcome is incorrect, most recently missed first
    fn fetch_needs_review(
        &self,
        learner_id: &str,
        list_id: i64,
        word_ids: Option<&[i64]>,
        limit: usize,
    ) -> EngineResult<Vec<Word>>;
    fn append_outcome_record(&self, record: &OutcomeRecord) -> EngineResult<i64>;
    fn create_session_record(
        &self,
        learner_id: &str,
        list_id: Option<i64>,
        items_total: usize,
        started_at: DateTime<Utc>,
    ) -> EngineResult<i64>;
    fn finalize_session_record(&self, session_id: i64, items_correct: usize, ended_at: DateTime<Utc>) -> EngineResult<()>;
    fn ensure_progress_snapshot(&self, learner_id: &str, list_id: i64) -> EngineResult<()>;
    fn get_progress_snapshot(&self, learner_id: &str, list_id: i64) -> EngineResult<Option<ProgressSnapshot>>;
    /// Atomic ensure + read + write of one snapshot row
    fn apply_progress_delta(
        &self,
        learner_id: &str,
        list_id: i64,
        delta: &dyn Fn(&ProgressSnapshot) -> ProgressDelta,
    ) -> EngineResult<ProgressSnapshot>;
    fn fetch_random_sample(
        &self,
        list_id: i64,
        exclude_word_id: i64,
        pos: Option<&str>,
        limit: usize,
    ) -> EngineResult<Vec<Word>>;
    fn fetch_questions_for_word(&self, word_id: i64, limit: usize, verified_only: bool) -> EngineResult<Vec<Question>>;
    fn fetch_sat_context(&self, word_id: i64) -> EngineResult<Option<String>>;
    fn fetch_collocations(&self, word_id: i64, limit: usize) -> EngineResult<Vec<String>>;
}

/// Shared handle to the learner-data store
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

impl Store {
    /// Open (creating if needed) the store at the given path and apply the schema
    pub fn open(db_path: &Path) -> EngineResult<Self> {
        let conn = Connection::open(db_path).map_err(|e| {
            EngineError::Initialization(format!("cannot open {:?}: {}", db_path, e))
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )
        .map_err(|e| EngineError::Initialization(e.to_string()))?;

        Self::from_connection(conn, db_path.to_string_lossy().to_string())
    }

    /// In-memory store, used by tests
    #[cfg(test)]
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EngineError::Initialization(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| EngineError::Initialization(e.to_string()))?;
        Self::from_connection(conn, ":memory:".to_string())
    }

    fn from_connection(conn: Connection, db_path: String) -> EngineResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| EngineError::Initialization(format!("schema setup failed: {}", e)))?;
        debug!("Schema ready at {}", db_path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| EngineError::Lock(e.to_string()))
    }

    /// Run a closure against the connection while holding the store lock
    pub fn with_conn<F, T>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Connection) -> EngineResult<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run a closure inside an IMMEDIATE transaction; commits on `Ok`
    pub fn transaction<F, T>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Connection) -> EngineResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Insert the learner row if missing
    pub fn ensure_user_exists(&self, learner_id: &str) -> EngineResult<()> {
        self.with_conn(|conn| {
            conn.execute("INSERT OR IGNORE INTO users(id, email) VALUES (?1, NULL)", [learner_id])?;
            Ok(())
        })
    }
}

impl WordStore for Store {
    fn get_default_list(&self, preferred_name: &str) -> EngineResult<ListInfo> {
        Store::get_default_list(self, preferred_name)
    }

    fn count_words_in_list(&self, list_id: i64) -> EngineResult<usize> {
        Store::count_words_in_list(self, list_id)
    }

    fn fetch_ordered_words(&self, list_id: i64, limit: usize, offset: usize) -> EngineResult<Vec<Word>> {
        Store::fetch_ordered_words(self, list_id, limit, offset)
    }

    fn fetch_word_by_id(&self, word_id: i64) -> EngineResult<Option<Word>> {
        Store::fetch_word_by_id(self, word_id)
    }

    fn fetch_outcome_records_for_words_in_list(
        &self,
        learner_id: &str,
        list_id: i64,
        word_ids: Option<&[i64]>,
    ) -> EngineResult<Vec<OutcomeRecord>> {
        Store::fetch_outcome_records_for_words_in_list(self, learner_id, list_id, word_ids)
    }

    fn fetch_needs_review(
        &self,
        learner_id: &str,
        list_id: i64,
        word_ids: Option<&[i64]>,
        limit: usize,
    ) -> EngineResult<Vec<Word>> {
        Store::fetch_needs_review(self, learner_id, list_id, word_ids, limit)
    }

    fn append_outcome_record(&self, record: &OutcomeRecord) -> EngineResult<i64> {
        Store::append_outcome_record(self, record)
    }

    fn create_session_record(
        &self,
        learner_id: &str,
        list_id: Option<i64>,
        items_total: usize,
        started_at: DateTime<Utc>,
    ) -> EngineResult<i64> {
        Store::create_session_record(self, learner_id, list_id, items_total, started_at)
    }

    fn finalize_session_record(&self, session_id: i64, items_correct: usize, ended_at: DateTime<Utc>) -> EngineResult<()> {
        Store::finalize_session_record(self, session_id, items_correct, ended_at)
    }

    fn ensure_progress_snapshot(&self, learner_id: &str, list_id: i64) -> EngineResult<()> {
        Store::ensure_progress_snapshot(self, learner_id, list_id)
    }

    fn get_progress_snapshot(&self, learner_id: &str, list_id: i64) -> EngineResult<Option<ProgressSnapshot>> {
        Store::get_progress_snapshot(self, learner_id, list_id)
    }

    fn apply_progress_delta(
        &self,
        learner_id: &str,
        list_id: i64,
        delta: &dyn Fn(&ProgressSnapshot) -> ProgressDelta,
    ) -> EngineResult<ProgressSnapshot> {
        Store::apply_progress_delta(self, learner_id, list_id, delta)
    }

    fn fetch_random_sample(
        &self,
        list_id: i64,
        exclude_word_id: i64,
        pos: Option<&str>,
        limit: usize,
    ) -> EngineResult<Vec<Word>> {
        Store::fetch_random_sample(self, list_id, exclude_word_id, pos, limit)
    }

    fn fetch_questions_for_word(&self, word_id: i64, limit: usize, verified_only: bool) -> EngineResult<Vec<Question>> {
        Store::fetch_questions_for_word(self, word_id, limit, verified_only)
    }

    fn fetch_sat_context(&self, word_id: i64) -> EngineResult<Option<String>> {
        Store::fetch_sat_context(self, word_id)
    }

    fn fetch_collocations(&self, word_id: i64, limit: usize) -> EngineResult<Vec<String>> {
        Store::fetch_collocations(self, word_id, limit)
    }
}

/// Fixed-width RFC 3339 (UTC, millis) so text order equals time order
pub fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Resolve the data directory: `$VOCAB_DIR`, then `./.vocab`, then `~/.vocab`
pub fn get_vocab_dir() -> EngineResult<PathBuf> {
    if let Ok(dir) = std::env::var("VOCAB_DIR") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let cwd = std::env::current_dir()
        .map_err(|e| EngineError::Initialization(e.to_string()))?;
    let project_dir = cwd.join(".vocab");
    if project_dir.exists() {
        return Ok(project_dir);
    }

    let home = dirs::home_dir()
        .ok_or_else(|| EngineError::Initialization("could not find home directory".to_string()))?;
    Ok(home.join(".vocab"))
}

/// Create the data directory and open its store
pub fn open_in_dir(dir: &Path) -> EngineResult<Store> {
    std::fs::create_dir_all(dir)
        .map_err(|e| EngineError::Initialization(format!("cannot create {:?}: {}", dir, e)))?;
    let store = Store::open(&dir.join(DB_FILE))?;
    info!("Store opened at {:?}", dir);
    Ok(store)
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_in_memory_store() {
        let store = Store::in_memory().expect("store");
        assert_eq!(store.db_path(), ":memory:");
        let one: i64 = store
            .with_conn(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(one, 1);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE);
        Store::open(&path).expect("first open");
        Store::open(&path).expect("second open reapplies schema");
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let store = Store::in_memory().unwrap();
        let result: EngineResult<()> = store.transaction(|conn| {
            conn.execute("INSERT INTO users(id) VALUES ('u1')", [])?;
            Err(EngineError::InvalidArgument("abort".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = store
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_ensure_user_is_idempotent() {
        let store = Store::in_memory().unwrap();
        store.ensure_user_exists("learner").unwrap();
        store.ensure_user_exists("learner").unwrap();
        let count: i64 = store
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_instant_format_sorts_chronologically() {
        let a = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        assert!(format_instant(a) < format_instant(b));
        assert_eq!(parse_instant(&format_instant(a)), Some(a));
    }

    #[test]
    fn test_open_in_dir_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data");
        open_in_dir(&nested).unwrap();
        assert!(nested.join(DB_FILE).exists());
    }
}
