//! Outcome log and session audit records
//!
//! `review_log` is append-only. Whether a word needs review is derived at
//! read time from the latest row per word, never stored.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::words::{word_from_row, Word, WORD_COLUMNS};
use super::{format_instant, parse_instant, Store};
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
    Skip,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Correct => "correct",
            Outcome::Incorrect => "incorrect",
            Outcome::Skip => "skip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "correct" => Some(Outcome::Correct),
            "incorrect" => Some(Outcome::Incorrect),
            "skip" => Some(Outcome::Skip),
            _ => None,
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, Outcome::Correct)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Zero until persisted
    pub id: i64,
    pub learner_id: String,
    pub word_id: i64,
    pub list_id: Option<i64>,
    pub outcome: Outcome,
    pub duration_ms: i64,
    pub reviewed_at: DateTime<Utc>,
    pub device_id: String,
}

/// `AND <column> IN (?, ?, ...)` plus its bind values; empty when unrestricted
fn word_filter(column: &str, word_ids: Option<&[i64]>) -> (String, Vec<Value>) {
    match word_ids {
        Some(ids) => {
            let placeholders = vec!["?"; ids.len()].join(",");
            (
                format!("AND {} IN ({})", column, placeholders),
                ids.iter().map(|id| Value::Integer(*id)).collect(),
            )
        }
        None => (String::new(), Vec::new()),
    }
}

impl Store {
    pub fn append_outcome_record(&self, record: &OutcomeRecord) -> EngineResult<i64> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO review_log(user_id, word_id, list_id, outcome, duration_ms, reviewed_at, device_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    record.learner_id,
                    record.word_id,
                    record.list_id,
                    record.outcome.as_str(),
                    record.duration_ms,
                    format_instant(record.reviewed_at),
                    record.device_id,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// All outcome records for the learner on words that belong to the list
    pub fn fetch_outcome_records_for_words_in_list(
        &self,
        learner_id: &str,
        list_id: i64,
        word_ids: Option<&[i64]>,
    ) -> EngineResult<Vec<OutcomeRecord>> {
        if matches!(word_ids, Some(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }

        let (filter, filter_values) = word_filter("rl.word_id", word_ids);
        let sql = format!(
            r#"
            SELECT rl.id, rl.user_id, rl.word_id, rl.list_id, rl.outcome, rl.duration_ms, rl.reviewed_at, rl.device_id
            FROM review_log rl
            JOIN word_list wl ON wl.word_id = rl.word_id AND wl.list_id = ?
            WHERE rl.user_id = ?
              {filter}
            ORDER BY rl.reviewed_at, rl.id
            "#
        );

        let mut values = vec![Value::Integer(list_id), Value::Text(learner_id.to_string())];
        values.extend(filter_values);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (id, learner_id, word_id, list_id, outcome, duration_ms, reviewed_at, device_id) = row?;
                let outcome = Outcome::parse(&outcome).ok_or_else(|| {
                    EngineError::InvalidArgument(format!("unknown outcome '{}' in record {}", outcome, id))
                })?;
                let reviewed_at = parse_instant(&reviewed_at).ok_or_else(|| {
                    EngineError::InvalidArgument(format!("bad timestamp '{}' in record {}", reviewed_at, id))
                })?;
                records.push(OutcomeRecord {
                    id,
                    learner_id,
                    word_id,
                    list_id,
                    outcome,
                    duration_ms,
                    reviewed_at,
                    device_id,
                });
            }
            Ok(records)
        })
    }

    /// Words whose most recent outcome is `incorrect`, newest miss first.
    ///
    /// Latest-per-word uses a window partition; equal timestamps fall back to
    /// the higher record id.
    pub fn fetch_needs_review(
        &self,
        learner_id: &str,
        list_id: i64,
        word_ids: Option<&[i64]>,
        limit: usize,
    ) -> EngineResult<Vec<Word>> {
        if matches!(word_ids, Some(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }

        let (filter, filter_values) = word_filter("l.word_id", word_ids);
        let sql = format!(
            r#"
            WITH latest AS (
                SELECT rl.id,
                       rl.word_id,
                       rl.outcome,
                       rl.reviewed_at,
                       ROW_NUMBER() OVER (
                           PARTITION BY rl.word_id
                           ORDER BY rl.reviewed_at DESC, rl.id DESC
                       ) AS rn
                FROM review_log rl
                JOIN word_list wl ON wl.word_id = rl.word_id AND wl.list_id = ?
                WHERE rl.user_id = ?
            )
            SELECT {WORD_COLUMNS}
            FROM latest l
            JOIN words w ON w.id = l.word_id
            WHERE l.rn = 1
              AND l.outcome = 'incorrect'
              {filter}
            ORDER BY l.reviewed_at DESC, l.id DESC
            LIMIT ?
            "#
        );

        let mut values = vec![Value::Integer(list_id), Value::Text(learner_id.to_string())];
        values.extend(filter_values);
        values.push(Value::Integer(limit as i64));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let words = stmt.query_map(params_from_iter(values.iter()), word_from_row)?;
            let words = words.collect::<Result<Vec<_>, _>>()?;
            debug!("{} words need review in list {}", words.len(), list_id);
            Ok(words)
        })
    }

    /// Opens a session audit row with no end time
    pub fn create_session_record(
        &self,
        learner_id: &str,
        list_id: Option<i64>,
        items_total: usize,
        started_at: DateTime<Utc>,
    ) -> EngineResult<i64> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO session(user_id, list_id, started_at, items_total, items_correct)
                VALUES (?1, ?2, ?3, ?4, 0)
                "#,
                params![learner_id, list_id, format_instant(started_at), items_total as i64],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Sets end time and score; a row that is already finalized is left alone
    pub fn finalize_session_record(&self, session_id: i64, items_correct: usize, ended_at: DateTime<Utc>) -> EngineResult<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                r#"
                UPDATE session
                SET ended_at = ?1, items_correct = ?2
                WHERE id = ?3 AND ended_at IS NULL
                "#,
                params![format_instant(ended_at), items_correct as i64, session_id],
            )?;
            if changed == 0 {
                debug!("Session {} already finalized or missing", session_id);
            }
            Ok(())
        })
    }
}
