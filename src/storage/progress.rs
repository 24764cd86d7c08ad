//! Per-(learner, list) progress snapshot

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{format_instant, parse_instant, Store};
use crate::error::EngineResult;

const SNAPSHOT_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub learner_id: String,
    pub list_id: i64,
    pub mastered_count: i64,
    pub total_seen: i64,
    pub streak_days: i64,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub version: i64,
}

/// Additive counters plus the replacement streak state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressDelta {
    pub mastered_add: i64,
    pub seen_add: i64,
    pub streak_days: i64,
    pub last_reviewed_at: DateTime<Utc>,
}

fn ensure_row(conn: &Connection, learner_id: &str, list_id: i64) -> EngineResult<()> {
    conn.execute(
        r#"
        INSERT OR IGNORE INTO progress_snapshot
            (user_id, list_id, mastered_count, total_seen, streak_days, last_reviewed_at, version)
        VALUES (?1, ?2, 0, 0, 0, NULL, ?3)
        "#,
        params![learner_id, list_id, SNAPSHOT_VERSION],
    )?;
    Ok(())
}

fn read_row(conn: &Connection, learner_id: &str, list_id: i64) -> EngineResult<Option<ProgressSnapshot>> {
    let snapshot = conn
        .query_row(
            r#"
            SELECT user_id, list_id, mastered_count, total_seen, streak_days, last_reviewed_at, version
            FROM progress_snapshot
            WHERE user_id = ?1 AND list_id = ?2
            "#,
            params![learner_id, list_id],
            |row| {
                let last: Option<String> = row.get(5)?;
                Ok(ProgressSnapshot {
                    learner_id: row.get(0)?,
                    list_id: row.get(1)?,
                    mastered_count: row.get(2)?,
                    total_seen: row.get(3)?,
                    streak_days: row.get(4)?,
                    last_reviewed_at: last.as_deref().and_then(parse_instant),
                    version: row.get(6)?,
                })
            },
        )
        .optional()?;
    Ok(snapshot)
}

impl Store {
    /// Creates a zeroed row if absent; never touches an existing row
    pub fn ensure_progress_snapshot(&self, learner_id: &str, list_id: i64) -> EngineResult<()> {
        self.with_conn(|conn| ensure_row(conn, learner_id, list_id))
    }

    pub fn get_progress_snapshot(&self, learner_id: &str, list_id: i64) -> EngineResult<Option<ProgressSnapshot>> {
        self.with_conn(|conn| read_row(conn, learner_id, list_id))
    }

    /// Ensure, read, compute, and write in one IMMEDIATE transaction.
    ///
    /// `delta` sees the row as it is inside the transaction, so two
    /// completions for the same key can never both read the same streak.
    pub fn apply_progress_delta(
        &self,
        learner_id: &str,
        list_id: i64,
        delta: &dyn Fn(&ProgressSnapshot) -> ProgressDelta,
    ) -> EngineResult<ProgressSnapshot> {
        self.transaction(|conn| {
            ensure_row(conn, learner_id, list_id)?;
            let current = read_row(conn, learner_id, list_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            let change = delta(&current);

            conn.execute(
                r#"
                UPDATE progress_snapshot
                SET mastered_count = mastered_count + ?1,
                    total_seen = total_seen + ?2,
                    streak_days = ?3,
                    last_reviewed_at = ?4
                WHERE user_id = ?5 AND list_id = ?6
                "#,
                params![
                    change.mastered_add,
                    change.seen_add,
                    change.streak_days,
                    format_instant(change.last_reviewed_at),
                    learner_id,
                    list_id,
                ],
            )?;

            read_row(conn, learner_id, list_id)?
                .ok_or_else(|| rusqlite::Error::QueryReturnedNoRows.into())
        })
    }
}
