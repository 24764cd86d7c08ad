//! Per-word card enrichment: exam-style context sentences and collocations

use rusqlite::{params, Connection, OptionalExtension};

use super::Store;
use crate::error::EngineResult;

/// Collocations shown on one card
pub const COLLOCATION_LIMIT: usize = 6;

pub(crate) fn insert_context(conn: &Connection, word_id: i64, context: &str) -> EngineResult<bool> {
    let context = context.trim();
    if context.is_empty() {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO sat_contexts(word_id, context) VALUES (?1, ?2)",
        params![word_id, context],
    )?;
    Ok(true)
}

pub(crate) fn insert_collocation(conn: &Connection, word_id: i64, phrase: &str) -> EngineResult<bool> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO collocations(word_id, phrase) VALUES (?1, ?2)",
        params![word_id, phrase],
    )?;
    Ok(true)
}

impl Store {
    /// One random context sentence for the word, if any
    pub fn fetch_sat_context(&self, word_id: i64) -> EngineResult<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT context
                FROM sat_contexts
                WHERE word_id = ?1 AND TRIM(context) != ''
                ORDER BY RANDOM()
                LIMIT 1
                "#,
                [word_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Collocations in insertion order
    pub fn fetch_collocations(&self, word_id: i64, limit: usize) -> EngineResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                r#"
                SELECT phrase
                FROM collocations
                WHERE word_id = ?1 AND phrase != ''
                ORDER BY id
                LIMIT ?2
                "#,
            )?;
            let phrases = stmt.query_map(params![word_id, limit as i64], |row| row.get(0))?;
            phrases.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }
}
