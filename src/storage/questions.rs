//! Multiple-choice question bank attached to words

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::Store;
use crate::error::EngineResult;
use crate::matching::normalized_option_text;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub word_id: i64,
    pub passage: Option<String>,
    pub question: Option<String>,
    pub options: [String; 4],
    pub answer: String,
    pub answer_verified: bool,
}

impl Question {
    /// Index of the correct option.
    ///
    /// A single-letter answer ("A".."D") names the option directly; otherwise
    /// the answer text is compared against each option's text.
    pub fn correct_option(&self) -> Option<usize> {
        let answer = normalized_option_text(&self.answer);
        if let Some(idx) = ["a", "b", "c", "d"].iter().position(|l| *l == answer) {
            return Some(idx);
        }
        if answer.is_empty() {
            return None;
        }
        self.options
            .iter()
            .position(|o| normalized_option_text(o) == answer)
    }
}

/// Import format for a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub id: String,
    #[serde(default)]
    pub passage: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub verified: bool,
}

pub(crate) fn insert_question(conn: &Connection, word_id: i64, entry: &QuestionEntry) -> EngineResult<()> {
    let option = |i: usize| entry.options.get(i).cloned();
    conn.execute(
        r#"
        INSERT OR REPLACE INTO questions
            (id, word_id, passage, question, option_a, option_b, option_c, option_d, answer, answer_verified)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            entry.id,
            word_id,
            entry.passage,
            entry.question,
            option(0),
            option(1),
            option(2),
            option(3),
            entry.answer,
            entry.verified,
        ],
    )?;
    Ok(())
}

impl Store {
    /// Random questions for a word that have an answer and all four options
    pub fn fetch_questions_for_word(&self, word_id: i64, limit: usize, verified_only: bool) -> EngineResult<Vec<Question>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                r#"
                SELECT id, word_id, passage, question, option_a, option_b, option_c, option_d, answer, answer_verified
                FROM questions
                WHERE word_id = ?1
                  AND (?2 = 0 OR answer_verified = 1)
                  AND answer IS NOT NULL AND TRIM(answer) <> ''
                  AND option_a IS NOT NULL AND TRIM(option_a) <> ''
                  AND option_b IS NOT NULL AND TRIM(option_b) <> ''
                  AND option_c IS NOT NULL AND TRIM(option_c) <> ''
                  AND option_d IS NOT NULL AND TRIM(option_d) <> ''
                ORDER BY RANDOM()
                LIMIT ?3
                "#,
            )?;

            let questions = stmt.query_map(params![word_id, verified_only, limit as i64], |row| {
                Ok(Question {
                    id: row.get(0)?,
                    word_id: row.get(1)?,
                    passage: row.get(2)?,
                    question: row.get(3)?,
                    options: [row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?],
                    answer: row.get(8)?,
                    answer_verified: row.get(9)?,
                })
            })?;

            questions.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }
}
