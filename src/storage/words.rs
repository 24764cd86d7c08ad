//! Word lists and word content
//!
//! Content is authored elsewhere and read-only to the engine; `import_list`
//! is the one write path, used to load a list bundle into a fresh store.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Store;
use crate::error::{EngineError, EngineResult};

/// Rank used for membership rows with no explicit rank
const UNRANKED: i64 = 999_999;

pub(crate) const WORD_COLUMNS: &str = "w.id, w.lemma, w.pos, w.definition, w.example, w.image_filename";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Word {
    pub id: i64,
    pub lemma: String,
    pub pos: Option<String>,
    pub definition: Option<String>,
    pub example: Option<String>,
    pub image_filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInfo {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub version: i64,
}

/// On-disk import format for a word list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListBundle {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: i64,
    pub words: Vec<WordEntry>,
}

fn default_version() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordEntry {
    pub lemma: String,
    #[serde(default)]
    pub pos: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub image_filename: Option<String>,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub questions: Vec<super::questions::QuestionEntry>,
    /// Exam-style sentences using the word
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub collocations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub list_id: i64,
    pub words: usize,
    pub questions: usize,
    pub contexts: usize,
    pub collocations: usize,
}

pub(crate) fn word_from_row(row: &Row<'_>) -> rusqlite::Result<Word> {
    Ok(Word {
        id: row.get(0)?,
        lemma: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        pos: row.get(2)?,
        definition: row.get(3)?,
        example: row.get(4)?,
        image_filename: row.get(5)?,
    })
}

impl Store {
    /// List matching `preferred_name`, else the first list by id
    pub fn get_default_list(&self, preferred_name: &str) -> EngineResult<ListInfo> {
        self.with_conn(|conn| {
            let list = conn
                .query_row(
                    r#"
                    SELECT id, name, description, version
                    FROM lists
                    ORDER BY CASE WHEN name = ?1 THEN 0 ELSE 1 END, id
                    LIMIT 1
                    "#,
                    [preferred_name],
                    |row| {
                        Ok(ListInfo {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            version: row.get(3)?,
                        })
                    },
                )
                .optional()?;

            list.ok_or_else(|| {
                EngineError::Initialization("no word list found; run `vocab import` first".to_string())
            })
        })
    }

    pub fn count_words_in_list(&self, list_id: i64) -> EngineResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM word_list WHERE list_id = ?1",
                [list_id],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as usize)
        })
    }

    pub fn fetch_ordered_words(&self, list_id: i64, limit: usize, offset: usize) -> EngineResult<Vec<Word>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                r#"
                SELECT {WORD_COLUMNS}
                FROM word_list wl
                JOIN words w ON w.id = wl.word_id
                WHERE wl.list_id = ?1
                ORDER BY COALESCE(wl.rank, {UNRANKED}), w.id
                LIMIT ?2 OFFSET ?3
                "#
            ))?;

            let words = stmt.query_map(params![list_id, limit as i64, offset as i64], word_from_row)?;
            words.collect::<Result<Vec<_>, _>>().map_err(Into::into)
        })
    }

    pub fn fetch_word_by_id(&self, word_id: i64) -> EngineResult<Option<Word>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {WORD_COLUMNS} FROM words w WHERE w.id = ?1"),
                [word_id],
                word_from_row,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Random words from the list, excluding one id, optionally filtered by part of speech
    pub fn fetch_random_sample(
        &self,
        list_id: i64,
        exclude_word_id: i64,
        pos: Option<&str>,
        limit: usize,
    ) -> EngineResult<Vec<Word>> {
        self.with_conn(|conn| {
            let words = match pos {
                Some(pos) => {
                    let mut stmt = conn.prepare_cached(&format!(
                        r#"
                        SELECT {WORD_COLUMNS}
                        FROM word_list wl
                        JOIN words w ON w.id = wl.word_id
                        WHERE wl.list_id = ?1 AND w.id != ?2 AND w.pos = ?3
                        ORDER BY RANDOM()
                        LIMIT ?4
                        "#
                    ))?;
                    let rows = stmt.query_map(params![list_id, exclude_word_id, pos, limit as i64], word_from_row)?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare_cached(&format!(
                        r#"
                        SELECT {WORD_COLUMNS}
                        FROM word_list wl
                        JOIN words w ON w.id = wl.word_id
                        WHERE wl.list_id = ?1 AND w.id != ?2
                        ORDER BY RANDOM()
                        LIMIT ?3
                        "#
                    ))?;
                    let rows = stmt.query_map(params![list_id, exclude_word_id, limit as i64], word_from_row)?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
            };
            Ok(words)
        })
    }

    /// Load a list bundle in one transaction.
    ///
    /// Re-importing an existing list name replaces its membership; word rows
    /// from the previous import are left in place for the outcome log.
    pub fn import_list(&self, bundle: &ListBundle) -> EngineResult<ImportSummary> {
        if bundle.name.trim().is_empty() {
            return Err(EngineError::InvalidArgument("list name must not be empty".to_string()));
        }

        let summary = self.transaction(|conn| {
            let list_id = upsert_list(conn, bundle)?;
            conn.execute("DELETE FROM word_list WHERE list_id = ?1", [list_id])?;

            let mut summary = ImportSummary {
                list_id,
                ..Default::default()
            };

            for entry in &bundle.words {
                let lemma = entry.lemma.trim();
                if lemma.is_empty() {
                    debug!("Skipping entry with empty lemma");
                    continue;
                }

                conn.execute(
                    "INSERT INTO words(lemma, pos, definition, example, image_filename) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![lemma, entry.pos, entry.definition, entry.example, entry.image_filename],
                )?;
                let word_id = conn.last_insert_rowid();

                conn.execute(
                    "INSERT OR REPLACE INTO word_list(list_id, word_id, rank) VALUES (?1, ?2, ?3)",
                    params![list_id, word_id, entry.rank],
                )?;
                summary.words += 1;

                for question in &entry.questions {
                    super::questions::insert_question(conn, word_id, question)?;
                    summary.questions += 1;
                }
                for context in &entry.contexts {
                    if super::contexts::insert_context(conn, word_id, context)? {
                        summary.contexts += 1;
                    }
                }
                for phrase in &entry.collocations {
                    if super::contexts::insert_collocation(conn, word_id, phrase)? {
                        summary.collocations += 1;
                    }
                }
            }

            Ok(summary)
        })?;

        info!(
            "Imported list '{}' (id {}): {} words, {} questions, {} contexts, {} collocations",
            bundle.name, summary.list_id, summary.words, summary.questions, summary.contexts, summary.collocations
        );
        Ok(summary)
    }
}

fn upsert_list(conn: &Connection, bundle: &ListBundle) -> EngineResult<i64> {
    conn.execute(
        r#"
        INSERT INTO lists(name, description, version) VALUES (?1, ?2, ?3)
        ON CONFLICT(name) DO UPDATE SET
            description = excluded.description,
            version = excluded.version
        "#,
        params![bundle.name, bundle.description, bundle.version],
    )?;

    let id = conn.query_row("SELECT id FROM lists WHERE name = ?1", [&bundle.name], |row| row.get(0))?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::seeded_store;

    fn entry(lemma: &str, rank: Option<i64>) -> WordEntry {
        WordEntry {
            lemma: lemma.to_string(),
            pos: None,
            definition: None,
            example: None,
            image_filename: None,
            rank,
            questions: Vec::new(),
            contexts: Vec::new(),
            collocations: Vec::new(),
        }
    }

    #[test]
    fn test_default_list_prefers_configured_name() {
        let store = Store::in_memory().unwrap();
        for name in ["starter", "sat_core_1"] {
            store
                .import_list(&ListBundle {
                    name: name.to_string(),
                    description: None,
                    version: 1,
                    words: vec![entry("a", None)],
                })
                .unwrap();
        }

        assert_eq!(store.get_default_list("sat_core_1").unwrap().name, "sat_core_1");
        // Unknown name falls back to the first list by id
        assert_eq!(store.get_default_list("missing").unwrap().name, "starter");
    }

    #[test]
    fn test_default_list_fails_on_empty_store() {
        let store = Store::in_memory().unwrap();
        assert!(matches!(
            store.get_default_list("sat_core_1"),
            Err(EngineError::Initialization(_))
        ));
    }

    #[test]
    fn test_ordering_uses_rank_then_id() {
        let store = Store::in_memory().unwrap();
        let summary = store
            .import_list(&ListBundle {
                name: "ranked".to_string(),
                description: None,
                version: 1,
                words: vec![
                    entry("unranked", None),
                    entry("second", Some(2)),
                    entry("first", Some(1)),
                    entry("also-second", Some(2)),
                ],
            })
            .unwrap();

        let lemmas: Vec<String> = store
            .fetch_ordered_words(summary.list_id, 10, 0)
            .unwrap()
            .into_iter()
            .map(|w| w.lemma)
            .collect();
        assert_eq!(lemmas, vec!["first", "second", "also-second", "unranked"]);
    }

    #[test]
    fn test_fetch_with_offset_and_count() {
        let (store, list_id) = seeded_store(5);
        assert_eq!(store.count_words_in_list(list_id).unwrap(), 5);

        let page = store.fetch_ordered_words(list_id, 2, 3).unwrap();
        let lemmas: Vec<&str> = page.iter().map(|w| w.lemma.as_str()).collect();
        assert_eq!(lemmas, vec!["w3", "w4"]);

        assert!(store.fetch_ordered_words(list_id, 2, 5).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_word_by_id() {
        let (store, list_id) = seeded_store(2);
        let first = &store.fetch_ordered_words(list_id, 1, 0).unwrap()[0];
        assert_eq!(store.fetch_word_by_id(first.id).unwrap().as_ref(), Some(first));
        assert_eq!(store.fetch_word_by_id(9_999).unwrap(), None);
    }

    #[test]
    fn test_random_sample_respects_filters() {
        let (store, list_id) = seeded_store(10);
        let target = store.fetch_ordered_words(list_id, 1, 0).unwrap().remove(0);

        let nouns = store.fetch_random_sample(list_id, target.id, Some("noun"), 10).unwrap();
        assert_eq!(nouns.len(), 4);
        assert!(nouns.iter().all(|w| w.pos.as_deref() == Some("noun") && w.id != target.id));

        let any = store.fetch_random_sample(list_id, target.id, None, 3).unwrap();
        assert_eq!(any.len(), 3);
        assert!(any.iter().all(|w| w.id != target.id));
    }

    #[test]
    fn test_reimport_replaces_membership() {
        let store = Store::in_memory().unwrap();
        let bundle = |words: Vec<WordEntry>| ListBundle {
            name: "sat_core_1".to_string(),
            description: None,
            version: 1,
            words,
        };

        let first = store.import_list(&bundle(vec![entry("a", None), entry("b", None)])).unwrap();
        let second = store.import_list(&bundle(vec![entry("c", None)])).unwrap();

        assert_eq!(first.list_id, second.list_id);
        assert_eq!(store.count_words_in_list(second.list_id).unwrap(), 1);
    }

    #[test]
    fn test_bundle_parses_minimal_json() {
        let bundle: ListBundle = serde_json::from_str(
            r#"{"name": "mini", "words": [{"lemma": "abate", "pos": "verb", "rank": 1}]}"#,
        )
        .unwrap();
        assert_eq!(bundle.version, 1);
        assert_eq!(bundle.words[0].pos.as_deref(), Some("verb"));
        assert!(bundle.words[0].questions.is_empty());
        assert!(bundle.words[0].contexts.is_empty());
    }

    #[test]
    fn test_import_counts_enrichment() {
        let store = Store::in_memory().unwrap();
        let bundle: ListBundle = serde_json::from_str(
            r#"{"name": "mini", "words": [{
                "lemma": "abate",
                "contexts": ["The storm began to abate.", " "],
                "collocations": ["abate a nuisance", "pain abates"]
            }]}"#,
        )
        .unwrap();
        let summary = store.import_list(&bundle).unwrap();
        assert_eq!(summary.words, 1);
        assert_eq!(summary.contexts, 1);
        assert_eq!(summary.collocations, 2);
    }
}
