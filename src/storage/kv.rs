//! Local key-value settings (identity, adventure flags)

use rusqlite::{params, Connection, OptionalExtension};

use super::Store;
use crate::error::EngineResult;

fn read_value(conn: &Connection, key: &str) -> EngineResult<Option<String>> {
    conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
        .optional()
        .map_err(Into::into)
}

fn write_value(conn: &Connection, key: &str, value: &str) -> EngineResult<()> {
    conn.execute(
        r#"
        INSERT INTO kv(key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
        params![key, value],
    )?;
    Ok(())
}

impl Store {
    pub fn get_setting(&self, key: &str) -> EngineResult<Option<String>> {
        self.with_conn(|conn| read_value(conn, key))
    }

    pub fn set_setting(&self, key: &str, value: &str) -> EngineResult<()> {
        self.with_conn(|conn| write_value(conn, key, value))
    }

    /// Read, transform, and write one key in a single IMMEDIATE transaction.
    ///
    /// `update` returns the new value, or `None` to leave the row as it is.
    /// The return value is whatever ends up stored.
    pub fn update_setting<F>(&self, key: &str, update: F) -> EngineResult<Option<String>>
    where
        F: FnOnce(Option<&str>) -> EngineResult<Option<String>>,
    {
        self.transaction(|conn| {
            let current = read_value(conn, key)?;
            match update(current.as_deref())? {
                Some(value) => {
                    write_value(conn, key, &value)?;
                    Ok(Some(value))
                }
                None => Ok(current),
            }
        })
    }

    /// Return the stored value, or store and return `init()` when absent.
    ///
    /// Runs in one transaction so two callers racing on first use agree on a
    /// single value.
    pub fn get_or_init_setting<F>(&self, key: &str, init: F) -> EngineResult<String>
    where
        F: FnOnce() -> String,
    {
        self.transaction(|conn| {
            if let Some(value) = read_value(conn, key)? {
                return Ok(value);
            }

            let value = init();
            conn.execute("INSERT INTO kv(key, value) VALUES (?1, ?2)", params![key, value])?;
            Ok(value)
        })
    }
}
