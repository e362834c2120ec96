//! Connection wrapper for one state database file.

use super::schema::ITEM_TABLE;
use crate::error::{CoreError, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a statement waits on a lock held by the running app.
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

pub struct StateDb {
    pub(crate) conn: Connection,
    pub(crate) path: PathBuf,
}

impl StateDb {
    /// Open an existing database for reading and writing. Never creates one.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
    }

    pub fn open_read_only(path: &Path) -> Result<Self> {
        Self::open_with(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
    }

    fn open_with(path: &Path, flags: OpenFlags) -> Result<Self> {
        let conn = Connection::open_with_flags(path, flags | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .map_err(|e| db_error(path, e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| db_error(path, e))?;

        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.ensure_item_table()?;
        Ok(db)
    }

    /// Stored value for `key`, converted to JSON. Text stays a string.
    pub fn get_item(&self, key: &str) -> Result<Option<Value>> {
        let sql = format!("SELECT value FROM {ITEM_TABLE} WHERE key = ?1");
        let raw: Option<SqlValue> = self
            .conn
            .query_row(&sql, params![key], |row| row.get(0))
            .optional()
            .map_err(|e| db_error(&self.path, e))?;
        Ok(raw.map(sql_to_json))
    }

    /// Stored value for `key` as text.
    pub fn get_item_text(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_item(key)?.map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        }))
    }

    /// Insert-or-replace every `(key, value)` pair in one transaction.
    pub fn upsert_items(&mut self, items: &[(&str, String)]) -> Result<usize> {
        let path = self.path.clone();
        let tx = self.conn.transaction().map_err(|e| db_error(&path, e))?;
        {
            let sql = format!("INSERT OR REPLACE INTO {ITEM_TABLE} (key, value) VALUES (?1, ?2)");
            let mut stmt = tx.prepare(&sql).map_err(|e| db_error(&path, e))?;
            for (key, value) in items {
                stmt.execute(params![key, value])
                    .map_err(|e| db_error(&path, e))?;
                log::debug!("Restored key {key} in {}", path.display());
            }
        }
        tx.commit().map_err(|e| db_error(&path, e))?;
        Ok(items.len())
    }
}

fn sql_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Values are stored as text; anything that is not already a string is
/// JSON-encoded first.
pub(crate) fn json_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn db_error(path: &Path, e: rusqlite::Error) -> CoreError {
    let message = e.to_string();
    if message.to_lowercase().contains("locked") {
        log::error!("Database is locked: {}", path.display());
        log::error!("Make sure the application is fully closed and try again");
    }
    CoreError::Database(format!("{}: {message}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_string_values_are_json_encoded() {
        assert_eq!(json_to_text(&json!("plain")), "plain");
        assert_eq!(json_to_text(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(json_to_text(&json!(7)), "7");
    }

    #[test]
    fn blob_values_read_back_as_text() {
        assert_eq!(
            sql_to_json(SqlValue::Blob(b"{\"x\":1}".to_vec())),
            json!("{\"x\":1}")
        );
    }
}
