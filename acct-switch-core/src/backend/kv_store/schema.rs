//! Schema checks for the app's state database
//!
//! The database belongs to the managed app; we only verify that the
//! key/value table we read and write is shaped the way we expect.

use super::StateDb;
use crate::error::{CoreError, Result};
use rusqlite::Connection;

/// Table holding one row per state key.
pub(crate) const ITEM_TABLE: &str = "ItemTable";

impl StateDb {
    /// Fail unless `ItemTable(key, value)` exists.
    pub(crate) fn ensure_item_table(&self) -> Result<()> {
        if !Self::table_exists(&self.conn, ITEM_TABLE)? {
            return Err(CoreError::Database(format!(
                "Table {ITEM_TABLE} not found in {}",
                self.path.display()
            )));
        }
        for column in ["key", "value"] {
            if !Self::has_column(&self.conn, ITEM_TABLE, column)? {
                return Err(CoreError::Database(format!(
                    "Table {ITEM_TABLE} in {} has no {column} column",
                    self.path.display()
                )));
            }
        }
        Ok(())
    }

    fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .map_err(|e| CoreError::Database(format!("Failed to read table names: {e}")))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| CoreError::Database(format!("Failed to query table names: {e}")))?;
        while let Some(row) = rows.next().map_err(|e| CoreError::Database(e.to_string()))? {
            let name: String = row
                .get(0)
                .map_err(|e| CoreError::Database(format!("Failed to parse table name: {e}")))?;
            if name.eq_ignore_ascii_case(table) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
        let sql = format!("PRAGMA table_info(\"{table}\");");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| CoreError::Database(format!("Failed to read table info: {e}")))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| CoreError::Database(format!("Failed to query table info: {e}")))?;
        while let Some(row) = rows.next().map_err(|e| CoreError::Database(e.to_string()))? {
            let name: String = row
                .get(1)
                .map_err(|e| CoreError::Database(format!("Failed to read column name: {e}")))?;
            if name.eq_ignore_ascii_case(column) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
