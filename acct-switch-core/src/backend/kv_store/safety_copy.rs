//! Rolling copies of the live state database, taken before a restore
//! overwrites it.

use super::StateDb;
use crate::error::{CoreError, Result};
use chrono::Utc;
use rusqlite::backup::Backup;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

/// Number of safety copies to retain
const SAFETY_COPY_RETAIN: usize = 5;

impl StateDb {
    /// Copy this database into `dir` with SQLite's online backup API and
    /// prune old copies. Returns the new copy's path.
    pub fn copy_into(&self, dir: &Path) -> Result<PathBuf> {
        crate::config::ensure_private_dir(dir)?;

        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "state".to_string());
        let copy_id = format!("{stem}_{}", Utc::now().format("%Y%m%d_%H%M%S_%3f"));
        let copy_path = dir.join(format!("{copy_id}.vscdb"));

        {
            let mut dest_conn =
                Connection::open(&copy_path).map_err(|e| CoreError::Database(e.to_string()))?;
            let backup = Backup::new(&self.conn, &mut dest_conn)
                .map_err(|e| CoreError::Database(e.to_string()))?;
            backup
                .step(-1)
                .map_err(|e| CoreError::Database(e.to_string()))?;
        }
        crate::config::set_private_file_permissions(&copy_path)?;

        Self::cleanup_safety_copies(dir)?;
        Ok(copy_path)
    }

    /// Keep only the newest copies
    fn cleanup_safety_copies(dir: &Path) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(iter) => iter
                .filter_map(|entry| entry.ok())
                .filter(|entry| {
                    entry
                        .path()
                        .extension()
                        .map(|ext| ext == "vscdb")
                        .unwrap_or(false)
                })
                .collect::<Vec<_>>(),
            Err(_) => return Ok(()),
        };

        if entries.len() <= SAFETY_COPY_RETAIN {
            return Ok(());
        }

        let remove_count = entries.len().saturating_sub(SAFETY_COPY_RETAIN);
        let mut sorted = entries;
        sorted.sort_by_key(|entry| entry.file_name());

        for entry in sorted.into_iter().take(remove_count) {
            if let Err(err) = fs::remove_file(entry.path()) {
                log::warn!(
                    "Failed to remove old safety copy {}: {}",
                    entry.path().display(),
                    err
                );
            }
        }
        Ok(())
    }
}
