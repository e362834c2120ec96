//! Key-value store backend
//!
//! The app keeps its session in an SQLite file with a single
//! `ItemTable(key, value)` table. A snapshot is the allow-listed keys of
//! that table; restoring upserts them into the primary file and every
//! replica so the copies stay in sync.

mod db;
mod safety_copy;
mod schema;

pub use db::StateDb;

use super::email::{first_email, EmailStrategy};
use super::{CredentialBackend, Snapshot, SnapshotLocation, UNKNOWN_EMAIL};
use crate::config::{self, AppType, CoreConfig};
use crate::error::{CoreError, Result};
use crate::outcome::Outcome;
use crate::paths::PathResolver;
use crate::registry::AccountIdentity;
use std::fs;
use std::path::{Path, PathBuf};

/// Keys captured for an Antigravity account.
pub const ANTIGRAVITY_KEYS: [&str; 2] = [
    "antigravityAuthStatus",
    "jetskiStateSync.agentManagerInitState",
];

pub struct KvStoreBackend {
    resolver: PathResolver,
    keys: Vec<String>,
    email_strategies: Vec<EmailStrategy>,
    backups_dir: PathBuf,
    safety_copy_dir: Option<PathBuf>,
}

impl KvStoreBackend {
    pub fn new(resolver: PathResolver, keys: Vec<String>, backups_dir: PathBuf) -> Self {
        Self {
            resolver,
            keys,
            email_strategies: Vec::new(),
            backups_dir,
            safety_copy_dir: None,
        }
    }

    pub fn with_email_strategies(mut self, strategies: Vec<EmailStrategy>) -> Self {
        self.email_strategies = strategies;
        self
    }

    /// Copy the primary database into `dir` before every restore.
    pub fn with_safety_copies(mut self, dir: PathBuf) -> Self {
        self.safety_copy_dir = Some(dir);
        self
    }

    /// Backend for Antigravity, archiving under the app's data directory.
    pub fn antigravity(resolver: PathResolver, config: &CoreConfig) -> Self {
        let app_dir = config.app_data_dir(AppType::Antigravity);
        Self::new(
            resolver,
            ANTIGRAVITY_KEYS.iter().map(|k| k.to_string()).collect(),
            app_dir.join("backups"),
        )
        .with_email_strategies(vec![
            EmailStrategy::json_field("antigravityAuthStatus", "email"),
            EmailStrategy::json_field("google.antigravity", "email"),
            EmailStrategy::json_field("antigravityUserSettings.allUserSettings", "email"),
            EmailStrategy::raw_scan("antigravityAuthStatus"),
        ])
        .with_safety_copies(app_dir.join("db_backups"))
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    fn db_paths(&self) -> Result<Vec<PathBuf>> {
        let paths = self.resolver.antigravity_db_paths();
        if paths.is_empty() {
            return Err(CoreError::LiveStateMissing(
                "state database not found".to_string(),
            ));
        }
        Ok(paths)
    }

    fn primary_db(&self) -> Result<StateDb> {
        let paths = self.db_paths()?;
        log::info!("Reading state from database: {}", paths[0].display());
        StateDb::open_read_only(&paths[0])
    }

    fn document_path(location: &SnapshotLocation) -> Result<&Path> {
        match location {
            SnapshotLocation::Document { path } => Ok(path),
            other => Err(CoreError::Message(format!(
                "Unsupported snapshot location for key-value backend: {other:?}"
            ))),
        }
    }

    fn restore_single(&self, path: &Path, items: &[(&str, String)]) -> Result<usize> {
        log::info!("Restoring database: {}", path.display());
        let mut db = StateDb::open(path)?;
        let count = db.upsert_items(items)?;
        log::info!("Database restore complete: {}", path.display());
        Ok(count)
    }
}

impl CredentialBackend for KvStoreBackend {
    fn detect_identity(&self) -> Option<AccountIdentity> {
        let db = match self.primary_db() {
            Ok(db) => db,
            Err(e) => {
                log::debug!("Cannot detect live account: {e}");
                return None;
            }
        };
        first_email(&self.email_strategies, |key| db.get_item_text(key).ok().flatten())
            .map(AccountIdentity::new)
    }

    fn read_current(&self) -> Result<Snapshot> {
        let db = self.primary_db()?;
        let email = first_email(&self.email_strategies, |key| {
            db.get_item_text(key).ok().flatten()
        })
        .unwrap_or_else(|| UNKNOWN_EMAIL.to_string());

        let mut snapshot = Snapshot::new(email);
        for key in &self.keys {
            match db.get_item(key)? {
                Some(value) => {
                    log::debug!("Backing up key: {key}");
                    snapshot.entries.insert(key.clone(), value);
                }
                None => log::debug!("Key not found: {key}"),
            }
        }

        if snapshot.entries.is_empty() {
            return Err(CoreError::LiveStateMissing(format!(
                "none of the account keys are present in {}",
                db.path.display()
            )));
        }
        Ok(snapshot)
    }

    fn write_current(&self, snapshot: &Snapshot) -> Result<Outcome<()>> {
        let paths = self.db_paths()?;
        let items: Vec<(&str, String)> = self
            .keys
            .iter()
            .filter_map(|key| {
                snapshot
                    .entries
                    .get(key)
                    .map(|value| (key.as_str(), db::json_to_text(value)))
            })
            .collect();
        if items.is_empty() {
            return Err(CoreError::SnapshotMissing(
                "snapshot contains none of the account keys".to_string(),
            ));
        }

        let mut warnings = Vec::new();

        if let Some(dir) = &self.safety_copy_dir {
            match StateDb::open_read_only(&paths[0]).and_then(|db| db.copy_into(dir)) {
                Ok(copy) => log::info!("Saved safety copy: {}", copy.display()),
                Err(e) => {
                    log::warn!("Failed to save safety copy of {}: {e}", paths[0].display());
                    warnings.push(format!("safety copy skipped: {e}"));
                }
            }
        }

        let mut updated = 0;
        for path in &paths {
            match self.restore_single(path, &items) {
                Ok(_) => updated += 1,
                Err(e) => {
                    log::error!("Database write error: {e}");
                    warnings.push(format!("failed to update {}: {e}", path.display()));
                }
            }
        }

        if updated == 0 {
            return Err(CoreError::Database(
                "no state database could be updated".to_string(),
            ));
        }
        Ok(Outcome::new((), warnings))
    }

    fn locate(&self, id: &str, _email: &str) -> SnapshotLocation {
        SnapshotLocation::Document {
            path: self.backups_dir.join(format!("{id}.json")),
        }
    }

    fn read_named(&self, location: &SnapshotLocation) -> Result<Snapshot> {
        let path = Self::document_path(location)?;
        if !path.is_file() {
            return Err(CoreError::SnapshotMissing(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!("Failed to parse snapshot {}: {e}", path.display()))
        })
    }

    fn write_named(&self, location: &SnapshotLocation, snapshot: &Snapshot) -> Result<()> {
        let path = Self::document_path(location)?;
        if let Some(parent) = path.parent() {
            config::ensure_private_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        config::write_private_file(path, json.as_bytes())?;
        log::info!("Backup successful: {}", path.display());
        Ok(())
    }

    fn snapshot_exists(&self, location: &SnapshotLocation) -> bool {
        Self::document_path(location)
            .map(Path::is_file)
            .unwrap_or(false)
    }

    fn remove_named(&self, location: &SnapshotLocation) -> Result<()> {
        let path = Self::document_path(location)?;
        if path.exists() {
            fs::remove_file(path)?;
            log::info!("Backup file deleted: {}", path.display());
        }
        Ok(())
    }
}
