//! Durable index of saved accounts
//!
//! The registry is a single JSON document per managed application. Every
//! mutation reads, changes and rewrites the whole document while holding
//! both an in-process mutex and an exclusive lock on a sibling `.lock`
//! file. The lock lives beside the document because the document itself is
//! replaced by rename on every write.

mod record;

pub use record::{
    derive_display_name, AccountIdentity, AccountRecord, RegistryDocument, RegistryFlavor,
};

use crate::backend::SnapshotLocation;
use crate::config;
use crate::error::{CoreError, Result};
use chrono::Utc;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Result of [`AccountRegistry::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertResult {
    pub id: String,
    /// `false` when an existing entry for the same email was overwritten.
    pub created: bool,
}

pub struct AccountRegistry {
    path: PathBuf,
    flavor: RegistryFlavor,
    write_lock: Mutex<()>,
}

/// Exclusive hold on the registry for one read-modify-write.
struct RegistryLock<'a> {
    _guard: MutexGuard<'a, ()>,
    file: File,
}

impl Drop for RegistryLock<'_> {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl AccountRegistry {
    pub fn open(path: impl Into<PathBuf>, flavor: RegistryFlavor) -> Self {
        Self {
            path: path.into(),
            flavor,
            write_lock: Mutex::new(()),
        }
    }

    /// Registry document name used under an app data directory.
    pub fn file_name(flavor: RegistryFlavor) -> &'static str {
        match flavor {
            RegistryFlavor::Uuid => "accounts.json",
            RegistryFlavor::Sequence => "sequence.json",
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flavor(&self) -> RegistryFlavor {
        self.flavor
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn lock(&self) -> Result<RegistryLock<'_>> {
        let guard = self
            .write_lock
            .lock()
            .map_err(|_| CoreError::Message("registry lock poisoned".to_string()))?;

        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            config::ensure_private_dir(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        file.lock_exclusive()?;

        Ok(RegistryLock {
            _guard: guard,
            file,
        })
    }

    /// Read the document. A missing file is an empty registry; an
    /// unreadable or corrupt one is logged and also treated as empty.
    pub fn load(&self) -> RegistryDocument {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return RegistryDocument::default()
            }
            Err(e) => {
                log::warn!("Failed to read registry {}: {e}", self.path.display());
                return RegistryDocument::default();
            }
        };
        if content.trim().is_empty() {
            return RegistryDocument::default();
        }

        match serde_json::from_str::<RegistryDocument>(&content) {
            Ok(mut doc) => {
                doc.normalize();
                doc
            }
            Err(e) => {
                log::warn!(
                    "Registry {} is corrupt, starting empty: {e}",
                    self.path.display()
                );
                RegistryDocument::default()
            }
        }
    }

    fn save(&self, doc: &mut RegistryDocument) -> Result<()> {
        doc.normalize();
        doc.last_updated = Some(Utc::now());
        let json = serde_json::to_string_pretty(doc)?;
        config::write_private_file(&self.path, json.as_bytes())
    }

    /// Apply `f` to the document under the registry lock and persist the
    /// result. Nothing is written when `f` fails.
    pub fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut RegistryDocument) -> Result<T>,
    {
        let _lock = self.lock()?;
        let mut doc = self.load();
        let value = f(&mut doc)?;
        self.save(&mut doc)?;
        Ok(value)
    }

    /// Insert or overwrite the entry for `identity.email`.
    ///
    /// An existing entry keeps its id and creation time; its name changes
    /// only when `name` is given. `locate` maps the entry's id to where its
    /// snapshot lives. The new entry becomes the active account.
    pub fn upsert<F>(
        &self,
        identity: &AccountIdentity,
        name: Option<&str>,
        locate: F,
    ) -> Result<UpsertResult>
    where
        F: FnOnce(&str) -> Result<SnapshotLocation>,
    {
        let flavor = self.flavor;
        self.mutate(|doc| {
            let now = Utc::now();
            let existing = doc.find_by_email(&identity.email).map(|r| r.id.clone());

            let result = match existing {
                Some(id) => {
                    let snapshot = locate(&id)?;
                    let record = doc
                        .accounts
                        .get_mut(&id)
                        .ok_or_else(|| CoreError::AccountNotFound(id.clone()))?;
                    if let Some(name) = name {
                        record.name = name.to_string();
                    }
                    if identity.account_uuid.is_some() {
                        record.account_uuid = identity.account_uuid.clone();
                    }
                    record.snapshot = snapshot;
                    record.last_used_at = now.max(record.last_used_at);
                    log::info!("Updated account {id} ({})", identity.email);
                    UpsertResult { id, created: false }
                }
                None => {
                    let id = doc.next_id(flavor);
                    let snapshot = locate(&id)?;
                    let record = AccountRecord {
                        id: id.clone(),
                        name: name
                            .map(str::to_string)
                            .unwrap_or_else(|| derive_display_name(&identity.email, now)),
                        email: identity.email.clone(),
                        account_uuid: identity.account_uuid.clone(),
                        snapshot,
                        created_at: now,
                        last_used_at: now,
                    };
                    doc.accounts.insert(id.clone(), record);
                    doc.sequence.push(id.clone());
                    log::info!("Added account {id} ({})", identity.email);
                    UpsertResult { id, created: true }
                }
            };

            doc.active_account = Some(result.id.clone());
            Ok(result)
        })
    }

    pub fn get(&self, id: &str) -> Option<AccountRecord> {
        self.load().accounts.get(id).cloned()
    }

    /// Remove an entry, returning it. Clears the active marker when it
    /// pointed at the removed entry.
    pub fn delete(&self, id: &str) -> Result<AccountRecord> {
        self.mutate(|doc| {
            let record = doc
                .accounts
                .shift_remove(id)
                .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))?;
            doc.sequence.retain(|known| known != id);
            if doc.active_account.as_deref() == Some(id) {
                doc.active_account = None;
            }
            log::info!("Removed account {id} ({})", record.email);
            Ok(record)
        })
    }

    /// All entries in display order.
    pub fn list(&self) -> Vec<AccountRecord> {
        self.load().ordered(self.flavor)
    }

    /// Mark `id` as just used. Last-used never moves backwards.
    pub fn touch(&self, id: &str) -> Result<()> {
        self.mutate(|doc| {
            let record = doc
                .accounts
                .get_mut(id)
                .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))?;
            record.last_used_at = Utc::now().max(record.last_used_at);
            Ok(())
        })
    }

    pub fn set_active(&self, id: &str) -> Result<()> {
        self.mutate(|doc| {
            if !doc.accounts.contains_key(id) {
                return Err(CoreError::AccountNotFound(id.to_string()));
            }
            doc.active_account = Some(id.to_string());
            Ok(())
        })
    }

    pub fn active(&self) -> Option<String> {
        self.load().active_account
    }
}
