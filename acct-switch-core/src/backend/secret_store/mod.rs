//! Secret store + config file backend
//!
//! The live account is named in a JSON config file (`oauthAccount`) while
//! the tokens themselves sit in a secret store. Archiving copies both
//! verbatim; restoring installs the secret and merges only the identity
//! sub-object back into the live config, leaving every other field alone.

mod store;

pub use store::{FileSecretStore, KeychainStore, SecretStore};

use super::{CredentialBackend, Snapshot, SnapshotLocation};
use crate::config::{self, AppType, CoreConfig};
use crate::error::{CoreError, Result};
use crate::outcome::Outcome;
use crate::paths::{Platform, PathResolver, CLAUDE_SECRET_SERVICE};
use crate::registry::AccountIdentity;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Config sub-object naming the signed-in account.
pub const IDENTITY_FIELD: &str = "oauthAccount";

/// Snapshot entry holding the raw config file.
pub const CONFIG_ENTRY: &str = "config";
/// Snapshot entry holding the raw secret.
pub const CREDENTIALS_ENTRY: &str = "credentials";

pub struct SecretStoreBackend {
    resolver: PathResolver,
    store: Box<dyn SecretStore>,
    configs_dir: PathBuf,
}

impl SecretStoreBackend {
    pub fn new(resolver: PathResolver, store: Box<dyn SecretStore>, configs_dir: PathBuf) -> Self {
        Self {
            resolver,
            store,
            configs_dir,
        }
    }

    /// Backend for Claude Code. The keychain is used on macOS, owner-only
    /// files everywhere else.
    pub fn claude(resolver: PathResolver, config: &CoreConfig) -> Self {
        let app_dir = config.app_data_dir(AppType::Claude);
        let store: Box<dyn SecretStore> = match resolver.platform() {
            Platform::MacOs => Box::new(KeychainStore::new(
                CLAUDE_SECRET_SERVICE,
                "Claude Code-Account",
            )),
            _ => Box::new(FileSecretStore::new(
                resolver.claude_credentials_file(),
                app_dir.join("credentials"),
                ".claude-credentials",
            )),
        };
        Self::new(resolver, store, app_dir.join("configs"))
    }

    fn live_config(&self) -> Result<(PathBuf, String, Value)> {
        let path = self
            .resolver
            .claude_config_path()
            .ok_or_else(|| CoreError::ConfigNotFound(self.resolver.claude_config_fallback()))?;
        let raw = fs::read_to_string(&path)?;
        let json = serde_json::from_str(&raw).map_err(|e| {
            CoreError::Config(format!("Failed to parse config {}: {e}", path.display()))
        })?;
        Ok((path, raw, json))
    }

    fn archive_parts(location: &SnapshotLocation) -> Result<(&Path, &super::SecretRef)> {
        match location {
            SnapshotLocation::Archive {
                config_path,
                secret,
            } => Ok((config_path.as_path(), secret)),
            other => Err(CoreError::Message(format!(
                "Unsupported snapshot location for secret store backend: {other:?}"
            ))),
        }
    }
}

/// Identity carried by a config document.
fn identity_of(config: &Value) -> Option<AccountIdentity> {
    let account = config.get(IDENTITY_FIELD)?;
    let email = account
        .get("emailAddress")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?;
    Some(AccountIdentity {
        email: email.to_string(),
        account_uuid: account
            .get("accountUuid")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// `email` made safe to embed in an archive file name.
fn archive_token(email: &str) -> String {
    email
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Copy `archived`'s identity sub-object into `live`, keeping all other
/// live fields.
pub fn merge_identity(live: &mut Value, archived: &Value) -> Result<()> {
    let Some(identity) = archived.get(IDENTITY_FIELD) else {
        return Ok(());
    };
    if !live.is_object() {
        *live = Value::Object(Map::new());
    }
    live.as_object_mut()
        .ok_or_else(|| CoreError::Config("Live config is not a JSON object".to_string()))?
        .insert(IDENTITY_FIELD.to_string(), identity.clone());
    Ok(())
}

impl CredentialBackend for SecretStoreBackend {
    fn detect_identity(&self) -> Option<AccountIdentity> {
        self.live_config()
            .ok()
            .and_then(|(_, _, json)| identity_of(&json))
    }

    fn read_current(&self) -> Result<Snapshot> {
        let (path, raw, json) = self.live_config()?;
        let identity = identity_of(&json).ok_or_else(|| {
            CoreError::LiveStateMissing(format!("no active account in {}", path.display()))
        })?;

        let secret = self
            .store
            .read(&self.store.live_ref())?
            .ok_or_else(|| {
                CoreError::LiveStateMissing("no credentials found for current account".to_string())
            })?;

        let mut snapshot = Snapshot::new(identity.email);
        snapshot
            .entries
            .insert(CONFIG_ENTRY.to_string(), Value::String(raw));
        snapshot
            .entries
            .insert(CREDENTIALS_ENTRY.to_string(), Value::String(secret));
        Ok(snapshot)
    }

    fn write_current(&self, snapshot: &Snapshot) -> Result<Outcome<()>> {
        let secret = snapshot.get_str(CREDENTIALS_ENTRY).ok_or_else(|| {
            CoreError::SnapshotMissing("snapshot has no credentials".to_string())
        })?;
        let archived: Value = match snapshot.get_str(CONFIG_ENTRY) {
            Some(raw) => serde_json::from_str(raw)?,
            None => Value::Null,
        };

        // Prepare the merged config before touching anything live.
        let live_path = self
            .resolver
            .claude_config_path()
            .unwrap_or_else(|| self.resolver.claude_config_fallback());
        let mut live: Value = if live_path.is_file() {
            serde_json::from_str(&fs::read_to_string(&live_path)?)?
        } else {
            Value::Object(Map::new())
        };
        merge_identity(&mut live, &archived)?;

        // The secret and the config must name the same account; undo the
        // secret if the config cannot follow.
        let live_ref = self.store.live_ref();
        let previous = self.store.read(&live_ref)?;
        self.store.write(&live_ref, secret)?;
        if let Err(e) = config::write_json_file(&live_path, &live) {
            log::error!("Failed to write live config {}: {e}", live_path.display());
            let restored = match &previous {
                Some(old) => self.store.write(&live_ref, old),
                None => self.store.delete(&live_ref),
            };
            if let Err(undo) = restored {
                log::error!("Failed to put back previous credentials: {undo}");
            }
            return Err(e);
        }
        log::info!("Updated live config: {}", live_path.display());

        Ok(Outcome::Success(()))
    }

    fn locate(&self, id: &str, email: &str) -> SnapshotLocation {
        let email = archive_token(email);
        SnapshotLocation::Archive {
            config_path: self
                .configs_dir
                .join(format!(".claude-config-{id}-{email}.json")),
            secret: self.store.archive_ref(id, &email),
        }
    }

    fn read_named(&self, location: &SnapshotLocation) -> Result<Snapshot> {
        let (config_path, secret_ref) = Self::archive_parts(location)?;
        if !config_path.is_file() {
            return Err(CoreError::SnapshotMissing(config_path.display().to_string()));
        }
        let raw = fs::read_to_string(config_path)?;
        let json: Value = serde_json::from_str(&raw).map_err(|e| {
            CoreError::Config(format!(
                "Failed to parse archived config {}: {e}",
                config_path.display()
            ))
        })?;
        let secret = self.store.read(secret_ref)?.ok_or_else(|| {
            CoreError::SnapshotMissing(format!("credentials for {}", config_path.display()))
        })?;

        let email = identity_of(&json)
            .map(|i| i.email)
            .unwrap_or_else(|| super::UNKNOWN_EMAIL.to_string());
        let mut snapshot = Snapshot::new(email);
        snapshot
            .entries
            .insert(CONFIG_ENTRY.to_string(), Value::String(raw));
        snapshot
            .entries
            .insert(CREDENTIALS_ENTRY.to_string(), Value::String(secret));
        if let Ok(meta) = fs::metadata(config_path).and_then(|m| m.modified()) {
            snapshot.backup_time = meta.into();
        }
        Ok(snapshot)
    }

    fn write_named(&self, location: &SnapshotLocation, snapshot: &Snapshot) -> Result<()> {
        let (config_path, secret_ref) = Self::archive_parts(location)?;
        let raw = snapshot
            .get_str(CONFIG_ENTRY)
            .ok_or_else(|| CoreError::Message("snapshot has no config".to_string()))?;
        let secret = snapshot
            .get_str(CREDENTIALS_ENTRY)
            .ok_or_else(|| CoreError::Message("snapshot has no credentials".to_string()))?;

        if let Some(parent) = config_path.parent() {
            config::ensure_private_dir(parent)?;
        }
        self.store.write(secret_ref, secret)?;
        config::write_private_file(config_path, raw.as_bytes())?;
        log::info!("Archived config: {}", config_path.display());
        Ok(())
    }

    fn snapshot_exists(&self, location: &SnapshotLocation) -> bool {
        let Ok((config_path, secret_ref)) = Self::archive_parts(location) else {
            return false;
        };
        config_path.is_file() && matches!(self.store.read(secret_ref), Ok(Some(_)))
    }

    fn remove_named(&self, location: &SnapshotLocation) -> Result<()> {
        let (config_path, secret_ref) = Self::archive_parts(location)?;
        let mut failures = Vec::new();

        if config_path.exists() {
            if let Err(e) = fs::remove_file(config_path) {
                failures.push(format!("{}: {e}", config_path.display()));
            }
        }
        if let Err(e) = self.store.delete(secret_ref) {
            failures.push(e.to_string());
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Message(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_replaces_only_identity() {
        let mut live = json!({
            "theme": "dark",
            "numStartups": 12,
            "oauthAccount": {"emailAddress": "a@x.com", "accountUuid": "ua"}
        });
        let archived = json!({
            "theme": "light",
            "oauthAccount": {"emailAddress": "b@x.com", "accountUuid": "ub"}
        });

        merge_identity(&mut live, &archived).unwrap();
        assert_eq!(live["theme"], "dark");
        assert_eq!(live["numStartups"], 12);
        assert_eq!(live["oauthAccount"]["emailAddress"], "b@x.com");
    }

    #[test]
    fn merge_without_identity_is_noop() {
        let mut live = json!({"theme": "dark"});
        merge_identity(&mut live, &json!({"other": 1})).unwrap();
        assert_eq!(live, json!({"theme": "dark"}));
    }

    #[test]
    fn archive_token_strips_separators() {
        assert_eq!(archive_token("a@x.com"), "a@x.com");
        assert_eq!(archive_token("../../evil/a@x.com"), ".._.._evil_a@x.com");
        assert_eq!(archive_token("a\\b@x.com"), "a_b@x.com");
    }

    #[test]
    fn identity_requires_email() {
        assert!(identity_of(&json!({"oauthAccount": {"accountUuid": "u"}})).is_none());
        let identity =
            identity_of(&json!({"oauthAccount": {"emailAddress": "a@x.com", "accountUuid": "u"}}))
                .unwrap();
        assert_eq!(identity.email, "a@x.com");
        assert_eq!(identity.account_uuid.as_deref(), Some("u"));
    }
}
