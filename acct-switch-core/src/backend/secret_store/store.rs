//! Native secret storage
//!
//! macOS keeps credentials as generic-password items in the login
//! keychain, reached through `keyring`. Elsewhere credentials live in
//! owner-only files.

use crate::backend::SecretRef;
use crate::config;
use crate::error::{CoreError, Result};
use std::fs;
use std::path::PathBuf;

pub trait SecretStore: Send + Sync {
    /// Where the app reads its active credentials from.
    fn live_ref(&self) -> SecretRef;

    /// Archive slot for one account.
    fn archive_ref(&self, id: &str, email: &str) -> SecretRef;

    fn read(&self, secret: &SecretRef) -> Result<Option<String>>;

    fn write(&self, secret: &SecretRef, value: &str) -> Result<()>;

    fn delete(&self, secret: &SecretRef) -> Result<()>;
}

/// Generic-password items keyed by (service, login user).
pub struct KeychainStore {
    live_service: String,
    archive_prefix: String,
    account: String,
}

impl KeychainStore {
    pub fn new(live_service: &str, archive_prefix: &str) -> Self {
        Self {
            live_service: live_service.to_string(),
            archive_prefix: archive_prefix.to_string(),
            account: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
        }
    }

    fn entry(&self, secret: &SecretRef) -> Result<(keyring::Entry, String)> {
        match secret {
            SecretRef::Keychain { service } => keyring::Entry::new(service, &self.account)
                .map(|entry| (entry, service.clone()))
                .map_err(|e| keychain_error("open", service, e)),
            SecretRef::File { path } => Err(CoreError::SecretStore(format!(
                "Keychain store cannot access file secret {}",
                path.display()
            ))),
        }
    }
}

fn keychain_error(action: &str, service: &str, err: keyring::Error) -> CoreError {
    CoreError::SecretStore(format!("Failed to {action} keychain item {service}: {err}"))
}

impl SecretStore for KeychainStore {
    fn live_ref(&self) -> SecretRef {
        SecretRef::Keychain {
            service: self.live_service.clone(),
        }
    }

    fn archive_ref(&self, id: &str, email: &str) -> SecretRef {
        SecretRef::Keychain {
            service: format!("{}-{id}-{email}", self.archive_prefix),
        }
    }

    fn read(&self, secret: &SecretRef) -> Result<Option<String>> {
        let (entry, service) = self.entry(secret)?;
        match entry.get_password() {
            Ok(value) if value.trim().is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keychain_error("read", &service, e)),
        }
    }

    fn write(&self, secret: &SecretRef, value: &str) -> Result<()> {
        let (entry, service) = self.entry(secret)?;
        entry
            .set_password(value)
            .map_err(|e| keychain_error("write", &service, e))
    }

    fn delete(&self, secret: &SecretRef) -> Result<()> {
        let (entry, service) = self.entry(secret)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(keychain_error("delete", &service, e)),
        }
    }
}

/// Credentials kept as owner-only (0600) files inside owner-only (0700)
/// directories.
pub struct FileSecretStore {
    live_path: PathBuf,
    archive_dir: PathBuf,
    archive_prefix: String,
}

impl FileSecretStore {
    pub fn new(live_path: PathBuf, archive_dir: PathBuf, archive_prefix: &str) -> Self {
        Self {
            live_path,
            archive_dir,
            archive_prefix: archive_prefix.to_string(),
        }
    }

    fn path<'a>(&self, secret: &'a SecretRef) -> Result<&'a PathBuf> {
        match secret {
            SecretRef::File { path } => Ok(path),
            SecretRef::Keychain { service } => Err(CoreError::SecretStore(format!(
                "File store cannot access keychain item {service}"
            ))),
        }
    }
}

impl SecretStore for FileSecretStore {
    fn live_ref(&self) -> SecretRef {
        SecretRef::File {
            path: self.live_path.clone(),
        }
    }

    fn archive_ref(&self, id: &str, email: &str) -> SecretRef {
        SecretRef::File {
            path: self
                .archive_dir
                .join(format!("{}-{id}-{email}.json", self.archive_prefix)),
        }
    }

    fn read(&self, secret: &SecretRef) -> Result<Option<String>> {
        let path = self.path(secret)?;
        match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::SecretStore(format!(
                "Reading {} failed: {e}",
                path.display()
            ))),
        }
    }

    fn write(&self, secret: &SecretRef, value: &str) -> Result<()> {
        let path = self.path(secret)?;
        if let Some(parent) = path.parent() {
            if parent.starts_with(&self.archive_dir) {
                config::ensure_private_dir(parent)?;
            } else {
                fs::create_dir_all(parent)?;
            }
        }
        config::write_private_file(path, value.as_bytes())
    }

    fn delete(&self, secret: &SecretRef) -> Result<()> {
        let path = self.path(secret)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trip_and_delete() {
        let temp = TempDir::new().unwrap();
        let store = FileSecretStore::new(
            temp.path().join(".claude/.credentials.json"),
            temp.path().join("credentials"),
            ".claude-credentials",
        );

        let slot = store.archive_ref("3", "a@x.com");
        assert_eq!(
            slot,
            SecretRef::File {
                path: temp
                    .path()
                    .join("credentials/.claude-credentials-3-a@x.com.json")
            }
        );
        assert_eq!(store.read(&slot).unwrap(), None);

        store.write(&slot, "{\"token\":\"t\"}").unwrap();
        assert_eq!(store.read(&slot).unwrap().as_deref(), Some("{\"token\":\"t\"}"));

        store.delete(&slot).unwrap();
        store.delete(&slot).unwrap();
        assert_eq!(store.read(&slot).unwrap(), None);
    }

    #[test]
    fn keychain_names_encode_account() {
        let store = KeychainStore::new("Claude Code-credentials", "Claude Code-Account");
        assert_eq!(
            store.archive_ref("2", "b@x.com"),
            SecretRef::Keychain {
                service: "Claude Code-Account-2-b@x.com".to_string()
            }
        );
    }

    // Off macOS `keyring` falls back to its in-memory mock store.
    #[cfg(not(target_os = "macos"))]
    #[test]
    fn keychain_missing_item_reads_as_none() {
        let store = KeychainStore::new("acct-switch-test", "acct-switch-test-Account");
        let slot = store.archive_ref("9", "nobody@x.com");
        assert_eq!(store.read(&slot).unwrap(), None);
        store.delete(&slot).unwrap();

        let file = SecretRef::File {
            path: PathBuf::from("/tmp/x.json"),
        };
        assert!(store.read(&file).is_err());
    }

    #[test]
    fn mismatched_ref_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = FileSecretStore::new(
            temp.path().join("live.json"),
            temp.path().join("credentials"),
            ".claude-credentials",
        );
        let keychain = SecretRef::Keychain {
            service: "x".to_string(),
        };
        assert!(store.read(&keychain).is_err());
    }
}
