//! Credential backends - reading and writing a managed app's account state
//!
//! ## Architecture
//!
//! ```text
//! backend/
//! ├── mod.rs          - Snapshot types + CredentialBackend trait
//! ├── email.rs        - Ordered email detection strategies
//! ├── kv_store/       - Embedded key-value database (Antigravity)
//! └── secret_store/   - OS secret store + JSON config file (Claude Code)
//! ```
//!
//! Callers never branch on the backend kind: the orchestrator only sees
//! `dyn CredentialBackend`.

pub mod email;
pub mod kv_store;
pub mod secret_store;

use crate::error::Result;
use crate::outcome::Outcome;
use crate::registry::AccountIdentity;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

pub use email::EmailStrategy;
pub use kv_store::KvStoreBackend;
pub use secret_store::{FileSecretStore, KeychainStore, SecretStore, SecretStoreBackend};

/// Email recorded when none was given and none could be detected.
pub const UNKNOWN_EMAIL: &str = "Unknown";

/// Point-in-time capture of an account's state.
///
/// Serialized as a flat JSON object: the captured keys next to the
/// `account_email` / `backup_time` metadata fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(flatten)]
    pub entries: IndexMap<String, Value>,
    pub account_email: String,
    pub backup_time: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(account_email: impl Into<String>) -> Self {
        Self {
            entries: IndexMap::new(),
            account_email: account_email.into(),
            backup_time: Utc::now(),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }
}

/// Reference to one secret in a secret store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "store", rename_all = "snake_case")]
pub enum SecretRef {
    /// Generic password item in the macOS keychain.
    Keychain { service: String },
    /// Owner-only file on disk.
    File { path: PathBuf },
}

/// Where an account's archived snapshot lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotLocation {
    /// A single snapshot JSON document.
    Document { path: PathBuf },
    /// Archived config file plus archived secret.
    Archive {
        config_path: PathBuf,
        secret: SecretRef,
    },
}

/// Storage strategy for one managed app's account state.
pub trait CredentialBackend: Send + Sync {
    /// Identity of the account currently live, if it can be detected.
    fn detect_identity(&self) -> Option<AccountIdentity>;

    /// Capture the live state.
    fn read_current(&self) -> Result<Snapshot>;

    /// Install `snapshot` as the live state. Partial when some replicas
    /// could not be written.
    fn write_current(&self, snapshot: &Snapshot) -> Result<Outcome<()>>;

    /// Deterministic archive location for an account.
    fn locate(&self, id: &str, email: &str) -> SnapshotLocation;

    fn read_named(&self, location: &SnapshotLocation) -> Result<Snapshot>;

    fn write_named(&self, location: &SnapshotLocation, snapshot: &Snapshot) -> Result<()>;

    fn snapshot_exists(&self, location: &SnapshotLocation) -> bool;

    fn remove_named(&self, location: &SnapshotLocation) -> Result<()>;
}
