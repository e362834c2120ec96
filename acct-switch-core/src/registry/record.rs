//! Account records and the registry document.

use crate::backend::{SnapshotLocation, UNKNOWN_EMAIL};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Stable external key of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_uuid: Option<String>,
}

impl AccountIdentity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            account_uuid: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.email == UNKNOWN_EMAIL
    }
}

/// One saved account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_uuid: Option<String>,
    pub snapshot: SnapshotLocation,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// How ids are minted and how listings are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryFlavor {
    /// Random UUIDs, listed most recently used first.
    Uuid,
    /// `1, 2, 3, ...`, listed by number.
    Sequence,
}

/// Whole registry as persisted on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sequence: Vec<String>,
    #[serde(default)]
    pub accounts: IndexMap<String, AccountRecord>,
}

impl RegistryDocument {
    pub fn find_by_email(&self, email: &str) -> Option<&AccountRecord> {
        self.accounts.values().find(|record| record.email == email)
    }

    pub fn next_id(&self, flavor: RegistryFlavor) -> String {
        match flavor {
            RegistryFlavor::Uuid => loop {
                let id = uuid::Uuid::new_v4().to_string();
                if !self.accounts.contains_key(&id) {
                    return id;
                }
            },
            RegistryFlavor::Sequence => {
                let max = self
                    .accounts
                    .keys()
                    .filter_map(|id| id.parse::<u64>().ok())
                    .max()
                    .unwrap_or(0);
                (max + 1).to_string()
            }
        }
    }

    /// Restore the document's invariants: every sequenced id has a record,
    /// every record is sequenced, and the active marker names a known id.
    pub fn normalize(&mut self) {
        let accounts = &self.accounts;
        self.sequence.retain(|id| accounts.contains_key(id));
        let mut seen = std::collections::HashSet::new();
        self.sequence.retain(|id| seen.insert(id.clone()));
        for id in self.accounts.keys() {
            if !self.sequence.contains(id) {
                self.sequence.push(id.clone());
            }
        }
        if let Some(active) = &self.active_account {
            if !self.accounts.contains_key(active) {
                self.active_account = None;
            }
        }
    }

    /// Records in display order for `flavor`.
    pub fn ordered(&self, flavor: RegistryFlavor) -> Vec<AccountRecord> {
        let mut records: Vec<AccountRecord> = self.accounts.values().cloned().collect();
        match flavor {
            RegistryFlavor::Uuid => records.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at)),
            RegistryFlavor::Sequence => records.sort_by(|a, b| {
                let a_num = a.id.parse::<u64>().unwrap_or(u64::MAX);
                let b_num = b.id.parse::<u64>().unwrap_or(u64::MAX);
                a_num.cmp(&b_num).then_with(|| a.id.cmp(&b.id))
            }),
        }
        records
    }
}

/// Display name for a new account: the email's local part, or a
/// timestamped placeholder when the email is unknown.
pub fn derive_display_name(email: &str, now: DateTime<Utc>) -> String {
    if email != UNKNOWN_EMAIL {
        if let Some(local) = email.split('@').next().filter(|s| !s.is_empty()) {
            return local.to_string();
        }
    }
    format!("Account_{}", now.timestamp())
}
