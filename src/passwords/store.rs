//! Keychain-backed storage of every known application password.
//!
//! All entries share a single secure-storage slot holding a JSON array, so
//! two unsynchronized writers would silently drop each other's updates.
//! Every operation therefore runs under one fair async mutex, which also
//! guards the lazily loaded copy of the list.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::model::{Credential, Owner, StoredEntry};
use crate::error::{ReconcileError, ReconcileResult};
use crate::traits::SecureStore;

/// Secure-storage key of the entry list. Do not change: existing installs
/// keep their passwords under it.
pub const APPLICATION_PASSWORDS_KEY: &str =
    "com.automattic.sites.ApplicationPasswords/ApplicationPasswords";

pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
    /// `None` until the slot is first read.
    entries: Mutex<Option<Vec<StoredEntry>>>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self {
            secure_store,
            entries: Mutex::new(None),
        }
    }

    /// Insert `entry`, replacing any entry with the same identifier.
    pub async fn save(&self, entry: StoredEntry) -> ReconcileResult<()> {
        let mut cached = self.entries.lock().await;
        let mut entries = self.load_locked(&mut cached).await.clone();

        match entries.iter().position(|existing| existing.id() == entry.id()) {
            Some(index) => entries[index] = entry,
            None => entries.push(entry),
        }

        self.write_locked(&mut cached, entries).await
    }

    /// Remove every entry whose identifier matches one of `credentials`.
    pub async fn delete(&self, credentials: &[Credential]) -> ReconcileResult<()> {
        if credentials.is_empty() {
            return Ok(());
        }

        let mut cached = self.entries.lock().await;
        let mut entries = self.load_locked(&mut cached).await.clone();
        let before = entries.len();
        entries.retain(|entry| {
            !credentials
                .iter()
                .any(|credential| credential.identifier == entry.id())
        });
        debug!(removed = before - entries.len(), "Deleting application passwords");

        self.write_locked(&mut cached, entries).await
    }

    /// Every stored entry. Unreadable or corrupt data reads as empty.
    pub async fn all_entries(&self) -> Vec<StoredEntry> {
        let mut cached = self.entries.lock().await;
        self.load_locked(&mut cached).await.clone()
    }

    /// Credentials of entries belonging to any of `owners`.
    pub async fn credentials_for(&self, owners: &[Owner]) -> Vec<Credential> {
        let mut cached = self.entries.lock().await;
        self.load_locked(&mut cached)
            .await
            .iter()
            .filter(|entry| entry.belongs_to_any(owners))
            .map(|entry| entry.credential.clone())
            .collect()
    }

    async fn load_locked<'a>(
        &self,
        cached: &'a mut Option<Vec<StoredEntry>>,
    ) -> &'a Vec<StoredEntry> {
        if cached.is_none() {
            *cached = Some(self.read_slot().await);
        }
        cached.get_or_insert_with(Vec::new)
    }

    async fn read_slot(&self) -> Vec<StoredEntry> {
        let raw = match self.secure_store.get_value(APPLICATION_PASSWORDS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read application passwords, treating as empty: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Stored application passwords are corrupt, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Persist `entries` and update the cached copy only once the write succeeded.
    async fn write_locked(
        &self,
        cached: &mut Option<Vec<StoredEntry>>,
        entries: Vec<StoredEntry>,
    ) -> ReconcileResult<()> {
        let raw = serde_json::to_string(&entries)
            .map_err(|e| ReconcileError::Storage(e.to_string()))?;
        self.secure_store
            .set_value(APPLICATION_PASSWORDS_KEY, Some(&raw))
            .await?;
        *cached = Some(entries);
        Ok(())
    }
}
