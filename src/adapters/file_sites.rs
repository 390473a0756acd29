//! File-backed site records adapter.
//!
//! Site records live in `~/.wpcreds/sites.json`:
//!
//! ```json
//! { "sites": { "1": { "url": "https://example.com", "username": "admin" } } }
//! ```
//!
//! A site's active application token is a secret, so it is kept in the
//! [`SecureStore`] under `{url}/{username}` rather than in this file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::file_secure_store::write_private_file;
use crate::error::{ReconcileError, ReconcileResult};
use crate::traits::{SecureStore, SiteHandle, SiteRecord, SiteRecords};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SitesFile {
    #[serde(default)]
    sites: BTreeMap<SiteHandle, SiteRecord>,
}

/// Site records stored in a JSON file, with active tokens in a secure store.
pub struct FileSiteRecords {
    path: PathBuf,
    secure_store: Arc<dyn SecureStore>,
    write_lock: Mutex<()>,
}

impl FileSiteRecords {
    pub fn new(path: impl Into<PathBuf>, secure_store: Arc<dyn SecureStore>) -> Self {
        Self {
            path: path.into(),
            secure_store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record, ordered by handle.
    pub fn all(&self) -> ReconcileResult<Vec<(SiteHandle, SiteRecord)>> {
        Ok(self.load()?.sites.into_iter().collect())
    }

    /// Add a record under the next free handle.
    pub fn insert(&self, record: SiteRecord) -> ReconcileResult<SiteHandle> {
        let mut handle = SiteHandle(0);
        self.update(|file| {
            handle = SiteHandle(file.sites.keys().next_back().map_or(1, |last| last.0 + 1));
            file.sites.insert(handle, record);
            Ok(())
        })?;
        Ok(handle)
    }

    /// Key of the site's active token in the secure store.
    pub fn token_key(record: &SiteRecord) -> Option<String> {
        record
            .username
            .as_ref()
            .map(|username| format!("{}/{}", record.url, username))
    }

    fn load(&self) -> ReconcileResult<SitesFile> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SitesFile::default()),
            Err(e) => return Err(ReconcileError::Storage(e.to_string())),
        };

        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            warn!(path = %self.path.display(), "Site records are unreadable: {}", e);
            ReconcileError::Storage(format!("{}: {}", self.path.display(), e))
        })
    }

    fn update<F>(&self, change: F) -> ReconcileResult<()>
    where
        F: FnOnce(&mut SitesFile) -> ReconcileResult<()>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ReconcileError::Storage("site records lock poisoned".to_string()))?;

        let mut file = self.load()?;
        change(&mut file)?;

        let raw = serde_json::to_vec_pretty(&file).map_err(|e| ReconcileError::Storage(e.to_string()))?;
        write_private_file(&self.path, &raw).map_err(|e| ReconcileError::Storage(e.to_string()))
    }

    fn update_site<F>(&self, handle: SiteHandle, change: F) -> ReconcileResult<()>
    where
        F: FnOnce(&mut SiteRecord),
    {
        self.update(|file| {
            let record = file
                .sites
                .get_mut(&handle)
                .ok_or(ReconcileError::SiteNotFound(handle))?;
            change(record);
            Ok(())
        })
    }
}

#[async_trait]
impl SiteRecords for FileSiteRecords {
    async fn site(&self, handle: SiteHandle) -> Result<SiteRecord, ReconcileError> {
        self.load()?
            .sites
            .remove(&handle)
            .ok_or(ReconcileError::SiteNotFound(handle))
    }

    async fn application_token(&self, handle: SiteHandle) -> Result<Option<String>, ReconcileError> {
        let record = self.site(handle).await?;
        match Self::token_key(&record) {
            Some(key) => Ok(self.secure_store.get_value(&key).await?),
            None => Ok(None),
        }
    }

    async fn set_application_token(&self, handle: SiteHandle, token: &str) -> Result<(), ReconcileError> {
        let record = self.site(handle).await?;
        let key = Self::token_key(&record).ok_or(ReconcileError::UsernameNotFound)?;
        self.secure_store.set_value(&key, Some(token)).await?;
        debug!(site = %handle, "Stored active application token");
        Ok(())
    }

    async fn set_username(&self, handle: SiteHandle, username: &str) -> Result<(), ReconcileError> {
        self.update_site(handle, |record| record.username = Some(username.to_string()))
    }

    async fn set_rest_api_root(&self, handle: SiteHandle, root: &str) -> Result<(), ReconcileError> {
        self.update_site(handle, |record| record.rest_api_root = Some(root.to_string()))
    }
}
