//! File-backed secure store adapter.
//!
//! Stores every key in one JSON object, e.g.
//! `~/.wpcreds/secure-store.json`. Writes go through a temporary file and a
//! rename so a crash never leaves a half-written store, and the file is
//! readable by its owner only.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::traits::{SecureStore, SecureStoreError};

type Slots = BTreeMap<String, String>;

/// File-based secure store.
///
/// # Example
///
/// ```ignore
/// use wpcreds::adapters::FileSecureStore;
/// use wpcreds::traits::SecureStore;
///
/// let store = FileSecureStore::new("/home/me/.wpcreds/secure-store.json");
/// store.set_value("https://example.com/admin", Some("abcd efgh")).await?;
/// ```
#[derive(Debug)]
pub struct FileSecureStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileSecureStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt files read as empty.
    fn load(&self) -> Result<Slots, SecureStoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Slots::new()),
            Err(e) => return Err(SecureStoreError::ReadFailed(e.to_string())),
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(slots) => Ok(slots),
            Err(e) => {
                warn!(path = %self.path.display(), "Secure store is corrupt, treating as empty: {}", e);
                Ok(Slots::new())
            }
        }
    }

    fn persist(&self, slots: &Slots) -> Result<(), SecureStoreError> {
        let raw = serde_json::to_vec_pretty(slots)
            .map_err(|e| SecureStoreError::Serialization(e.to_string()))?;
        write_private_file(&self.path, &raw).map_err(|e| SecureStoreError::WriteFailed(e.to_string()))
    }
}

/// Replace `path` with `contents` through a temp file and a rename,
/// creating parent directories and restricting the file to its owner.
pub(crate) fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp)?;
        restrict_permissions(&file)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

#[cfg(unix)]
fn restrict_permissions(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &File) -> io::Result<()> {
    Ok(())
}

#[async_trait]
impl SecureStore for FileSecureStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, SecureStoreError> {
        Ok(self.load()?.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: Option<&str>) -> Result<(), SecureStoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| SecureStoreError::WriteFailed("store lock poisoned".to_string()))?;

        let mut slots = self.load()?;
        match value {
            Some(value) => {
                slots.insert(key.to_string(), value.to_string());
            }
            None => {
                if slots.remove(key).is_none() {
                    return Ok(());
                }
            }
        }
        self.persist(&slots)
    }
}
