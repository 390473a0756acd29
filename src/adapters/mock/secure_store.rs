//! In-memory secure store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::traits::{SecureStore, SecureStoreError};

/// In-memory secure store for testing.
///
/// Clones share the same slots, so a test can keep one handle for
/// inspection while the code under test owns another.
///
/// # Example
///
/// ```ignore
/// use wpcreds::adapters::mock::InMemorySecureStore;
/// use wpcreds::traits::SecureStore;
///
/// let store = InMemorySecureStore::new();
/// store.set_value("key", Some("value")).await?;
/// assert_eq!(store.get("key"), Some("value".to_string()));
/// assert_eq!(store.write_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySecureStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    read_should_fail: Arc<AtomicBool>,
    write_should_fail: Arc<AtomicBool>,
}

impl InMemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a slot directly, without counting it as a read.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    /// Seed a slot directly, without counting it as a write.
    pub fn insert(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    /// Number of `get_value` calls so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `set_value` calls so far, failed ones included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_read_should_fail(&self, should_fail: bool) {
        self.read_should_fail.store(should_fail, Ordering::SeqCst);
    }

    pub fn set_write_should_fail(&self, should_fail: bool) {
        self.write_should_fail.store(should_fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SecureStore for InMemorySecureStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, SecureStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.read_should_fail.load(Ordering::SeqCst) {
            return Err(SecureStoreError::ReadFailed("Mock read failure".to_string()));
        }
        Ok(self.get(key))
    }

    async fn set_value(&self, key: &str, value: Option<&str>) -> Result<(), SecureStoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.write_should_fail.load(Ordering::SeqCst) {
            return Err(SecureStoreError::WriteFailed("Mock write failure".to_string()));
        }

        let mut values = self.values.lock().unwrap();
        match value {
            Some(value) => {
                values.insert(key.to_string(), value.to_string());
            }
            None => {
                values.remove(key);
            }
        }
        Ok(())
    }
}
