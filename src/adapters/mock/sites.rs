//! In-memory site records for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::ReconcileError;
use crate::traits::{SiteHandle, SiteRecord, SiteRecords};

#[derive(Debug, Default)]
struct State {
    records: HashMap<SiteHandle, SiteRecord>,
    tokens: HashMap<SiteHandle, String>,
    next_handle: u64,
}

/// In-memory site records.
///
/// Clones share state. Active tokens are kept beside the records, keyed by
/// handle, so tests can seed a legacy token directly.
#[derive(Debug, Clone, Default)]
pub struct InMemorySiteRecords {
    state: Arc<Mutex<State>>,
}

impl InMemorySiteRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: SiteRecord) -> SiteHandle {
        let mut state = self.state.lock().unwrap();
        state.next_handle += 1;
        let handle = SiteHandle(state.next_handle);
        state.records.insert(handle, record);
        handle
    }

    /// Current snapshot of a record.
    pub fn get(&self, handle: SiteHandle) -> Option<SiteRecord> {
        self.state.lock().unwrap().records.get(&handle).cloned()
    }

    pub fn active_token(&self, handle: SiteHandle) -> Option<String> {
        self.state.lock().unwrap().tokens.get(&handle).cloned()
    }

    pub fn set_active_token(&self, handle: SiteHandle, token: &str) {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(handle, token.to_string());
    }

    fn with_record<T>(
        &self,
        handle: SiteHandle,
        f: impl FnOnce(&mut SiteRecord) -> T,
    ) -> Result<T, ReconcileError> {
        let mut state = self.state.lock().unwrap();
        state
            .records
            .get_mut(&handle)
            .map(f)
            .ok_or(ReconcileError::SiteNotFound(handle))
    }
}

#[async_trait]
impl SiteRecords for InMemorySiteRecords {
    async fn site(&self, handle: SiteHandle) -> Result<SiteRecord, ReconcileError> {
        self.with_record(handle, |record| record.clone())
    }

    async fn application_token(&self, handle: SiteHandle) -> Result<Option<String>, ReconcileError> {
        self.with_record(handle, |_| ())?;
        Ok(self.active_token(handle))
    }

    async fn set_application_token(&self, handle: SiteHandle, token: &str) -> Result<(), ReconcileError> {
        self.with_record(handle, |_| ())?;
        self.set_active_token(handle, token);
        Ok(())
    }

    async fn set_username(&self, handle: SiteHandle, username: &str) -> Result<(), ReconcileError> {
        self.with_record(handle, |record| record.username = Some(username.to_string()))
    }

    async fn set_rest_api_root(&self, handle: SiteHandle, root: &str) -> Result<(), ReconcileError> {
        self.with_record(handle, |record| record.rest_api_root = Some(root.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_write_back() {
        let records = InMemorySiteRecords::new();
        let handle = records.insert(SiteRecord {
            url: "https://example.com".to_string(),
            ..Default::default()
        });

        records.set_username(handle, "admin").await.unwrap();
        records.set_application_token(handle, "t").await.unwrap();

        let record = records.site(handle).await.unwrap();
        assert_eq!(record.username.as_deref(), Some("admin"));
        assert_eq!(records.application_token(handle).await.unwrap().as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn test_missing_site() {
        let records = InMemorySiteRecords::new();
        assert_eq!(
            records.site(SiteHandle(3)).await,
            Err(ReconcileError::SiteNotFound(SiteHandle(3)))
        );
        assert!(records.set_application_token(SiteHandle(3), "t").await.is_err());
    }
}
