//! Common test utilities for integration tests.
//!
//! Builds a repository over the in-memory adapters and seeds the secure
//! storage slot the way an existing install would have it.
//!
//! # Example
//!
//! ```ignore
//! let h = Harness::new();
//! let site = h.sites.insert(self_hosted_site());
//! h.repository.ensure_valid(site).await?;
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use wpcreds::adapters::mock::{InMemorySecureStore, InMemorySiteRecords, MockAuthority};
use wpcreds::config::ReconcilerConfig;
use wpcreds::passwords::{
    owners_of, ApplicationPasswordRepository, Credential, StoredEntry, APPLICATION_PASSWORDS_KEY,
};
use wpcreds::traits::{DotComAccount, SiteHandle, SiteRecord};

pub const SITE_URL: &str = "https://example.com";
pub const API_ROOT: &str = "https://example.com/wp-json/";

/// Repository wired to in-memory adapters, with handles on each of them.
pub struct Harness {
    pub secure: InMemorySecureStore,
    pub sites: InMemorySiteRecords,
    pub authority: MockAuthority,
    pub repository: ApplicationPasswordRepository,
}

impl Harness {
    pub fn new() -> Self {
        let secure = InMemorySecureStore::new();
        let sites = InMemorySiteRecords::new();
        let authority = MockAuthority::new();
        let repository = ApplicationPasswordRepository::new(
            Arc::new(secure.clone()),
            Arc::new(authority.clone()),
            Arc::new(sites.clone()),
            ReconcilerConfig::default().app,
        );
        Self {
            secure,
            sites,
            authority,
            repository,
        }
    }

    /// Write `entries` straight into the secure storage slot.
    pub fn seed(&self, entries: &[StoredEntry]) {
        let raw = serde_json::to_string(entries).expect("entries serialize");
        self.secure.insert(APPLICATION_PASSWORDS_KEY, &raw);
    }

    /// Seed `credentials` as entries owned by `site`'s current owners.
    pub fn seed_for_site(&self, site: SiteHandle, credentials: &[Credential]) {
        let record = self.sites.get(site).expect("site exists");
        let owners = owners_of(&record);
        let entries: Vec<StoredEntry> = credentials
            .iter()
            .map(|credential| StoredEntry::new(credential.clone(), owners.clone()))
            .collect();
        self.seed(&entries);
    }

    /// Entries currently persisted in the slot, bypassing any cache.
    pub fn persisted(&self) -> Vec<StoredEntry> {
        self.secure
            .get(APPLICATION_PASSWORDS_KEY)
            .map(|raw| serde_json::from_str(&raw).expect("slot holds entries"))
            .unwrap_or_default()
    }

    pub fn persisted_ids(&self) -> Vec<String> {
        self.persisted()
            .iter()
            .map(|entry| entry.id().to_string())
            .collect()
    }
}

/// Self-hosted site with a primary password and a cached API root.
pub fn self_hosted_site() -> SiteRecord {
    SiteRecord::self_hosted(SITE_URL, "admin")
        .with_password("primary-password")
        .with_rest_api_root(API_ROOT)
}

/// Site added through a WordPress.com account, username not yet known.
pub fn dotcom_site(site_id: u64) -> SiteRecord {
    SiteRecord {
        url: "https://atomic.example".to_string(),
        ..Default::default()
    }
    .with_dotcom(site_id, test_account())
}

pub fn test_account() -> DotComAccount {
    DotComAccount {
        username: "dotcomuser".to_string(),
        auth_token: "test-bearer-token".to_string(),
    }
}

/// A credential the mock authority accepts.
pub fn valid_credential(authority: &MockAuthority, id: &str) -> Credential {
    let credential = Credential::new(id, format!("{}-token", id));
    authority.mark_valid(&credential);
    credential
}

/// A credential the mock authority rejects with 401.
pub fn revoked_credential(authority: &MockAuthority, id: &str) -> Credential {
    let credential = Credential::new(id, format!("{}-token", id));
    authority.mark_revoked(&credential.token);
    credential
}
