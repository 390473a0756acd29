//! Site record accessor trait abstraction.
//!
//! The reconciler never owns site records. It reads a [`SiteRecord`]
//! snapshot, and writes back only the few cached fields it resolves
//! (username, REST API root) plus the site's active application token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ReconcileError;

/// Opaque, stable reference to a persisted site record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteHandle(pub u64);

impl fmt::Display for SiteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site#{}", self.0)
    }
}

/// A WordPress.com account that can reach the site through the Jetpack proxy.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotComAccount {
    pub username: String,
    pub auth_token: String,
}

impl fmt::Debug for DotComAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DotComAccount")
            .field("username", &self.username)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// Snapshot of the site fields the reconciler needs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    /// Site base URL, e.g. `https://example.com`.
    pub url: String,
    /// Username on the site itself, if known.
    #[serde(default)]
    pub username: Option<String>,
    /// Primary site password, used for cookie-session login.
    #[serde(default)]
    pub password: Option<String>,
    /// WordPress.com site id for Jetpack-connected or hosted sites.
    #[serde(default)]
    pub dotcom_site_id: Option<u64>,
    #[serde(default)]
    pub dotcom_account: Option<DotComAccount>,
    /// Cached REST API root, e.g. `https://example.com/wp-json/`.
    #[serde(default)]
    pub rest_api_root: Option<String>,
}

impl fmt::Debug for SiteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteRecord")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("dotcom_site_id", &self.dotcom_site_id)
            .field("dotcom_account", &self.dotcom_account)
            .field("rest_api_root", &self.rest_api_root)
            .finish()
    }
}

impl SiteRecord {
    /// Create a record for a site reachable only by address.
    pub fn self_hosted(url: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: Some(username.into()),
            ..Default::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_dotcom(mut self, site_id: u64, account: DotComAccount) -> Self {
        self.dotcom_site_id = Some(site_id);
        self.dotcom_account = Some(account);
        self
    }

    pub fn with_rest_api_root(mut self, root: impl Into<String>) -> Self {
        self.rest_api_root = Some(root.into());
        self
    }
}

/// Trait for reading and updating persisted site records.
#[async_trait]
pub trait SiteRecords: Send + Sync {
    /// Load a snapshot of the site, or `ReconcileError::SiteNotFound`.
    async fn site(&self, handle: SiteHandle) -> Result<SiteRecord, ReconcileError>;

    /// The site's active application token (the legacy single slot).
    async fn application_token(&self, handle: SiteHandle) -> Result<Option<String>, ReconcileError>;

    async fn set_application_token(
        &self,
        handle: SiteHandle,
        token: &str,
    ) -> Result<(), ReconcileError>;

    async fn set_username(&self, handle: SiteHandle, username: &str) -> Result<(), ReconcileError>;

    async fn set_rest_api_root(&self, handle: SiteHandle, root: &str) -> Result<(), ReconcileError>;
}
