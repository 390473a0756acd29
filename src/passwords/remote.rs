//! The remote authority that validates and mints application passwords.

use async_trait::async_trait;
use std::fmt;

use super::model::Credential;
use crate::config::AppIdentity;
use crate::error::{ReconcileError, ReconcileResult};
use crate::traits::DotComAccount;

/// Result of probing one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Valid,
    /// The server explicitly rejected the credential.
    Unauthorized,
    /// The probe could not reach a verdict; the credential is kept.
    TransportError(String),
}

/// A site's REST API root.
///
/// Sites with pretty permalinks serve the API under `/wp-json/`; others only
/// answer `?rest_route=/`. Endpoints are built differently for each form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoot(String);

impl ApiRoot {
    pub fn parse(raw: &str) -> ReconcileResult<Self> {
        let url = reqwest::Url::parse(raw.trim())
            .map_err(|e| ReconcileError::InvalidResponse(format!("invalid API root {}: {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ReconcileError::InvalidResponse(format!(
                "unsupported API root scheme: {}",
                raw
            )));
        }
        Ok(Self(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn uses_rest_route(&self) -> bool {
        self.0.contains("rest_route=")
    }

    /// Build the URL of `path` (e.g. `wp/v2/users/me`) with `query` appended.
    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> String {
        // Both forms take the path after the root's trailing slash; only the
        // query separator differs.
        let mut url = format!(
            "{}/{}",
            self.0.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let mut separator = if self.uses_rest_route() { '&' } else { '?' };
        for (key, value) in query {
            url.push(separator);
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
            separator = '&';
        }
        url
    }
}

impl fmt::Display for ApiRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything needed to open a cookie session on a self-hosted site.
#[derive(Clone)]
pub struct SiteSession {
    pub site_url: String,
    pub api_root: ApiRoot,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SiteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteSession")
            .field("site_url", &self.site_url)
            .field("api_root", &self.api_root)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Remote operations the reconciler depends on.
///
/// Only the two `create_*` calls have side effects: each one leaves a new
/// password in the user's profile, so callers must route them through the
/// in-flight coordinator.
#[async_trait]
pub trait CredentialAuthority: Send + Sync {
    /// Check whether `credential` still authenticates `username` at `api_root`.
    async fn probe(&self, credential: &Credential, api_root: &ApiRoot, username: &str)
        -> ProbeOutcome;

    /// Recover the identifier of a bare token.
    async fn introspect(
        &self,
        token: &str,
        api_root: &ApiRoot,
        username: &str,
    ) -> ReconcileResult<Credential>;

    /// Find the REST API root advertised by the site at `site_url`.
    async fn discover_api_root(&self, site_url: &str) -> ReconcileResult<ApiRoot>;

    /// Look up the account's username on a WordPress.com-reachable site.
    async fn fetch_dotcom_username(
        &self,
        account: &DotComAccount,
        site_id: u64,
    ) -> ReconcileResult<String>;

    /// Mint a password through the WordPress.com Jetpack proxy.
    async fn create_via_dotcom(
        &self,
        account: &DotComAccount,
        site_id: u64,
        app: &AppIdentity,
    ) -> ReconcileResult<Credential>;

    /// Mint a password directly on the site using a cookie session.
    ///
    /// Fails with [`ReconcileError::RestApiInaccessible`] when the site's REST
    /// API cannot be reached with that session.
    async fn create_on_site(
        &self,
        session: &SiteSession,
        app: &AppIdentity,
    ) -> ReconcileResult<Credential>;
}
