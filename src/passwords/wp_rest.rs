//! WordPress REST implementation of [`CredentialAuthority`].
//!
//! Talks to three surfaces:
//! - the site's own REST API (probe, introspection, direct creation)
//! - the site's login and admin pages (cookie session + REST nonce)
//! - the WordPress.com public API (username lookup, Jetpack proxy creation)

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::model::Credential;
use super::remote::{ApiRoot, CredentialAuthority, ProbeOutcome, SiteSession};
use crate::config::{AppIdentity, DOTCOM_API_URL};
use crate::error::{ReconcileError, ReconcileResult};
use crate::traits::{DotComAccount, Headers, HttpClient, Response};

const INTROSPECT_PATH: &str = "wp/v2/users/me/application-passwords/introspect";
const PASSWORDS_PATH: &str = "wp/v2/users/me/application-passwords";
const USERS_ME_PATH: &str = "wp/v2/users/me";

/// `Link: <https://example.com/wp-json/>; rel="https://api.w.org/"`
static API_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<([^>]+)>\s*;\s*rel="https://api\.w\.org/""#).expect("valid link regex")
});

/// `var wpApiSettings = {"root":"...","nonce":"abc123",...};`
static WP_API_SETTINGS_NONCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"wpApiSettings\s*=\s*\{[^}]*"nonce"\s*:\s*"([A-Za-z0-9]+)""#)
        .expect("valid nonce regex")
});

#[derive(Debug, Deserialize)]
struct WpErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsernameBody {
    username: String,
}

#[derive(Debug, Deserialize)]
struct JetpackProxyBody {
    data: Credential,
}

/// Credential authority backed by the WordPress REST API.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use wpcreds::adapters::ReqwestHttpClient;
/// use wpcreds::passwords::WpRestAuthority;
///
/// let authority = WpRestAuthority::new(Arc::new(ReqwestHttpClient::new()?));
/// let root = authority.discover_api_root("https://example.com").await?;
/// ```
pub struct WpRestAuthority<C: HttpClient> {
    client: Arc<C>,
    dotcom_api_base: String,
}

impl<C: HttpClient> WpRestAuthority<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            dotcom_api_base: DOTCOM_API_URL.to_string(),
        }
    }

    /// Send WordPress.com calls to another base URL.
    pub fn with_dotcom_api_base(mut self, base: impl Into<String>) -> Self {
        self.dotcom_api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn basic_auth(username: &str, token: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Basic {}", BASE64.encode(format!("{}:{}", username, token))),
        );
        headers
    }

    fn bearer(token: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        headers
    }

    fn json_body(headers: &mut Headers) {
        headers.insert("Content-Type".to_string(), "application/json".to_string());
    }

    /// Map a non-2xx response to `Remote`, preferring the WP error message.
    fn remote_error(response: &Response) -> ReconcileError {
        let message = response
            .json::<WpErrorBody>()
            .ok()
            .and_then(|body| body.message.or(body.code))
            .unwrap_or_else(|| {
                let text = String::from_utf8_lossy(&response.body);
                text.chars().take(200).collect()
            });
        ReconcileError::Remote {
            status: response.status,
            message,
        }
    }

    fn parse_credential(response: &Response) -> ReconcileResult<Credential> {
        response
            .json::<Credential>()
            .map_err(|e| ReconcileError::InvalidResponse(format!("application password: {}", e)))
    }

    async fn introspect_request(
        &self,
        token: &str,
        api_root: &ApiRoot,
        username: &str,
    ) -> ReconcileResult<Response> {
        let url = api_root.endpoint(INTROSPECT_PATH, &[("context", "view")]);
        Ok(self
            .client
            .get(&url, &Self::basic_auth(username, token))
            .await?)
    }

    async fn log_in(&self, session: &SiteSession) -> ReconcileResult<()> {
        let site = session.site_url.trim_end_matches('/');
        let redirect_to = format!("{}/wp-admin/", site);
        let form = [
            ("log", session.username.as_str()),
            ("pwd", session.password.as_str()),
            ("rememberme", "true"),
            ("redirect_to", redirect_to.as_str()),
        ]
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

        let mut headers = Headers::new();
        headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );

        let response = self
            .client
            .post(&format!("{}/wp-login.php", site), &form, &headers)
            .await?;
        debug!(status = response.status, "wp-login responded");
        Ok(())
    }

    /// Fetch a REST nonce for the logged-in session.
    async fn fetch_nonce(&self, site_url: &str) -> ReconcileResult<String> {
        let site = site_url.trim_end_matches('/');

        match self
            .client
            .get(
                &format!("{}/wp-admin/admin-ajax.php?action=rest-nonce", site),
                &Headers::new(),
            )
            .await
        {
            Ok(response) if response.is_success() => {
                let body = response.text().unwrap_or_default();
                let nonce = body.trim();
                if !nonce.is_empty()
                    && nonce != "0"
                    && nonce.chars().all(|c| c.is_ascii_alphanumeric())
                {
                    return Ok(nonce.to_string());
                }
                debug!("admin-ajax returned no nonce, falling back to post-new.php");
            }
            Ok(response) => {
                debug!(status = response.status, "admin-ajax nonce request rejected");
            }
            Err(e) => {
                debug!("admin-ajax nonce request failed: {}", e);
            }
        }

        let response = self
            .client
            .get(&format!("{}/wp-admin/post-new.php", site), &Headers::new())
            .await?;
        let page = response.text().unwrap_or_default();
        WP_API_SETTINGS_NONCE_RE
            .captures(&page)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or(ReconcileError::RestApiInaccessible)
    }

    /// Confirm the cookie session can reach `users/me`.
    ///
    /// Transport failures are not conclusive here and are let through; the
    /// creation request that follows reports them.
    async fn check_rest_access(&self, api_root: &ApiRoot, nonce_headers: &Headers) -> ReconcileResult<()> {
        let url = api_root.endpoint(USERS_ME_PATH, &[("context", "edit")]);
        let response = match self.client.get(&url, nonce_headers).await {
            Ok(response) => response,
            Err(e) => {
                warn!("REST access check failed, attempting creation anyway: {}", e);
                return Ok(());
            }
        };

        if !response.is_success() {
            debug!(status = response.status, "users/me rejected the session");
            return Err(ReconcileError::RestApiInaccessible);
        }

        match response.json::<serde_json::Value>() {
            Ok(body) => {
                if body.get("code").and_then(|c| c.as_str()) == Some("rest_not_logged_in") {
                    return Err(ReconcileError::RestApiInaccessible);
                }
                Ok(())
            }
            Err(_) => Err(ReconcileError::RestApiInaccessible),
        }
    }
}

#[async_trait]
impl<C: HttpClient + 'static> CredentialAuthority for WpRestAuthority<C> {
    async fn probe(&self, credential: &Credential, api_root: &ApiRoot, username: &str) -> ProbeOutcome {
        match self
            .introspect_request(&credential.token, api_root, username)
            .await
        {
            Ok(response) if response.is_success() => ProbeOutcome::Valid,
            Ok(response) if response.status == 401 => ProbeOutcome::Unauthorized,
            Ok(response) => ProbeOutcome::TransportError(format!("HTTP {}", response.status)),
            Err(e) => ProbeOutcome::TransportError(e.to_string()),
        }
    }

    async fn introspect(
        &self,
        token: &str,
        api_root: &ApiRoot,
        username: &str,
    ) -> ReconcileResult<Credential> {
        let response = self.introspect_request(token, api_root, username).await?;
        if !response.is_success() {
            return Err(Self::remote_error(&response));
        }

        #[derive(Deserialize)]
        struct Introspection {
            uuid: String,
        }

        let body: Introspection = response
            .json()
            .map_err(|e| ReconcileError::InvalidResponse(format!("introspection: {}", e)))?;
        Ok(Credential::new(body.uuid, token))
    }

    async fn discover_api_root(&self, site_url: &str) -> ReconcileResult<ApiRoot> {
        let site = site_url.trim_end_matches('/');
        let response = self.client.get(site, &Headers::new()).await?;

        if let Some(link) = response.header("link") {
            if let Some(root) = API_LINK_RE.captures(link).and_then(|caps| caps.get(1)) {
                debug!(site = %site, root = %root.as_str(), "Discovered REST API root from Link header");
                return ApiRoot::parse(root.as_str());
            }
        }

        let fallback = format!("{}/wp-json/", site);
        let failed = |message: String| ReconcileError::ApiDiscoveryFailed {
            site_url: site_url.to_string(),
            message,
        };

        let response = self.client.get(&fallback, &Headers::new()).await?;
        if !response.is_success() {
            return Err(failed(format!("no Link header and {} returned HTTP {}", fallback, response.status)));
        }

        let index: serde_json::Value = response
            .json()
            .map_err(|_| failed(format!("{} is not a REST API index", fallback)))?;
        if index.get("namespaces").map_or(false, |ns| ns.is_array()) {
            ApiRoot::parse(&fallback)
        } else {
            Err(failed(format!("{} is not a REST API index", fallback)))
        }
    }

    async fn fetch_dotcom_username(&self, account: &DotComAccount, site_id: u64) -> ReconcileResult<String> {
        let url = format!(
            "{}/wp/v2/sites/{}/users/me?context=edit",
            self.dotcom_api_base, site_id
        );
        let response = self.client.get(&url, &Self::bearer(&account.auth_token)).await?;
        if !response.is_success() {
            return Err(Self::remote_error(&response));
        }

        let body: UsernameBody = response
            .json()
            .map_err(|e| ReconcileError::InvalidResponse(format!("users/me: {}", e)))?;
        Ok(body.username)
    }

    async fn create_via_dotcom(
        &self,
        account: &DotComAccount,
        site_id: u64,
        app: &AppIdentity,
    ) -> ReconcileResult<Credential> {
        let url = format!(
            "{}/rest/v1.1/jetpack-blogs/{}/rest-api/",
            self.dotcom_api_base, site_id
        );
        let parameters = serde_json::json!({
            "app_id": app.app_id.to_string(),
            "name": app.name,
        });
        let body = serde_json::json!({
            "path": format!("/{}&_method=post", PASSWORDS_PATH),
            "body": parameters.to_string(),
            "json": true,
        });

        let mut headers = Self::bearer(&account.auth_token);
        Self::json_body(&mut headers);

        let response = self.client.post(&url, &body.to_string(), &headers).await?;
        if !response.is_success() {
            return Err(Self::remote_error(&response));
        }

        let proxied: JetpackProxyBody = response
            .json()
            .map_err(|e| ReconcileError::InvalidResponse(format!("jetpack proxy: {}", e)))?;
        info!(site_id, "Created application password through WordPress.com");
        Ok(proxied.data)
    }

    async fn create_on_site(&self, session: &SiteSession, app: &AppIdentity) -> ReconcileResult<Credential> {
        self.log_in(session).await?;
        let nonce = self.fetch_nonce(&session.site_url).await?;

        let mut headers = Headers::new();
        headers.insert("X-WP-Nonce".to_string(), nonce);
        self.check_rest_access(&session.api_root, &headers).await?;

        Self::json_body(&mut headers);
        let body = serde_json::json!({
            "app_id": app.app_id.to_string(),
            "name": app.name,
        });
        let url = session.api_root.endpoint(PASSWORDS_PATH, &[]);
        let response = self.client.post(&url, &body.to_string(), &headers).await?;
        if !response.is_success() {
            return Err(Self::remote_error(&response));
        }

        let credential = Self::parse_credential(&response)?;
        info!(site = %session.site_url, "Created application password on site");
        Ok(credential)
    }
}
