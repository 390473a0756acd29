//! Scripted credential authority for testing.
//!
//! Tokens are unauthorized unless marked valid or unreachable. Created
//! passwords are valid from then on, so a follow-up reconciliation finds
//! them. Creation counts include attempts that were later aborted.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::AppIdentity;
use crate::error::{ReconcileError, ReconcileResult};
use crate::passwords::{ApiRoot, Credential, CredentialAuthority, ProbeOutcome, SiteSession};
use crate::traits::DotComAccount;

#[derive(Debug, Default)]
struct State {
    /// token -> identifier, for tokens the server accepts
    valid: HashMap<String, String>,
    unreachable: HashSet<String>,
    dotcom_username: Option<String>,
    create_delay: Duration,
    probe_delay: Duration,
    create_failure: Option<ReconcileError>,
    discovery_failure: Option<ReconcileError>,
    introspect_failure: Option<ReconcileError>,
    last_session: Option<SiteSession>,
}

/// Scripted [`CredentialAuthority`].
#[derive(Debug, Clone, Default)]
pub struct MockAuthority {
    state: Arc<Mutex<State>>,
    creates: Arc<AtomicUsize>,
    dotcom_creates: Arc<AtomicUsize>,
    probes: Arc<AtomicUsize>,
    discoveries: Arc<AtomicUsize>,
}

impl MockAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `credential` on probes and introspection.
    pub fn mark_valid(&self, credential: &Credential) {
        let mut state = self.state.lock().unwrap();
        state.unreachable.remove(&credential.token);
        state
            .valid
            .insert(credential.token.clone(), credential.identifier.clone());
    }

    /// Reject `token` with 401 from now on.
    pub fn mark_revoked(&self, token: &str) {
        let mut state = self.state.lock().unwrap();
        state.valid.remove(token);
        state.unreachable.remove(token);
    }

    /// Make probes of `token` fail without a verdict.
    pub fn mark_unreachable(&self, token: &str) {
        self.state
            .lock()
            .unwrap()
            .unreachable
            .insert(token.to_string());
    }

    pub fn set_dotcom_username(&self, username: &str) {
        self.state.lock().unwrap().dotcom_username = Some(username.to_string());
    }

    /// Hold every creation for `delay` before it completes.
    pub fn set_create_delay(&self, delay: Duration) {
        self.state.lock().unwrap().create_delay = delay;
    }

    /// Hold every probe for `delay` before it reports.
    pub fn set_probe_delay(&self, delay: Duration) {
        self.state.lock().unwrap().probe_delay = delay;
    }

    pub fn set_create_failure(&self, error: Option<ReconcileError>) {
        self.state.lock().unwrap().create_failure = error;
    }

    pub fn set_discovery_failure(&self, error: Option<ReconcileError>) {
        self.state.lock().unwrap().discovery_failure = error;
    }

    pub fn set_introspect_failure(&self, error: Option<ReconcileError>) {
        self.state.lock().unwrap().introspect_failure = error;
    }

    /// Creations started through either route.
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn dotcom_create_count(&self) -> usize {
        self.dotcom_creates.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn discovery_count(&self) -> usize {
        self.discoveries.load(Ordering::SeqCst)
    }

    /// Session used by the most recent direct creation.
    pub fn last_session(&self) -> Option<SiteSession> {
        self.state.lock().unwrap().last_session.clone()
    }

    async fn create(&self) -> ReconcileResult<Credential> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.state.lock().unwrap().create_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.state.lock().unwrap().create_failure.clone() {
            return Err(error);
        }

        let credential = Credential::new(format!("created-{}", n), format!("created-token-{}", n));
        self.mark_valid(&credential);
        Ok(credential)
    }
}

#[async_trait]
impl CredentialAuthority for MockAuthority {
    async fn probe(&self, credential: &Credential, _api_root: &ApiRoot, _username: &str) -> ProbeOutcome {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.lock().unwrap().probe_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        if state.unreachable.contains(&credential.token) {
            ProbeOutcome::TransportError("connection reset".to_string())
        } else if state.valid.contains_key(&credential.token) {
            ProbeOutcome::Valid
        } else {
            ProbeOutcome::Unauthorized
        }
    }

    async fn introspect(&self, token: &str, _api_root: &ApiRoot, _username: &str) -> ReconcileResult<Credential> {
        let state = self.state.lock().unwrap();
        if let Some(error) = state.introspect_failure.clone() {
            return Err(error);
        }
        match state.valid.get(token) {
            Some(identifier) => Ok(Credential::new(identifier.clone(), token)),
            None => Err(ReconcileError::Remote {
                status: 401,
                message: "incorrect_password".to_string(),
            }),
        }
    }

    async fn discover_api_root(&self, site_url: &str) -> ReconcileResult<ApiRoot> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.state.lock().unwrap().discovery_failure.clone() {
            return Err(error);
        }
        ApiRoot::parse(&format!("{}/wp-json/", site_url.trim_end_matches('/')))
    }

    async fn fetch_dotcom_username(&self, _account: &DotComAccount, site_id: u64) -> ReconcileResult<String> {
        self.state
            .lock()
            .unwrap()
            .dotcom_username
            .clone()
            .ok_or(ReconcileError::Remote {
                status: 404,
                message: format!("no user on site {}", site_id),
            })
    }

    async fn create_via_dotcom(
        &self,
        _account: &DotComAccount,
        _site_id: u64,
        _app: &AppIdentity,
    ) -> ReconcileResult<Credential> {
        self.dotcom_creates.fetch_add(1, Ordering::SeqCst);
        self.create().await
    }

    async fn create_on_site(&self, session: &SiteSession, _app: &AppIdentity) -> ReconcileResult<Credential> {
        self.state.lock().unwrap().last_session = Some(session.clone());
        self.create().await
    }
}
