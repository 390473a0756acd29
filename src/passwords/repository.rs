//! The application password reconciler.
//!
//! A site should only ever get one application password from this app, no
//! matter how it was added (WordPress.com account or site address) or how
//! many callers ask at once. [`ApplicationPasswordRepository::ensure_valid`]
//! reuses any stored password that still works, prunes revoked ones, and
//! creates a new one only when nothing usable is left.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::inflight::InFlightCoordinator;
use super::model::{owners_of, Credential, StoredEntry};
use super::remote::{ApiRoot, CredentialAuthority, ProbeOutcome, SiteSession};
use super::store::CredentialStore;
use crate::config::AppIdentity;
use crate::error::{ReconcileError, ReconcileResult};
use crate::traits::{SecureStore, SiteHandle, SiteRecord, SiteRecords};

/// Capacity of the event channel; slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 16;

/// Notification sent to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialEvent {
    /// A newly created password became the site's active one.
    Updated { site: SiteHandle },
}

/// Outcome of checking the stored passwords of a site.
#[derive(Debug)]
enum Validation {
    /// At least one password works and the active slot points at one.
    Valid,
    /// Nothing could be confirmed either way for `count` passwords.
    Inconclusive { count: usize, active_usable: bool },
    /// Every stored password (possibly none) was rejected. `probed` holds
    /// the identifiers that were checked.
    NoneValid { probed: HashSet<String> },
}

/// Ensures each site has exactly one working application password.
///
/// Cheap to clone; clones share the store, the in-flight registry and the
/// event channel.
#[derive(Clone)]
pub struct ApplicationPasswordRepository {
    store: Arc<CredentialStore>,
    authority: Arc<dyn CredentialAuthority>,
    sites: Arc<dyn SiteRecords>,
    coordinator: Arc<InFlightCoordinator>,
    app: AppIdentity,
    events: broadcast::Sender<CredentialEvent>,
}

impl ApplicationPasswordRepository {
    pub fn new(
        secure_store: Arc<dyn SecureStore>,
        authority: Arc<dyn CredentialAuthority>,
        sites: Arc<dyn SiteRecords>,
        app: AppIdentity,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store: Arc::new(CredentialStore::new(secure_store)),
            authority,
            sites,
            coordinator: Arc::new(InFlightCoordinator::new()),
            app,
            events,
        }
    }

    /// Receive a [`CredentialEvent`] whenever a created password is activated.
    pub fn subscribe(&self) -> broadcast::Receiver<CredentialEvent> {
        self.events.subscribe()
    }

    /// Every stored entry, for listing.
    pub async fn entries(&self) -> Vec<StoredEntry> {
        self.store.all_entries().await
    }

    /// Copy a token held only in the site's active slot into the store.
    ///
    /// Older installs kept a single token per site. Such a token is adopted
    /// once its identifier is recovered from the server; failures to reach
    /// the server are logged and retried on a later call. A REST API root
    /// that is not cached yet is discovered and cached first.
    pub async fn migrate_legacy_if_needed(&self, site: SiteHandle) -> ReconcileResult<()> {
        let Some((record, token)) = self.unmigrated_token(site).await? else {
            return Ok(());
        };

        let api_root = match self.resolve_rest_api_root(site).await {
            Ok(api_root) => api_root,
            Err(e) => {
                warn!(%site, "Skipping legacy password migration: {}", e);
                return Ok(());
            }
        };

        self.adopt_legacy(site, &record, &token, &api_root).await
    }

    /// The site's active token, when the site has a username and the token
    /// is not stored under the site's owners yet.
    async fn unmigrated_token(&self, site: SiteHandle) -> ReconcileResult<Option<(SiteRecord, String)>> {
        let record = self.sites.site(site).await?;
        if record.username.is_none() {
            return Ok(None);
        }
        let Some(token) = self.sites.application_token(site).await? else {
            return Ok(None);
        };

        let already_stored = self
            .store
            .credentials_for(&owners_of(&record))
            .await
            .iter()
            .any(|credential| credential.token == token);
        Ok((!already_stored).then_some((record, token)))
    }

    async fn adopt_legacy(
        &self,
        site: SiteHandle,
        record: &SiteRecord,
        token: &str,
        api_root: &ApiRoot,
    ) -> ReconcileResult<()> {
        let Some(username) = record.username.as_deref() else {
            return Ok(());
        };

        match self.authority.introspect(token, api_root, username).await {
            Ok(credential) => {
                info!(%site, id = %credential.identifier, "Migrated legacy application password");
                self.store
                    .save(StoredEntry::new(credential, owners_of(record)))
                    .await?;
            }
            Err(e) => {
                warn!(%site, "Could not introspect legacy application password: {}", e);
            }
        }
        Ok(())
    }

    /// Make sure the site's active slot holds a working application password,
    /// creating one if no stored password works.
    ///
    /// Concurrent calls for the same site share a single creation.
    pub async fn ensure_valid(&self, site: SiteHandle) -> ReconcileResult<()> {
        match self.validate_passwords(site).await? {
            Validation::Valid => Ok(()),
            Validation::Inconclusive { active_usable: true, count } => {
                debug!(%site, count, "Keeping active password; stored passwords could not be verified");
                Ok(())
            }
            Validation::Inconclusive { count, .. } => {
                Err(ReconcileError::ValidationInconclusive { count })
            }
            Validation::NoneValid { probed } => {
                let repository = self.clone();
                let probed = Arc::new(probed);
                self.coordinator
                    .obtain(site, move || {
                        let repository = repository.clone();
                        let probed = Arc::clone(&probed);
                        async move { repository.reuse_or_create(site, &probed).await }
                    })
                    .await?;
                Ok(())
            }
        }
    }

    /// [`ensure_valid`](Self::ensure_valid), abandoned as soon as `cancel` fires.
    ///
    /// Abandoning a call that owns an in-flight creation aborts that creation;
    /// any other caller waiting on it starts a new one.
    pub async fn ensure_valid_with_cancellation(
        &self,
        site: SiteHandle,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReconcileError::Cancelled),
            result = self.ensure_valid(site) => result,
        }
    }

    async fn validate_passwords(&self, site: SiteHandle) -> ReconcileResult<Validation> {
        // Resolved first so a legacy token is adopted even when neither was cached.
        let api_root = self.resolve_rest_api_root(site).await?;
        let username = self.resolve_username(site).await?;
        if let Some((record, token)) = self.unmigrated_token(site).await? {
            self.adopt_legacy(site, &record, &token, &api_root).await?;
        }

        let record = self.sites.site(site).await?;
        let credentials = self.store.credentials_for(&owners_of(&record)).await;
        let probed: HashSet<String> = credentials
            .iter()
            .map(|credential| credential.identifier.clone())
            .collect();

        let outcomes = join_all(
            credentials
                .iter()
                .map(|credential| self.authority.probe(credential, &api_root, &username)),
        )
        .await;

        let mut valid = Vec::new();
        let mut unauthorized = Vec::new();
        let mut inconclusive = 0;
        for (credential, outcome) in credentials.into_iter().zip(outcomes) {
            match outcome {
                ProbeOutcome::Valid => valid.push(credential),
                ProbeOutcome::Unauthorized => unauthorized.push(credential),
                ProbeOutcome::TransportError(message) => {
                    warn!(%site, id = %credential.identifier, "Could not verify application password: {}", message);
                    inconclusive += 1;
                }
            }
        }

        if !unauthorized.is_empty() {
            self.store.delete(&unauthorized).await?;
        }

        info!(
            %site,
            username = %username,
            total = valid.len() + unauthorized.len() + inconclusive,
            valid = valid.len(),
            deleted = unauthorized.len(),
            inconclusive,
            "Checked stored application passwords"
        );

        let active = self.sites.application_token(site).await?;

        if let Some(first) = valid.first() {
            let active_is_valid = active
                .as_deref()
                .map_or(false, |token| valid.iter().any(|credential| credential.token == token));
            if !active_is_valid {
                self.assign(first, &api_root, site).await?;
            }
            return Ok(Validation::Valid);
        }

        if inconclusive > 0 {
            let active_usable = active.as_deref().map_or(false, |token| {
                !unauthorized.iter().any(|credential| credential.token == token)
            });
            return Ok(Validation::Inconclusive {
                count: inconclusive,
                active_usable,
            });
        }

        Ok(Validation::NoneValid { probed })
    }

    /// Runs as the site's single in-flight creation.
    ///
    /// Between this caller's probes and becoming the owner, an earlier
    /// owner may already have stored a new password. Passwords stored since
    /// (identifiers not in `probed`) are checked before minting another one.
    async fn reuse_or_create(
        &self,
        site: SiteHandle,
        probed: &HashSet<String>,
    ) -> ReconcileResult<Credential> {
        let record = self.sites.site(site).await?;
        let fresh: Vec<Credential> = self
            .store
            .credentials_for(&owners_of(&record))
            .await
            .into_iter()
            .filter(|credential| !probed.contains(&credential.identifier))
            .collect();
        if fresh.is_empty() {
            return self.create_password(site).await;
        }

        let api_root = self.resolve_rest_api_root(site).await?;
        let username = self.resolve_username(site).await?;
        let mut inconclusive = 0;
        for credential in fresh {
            match self.authority.probe(&credential, &api_root, &username).await {
                ProbeOutcome::Valid => {
                    debug!(%site, id = %credential.identifier, "Reusing password stored by an earlier creation");
                    let active = self.sites.application_token(site).await?;
                    if active.as_deref() != Some(credential.token.as_str()) {
                        self.assign(&credential, &api_root, site).await?;
                    }
                    return Ok(credential);
                }
                // Left for the next validation to prune.
                ProbeOutcome::Unauthorized => {}
                ProbeOutcome::TransportError(message) => {
                    warn!(%site, id = %credential.identifier, "Could not verify application password: {}", message);
                    inconclusive += 1;
                }
            }
        }

        if inconclusive > 0 {
            return Err(ReconcileError::ValidationInconclusive {
                count: inconclusive,
            });
        }
        self.create_password(site).await
    }

    async fn create_password(&self, site: SiteHandle) -> ReconcileResult<Credential> {
        // Resolving the username first lets the new entry carry both owners.
        let username = self.resolve_username(site).await?;
        let api_root = self.resolve_rest_api_root(site).await?;
        let record = self.sites.site(site).await?;

        let credential = match (&record.dotcom_account, record.dotcom_site_id, &record.password) {
            (Some(account), Some(site_id), _) => {
                self.authority
                    .create_via_dotcom(account, site_id, &self.app)
                    .await?
            }
            (_, _, Some(password)) => {
                let session = SiteSession {
                    site_url: record.url.clone(),
                    api_root: api_root.clone(),
                    username: username.clone(),
                    password: password.clone(),
                };
                self.authority.create_on_site(&session, &self.app).await?
            }
            _ => return Err(ReconcileError::Unknown),
        };

        self.store
            .save(StoredEntry::new(credential.clone(), owners_of(&record)))
            .await?;
        self.assign(&credential, &api_root, site).await?;

        info!(%site, username = %username, api_root = %api_root, "Created application password");
        // No subscribers is fine.
        let _ = self.events.send(CredentialEvent::Updated { site });

        Ok(credential)
    }

    /// Point the site's active slot at `credential`.
    async fn assign(
        &self,
        credential: &Credential,
        api_root: &ApiRoot,
        site: SiteHandle,
    ) -> ReconcileResult<()> {
        self.resolve_username(site).await?;
        self.sites.set_rest_api_root(site, api_root.as_str()).await?;
        self.sites
            .set_application_token(site, &credential.token)
            .await?;
        debug!(%site, id = %credential.identifier, "Activated application password");
        Ok(())
    }

    async fn resolve_rest_api_root(&self, site: SiteHandle) -> ReconcileResult<ApiRoot> {
        let record = self.sites.site(site).await?;
        if let Some(root) = record
            .rest_api_root
            .as_deref()
            .and_then(|root| ApiRoot::parse(root).ok())
        {
            return Ok(root);
        }

        let root = self.authority.discover_api_root(&record.url).await?;
        self.sites.set_rest_api_root(site, root.as_str()).await?;
        Ok(root)
    }

    async fn resolve_username(&self, site: SiteHandle) -> ReconcileResult<String> {
        let record = self.sites.site(site).await?;
        if let Some(username) = record.username {
            return Ok(username);
        }

        match (&record.dotcom_account, record.dotcom_site_id) {
            (Some(account), Some(site_id)) => {
                let username = self
                    .authority
                    .fetch_dotcom_username(account, site_id)
                    .await?;
                self.sites.set_username(site, &username).await?;
                Ok(username)
            }
            _ => Err(ReconcileError::UsernameNotFound),
        }
    }
}
