//! Integration tests for application password reconciliation.
//!
//! Scenarios:
//! - A working legacy token is adopted without creating anything, even
//!   before the site's REST API root is known
//! - A revoked legacy token leads to exactly one creation
//! - Only rejected passwords are pruned; other sites' entries survive
//! - Inconclusive probes never delete or create
//! - Passwords created through WordPress.com are found again by address
//! - Corrupt or failing secure storage

mod common;

use common::*;
use wpcreds::error::ReconcileError;
use wpcreds::passwords::{Credential, Owner, StoredEntry};
use wpcreds::traits::SiteRecord;

#[tokio::test]
async fn test_valid_legacy_token_is_adopted_without_creation() {
    let h = Harness::new();
    let site = h.sites.insert(self_hosted_site());
    h.sites.set_active_token(site, "legacy-token");
    h.authority
        .mark_valid(&Credential::new("legacy-id", "legacy-token"));

    h.repository.ensure_valid(site).await.unwrap();

    assert_eq!(h.authority.create_count(), 0);
    assert_eq!(h.persisted_ids(), vec!["legacy-id".to_string()]);
    assert_eq!(h.sites.active_token(site).as_deref(), Some("legacy-token"));
}

#[tokio::test]
async fn test_legacy_token_is_adopted_before_api_root_is_cached() {
    let h = Harness::new();
    let site = h
        .sites
        .insert(SiteRecord::self_hosted(SITE_URL, "admin").with_password("primary-password"));
    h.sites.set_active_token(site, "legacy-token");
    h.authority
        .mark_valid(&Credential::new("legacy-id", "legacy-token"));

    h.repository.ensure_valid(site).await.unwrap();

    assert_eq!(h.authority.create_count(), 0);
    assert_eq!(h.persisted_ids(), vec!["legacy-id".to_string()]);
    assert_eq!(h.sites.active_token(site).as_deref(), Some("legacy-token"));
    assert_eq!(h.sites.get(site).unwrap().rest_api_root.as_deref(), Some(API_ROOT));
}

#[tokio::test]
async fn test_revoked_legacy_token_creates_exactly_once() {
    let h = Harness::new();
    let site = h.sites.insert(self_hosted_site());
    h.sites.set_active_token(site, "legacy-token");
    h.authority.mark_revoked("legacy-token");

    h.repository.ensure_valid(site).await.unwrap();

    assert_eq!(h.authority.create_count(), 1);
    assert_eq!(h.persisted_ids(), vec!["created-1".to_string()]);
    assert_eq!(h.sites.active_token(site).as_deref(), Some("created-token-1"));

    // The new password is reused from now on.
    h.repository.ensure_valid(site).await.unwrap();
    h.repository.ensure_valid(site).await.unwrap();
    assert_eq!(h.authority.create_count(), 1);
    assert_eq!(h.persisted_ids(), vec!["created-1".to_string()]);
}

#[tokio::test]
async fn test_direct_creation_uses_primary_password() {
    let h = Harness::new();
    let site = h.sites.insert(self_hosted_site());

    h.repository.ensure_valid(site).await.unwrap();

    let session = h.authority.last_session().expect("direct creation ran");
    assert_eq!(session.username, "admin");
    assert_eq!(session.password, "primary-password");
    assert_eq!(session.site_url, SITE_URL);
    assert_eq!(session.api_root.as_str(), API_ROOT);
    assert_eq!(h.authority.dotcom_create_count(), 0);
}

#[tokio::test]
async fn test_prunes_exactly_the_rejected_passwords() {
    let h = Harness::new();
    let site = h.sites.insert(self_hosted_site());

    let keep = valid_credential(&h.authority, "keep");
    let gone_a = revoked_credential(&h.authority, "gone-a");
    let gone_b = revoked_credential(&h.authority, "gone-b");
    let elsewhere = StoredEntry::new(
        revoked_credential(&h.authority, "elsewhere"),
        [Owner::SelfHosted {
            username: "admin".to_string(),
            site: "https://other.example".to_string(),
        }],
    );

    let owners = wpcreds::passwords::owners_of(&h.sites.get(site).unwrap());
    h.seed(&[
        StoredEntry::new(gone_a, owners.clone()),
        StoredEntry::new(keep.clone(), owners.clone()),
        elsewhere,
        StoredEntry::new(gone_b, owners),
    ]);

    h.repository.ensure_valid(site).await.unwrap();

    assert_eq!(
        h.persisted_ids(),
        vec!["keep".to_string(), "elsewhere".to_string()]
    );
    assert_eq!(h.sites.active_token(site).as_deref(), Some(keep.token.as_str()));
    assert_eq!(h.authority.create_count(), 0);
    // Entries of other sites are never probed.
    assert_eq!(h.authority.probe_count(), 3);
}

#[tokio::test]
async fn test_inconclusive_probe_keeps_usable_active_password() {
    let h = Harness::new();
    let site = h.sites.insert(self_hosted_site());

    let flaky = Credential::new("flaky", "flaky-token");
    h.authority.mark_unreachable(&flaky.token);
    let revoked = revoked_credential(&h.authority, "revoked");
    h.seed_for_site(site, &[flaky.clone(), revoked]);
    h.sites.set_active_token(site, &flaky.token);

    h.repository.ensure_valid(site).await.unwrap();

    assert_eq!(h.persisted_ids(), vec!["flaky".to_string()]);
    assert_eq!(h.authority.create_count(), 0);
    assert_eq!(h.sites.active_token(site).as_deref(), Some("flaky-token"));
}

#[tokio::test]
async fn test_inconclusive_probe_without_usable_active_password() {
    let h = Harness::new();
    let site = h.sites.insert(self_hosted_site());

    let flaky = Credential::new("flaky", "flaky-token");
    h.authority.mark_unreachable(&flaky.token);
    let revoked = revoked_credential(&h.authority, "revoked");
    h.seed_for_site(site, &[flaky, revoked.clone()]);
    // The active slot points at the password that was just rejected.
    h.sites.set_active_token(site, &revoked.token);

    let result = h.repository.ensure_valid(site).await;

    assert_eq!(result, Err(ReconcileError::ValidationInconclusive { count: 1 }));
    assert_eq!(h.persisted_ids(), vec!["flaky".to_string()]);
    assert_eq!(h.authority.create_count(), 0);
}

#[tokio::test]
async fn test_inconclusive_without_any_active_password() {
    let h = Harness::new();
    let site = h.sites.insert(self_hosted_site());

    let a = Credential::new("a", "a-token");
    let b = Credential::new("b", "b-token");
    h.authority.mark_unreachable(&a.token);
    h.authority.mark_unreachable(&b.token);
    h.seed_for_site(site, &[a, b]);

    let err = h.repository.ensure_valid(site).await.unwrap_err();

    assert_eq!(err, ReconcileError::ValidationInconclusive { count: 2 });
    assert!(err.is_retryable());
    assert_eq!(h.persisted_ids().len(), 2);
    assert_eq!(h.authority.create_count(), 0);
}

#[tokio::test]
async fn test_dotcom_password_is_found_by_address_later() {
    let h = Harness::new();
    h.authority.set_dotcom_username("siteadmin");
    let via_dotcom = h.sites.insert(dotcom_site(456));

    h.repository.ensure_valid(via_dotcom).await.unwrap();
    assert_eq!(h.authority.dotcom_create_count(), 1);

    // Same site, added again by address with the resolved username.
    let by_address = h.sites.insert(
        SiteRecord::self_hosted("https://atomic.example", "siteadmin")
            .with_password("primary-password"),
    );
    h.repository.ensure_valid(by_address).await.unwrap();

    assert_eq!(h.authority.create_count(), 1);
    assert_eq!(
        h.sites.active_token(by_address),
        h.sites.active_token(via_dotcom)
    );
}

#[tokio::test]
async fn test_missing_api_root_is_discovered_and_cached() {
    let h = Harness::new();
    let site = h
        .sites
        .insert(SiteRecord::self_hosted(SITE_URL, "admin").with_password("primary-password"));

    h.repository.ensure_valid(site).await.unwrap();
    h.repository.ensure_valid(site).await.unwrap();

    assert_eq!(h.sites.get(site).unwrap().rest_api_root.as_deref(), Some(API_ROOT));
    assert_eq!(h.authority.discovery_count(), 1);
}

#[tokio::test]
async fn test_discovery_failure_is_reported() {
    let h = Harness::new();
    let failure = ReconcileError::ApiDiscoveryFailed {
        site_url: SITE_URL.to_string(),
        message: "no REST API".to_string(),
    };
    h.authority.set_discovery_failure(Some(failure.clone()));
    let site = h
        .sites
        .insert(SiteRecord::self_hosted(SITE_URL, "admin").with_password("primary-password"));

    assert_eq!(h.repository.ensure_valid(site).await, Err(failure));
    assert_eq!(h.authority.create_count(), 0);
}

#[tokio::test]
async fn test_creation_failure_stores_nothing() {
    let h = Harness::new();
    h.authority
        .set_create_failure(Some(ReconcileError::RestApiInaccessible));
    let site = h.sites.insert(self_hosted_site());

    assert_eq!(
        h.repository.ensure_valid(site).await,
        Err(ReconcileError::RestApiInaccessible)
    );
    assert!(h.persisted().is_empty());
    assert_eq!(h.sites.active_token(site), None);

    // Not cached: the next call tries again.
    h.authority.set_create_failure(None);
    h.repository.ensure_valid(site).await.unwrap();
    assert_eq!(h.authority.create_count(), 2);
}

#[tokio::test]
async fn test_corrupt_slot_reads_as_empty() {
    let h = Harness::new();
    h.secure
        .insert(wpcreds::passwords::APPLICATION_PASSWORDS_KEY, "{not json");
    let site = h.sites.insert(self_hosted_site());

    assert!(h.repository.entries().await.is_empty());
    h.repository.ensure_valid(site).await.unwrap();

    assert_eq!(h.authority.create_count(), 1);
    assert_eq!(h.persisted_ids(), vec!["created-1".to_string()]);
}

#[tokio::test]
async fn test_failed_write_leaves_entries_untouched() {
    let h = Harness::new();
    let site = h.sites.insert(self_hosted_site());
    let revoked = revoked_credential(&h.authority, "revoked");
    h.seed_for_site(site, &[revoked]);
    h.secure.set_write_should_fail(true);

    let result = h.repository.ensure_valid(site).await;

    assert!(matches!(result, Err(ReconcileError::Storage(_))));
    assert_eq!(h.authority.create_count(), 0);
    let ids: Vec<String> = h
        .repository
        .entries()
        .await
        .iter()
        .map(|entry| entry.id().to_string())
        .collect();
    assert_eq!(ids, vec!["revoked".to_string()]);
}
