//! Integration tests for concurrent reconciliation of one site.
//!
//! Scenarios:
//! - Concurrent callers share a single creation
//! - Callers still checking passwords when a creation finishes reuse its password
//!   instead of minting another
//! - Cancelling the caller that started a creation hands over to a waiter
//! - Cancelling a waiter leaves the creation running

mod common;

use std::time::Duration;

use common::*;
use tokio_util::sync::CancellationToken;
use wpcreds::error::ReconcileError;

#[tokio::test]
async fn test_concurrent_calls_create_once() {
    let h = Harness::new();
    h.authority.set_create_delay(Duration::from_millis(50));
    let site = h.sites.insert(self_hosted_site());

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let repository = h.repository.clone();
            tokio::spawn(async move { repository.ensure_valid(site).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.authority.create_count(), 1);
    assert_eq!(h.persisted_ids(), vec!["created-1".to_string()]);
    assert_eq!(h.sites.active_token(site).as_deref(), Some("created-token-1"));
}

#[tokio::test]
async fn test_late_caller_reuses_password_created_during_its_check() {
    let h = Harness::new();
    h.authority.set_probe_delay(Duration::from_millis(50));
    h.authority.set_create_delay(Duration::from_millis(10));
    let site = h.sites.insert(self_hosted_site());
    let revoked = revoked_credential(&h.authority, "revoked");
    h.seed_for_site(site, &[revoked]);

    let first = {
        let repository = h.repository.clone();
        tokio::spawn(async move { repository.ensure_valid(site).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Still checking the revoked password when the first caller finishes creating.
    let second = {
        let repository = h.repository.clone();
        tokio::spawn(async move { repository.ensure_valid(site).await })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(h.authority.create_count(), 1);
    assert_eq!(h.persisted_ids(), vec!["created-1".to_string()]);
    assert_eq!(h.sites.active_token(site).as_deref(), Some("created-token-1"));
}

#[tokio::test]
async fn test_staggered_callers_with_revoked_entry_create_once() {
    let h = Harness::new();
    h.authority.set_probe_delay(Duration::from_millis(40));
    h.authority.set_create_delay(Duration::from_millis(10));
    let site = h.sites.insert(self_hosted_site());
    let revoked = revoked_credential(&h.authority, "revoked");
    h.seed_for_site(site, &[revoked]);

    let mut handles = Vec::new();
    for _ in 0..5 {
        let repository = h.repository.clone();
        handles.push(tokio::spawn(async move { repository.ensure_valid(site).await }));
        tokio::time::sleep(Duration::from_millis(8)).await;
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.authority.create_count(), 1);
    assert_eq!(h.persisted_ids(), vec!["created-1".to_string()]);
}

#[tokio::test]
async fn test_simultaneous_callers_with_revoked_entry_create_once() {
    let h = Harness::new();
    h.authority.set_probe_delay(Duration::from_millis(20));
    h.authority.set_create_delay(Duration::from_millis(20));
    let site = h.sites.insert(self_hosted_site());
    let revoked = revoked_credential(&h.authority, "revoked");
    h.seed_for_site(site, &[revoked]);

    let results = futures::future::join_all((0..5).map(|_| h.repository.ensure_valid(site))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(h.authority.create_count(), 1);
    assert_eq!(h.persisted_ids(), vec!["created-1".to_string()]);
}

#[tokio::test]
async fn test_different_sites_create_independently() {
    let h = Harness::new();
    h.authority.set_create_delay(Duration::from_millis(20));
    let a = h.sites.insert(self_hosted_site());
    let b = h.sites.insert(
        wpcreds::traits::SiteRecord::self_hosted("https://other.example", "admin")
            .with_password("primary-password")
            .with_rest_api_root("https://other.example/wp-json/"),
    );

    let (ra, rb) = tokio::join!(h.repository.ensure_valid(a), h.repository.ensure_valid(b));
    ra.unwrap();
    rb.unwrap();

    assert_eq!(h.authority.create_count(), 2);
    assert_eq!(h.persisted().len(), 2);
}

#[tokio::test]
async fn test_cancelled_owner_hands_over_to_waiter() {
    let h = Harness::new();
    h.authority.set_create_delay(Duration::from_millis(100));
    let site = h.sites.insert(self_hosted_site());

    let owner_cancel = CancellationToken::new();
    let owner = {
        let repository = h.repository.clone();
        let cancel = owner_cancel.clone();
        tokio::spawn(async move { repository.ensure_valid_with_cancellation(site, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let waiter = {
        let repository = h.repository.clone();
        tokio::spawn(async move { repository.ensure_valid(site).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    owner_cancel.cancel();
    assert_eq!(owner.await.unwrap(), Err(ReconcileError::Cancelled));

    waiter.await.unwrap().unwrap();
    assert_eq!(h.authority.create_count(), 2);
    // The aborted attempt never stored anything.
    assert_eq!(h.persisted_ids(), vec!["created-2".to_string()]);
    assert_eq!(h.sites.active_token(site).as_deref(), Some("created-token-2"));
}

#[tokio::test]
async fn test_cancelled_waiter_does_not_restart_creation() {
    let h = Harness::new();
    h.authority.set_create_delay(Duration::from_millis(80));
    let site = h.sites.insert(self_hosted_site());

    let owner = {
        let repository = h.repository.clone();
        tokio::spawn(async move { repository.ensure_valid(site).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let waiter_cancel = CancellationToken::new();
    let waiter = {
        let repository = h.repository.clone();
        let cancel = waiter_cancel.clone();
        tokio::spawn(async move { repository.ensure_valid_with_cancellation(site, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    waiter_cancel.cancel();

    assert_eq!(waiter.await.unwrap(), Err(ReconcileError::Cancelled));
    owner.await.unwrap().unwrap();
    assert_eq!(h.authority.create_count(), 1);
    assert_eq!(h.persisted_ids(), vec!["created-1".to_string()]);
}

#[tokio::test]
async fn test_cancellation_before_start() {
    let h = Harness::new();
    let site = h.sites.insert(self_hosted_site());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h
        .repository
        .ensure_valid_with_cancellation(site, &cancel)
        .await;

    assert_eq!(result, Err(ReconcileError::Cancelled));
    assert_eq!(h.authority.create_count(), 0);
}
