//! Per-site coalescing of application password creation.
//!
//! Creating a password leaves a visible entry in the user's profile, so
//! concurrent callers for the same site must share one creation. The first
//! caller (the owner) spawns the work and registers it; later callers wait
//! on the shared result.
//!
//! Cancellation rules:
//! - dropping the owner aborts the shared task; its waiters observe the
//!   abort and start over, one of them becoming the new owner
//! - dropping a waiter only stops that caller

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use super::model::Credential;
use crate::error::{ReconcileError, ReconcileResult};
use crate::traits::SiteHandle;

/// How a shared creation ended, as seen by everyone waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CreationFailure {
    /// The owner went away and the task was aborted.
    Cancelled,
    Failed(ReconcileError),
}

type SharedCreation = Shared<BoxFuture<'static, Result<Credential, CreationFailure>>>;

struct PendingCreation {
    generation: u64,
    result: SharedCreation,
}

type Registry = Arc<Mutex<HashMap<SiteHandle, PendingCreation>>>;

enum Role {
    Owner(OwnerGuard, SharedCreation),
    Waiter(SharedCreation),
}

/// Held by the owning call for as long as it awaits the creation.
///
/// On drop the registry entry is removed first, then the task is aborted,
/// so a waiter woken by the abort never finds the dead entry.
struct OwnerGuard {
    registry: Registry,
    site: SiteHandle,
    generation: u64,
    abort: AbortHandle,
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        {
            let mut pending = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            if pending
                .get(&self.site)
                .map_or(false, |entry| entry.generation == self.generation)
            {
                pending.remove(&self.site);
            }
        }
        self.abort.abort();
    }
}

/// Registry of outstanding creations, at most one per site.
#[derive(Default)]
pub struct InFlightCoordinator {
    registry: Registry,
    next_generation: AtomicU64,
}

impl InFlightCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the credential produced by the site's single in-flight creation,
    /// starting one with `create` if none is outstanding.
    ///
    /// `create` may be called more than once when an owner is cancelled and
    /// a waiter takes over.
    ///
    /// There is no cancellation parameter: a caller cancels by dropping the
    /// returned future, for instance from a `tokio::select!` on a
    /// `CancellationToken` as
    /// [`ensure_valid_with_cancellation`](crate::passwords::ApplicationPasswordRepository::ensure_valid_with_cancellation)
    /// does. A dropped waiter leaves the creation running for everyone else.
    /// A dropped owner unregisters the site and aborts the creation task, so
    /// any remaining waiter restarts with its own `create`.
    pub async fn obtain<F, Fut>(&self, site: SiteHandle, create: F) -> ReconcileResult<Credential>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ReconcileResult<Credential>> + Send + 'static,
    {
        loop {
            match self.join_or_start(site, &create) {
                Role::Waiter(shared) => match shared.await {
                    Ok(credential) => return Ok(credential),
                    Err(CreationFailure::Failed(e)) => return Err(e),
                    Err(CreationFailure::Cancelled) => {
                        debug!(%site, "In-flight creation was cancelled, restarting");
                    }
                },
                Role::Owner(guard, shared) => {
                    let result = shared.await;
                    drop(guard);
                    return result.map_err(|failure| match failure {
                        CreationFailure::Cancelled => ReconcileError::Cancelled,
                        CreationFailure::Failed(e) => e,
                    });
                }
            }
        }
    }

    /// Whether a creation is currently registered for `site`.
    pub fn is_pending(&self, site: SiteHandle) -> bool {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&site)
    }

    /// Look up and, if needed, register in one critical section.
    fn join_or_start<F, Fut>(&self, site: SiteHandle, create: &F) -> Role
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ReconcileResult<Credential>> + Send + 'static,
    {
        let mut pending = self.registry.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = pending.get(&site) {
            let aborted = matches!(entry.result.peek(), Some(Err(CreationFailure::Cancelled)));
            if !aborted {
                return Role::Waiter(entry.result.clone());
            }
            pending.remove(&site);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(create());
        let abort = handle.abort_handle();

        let result: SharedCreation = async move {
            match handle.await {
                Ok(Ok(credential)) => Ok(credential),
                Ok(Err(e)) => Err(CreationFailure::Failed(e)),
                Err(join_error) if join_error.is_cancelled() => Err(CreationFailure::Cancelled),
                Err(join_error) => {
                    warn!("Application password creation task panicked: {}", join_error);
                    Err(CreationFailure::Failed(ReconcileError::Unknown))
                }
            }
        }
        .boxed()
        .shared();

        pending.insert(
            site,
            PendingCreation {
                generation,
                result: result.clone(),
            },
        );
        debug!(%site, generation, "Started application password creation");

        Role::Owner(
            OwnerGuard {
                registry: Arc::clone(&self.registry),
                site,
                generation,
                abort,
            },
            result,
        )
    }
}
