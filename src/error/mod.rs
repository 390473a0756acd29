//! Error handling for application-password reconciliation.
//!
//! - **Error Categories**: high-level classification for handling decisions
//! - **`ReconcileError`**: the single error type every public operation returns
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Network | Connection, DNS, timeout, inconclusive probes | Yes |
//! | Auth | Username missing, session rejected | No |
//! | Site | REST API blocked or undiscoverable | No |
//! | Server | 5xx, malformed payloads | Yes |
//! | Configuration | No route to create a credential | No |
//! | Storage | Keychain write failed | No |
//! | Cancelled | Caller stopped waiting | No |

mod category;
mod reconcile;

pub use category::ErrorCategory;
pub use reconcile::ReconcileError;

/// Result alias used throughout the crate.
pub type ReconcileResult<T> = Result<T, ReconcileError>;
