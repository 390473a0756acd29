//! Application password reconciliation.
//!
//! - [`model`]: credentials, owners and the stored entry format
//! - [`store`]: the single secure-storage slot holding every entry
//! - [`remote`] / [`wp_rest`]: probing and minting passwords on the server
//! - [`inflight`]: one creation per site at a time
//! - [`repository`]: the reconciler tying them together

pub mod inflight;
pub mod model;
pub mod remote;
pub mod repository;
pub mod store;
pub mod wp_rest;

pub use inflight::InFlightCoordinator;
pub use model::{owners_of, Credential, Owner, StoredEntry};
pub use remote::{ApiRoot, CredentialAuthority, ProbeOutcome, SiteSession};
pub use repository::{ApplicationPasswordRepository, CredentialEvent};
pub use store::{CredentialStore, APPLICATION_PASSWORDS_KEY};
pub use wp_rest::WpRestAuthority;
