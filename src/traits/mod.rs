//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP client operations (GET, POST)
//! - [`SecureStore`] - Keychain-style secure key-value storage
//! - [`SiteRecords`] - Access to persisted site records

pub mod http;
pub mod secure_store;
pub mod sites;

pub use http::{Headers, HttpClient, HttpError, Response};
pub use secure_store::{SecureStore, SecureStoreError};
pub use sites::{DotComAccount, SiteHandle, SiteRecord, SiteRecords};
