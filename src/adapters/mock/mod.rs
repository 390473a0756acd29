//! Mock implementations for testing.
//!
//! Test doubles for every trait seam, usable without network or file
//! system access:
//!
//! - [`InMemorySecureStore`] - keychain slots with read/write counters
//! - [`InMemorySiteRecords`] - site records and active tokens
//! - [`MockHttpClient`] - HTTP client with configurable responses
//! - [`MockAuthority`] - scripted credential authority

pub mod authority;
pub mod http;
pub mod secure_store;
pub mod sites;

pub use authority::MockAuthority;
pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use secure_store::InMemorySecureStore;
pub use sites::InMemorySiteRecords;
