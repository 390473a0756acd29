//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest, with a cookie store
//!   for wp-login sessions
//! - [`FileSecureStore`] - JSON-file secure store
//! - [`FileSiteRecords`] - JSON-file site records
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles for every trait.

pub mod file_secure_store;
pub mod file_sites;
pub mod mock;
pub mod reqwest_http;

pub use file_secure_store::FileSecureStore;
pub use file_sites::FileSiteRecords;
pub use mock::{InMemorySecureStore, InMemorySiteRecords, MockAuthority, MockHttpClient};
pub use reqwest_http::ReqwestHttpClient;
