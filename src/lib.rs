//! wpcreds - WordPress application password reconciliation.
//!
//! Keeps exactly one working application password per site: stored
//! passwords are validated against the site, revoked ones are pruned, and a
//! new one is created only when nothing usable is left, never more than one
//! at a time per site.
//!
//! This library exposes modules for use in integration tests and by other
//! frontends.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod passwords;
pub mod traits;
