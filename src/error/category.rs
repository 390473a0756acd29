//! Error category classification.
//!
//! Categories drive how callers present a reconciliation failure: whether to
//! offer a retry, blame the network, or point the user at the site's own
//! configuration.

use std::fmt;

/// Where a reconciliation failure originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection, DNS, timeout, or probes that reached no verdict.
    Network,
    /// Missing username or a rejected sign-in.
    Auth,
    /// The site blocks or hides its REST API.
    Site,
    /// HTTP 5xx or a malformed payload.
    Server,
    /// No route to create a password from the local site record.
    Configuration,
    /// The keychain slot could not be written.
    Storage,
    Cancelled,
}

impl ErrorCategory {
    /// Transient failures: calling `ensure_valid` again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// What the user can do about it, printed under a failed site.
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "check the connection and run the command again",
            ErrorCategory::Auth => "sign in to the site again",
            ErrorCategory::Site => {
                "make sure the REST API is enabled and not blocked by a security plugin"
            }
            ErrorCategory::Server => "the site is having trouble; try again later",
            ErrorCategory::Configuration => "add the site's password or WordPress.com account",
            ErrorCategory::Storage => "check that the state directory is writable",
            ErrorCategory::Cancelled => "run the command again",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Site => "site",
            ErrorCategory::Server => "server",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}
