//! Errors raised while reconciling application passwords.

use thiserror::Error;

use super::category::ErrorCategory;
use crate::traits::{HttpError, SecureStoreError, SiteHandle};

/// Failure of a reconciliation, migration or creation call.
///
/// The type is `Clone` because one creation result is handed to every
/// caller waiting on the same in-flight task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// The site username could not be resolved locally or remotely.
    #[error("username not found for site")]
    UsernameNotFound,

    /// The site's REST API rejected session-based access.
    #[error("site REST API is inaccessible")]
    RestApiInaccessible,

    /// Neither a WordPress.com nor a direct route was available.
    #[error("no route available to create an application password")]
    Unknown,

    #[error("operation cancelled")]
    Cancelled,

    #[error("REST API discovery failed for {site_url}: {message}")]
    ApiDiscoveryFailed { site_url: String, message: String },

    /// Every stored credential probe was inconclusive and no usable
    /// active credential is set.
    #[error("could not verify any of {count} stored application passwords")]
    ValidationInconclusive { count: usize },

    #[error("network error: {0}")]
    Network(String),

    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("site record not found: {0}")]
    SiteNotFound(SiteHandle),

    #[error("secure storage error: {0}")]
    Storage(String),
}

impl ReconcileError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReconcileError::UsernameNotFound => ErrorCategory::Auth,
            ReconcileError::RestApiInaccessible => ErrorCategory::Site,
            ReconcileError::ApiDiscoveryFailed { .. } => ErrorCategory::Site,
            ReconcileError::Unknown => ErrorCategory::Configuration,
            ReconcileError::SiteNotFound(_) => ErrorCategory::Configuration,
            ReconcileError::Cancelled => ErrorCategory::Cancelled,
            ReconcileError::ValidationInconclusive { .. } => ErrorCategory::Network,
            ReconcileError::Network(_) => ErrorCategory::Network,
            ReconcileError::Remote { status, .. } => match *status {
                401 | 403 => ErrorCategory::Auth,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Site,
            },
            ReconcileError::InvalidResponse(_) => ErrorCategory::Server,
            ReconcileError::Storage(_) => ErrorCategory::Storage,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReconcileError::Cancelled)
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ReconcileError::UsernameNotFound => "Unable to find username for the site".to_string(),
            ReconcileError::RestApiInaccessible => {
                "Unable to access the site's REST API".to_string()
            }
            ReconcileError::Unknown => "Unable to create application password".to_string(),
            ReconcileError::Cancelled => "The request was cancelled.".to_string(),
            ReconcileError::ApiDiscoveryFailed { site_url, .. } => {
                format!("Unable to find the REST API for {}", site_url)
            }
            ReconcileError::ValidationInconclusive { .. } => {
                "Unable to verify the site's application passwords. Please check your connection and try again."
                    .to_string()
            }
            ReconcileError::Network(_) => {
                "Unable to connect to the site. Please check your internet connection.".to_string()
            }
            ReconcileError::Remote { status, .. } => match *status {
                401 => "The site rejected the sign-in. Please sign in again.".to_string(),
                403 => "You don't have permission to create application passwords on this site."
                    .to_string(),
                _ => format!("The site returned an error (HTTP {}). Please try again.", status),
            },
            ReconcileError::InvalidResponse(_) => {
                "Received an invalid response from the site. Please try again.".to_string()
            }
            ReconcileError::SiteNotFound(_) => "The site could not be found.".to_string(),
            ReconcileError::Storage(_) => {
                "Unable to save the application password to the keychain.".to_string()
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ReconcileError::UsernameNotFound => "E_APPPW_USERNAME",
            ReconcileError::RestApiInaccessible => "E_APPPW_REST_INACCESSIBLE",
            ReconcileError::Unknown => "E_APPPW_UNKNOWN",
            ReconcileError::Cancelled => "E_APPPW_CANCELLED",
            ReconcileError::ApiDiscoveryFailed { .. } => "E_APPPW_DISCOVERY",
            ReconcileError::ValidationInconclusive { .. } => "E_APPPW_INCONCLUSIVE",
            ReconcileError::Network(_) => "E_APPPW_NETWORK",
            ReconcileError::Remote { .. } => "E_APPPW_REMOTE",
            ReconcileError::InvalidResponse(_) => "E_APPPW_INVALID_RESPONSE",
            ReconcileError::SiteNotFound(_) => "E_APPPW_SITE_NOT_FOUND",
            ReconcileError::Storage(_) => "E_APPPW_STORAGE",
        }
    }
}

impl From<HttpError> for ReconcileError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::ServerError { status, message } => ReconcileError::Remote { status, message },
            HttpError::Cancelled => ReconcileError::Cancelled,
            other => ReconcileError::Network(other.to_string()),
        }
    }
}

impl From<SecureStoreError> for ReconcileError {
    fn from(err: SecureStoreError) -> Self {
        ReconcileError::Storage(err.to_string())
    }
}
