//! Reconciler configuration.
//!
//! Use the builder methods to customize behavior, or [`ReconcilerConfig::from_env`]
//! to pick up overrides from the environment.

use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Default WordPress.com public API base URL.
pub const DOTCOM_API_URL: &str = "https://public-api.wordpress.com";

/// App id sent when creating application passwords. Sites list passwords by
/// app id, so this must stay stable across releases.
pub const DEFAULT_APP_ID: Uuid = Uuid::from_u128(0x6f1c2e04_8c1b_4f5e_9d2a_3b7e5c1a9f40);

/// Default application password name shown in the user's profile.
pub const DEFAULT_APP_NAME: &str = "wpcreds";

/// Directory under the home directory holding local state.
const STATE_DIR: &str = ".wpcreds";

/// Identity the app presents when minting an application password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub app_id: Uuid,
    pub name: String,
}

/// Configuration for the reconciler and its production adapters.
///
/// # Example
///
/// ```ignore
/// use wpcreds::config::ReconcilerConfig;
///
/// let config = ReconcilerConfig::default()
///     .with_app_name("My App")
///     .with_request_timeout(std::time::Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// App identity recorded on created passwords
    pub app: AppIdentity,
    /// WordPress.com API base (overridable for tests)
    pub dotcom_api_base: String,
    /// Per-request timeout for the HTTP adapter; `None` leaves it to reqwest
    pub request_timeout: Option<Duration>,
    /// Directory for the file-backed secure store and site records
    pub state_dir: Option<PathBuf>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            app: AppIdentity {
                app_id: DEFAULT_APP_ID,
                name: DEFAULT_APP_NAME.to_string(),
            },
            dotcom_api_base: DOTCOM_API_URL.to_string(),
            request_timeout: Some(Duration::from_secs(30)),
            state_dir: dirs::home_dir().map(|home| home.join(STATE_DIR)),
        }
    }
}

impl ReconcilerConfig {
    /// Create a new ReconcilerConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_id(mut self, app_id: Uuid) -> Self {
        self.app.app_id = app_id;
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app.name = name.into();
        self
    }

    /// Point WordPress.com calls at another base URL.
    pub fn with_dotcom_api_base(mut self, base: impl Into<String>) -> Self {
        self.dotcom_api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `WPCREDS_HOME` - state directory
    /// - `WPCREDS_DOTCOM_API` - WordPress.com API base
    /// - `WPCREDS_APP_NAME` - application password name
    /// - `WPCREDS_TIMEOUT_SECS` - request timeout in seconds
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(home) = std::env::var("WPCREDS_HOME") {
            config = config.with_state_dir(home);
        }
        if let Ok(base) = std::env::var("WPCREDS_DOTCOM_API") {
            config = config.with_dotcom_api_base(base);
        }
        if let Ok(name) = std::env::var("WPCREDS_APP_NAME") {
            config = config.with_app_name(name);
        }
        if let Some(secs) = std::env::var("WPCREDS_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
        {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        config
    }

    /// Path of the file-backed secure store.
    pub fn secure_store_path(&self) -> Option<PathBuf> {
        self.state_dir
            .as_ref()
            .map(|dir| dir.join("secure-store.json"))
    }

    /// Path of the file-backed site records.
    pub fn sites_path(&self) -> Option<PathBuf> {
        self.state_dir.as_ref().map(|dir| dir.join("sites.json"))
    }
}
