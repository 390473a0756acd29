//! Tracing subscriber setup for the `wpcreds` binary.
//!
//! Logs go to stderr so stdout stays clean for command output. The filter
//! comes from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "wpcreds=info";

/// Build the filter from `RUST_LOG`, or `default` when unset or invalid.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("wpcreds=debug")
    } else {
        env_filter(DEFAULT_FILTER)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
