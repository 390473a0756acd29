//! CLI module for wpcreds.
//!
//! - Argument parsing
//! - Wiring of the production adapters
//! - The `ensure` and `list` commands
//!
//! # Usage
//!
//! ```ignore
//! use wpcreds::cli::{parse_args, run_cli_command};
//! use wpcreds::config::ReconcilerConfig;
//!
//! let args = parse_args(std::env::args());
//! run_cli_command(args.command, &ReconcilerConfig::from_env()).await?;
//! ```

pub mod args;
pub mod version;

pub use args::{parse_args, CliArgs, CliCommand, USAGE};
pub use version::{version_line, VERSION};

use color_eyre::eyre::{eyre, Result};
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapters::{FileSecureStore, FileSiteRecords, ReqwestHttpClient};
use crate::config::ReconcilerConfig;
use crate::error::ReconcileResult;
use crate::passwords::{ApplicationPasswordRepository, StoredEntry, WpRestAuthority};
use crate::traits::{SecureStore, SiteHandle};

/// Production wiring: file-backed storage and the WordPress REST authority.
pub fn build_repository(config: &ReconcilerConfig) -> Result<ApplicationPasswordRepository> {
    let secure_path = config
        .secure_store_path()
        .ok_or_else(|| eyre!("could not determine the home directory; set WPCREDS_HOME"))?;
    let sites_path = config
        .sites_path()
        .ok_or_else(|| eyre!("could not determine the home directory; set WPCREDS_HOME"))?;

    let secure_store: Arc<dyn SecureStore> = Arc::new(FileSecureStore::new(secure_path));
    let sites = Arc::new(FileSiteRecords::new(sites_path, Arc::clone(&secure_store)));
    let http = ReqwestHttpClient::from_config(config)
        .map_err(|e| eyre!("failed to create HTTP client: {}", e))?;
    let authority = WpRestAuthority::new(Arc::new(http))
        .with_dotcom_api_base(config.dotcom_api_base.clone());

    Ok(ApplicationPasswordRepository::new(
        secure_store,
        Arc::new(authority),
        sites,
        config.app.clone(),
    ))
}

/// Run `command`, printing results to stdout.
pub async fn run_cli_command(command: CliCommand, config: &ReconcilerConfig) -> Result<()> {
    match command {
        CliCommand::Version => {
            println!("{}", version_line());
            Ok(())
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        CliCommand::Invalid(reason) => Err(eyre!("{}\n\n{}", reason, USAGE)),
        CliCommand::List => {
            let repository = build_repository(config)?;
            let entries = repository.entries().await;
            if entries.is_empty() {
                println!("No application passwords stored.");
            }
            for entry in &entries {
                println!("{}", format_entry(entry));
            }
            Ok(())
        }
        CliCommand::Ensure(sites) => {
            let repository = build_repository(config)?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    debug!("Interrupted, cancelling");
                    on_interrupt.cancel();
                }
            });

            let outcomes = ensure_sites(&repository, &sites, &cancel).await;
            let mut failed = 0;
            for (site, result) in &outcomes {
                println!("{}", format_outcome(*site, result));
                if let Err(e) = result {
                    failed += 1;
                    warn!(%site, category = %e.category(), "{}", e);
                    println!("  hint: {}", e.category().hint());
                }
            }

            if failed > 0 {
                Err(eyre!("{} of {} sites failed", failed, outcomes.len()))
            } else {
                Ok(())
            }
        }
    }
}

/// Reconcile every site concurrently. Repeated handles share one creation.
pub async fn ensure_sites(
    repository: &ApplicationPasswordRepository,
    sites: &[SiteHandle],
    cancel: &CancellationToken,
) -> Vec<(SiteHandle, ReconcileResult<()>)> {
    let results = join_all(
        sites
            .iter()
            .map(|site| repository.ensure_valid_with_cancellation(*site, cancel)),
    )
    .await;
    sites.iter().copied().zip(results).collect()
}

pub fn format_outcome(site: SiteHandle, result: &ReconcileResult<()>) -> String {
    match result {
        Ok(()) => format!("{}: ok", site),
        Err(e) => format!("{}: {} [{}]", site, e.user_message(), e.error_code()),
    }
}

/// One line per entry; secrets are never printed.
pub fn format_entry(entry: &StoredEntry) -> String {
    let owners: Vec<String> = entry.owners.iter().map(ToString::to_string).collect();
    format!("{}  {}", entry.id(), owners.join(", "))
}
