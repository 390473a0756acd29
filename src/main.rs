use color_eyre::Result;
use wpcreds::cli::{parse_args, run_cli_command, CliCommand};
use wpcreds::config::ReconcilerConfig;
use wpcreds::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args());

    // Version and help print before any initialization
    if matches!(args.command, CliCommand::Version | CliCommand::Help) {
        return run_cli_command(args.command, &ReconcilerConfig::default()).await;
    }

    color_eyre::install()?;
    init_logging(args.verbose);

    run_cli_command(args.command, &ReconcilerConfig::from_env()).await
}
