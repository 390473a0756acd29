//! Command-line argument parsing for the `wpcreds` binary.

use crate::traits::SiteHandle;

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Make sure each site has a working application password
    Ensure(Vec<SiteHandle>),
    /// List stored application passwords without their secrets
    List,
    Version,
    Help,
    /// Unusable arguments, with the reason
    Invalid(String),
}

/// Parsed arguments: the command plus global flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub command: CliCommand,
    /// `-v` / `--verbose`: debug logging
    pub verbose: bool,
}

pub const USAGE: &str = "\
Usage: wpcreds [OPTIONS] <COMMAND>

Commands:
  ensure <SITE_ID>...  Make sure each site has one working application password
  list                 List stored application passwords (never prints secrets)

Options:
  -v, --verbose        Enable debug logging
  -V, --version        Print version
  -h, --help           Print help

Sites are read from $WPCREDS_HOME/sites.json (default ~/.wpcreds).";

/// Parse command-line arguments, including the program name.
///
/// # Examples
///
/// ```
/// use wpcreds::cli::args::{parse_args, CliCommand};
/// use wpcreds::traits::SiteHandle;
///
/// let args = ["wpcreds", "ensure", "1", "2"].map(String::from);
/// assert_eq!(
///     parse_args(args.into_iter()).command,
///     CliCommand::Ensure(vec![SiteHandle(1), SiteHandle(2)])
/// );
/// ```
pub fn parse_args<I>(args: I) -> CliArgs
where
    I: Iterator<Item = String>,
{
    let mut verbose = false;
    let mut positional = Vec::new();

    // Skip the program name
    for arg in args.skip(1) {
        match arg.as_str() {
            "--version" | "-V" => return CliArgs { command: CliCommand::Version, verbose },
            "--help" | "-h" => return CliArgs { command: CliCommand::Help, verbose },
            "--verbose" | "-v" => verbose = true,
            flag if flag.starts_with('-') => {
                return CliArgs {
                    command: CliCommand::Invalid(format!("unknown option: {}", flag)),
                    verbose,
                }
            }
            _ => positional.push(arg),
        }
    }

    let command = match positional.split_first() {
        None => CliCommand::Help,
        Some((name, rest)) => match name.as_str() {
            "ensure" => parse_sites(rest),
            "list" if rest.is_empty() => CliCommand::List,
            "list" => CliCommand::Invalid("list takes no arguments".to_string()),
            other => CliCommand::Invalid(format!("unknown command: {}", other)),
        },
    };

    CliArgs { command, verbose }
}

fn parse_sites(raw: &[String]) -> CliCommand {
    if raw.is_empty() {
        return CliCommand::Invalid("ensure needs at least one site id".to_string());
    }

    let mut sites = Vec::with_capacity(raw.len());
    for value in raw {
        match value.parse::<u64>() {
            Ok(id) => sites.push(SiteHandle(id)),
            Err(_) => return CliCommand::Invalid(format!("invalid site id: {}", value)),
        }
    }
    CliCommand::Ensure(sites)
}
