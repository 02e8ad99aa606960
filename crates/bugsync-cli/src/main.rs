#![forbid(unsafe_code)]

mod client;
mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "bugsync: keep a remote analysis store in sync with Bugzilla queries",
    long_about = None
)]
struct Cli {
    /// Enable debug logging (ignored when BUGSYNC_LOG is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Run one synchronization pass",
        long_about = "List every remote analysis, run its Bugzilla query, then add, refresh \
                      or remove bugs on the remote store so it matches the queries.",
        after_help = "EXAMPLES:\n    # Inside a Taskcluster task (secrets through the proxy)\n    bugsync run --secrets-path project/releng/shipit/bot\n\n    # Locally, without touching the remote store\n    bugsync run --secrets-file secrets.toml --dry-run\n\n    # Emit machine-readable output\n    bugsync run --secrets-file secrets.toml --json"
    )]
    Run(cmd::run::RunArgs),

    #[command(
        about = "List remote analyses",
        after_help = "EXAMPLES:\n    bugsync analyses --secrets-file secrets.toml"
    )]
    Analyses(cmd::analyses::AnalysesArgs),

    #[command(
        about = "Print the content hash of a bug record",
        long_about = "Print the hash used for change detection of a raw bug record JSON file.",
        after_help = "EXAMPLES:\n    bugsync hash bug-1234.json"
    )]
    Hash(cmd::hash::HashArgs),

    #[command(
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    bugsync completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("BUGSYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "bugsync=debug,info"
        } else {
            "bugsync=info,warn"
        })
    });

    let format = env::var("BUGSYNC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(command = ?cli.command, "Starting");

    let output = output::resolve_output_mode(cli.json);

    match &cli.command {
        Commands::Run(args) => cmd::run::run_sync(args, output),
        Commands::Analyses(args) => cmd::analyses::run_analyses(args, output),
        Commands::Hash(args) => cmd::hash::run_hash(args, output),
        Commands::Completions(args) => {
            cmd::completions::run_completions(args, &mut Cli::command())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["bugsync", "hash", "bug.json", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Hash(_)));
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::parse_from([
            "bugsync",
            "run",
            "--secrets-path",
            "project/releng/shipit/bot",
            "--client-id",
            "id",
            "--access-token",
            "token",
            "--dry-run",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.dry_run);
        assert_eq!(args.secrets.secrets_path.as_deref(), Some("project/releng/shipit/bot"));
        assert_eq!(args.secrets.client_id.as_deref(), Some("id"));
    }

    #[test]
    fn secrets_path_and_file_conflict() {
        let result = Cli::try_parse_from([
            "bugsync",
            "run",
            "--secrets-path",
            "a",
            "--secrets-file",
            "b.toml",
        ]);
        assert!(result.is_err());
    }
}
