//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::storage::config::CliOverrides;

/// Showroom - lead capture API and offline-first edge cache.
#[derive(Parser, Debug)]
#[command(name = "showroom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // === Global flags ===
    /// Config file (overrides SHOWROOM_CONFIG)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Config overrides carried by the chosen command.
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        let mut overrides = CliOverrides {
            config_path: self.config.clone(),
            ..CliOverrides::default()
        };

        match &self.command {
            Commands::Serve(args) => {
                overrides.listen.clone_from(&args.listen);
            }
            Commands::Edge(args) => {
                overrides.listen.clone_from(&args.listen);
                overrides.origin.clone_from(&args.target.origin);
                overrides.database.clone_from(&args.target.database);
            }
            Commands::Worker(command) => {
                let target = command.target();
                overrides.origin.clone_from(&target.origin);
                overrides.database.clone_from(&target.database);
            }
        }
        overrides
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the lead API server
    Serve(ServeArgs),

    /// Run the offline caching proxy in front of the site
    Edge(EdgeArgs),

    /// Operate the offline worker
    #[command(subcommand)]
    Worker(WorkerCommand),
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address (e.g. 127.0.0.1:3000)
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,
}

/// Which site and database a worker command acts on.
#[derive(Args, Debug, Default)]
pub struct WorkerTarget {
    /// Site origin (e.g. https://cars.example)
    #[arg(long, value_name = "URL")]
    pub origin: Option<String>,

    /// Worker database path
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,
}

/// Arguments for the `edge` command.
#[derive(Args, Debug)]
pub struct EdgeArgs {
    /// Listen address (e.g. 127.0.0.1:8080)
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    #[command(flatten)]
    pub target: WorkerTarget,
}

/// Worker subcommands.
#[derive(Subcommand, Debug)]
pub enum WorkerCommand {
    /// Precache the manifest for the current version
    Install(WorkerTarget),

    /// Delete stale stores and make the current version active
    Activate(WorkerTarget),

    /// Replay queued form submissions
    Sync(SyncArgs),

    /// Show stores, queue and registered sync tags
    Status(StatusArgs),
}

impl WorkerCommand {
    /// Target shared by every subcommand.
    #[must_use]
    pub const fn target(&self) -> &WorkerTarget {
        match self {
            Self::Install(target) | Self::Activate(target) => target,
            Self::Sync(args) => &args.target,
            Self::Status(args) => &args.target,
        }
    }
}

/// Arguments for `worker sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Sync tag (defaults to the configured form tag)
    #[arg(long)]
    pub tag: Option<String>,

    #[command(flatten)]
    pub target: WorkerTarget,
}

/// Arguments for `worker status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub target: WorkerTarget,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn edge_overrides_flow_into_config() {
        let cli = Cli::parse_from([
            "showroom",
            "edge",
            "--listen",
            "0.0.0.0:8080",
            "--origin",
            "https://cars.example",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.listen.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(overrides.origin.as_deref(), Some("https://cars.example"));
    }

    #[test]
    fn worker_sync_takes_tag() {
        let cli = Cli::parse_from(["showroom", "worker", "sync", "--tag", "background-sync-form"]);
        let Commands::Worker(WorkerCommand::Sync(args)) = cli.command else {
            panic!("expected worker sync");
        };
        assert_eq!(args.tag.as_deref(), Some("background-sync-form"));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["showroom", "worker", "status", "--json", "--verbose"]);
        assert!(cli.verbose);
    }
}
