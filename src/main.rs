//! showroom - lead capture API and offline-first edge cache.
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use std::process::ExitCode;

use clap::Parser;

use showroom::cli::{Cli, Commands};
use showroom::core::logging;
use showroom::storage::ResolvedConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let resolved = ResolvedConfig::resolve(&cli.overrides());

    let config_level = resolved
        .as_ref()
        .ok()
        .and_then(|r| r.config.general.log_level.as_deref());
    logging::init(&logging::LogSettings::resolve(
        cli.log_level.as_deref(),
        config_level,
        cli.json_output,
        cli.verbose,
    ));

    let result = match resolved {
        Ok(config) => run(&cli, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), "{e}");
            eprintln!("error[{}]: {e}", e.error_code());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: &Cli, config: &ResolvedConfig) -> showroom::Result<()> {
    match &cli.command {
        Commands::Serve(_) => showroom::cli::serve::execute_serve(config).await,
        Commands::Edge(_) => showroom::cli::serve::execute_edge(config).await,
        Commands::Worker(command) => {
            showroom::cli::worker::execute(command, config, cli.no_color).await
        }
    }
}
