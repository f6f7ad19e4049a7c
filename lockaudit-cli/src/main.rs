//! lockaudit CLI entry point.
//!
//! Loads configuration, initialises logging, dispatches to the
//! subcommand handler and maps errors to exit codes.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use lockaudit_core::config::LockauditConfig;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let loaded = LockauditConfig::load_or_default(&cli.config).await;

    // `config validate` must be able to report a broken file, so logging
    // falls back to defaults when loading fails.
    let mut general = loaded
        .as_ref()
        .map(|c| c.general.clone())
        .unwrap_or_default();
    if let Some(level) = &cli.log_level {
        general.log_level.clone_from(level);
    }
    logging::init_tracing(&general)?;

    debug!(config = %cli.config.display(), "lockaudit starting");

    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
        Commands::Lock(args) => {
            let config = loaded?;
            commands::lock::execute(args, &config, &cli.filter, &writer).await
        }
        Commands::Package(args) => {
            let config = loaded?;
            commands::package::execute(args, &config, &cli.filter, &writer).await
        }
    }
}
