//! Tally CLI
//!
//! Command-line entry point for the tally sync agent.
//!
//! # Commands
//!
//! - `run` - Apply pending hub updates to the ledger, then answer its queries
//! - `check-config` - Print the resolved configuration
//! - `version` - Show version information
//!
//! Exits with status 0 when the run completes (including when the hub has no
//! queries) and 1 on any failure.

mod commands;
mod logging;
mod settings;

use clap::{Parser, Subcommand};
use settings::{CliOverrides, Settings};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

/// Sync agent that reconciles a local ledger with its hub.
#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Maximum number of queries executed at once
    #[arg(global = true, long, value_name = "N")]
    max_parallel: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform one sync run (default)
    Run,

    /// Print the resolved configuration with secrets redacted
    CheckConfig,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    if let Commands::Version = command {
        println!("tally v{}", env!("CARGO_PKG_VERSION"));
        println!("tally agent v{}", tally_agent::VERSION);
        return ExitCode::SUCCESS;
    }

    let overrides = CliOverrides {
        config_path: cli.config,
        max_parallel_queries: cli.max_parallel,
        verbose: cli.verbose,
    };
    let settings = Settings::load(&overrides);

    let level = match &settings {
        Ok(settings) => settings.log_level.as_str(),
        Err(_) if cli.verbose => "debug",
        Err(_) => "info",
    };
    let log_file = match settings.as_ref().ok().and_then(|s| s.log_file.as_ref()) {
        Some(log_file) => match log_file.open() {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("failed to open log file {}: {}", log_file.path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };
    logging::init(level, cli.verbose, log_file);

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %error_chain(&e), "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match command {
        Commands::Run => match commands::run::run(&settings).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "sync run failed");
                ExitCode::FAILURE
            }
        },
        Commands::CheckConfig => {
            commands::check_config::run(&settings);
            ExitCode::SUCCESS
        }
        Commands::Version => ExitCode::SUCCESS,
    }
}

fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
