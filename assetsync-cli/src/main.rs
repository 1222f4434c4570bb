//! AssetSync CLI - Command-line interface
//!
//! Checks for, downloads and cleans manifest-driven asset updates for one
//! storage root.

mod commands;
mod error;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use commands::ConfigArgs;

#[derive(Debug, Parser)]
#[command(name = "assetsync", version, about = "Incremental asset updates from a remote manifest")]
struct Cli {
    /// INI configuration file (defaults to the per-user config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage root for cached manifests and downloaded assets
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Manifest shipped with the application
    #[arg(long, global = true)]
    bundled: Option<PathBuf>,

    /// Maximum concurrent asset downloads
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    /// Log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Hide the progress bar
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compare the local version against the remote one
    Check,
    /// Download and apply the remote version
    Update {
        /// Times to retry assets that failed to download
        #[arg(long, default_value_t = 2)]
        retries: u32,
    },
    /// Show the local manifest
    Status,
    /// Delete everything under the storage root
    Clean,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let args = ConfigArgs {
        config: cli.config,
        storage: cli.storage,
        bundled: cli.bundled,
        max_concurrent: cli.max_concurrent,
    };

    let result = match cli.command {
        Command::Check => commands::update::check(&args, cli.quiet),
        Command::Update { retries } => commands::update::update(&args, retries, cli.quiet),
        Command::Status => commands::status::run(&args),
        Command::Clean => commands::clean::run(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
