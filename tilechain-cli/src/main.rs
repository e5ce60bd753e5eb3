//! tilechain CLI - Command-line interface
//!
//! Thin front end over the `tilechain` library: fetch a tile through the
//! provider chain and manage the local tile store.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tilechain::config::{default_config_path, TileChainConfig};
use tilechain::logging::{default_log_dir, init_logging, DEFAULT_LOG_FILE};

use commands::cache::CacheAction;
use commands::fetch::FetchArgs;
use commands::pack::PackArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tilechain")]
#[command(version, about = "Fetch map tiles through a coalescing provider chain", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also print log output to the terminal
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one tile through the provider chain
    Fetch(FetchArgs),
    /// Manage the local tile store
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Pack the tile store into a .tcpk archive
    Pack(PackArgs),
    /// Show the effective configuration
    Info,
}

fn main() {
    let cli = Cli::parse();

    let _logging_guard = match init_logging(&default_log_dir(), DEFAULT_LOG_FILE, cli.verbose) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = match TileChainConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => CliError::from(e).exit(),
    };

    let result = match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args, config),
        Commands::Cache { action } => commands::cache::run(action, &config),
        Commands::Pack(args) => commands::pack::run(args, &config),
        Commands::Info => commands::info::run(&config, &config_path),
    };

    if let Err(e) = result {
        e.exit();
    }
}
