//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use tilechain::archive::ArchiveError;
use tilechain::config::ConfigError;
use tilechain::provider::ProviderError;
use tilechain::tile::TileKey;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(ConfigError),
    /// Invalid command-line argument
    Argument(String),
    /// Failed to build the provider chain
    Chain(ProviderError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// No provider could produce the tile
    Unavailable(TileKey),
    /// The tile did not arrive in time
    Timeout { key: TileKey, secs: u64 },
    /// Failed to write output file
    FileWrite { path: String, error: String },
    /// Failed to clear the tile store
    CacheClear(std::io::Error),
    /// Failed to pack the tile store
    Pack(ArchiveError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Unavailable(_) | CliError::Timeout { .. } => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. No network connection (or --offline was given)");
                eprintln!("  2. Zoom level outside the source's range");
                eprintln!("  3. The tile server rejected the request (check the log)");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run 'tilechain info' to see the effective configuration.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Argument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Chain(e) => write!(f, "Failed to build tile chain: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Unavailable(key) => write!(f, "Tile {} is unavailable", key),
            CliError::Timeout { key, secs } => {
                write!(f, "Tile {} did not arrive within {}s", key, secs)
            }
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
            CliError::CacheClear(e) => write!(f, "Failed to clear tile store: {}", e),
            CliError::Pack(e) => write!(f, "Failed to pack tile store: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Chain(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::CacheClear(e) => Some(e),
            CliError::Pack(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::Chain(e)
    }
}
