//! Tile store management CLI commands.

use clap::Subcommand;
use tilechain::config::{format_size, TileChainConfig};

use super::store_from;
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove every stored tile
    Clear,
    /// Show tile store statistics
    Stats,
}

/// Run a cache subcommand.
pub fn run(action: CacheAction, config: &TileChainConfig) -> Result<(), CliError> {
    let store = store_from(config);

    match action {
        CacheAction::Clear => {
            println!("Clearing tile store at: {}", store.root().display());
            let result = store.clear().map_err(CliError::CacheClear)?;
            println!(
                "Deleted {} files, freed {}",
                result.files_deleted,
                format_size(result.bytes_freed)
            );
            Ok(())
        }
        CacheAction::Stats => {
            println!("Tile store: {}", store.root().display());
            let (files, bytes) = store.stats();
            println!("  Files: {}", files);
            println!("  Size:  {}", format_size(bytes));
            Ok(())
        }
    }
}
