//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! - [`cache`] - Tile store management (stats, clear)
//! - [`fetch`] - Fetch one tile through the provider chain
//! - [`info`] - Print the effective configuration
//! - [`pack`] - Pack the tile store into an archive

pub mod cache;
pub mod fetch;
pub mod info;
pub mod pack;

use tilechain::cache::TileStore;
use tilechain::config::TileChainConfig;

/// The tile store described by `config`.
pub fn store_from(config: &TileChainConfig) -> TileStore {
    TileStore::with_extension(
        config.storage.directory.clone(),
        config.storage.extension.clone(),
    )
}
