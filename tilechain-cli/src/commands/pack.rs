//! Pack the tile store into an archive.

use std::path::PathBuf;

use clap::Args;
use tilechain::archive::{pack_store, ARCHIVE_EXTENSION};
use tilechain::config::TileChainConfig;

use super::store_from;
use crate::error::CliError;

/// Arguments for `tilechain pack`.
#[derive(Debug, Args)]
pub struct PackArgs {
    /// Archive to create. Defaults to `<archive_directory>/tiles.tcpk`
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Run the pack command.
pub fn run(args: PackArgs, config: &TileChainConfig) -> Result<(), CliError> {
    let store = store_from(config);
    let output = args.output.unwrap_or_else(|| {
        config
            .storage
            .archive_directory
            .join(format!("tiles.{}", ARCHIVE_EXTENSION))
    });

    println!("Packing {} into {}", store.root().display(), output.display());
    let count = pack_store(&store, &output).map_err(CliError::Pack)?;
    println!("Packed {} tiles", count);
    Ok(())
}
