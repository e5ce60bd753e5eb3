//! Print the effective configuration.

use std::path::Path;

use tilechain::config::{format_size, TileChainConfig};

use crate::error::CliError;

/// Run the info command.
pub fn run(config: &TileChainConfig, config_path: &Path) -> Result<(), CliError> {
    println!("tilechain {}", tilechain::VERSION);
    println!();
    println!("Config file:   {}", config_path.display());
    println!(
        "Source:        {} ({}..={})",
        config.source.name, config.source.min_zoom, config.source.max_zoom
    );
    println!("URL template:  {}", config.source.url_template);
    println!("Layout:        {}", config.layout);
    println!();
    println!("Tile store:    {}", config.storage.directory.display());
    println!("Extension:     {}", config.storage.extension);
    println!("Archives:      {}", config.storage.archive_directory.display());
    println!(
        "Expiry:        {} days",
        config.storage.expiry.as_secs() / (24 * 60 * 60)
    );
    println!("Memory cache:  {}", format_size(config.memory_cache_bytes));
    println!();
    println!(
        "Filesystem pool: {} threads, queue {}",
        config.filesystem_pool.threads, config.filesystem_pool.queue_capacity
    );
    println!(
        "Download pool:   {} threads, queue {}",
        config.download_pool.threads, config.download_pool.queue_capacity
    );
    println!(
        "Download:        {}s timeout, agent '{}'",
        config.download.timeout_secs, config.download.user_agent
    );
    Ok(())
}
