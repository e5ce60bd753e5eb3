//! Fetch a single tile through the provider chain.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::info;

use tilechain::chain::TileChainBuilder;
use tilechain::config::{ChainLayout, TileChainConfig};
use tilechain::dispatch::{ChannelCallback, TileDispatcher, TileEvent};
use tilechain::network::ManualConnectivity;
use tilechain::tile::{TileImage, TileKey, MAXIMUM_ZOOM};

use crate::error::CliError;

/// Interval at which a pending stale result is re-checked.
const STALE_POLL: Duration = Duration::from_millis(200);

/// Arguments for `tilechain fetch`.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Zoom level
    #[arg(long)]
    pub zoom: u8,

    /// Tile column (x)
    #[arg(long)]
    pub col: u32,

    /// Tile row (y)
    #[arg(long)]
    pub row: u32,

    /// URL template overriding the configured source, e.g.
    /// https://tile.example.org/{z}/{x}/{y}.png
    #[arg(long)]
    pub url: Option<String>,

    /// Use the filesystem → archive → downloader chain
    #[arg(long)]
    pub layered: bool,

    /// Skip every network-backed provider. The default smart layout has
    /// only a network-backed provider, so combine with --layered to read
    /// tiles already on disk
    #[arg(long)]
    pub offline: bool,

    /// Seconds to wait for the tile
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Save the decoded tile as an image (format from extension)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Run the fetch command.
pub fn run(args: FetchArgs, mut config: TileChainConfig) -> Result<(), CliError> {
    if args.zoom > MAXIMUM_ZOOM {
        return Err(CliError::Argument(format!(
            "zoom must be between 0 and {}",
            MAXIMUM_ZOOM
        )));
    }
    if let Some(url) = args.url {
        config.source.url_template = url;
    }
    if args.layered {
        config.layout = ChainLayout::Layered;
    }

    if args.offline && config.layout == ChainLayout::Smart {
        println!("Note: --offline leaves the smart layout with no usable provider; add --layered");
    }

    let key = TileKey::new(args.zoom, args.col, args.row);
    let (callback, mut events) = ChannelCallback::new();
    let connectivity = Arc::new(ManualConnectivity::new(!args.offline));

    // Built outside the runtime: the blocking HTTP client must not be
    // created or dropped on an async thread.
    let dispatcher = TileChainBuilder::new(config, Arc::new(callback))
        .connectivity(connectivity)
        .build()?;

    println!("Fetching tile {}", key);
    let image = match dispatcher.get(key) {
        Some(image) => image,
        None => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .map_err(CliError::Runtime)?;
            runtime.block_on(wait_for_tile(
                &dispatcher,
                &mut events,
                key,
                Duration::from_secs(args.timeout),
            ))?
        }
    };

    let stats = dispatcher.stats();
    info!(
        tile = %key,
        dispatched = stats.dispatched,
        stale = stats.stale_delivered,
        "Fetch finished"
    );

    println!(
        "  {}x{} pixels{}",
        image.width(),
        image.height(),
        if image.is_expired() { " (expired)" } else { "" }
    );

    if let Some(path) = args.output {
        image
            .pixels()
            .save(&path)
            .map_err(|e| CliError::FileWrite {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
        println!("  Saved to {}", path.display());
    }

    Ok(())
}

/// Wait for the best result for `key`.
///
/// A fresh tile wins. An expired tile is kept while the chain keeps looking
/// and returned once nothing is in flight for the key any more.
async fn wait_for_tile(
    dispatcher: &TileDispatcher,
    events: &mut UnboundedReceiver<TileEvent>,
    key: TileKey,
    timeout: Duration,
) -> Result<TileImage, CliError> {
    let deadline = Instant::now() + timeout;
    let mut stale: Option<TileImage> = None;

    loop {
        let now = Instant::now();
        if now >= deadline {
            return stale.ok_or(CliError::Timeout {
                key,
                secs: timeout.as_secs(),
            });
        }
        let wait = (deadline - now).min(STALE_POLL);

        match tokio::time::timeout(wait, events.recv()).await {
            Ok(Some(TileEvent::Delivered {
                key: delivered,
                image,
                expired,
            })) if delivered == key => {
                if !expired {
                    return Ok(image);
                }
                println!("  Got expired tile, looking for a fresher copy");
                stale = Some(image);
            }
            Ok(Some(TileEvent::Unavailable { key: missing })) if missing == key => {
                return stale.ok_or(CliError::Unavailable(key));
            }
            Ok(Some(_)) => {}
            Ok(None) => return stale.ok_or(CliError::Unavailable(key)),
            Err(_) => {
                if stale.is_some() && !dispatcher.is_in_flight(key) {
                    return stale.ok_or(CliError::Unavailable(key));
                }
            }
        }
    }
}
