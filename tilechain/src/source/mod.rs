//! Tile source abstraction.
//!
//! A tile source knows how a tile is named on disk and on the network, how
//! stored bytes decode into a [`TileImage`], and which zoom levels it covers.
//! Every provider that touches storage resolves paths through the current
//! source, so swapping the source swaps the whole on-disk namespace.
//!
//! # Example
//!
//! ```
//! use tilechain::source::{TileSource, XyzTileSource};
//! use tilechain::tile::TileKey;
//!
//! let source = XyzTileSource::new("Mapnik", "https://tile.example.org/{z}/{x}/{y}.png");
//! let key = TileKey::new(3, 4, 2);
//!
//! assert_eq!(source.relative_path(key), "Mapnik/3/4/2.png");
//! assert_eq!(
//!     source.tile_url(key).as_deref(),
//!     Some("https://tile.example.org/3/4/2.png")
//! );
//! ```

mod xyz;

pub use xyz::XyzTileSource;

use thiserror::Error;

use crate::tile::{TileImage, TileKey, ZoomRange};

/// Errors produced while decoding stored tile bytes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The decoder could not allocate memory for the image.
    ///
    /// Providers treat this as a non-continuable condition for their queue.
    #[error("out of memory decoding tile: {0}")]
    OutOfMemory(String),

    /// The bytes are not a decodable image.
    #[error("invalid tile data: {0}")]
    Invalid(String),
}

/// A source of map tiles.
///
/// Implementations must be safe to call from many worker threads at once;
/// they are read-only after configuration.
pub trait TileSource: Send + Sync {
    /// Display name, also used as the top-level storage directory.
    fn name(&self) -> &str;

    /// Storage-relative path of a tile, without the store's file extension.
    fn relative_path(&self, key: TileKey) -> String;

    /// Decode stored bytes into a tile image.
    fn decode(&self, bytes: &[u8]) -> Result<TileImage, DecodeError>;

    /// Lowest zoom level this source serves.
    fn min_zoom(&self) -> u8;

    /// Highest zoom level this source serves.
    fn max_zoom(&self) -> u8;

    /// Zoom levels this source serves.
    fn zoom_range(&self) -> ZoomRange {
        ZoomRange::new(self.min_zoom(), self.max_zoom())
    }

    /// Network location of a tile, if the source can be downloaded.
    fn tile_url(&self, _key: TileKey) -> Option<String> {
        None
    }
}
