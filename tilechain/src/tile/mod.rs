//! Tile identity and decoded tile images.
//!
//! A [`TileKey`] names one cell of the zoom-level grid and is used both as the
//! memory cache key and as the coalescing key for in-flight requests. A
//! [`TileImage`] is the decoded result handed back to callers.

mod decoded;
mod key;

pub use decoded::TileImage;
pub use key::{TileKey, ZoomRange, MAXIMUM_ZOOM, MINIMUM_ZOOM};
