//! Tile caches.
//!
//! Two layers sit in front of the network:
//!
//! - [`MemoryCache`] - decoded tiles, consulted synchronously by the
//!   dispatcher before any provider runs
//! - [`TileStore`] - encoded tiles persisted on local disk, read and filled
//!   by the disk-backed providers

mod memory;
mod store;

pub use memory::{MemoryCache, MokaMemoryCache, DEFAULT_MEMORY_CACHE_BYTES};
pub use store::{ClearResult, TileStore, DEFAULT_TILE_EXTENSION};
