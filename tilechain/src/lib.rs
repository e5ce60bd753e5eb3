//! tilechain - request-coalescing map tile dispatcher
//!
//! This library resolves map tile requests through an in-memory cache and an
//! ordered chain of fallback providers (disk cache, packaged archives,
//! network download), keeping at most one fetch in flight per tile.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tilechain::chain::TileChainBuilder;
//! use tilechain::config::TileChainConfig;
//! use tilechain::dispatch::{ChannelCallback, TileEvent};
//! use tilechain::tile::TileKey;
//!
//! let (callback, mut events) = ChannelCallback::new();
//! let dispatcher = TileChainBuilder::new(TileChainConfig::default(), Arc::new(callback))
//!     .build()
//!     .expect("chain");
//!
//! let key = TileKey::new(12, 2200, 1343);
//! if dispatcher.get(key).is_none() {
//!     if let Some(TileEvent::Delivered { image, .. }) = events.blocking_recv() {
//!         println!("{}x{}", image.width(), image.height());
//!     }
//! }
//! ```

pub mod archive;
pub mod cache;
pub mod chain;
pub mod config;
pub mod dispatch;
pub mod logging;
pub mod network;
pub mod provider;
pub mod source;
pub mod tile;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
