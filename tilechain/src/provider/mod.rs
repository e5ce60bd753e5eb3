//! Tile fetch providers.
//!
//! A provider is one strategy in the dispatcher's chain: read the disk
//! cache, look inside a packaged archive, or download. Providers accept a
//! [`RequestState`] without blocking and report exactly one outcome for it
//! from their own worker threads.
//!
//! Most providers are a [`ModuleProvider`]: a bounded [`WorkerPool`] running
//! a synchronous [`TileLoader`]. The loaders shipped here are:
//!
//! | Loader              | Network | Behaviour                                |
//! |---------------------|---------|------------------------------------------|
//! | [`SmartFsLoader`]   | yes     | Disk cache, filled from the network      |
//! | [`FilesystemLoader`]| no      | Disk cache with expiry                   |
//! | [`ArchiveLoader`]   | no      | Packaged tile archives                   |
//! | [`DownloaderLoader`]| yes     | Network only, optionally persisted       |

mod archive;
mod downloader;
mod filesystem;
mod module;
mod pool;
mod smart_fs;

pub use archive::ArchiveLoader;
pub use downloader::DownloaderLoader;
pub use filesystem::FilesystemLoader;
pub use module::ModuleProvider;
pub use pool::{PoolConfig, WorkerPool, WorkerSignal};
pub use smart_fs::SmartFsLoader;

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::dispatch::RequestState;
use crate::network::HttpError;
use crate::source::{DecodeError, TileSource};
use crate::tile::{TileImage, TileKey, ZoomRange};

/// One strategy in the provider chain.
pub trait TileProvider: Send + Sync {
    /// Display name, unique within a chain.
    fn name(&self) -> &str;

    /// Whether this provider needs network connectivity.
    fn uses_network(&self) -> bool;

    /// Zoom levels this provider can serve.
    fn zoom_range(&self) -> ZoomRange;

    /// Start loading a tile. Must not block.
    ///
    /// Exactly one of `report_success`, `report_failure` or `report_stale`
    /// is eventually called on `state`. When the provider cannot accept more
    /// work the failure is reported immediately.
    fn load_async(&self, state: RequestState);

    /// Use a new tile source for subsequent loads.
    fn set_source(&self, source: Arc<dyn TileSource>);

    /// Stop accepting work and abandon queued requests.
    fn detach(&self);

    /// Number of requests waiting in this provider's queue.
    fn pending(&self) -> usize;
}

/// Static metadata of a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Display name.
    pub name: String,
    /// Whether the provider requires network connectivity.
    pub uses_network: bool,
    /// Fixed zoom range. `None` follows the current tile source.
    pub zoom: Option<ZoomRange>,
}

impl ProviderDescriptor {
    /// Descriptor for a provider whose zoom range follows the source.
    pub fn new(name: impl Into<String>, uses_network: bool) -> Self {
        Self {
            name: name.into(),
            uses_network,
            zoom: None,
        }
    }

    /// Pin the provider to a fixed zoom range.
    pub fn with_zoom(mut self, zoom: ZoomRange) -> Self {
        self.zoom = Some(zoom);
        self
    }
}

/// Result of one synchronous load.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// A fresh tile.
    Loaded(TileImage),
    /// A usable tile past its expiry.
    Expired(TileImage),
    /// This loader has no copy of the tile.
    Missing,
}

/// Errors from a loader.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The loader cannot do useful work right now; its queue is drained.
    #[error("provider cannot continue: {0}")]
    CantContinue(String),

    /// This attempt failed; the chain moves on.
    #[error("load failed: {0}")]
    Failed(String),
}

impl From<DecodeError> for LoadError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::OutOfMemory(msg) => LoadError::CantContinue(msg),
            DecodeError::Invalid(msg) => LoadError::Failed(msg),
        }
    }
}

/// Synchronous tile loading, run on a provider's worker threads.
pub trait TileLoader: Send + Sync + 'static {
    /// Load `key` from `source`.
    fn load(&self, key: TileKey, source: &dyn TileSource) -> Result<LoadOutcome, LoadError>;
}

/// Errors building providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] io::Error),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] HttpError),
}
