//! Disk cache filled from the network on demand.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{LoadError, LoadOutcome, TileLoader};
use crate::cache::TileStore;
use crate::network::TileFetcher;
use crate::source::TileSource;
use crate::tile::TileKey;

/// Loads tiles from the [`TileStore`], downloading missing ones first.
///
/// The download runs synchronously on the provider's worker thread and is
/// attempted once per load. A tile that the fetcher reports as written but
/// that is not on disk afterwards is treated as missing.
pub struct SmartFsLoader {
    store: TileStore,
    fetcher: Option<Arc<dyn TileFetcher>>,
}

impl SmartFsLoader {
    /// Create a loader. Without a fetcher it only reads the store.
    pub fn new(store: TileStore, fetcher: Option<Arc<dyn TileFetcher>>) -> Self {
        Self { store, fetcher }
    }

    /// The store tiles are read from.
    pub fn store(&self) -> &TileStore {
        &self.store
    }

    fn decode_stored(&self, key: TileKey, source: &dyn TileSource) -> Result<LoadOutcome, LoadError> {
        let bytes = self
            .store
            .read(source, key)
            .map_err(|e| LoadError::Failed(format!("read {}: {}", key, e)))?;
        Ok(LoadOutcome::Loaded(source.decode(&bytes)?))
    }
}

impl TileLoader for SmartFsLoader {
    fn load(&self, key: TileKey, source: &dyn TileSource) -> Result<LoadOutcome, LoadError> {
        if !self.store.is_available() {
            debug!(tile = %key, root = %self.store.root().display(), "Tile store unavailable");
            return Ok(LoadOutcome::Missing);
        }

        if self.store.contains(source, key) {
            return self.decode_stored(key, source);
        }

        let Some(fetcher) = &self.fetcher else {
            return Ok(LoadOutcome::Missing);
        };

        let written = fetcher.fetch_and_persist(source, key);
        if self.store.contains(source, key) {
            return self.decode_stored(key, source);
        }

        if written {
            warn!(
                tile = %key,
                path = %self.store.path_for(source, key).display(),
                "Write reported success but file is missing"
            );
        } else {
            debug!(tile = %key, "Tile download or write failed");
        }
        Ok(LoadOutcome::Missing)
    }
}
