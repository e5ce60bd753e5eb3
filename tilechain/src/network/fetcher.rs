//! Network fetch-and-persist collaborator.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{ConnectivityProbe, HttpClient};
use crate::cache::TileStore;
use crate::source::TileSource;
use crate::tile::TileKey;

/// Downloads a tile and writes it to the tile store.
///
/// Called synchronously from a provider worker thread. One call is one
/// attempt; there is no retry.
pub trait TileFetcher: Send + Sync {
    /// Fetch `key` from `source` and persist it.
    ///
    /// Returns true iff the bytes were written to the store path of `key`.
    fn fetch_and_persist(&self, source: &dyn TileSource, key: TileKey) -> bool;
}

/// [`TileFetcher`] that downloads with an [`HttpClient`].
pub struct HttpTileFetcher {
    client: Arc<dyn HttpClient>,
    store: TileStore,
    connectivity: Arc<dyn ConnectivityProbe>,
}

impl HttpTileFetcher {
    /// Create a fetcher writing into `store`.
    pub fn new(
        client: Arc<dyn HttpClient>,
        store: TileStore,
        connectivity: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        Self {
            client,
            store,
            connectivity,
        }
    }

    /// The store tiles are written into.
    pub fn store(&self) -> &TileStore {
        &self.store
    }
}

impl TileFetcher for HttpTileFetcher {
    fn fetch_and_persist(&self, source: &dyn TileSource, key: TileKey) -> bool {
        if !self.connectivity.is_available() {
            debug!(tile = %key, "No connectivity, skipping download");
            return false;
        }

        let Some(url) = source.tile_url(key) else {
            debug!(tile = %key, source = source.name(), "Source has no URL for tile");
            return false;
        };

        let bytes = match self.client.get(&url) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(tile = %key, url = %url, error = %e, "Tile download failed");
                return false;
            }
        };

        if bytes.is_empty() {
            warn!(tile = %key, url = %url, "Tile download returned an empty body");
            return false;
        }

        match self.store.write(source, key, &bytes) {
            Ok(path) => {
                debug!(
                    tile = %key,
                    path = %path.display(),
                    size_bytes = bytes.len(),
                    "Tile written to store"
                );
                true
            }
            Err(e) => {
                warn!(tile = %key, error = %e, "Failed to write downloaded tile");
                false
            }
        }
    }
}
