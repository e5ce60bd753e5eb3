//! Network-only tile loading.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{LoadError, LoadOutcome, TileLoader};
use crate::cache::TileStore;
use crate::network::HttpClient;
use crate::source::TileSource;
use crate::tile::TileKey;

/// Downloads tiles and decodes them directly.
///
/// When a store is configured the downloaded bytes are also written to it,
/// so a disk provider earlier in the chain finds them next time.
pub struct DownloaderLoader {
    client: Arc<dyn HttpClient>,
    store: Option<TileStore>,
}

impl DownloaderLoader {
    /// Create a downloader, optionally persisting into `store`.
    pub fn new(client: Arc<dyn HttpClient>, store: Option<TileStore>) -> Self {
        Self { client, store }
    }
}

impl TileLoader for DownloaderLoader {
    fn load(&self, key: TileKey, source: &dyn TileSource) -> Result<LoadOutcome, LoadError> {
        let Some(url) = source.tile_url(key) else {
            debug!(tile = %key, source = source.name(), "Source has no URL for tile");
            return Ok(LoadOutcome::Missing);
        };

        let bytes = self
            .client
            .get(&url)
            .map_err(|e| LoadError::Failed(e.to_string()))?;
        if bytes.is_empty() {
            return Err(LoadError::Failed(format!("empty response from {}", url)));
        }

        let image = source.decode(&bytes)?;

        if let Some(store) = &self.store {
            if let Err(e) = store.write(source, key, &bytes) {
                warn!(tile = %key, error = %e, "Failed to persist downloaded tile");
            }
        }

        Ok(LoadOutcome::Loaded(image))
    }
}
