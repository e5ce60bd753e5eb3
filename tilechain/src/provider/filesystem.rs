//! Pure disk cache with expiry.

use std::time::Duration;

use tracing::trace;

use super::{LoadError, LoadOutcome, TileLoader};
use crate::cache::TileStore;
use crate::source::TileSource;
use crate::tile::TileKey;

/// Default age after which a stored tile is considered expired.
pub const DEFAULT_TILE_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Loads tiles from the [`TileStore`] only.
///
/// Tiles older than `max_age` are returned as [`LoadOutcome::Expired`] so
/// the chain can look for a fresher copy.
pub struct FilesystemLoader {
    store: TileStore,
    max_age: Duration,
}

impl FilesystemLoader {
    /// Create a loader treating tiles older than `max_age` as expired.
    pub fn new(store: TileStore, max_age: Duration) -> Self {
        Self { store, max_age }
    }

    /// Expiry age.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }
}

impl TileLoader for FilesystemLoader {
    fn load(&self, key: TileKey, source: &dyn TileSource) -> Result<LoadOutcome, LoadError> {
        if !self.store.is_available() {
            return Ok(LoadOutcome::Missing);
        }

        let path = self.store.path_for(source, key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LoadOutcome::Missing);
            }
            Err(e) => return Err(LoadError::Failed(format!("read {}: {}", path.display(), e))),
        };

        let image = source.decode(&bytes)?;
        let expired = self
            .store
            .age(&path)
            .is_some_and(|age| age > self.max_age);

        if expired {
            trace!(tile = %key, "Stored tile expired");
            Ok(LoadOutcome::Expired(image.with_expired(true)))
        } else {
            Ok(LoadOutcome::Loaded(image))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{png_bytes, source};
    use filetime::FileTime;
    use std::time::SystemTime;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_tile_is_loaded() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path());
        let key = TileKey::new(8, 10, 20);
        store.write(&source(), key, &png_bytes()).unwrap();

        let loader = FilesystemLoader::new(store, DEFAULT_TILE_EXPIRY);
        assert!(matches!(
            loader.load(key, &source()).unwrap(),
            LoadOutcome::Loaded(img) if !img.is_expired()
        ));
    }

    #[test]
    fn test_old_tile_is_expired() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path());
        let key = TileKey::new(8, 10, 20);
        let path = store.write(&source(), key, &png_bytes()).unwrap();

        let eight_days_ago = SystemTime::now() - Duration::from_secs(8 * 24 * 60 * 60);
        filetime::set_file_mtime(&path, FileTime::from_system_time(eight_days_ago)).unwrap();

        let loader = FilesystemLoader::new(store, DEFAULT_TILE_EXPIRY);
        assert!(matches!(
            loader.load(key, &source()).unwrap(),
            LoadOutcome::Expired(img) if img.is_expired()
        ));
    }

    #[test]
    fn test_absent_tile_is_missing() {
        let dir = TempDir::new().unwrap();
        let loader = FilesystemLoader::new(TileStore::new(dir.path()), DEFAULT_TILE_EXPIRY);

        assert!(matches!(
            loader.load(TileKey::new(8, 10, 20), &source()).unwrap(),
            LoadOutcome::Missing
        ));
    }

    #[test]
    fn test_corrupt_tile_fails() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path());
        let key = TileKey::new(8, 10, 20);
        store.write(&source(), key, b"garbage").unwrap();

        let loader = FilesystemLoader::new(store, DEFAULT_TILE_EXPIRY);
        assert!(matches!(loader.load(key, &source()), Err(LoadError::Failed(_))));
    }
}
