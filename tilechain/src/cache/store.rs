//! Persistent tile store on local disk.
//!
//! Every provider that touches storage resolves a tile to
//! `<root>/<source.relative_path(key)><extension>`. The root and extension are
//! fixed when the store is built from configuration.
//!
//! ```text
//! <root>/Mapnik/12/2200/1343.png.tile
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, trace};

use crate::source::TileSource;
use crate::tile::TileKey;

/// Extension appended to every stored tile.
pub const DEFAULT_TILE_EXTENSION: &str = ".tile";

/// Result of clearing the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearResult {
    /// Number of tile files removed.
    pub files_deleted: u64,
    /// Bytes freed.
    pub bytes_freed: u64,
}

/// Location of persisted tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileStore {
    root: PathBuf,
    extension: String,
}

impl TileStore {
    /// Create a store rooted at `root` with the default `.tile` extension.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_extension(root, DEFAULT_TILE_EXTENSION)
    }

    /// Create a store with a custom file extension.
    pub fn with_extension(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extension appended to every stored tile.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Storage name of a tile, relative to the root.
    pub fn entry_name(&self, source: &dyn TileSource, key: TileKey) -> String {
        format!("{}{}", source.relative_path(key), self.extension)
    }

    /// Full path of a tile.
    pub fn path_for(&self, source: &dyn TileSource, key: TileKey) -> PathBuf {
        self.root.join(self.entry_name(source, key))
    }

    /// Whether persistent storage can be used at all.
    ///
    /// Only probes the root. A missing root (e.g. removable media unmounted)
    /// is unavailable and is not recreated, so nothing lands on the
    /// underlying filesystem.
    pub fn is_available(&self) -> bool {
        let available = self.root.is_dir();
        if !available {
            trace!(root = %self.root.display(), "Tile store root missing");
        }
        available
    }

    /// Create the root directory if it does not exist yet.
    ///
    /// Called once when a chain is built; loaders never create it.
    pub fn create_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Whether a tile file exists.
    pub fn contains(&self, source: &dyn TileSource, key: TileKey) -> bool {
        self.path_for(source, key).is_file()
    }

    /// Read a stored tile.
    pub fn read(&self, source: &dyn TileSource, key: TileKey) -> io::Result<Vec<u8>> {
        fs::read(self.path_for(source, key))
    }

    /// Write a tile, replacing any previous copy.
    ///
    /// Writes to a temporary sibling first and renames it into place so a
    /// concurrent reader never sees a partial file.
    pub fn write(&self, source: &dyn TileSource, key: TileKey, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(source, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &path)?;

        Ok(path)
    }

    /// Time since a stored file was last modified.
    ///
    /// Returns `None` if the file is missing or the clock went backwards.
    pub fn age(&self, path: &Path) -> Option<Duration> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        SystemTime::now().duration_since(modified).ok()
    }

    /// All stored tile files.
    pub fn stored_files(&self) -> Vec<PathBuf> {
        let pattern = self.root.join("**").join(format!("*{}", self.extension));
        let pattern = pattern.to_string_lossy();

        match glob::glob(&pattern) {
            Ok(paths) => paths.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
            Err(e) => {
                debug!(pattern = %pattern, error = %e, "Invalid store glob pattern");
                Vec::new()
            }
        }
    }

    /// Number of stored tiles and their total size in bytes.
    pub fn stats(&self) -> (u64, u64) {
        self.stored_files()
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .fold((0, 0), |(files, bytes), meta| (files + 1, bytes + meta.len()))
    }

    /// Remove every stored tile.
    pub fn clear(&self) -> io::Result<ClearResult> {
        let mut result = ClearResult::default();
        for path in self.stored_files() {
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            fs::remove_file(&path)?;
            result.files_deleted += 1;
            result.bytes_freed += size;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::XyzTileSource;
    use tempfile::TempDir;

    fn source() -> XyzTileSource {
        XyzTileSource::new("Mapnik", "https://example.org/{z}/{x}/{y}.png")
    }

    #[test]
    fn test_path_for_appends_extension() {
        let store = TileStore::new("/data/tiles");
        assert_eq!(
            store.path_for(&source(), TileKey::new(12, 2200, 1343)),
            PathBuf::from("/data/tiles/Mapnik/12/2200/1343.png.tile")
        );
    }

    #[test]
    fn test_custom_extension() {
        let store = TileStore::with_extension("/data", ".bin");
        assert_eq!(store.entry_name(&source(), TileKey::new(1, 0, 1)), "Mapnik/1/0/1.png.bin");
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path());
        let key = TileKey::new(3, 1, 2);

        assert!(!store.contains(&source(), key));
        let path = store.write(&source(), key, b"tile bytes").unwrap();

        assert!(path.is_file());
        assert!(store.contains(&source(), key));
        assert_eq!(store.read(&source(), key).unwrap(), b"tile bytes");
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path());
        let path = store.write(&source(), TileKey::new(3, 1, 2), b"x").unwrap();

        let siblings: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(siblings.len(), 1);
    }

    #[test]
    fn test_is_available_does_not_create_root() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path().join("media").join("tiles"));

        assert!(!store.is_available());
        assert!(!store.root().exists());

        store.create_root().unwrap();
        assert!(store.is_available());
    }

    #[test]
    fn test_write_creates_parents_of_missing_root() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path().join("fresh"));

        store.write(&source(), TileKey::new(2, 1, 1), b"x").unwrap();
        assert!(store.is_available());
    }

    #[test]
    fn test_is_available_false_when_root_is_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("blocker");
        fs::write(&file, b"").unwrap();

        let store = TileStore::new(&file);
        assert!(!store.is_available());
    }

    #[test]
    fn test_age_of_fresh_file_is_small() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path());
        let path = store.write(&source(), TileKey::new(3, 1, 2), b"x").unwrap();

        let age = store.age(&path).unwrap();
        assert!(age < Duration::from_secs(60));
        assert!(store.age(&dir.path().join("missing")).is_none());
    }

    #[test]
    fn test_stats_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = TileStore::new(dir.path());
        store.write(&source(), TileKey::new(3, 1, 2), b"abc").unwrap();
        store.write(&source(), TileKey::new(4, 1, 2), b"defg").unwrap();

        assert_eq!(store.stats(), (2, 7));

        let cleared = store.clear().unwrap();
        assert_eq!(cleared.files_deleted, 2);
        assert_eq!(cleared.bytes_freed, 7);
        assert_eq!(store.stats(), (0, 0));
    }
}
