//! Tile lookup in packaged archives.

use tracing::warn;

use super::{LoadError, LoadOutcome, TileLoader};
use crate::archive::TileArchive;
use crate::cache::DEFAULT_TILE_EXTENSION;
use crate::source::TileSource;
use crate::tile::TileKey;

/// Loads tiles from a list of opened [`TileArchive`]s, first match wins.
pub struct ArchiveLoader {
    archives: Vec<TileArchive>,
    extension: String,
}

impl ArchiveLoader {
    /// Create a loader over `archives`, searched in order.
    ///
    /// Entry names use the default tile extension.
    pub fn new(archives: Vec<TileArchive>) -> Self {
        Self::with_extension(archives, DEFAULT_TILE_EXTENSION)
    }

    /// Create a loader whose entry names end in `extension`.
    pub fn with_extension(archives: Vec<TileArchive>, extension: impl Into<String>) -> Self {
        Self {
            archives,
            extension: extension.into(),
        }
    }

    /// Number of archives searched.
    pub fn archive_count(&self) -> usize {
        self.archives.len()
    }
}

impl TileLoader for ArchiveLoader {
    fn load(&self, key: TileKey, source: &dyn TileSource) -> Result<LoadOutcome, LoadError> {
        let name = format!("{}{}", source.relative_path(key), self.extension);

        for archive in &self.archives {
            match archive.get(&name) {
                Ok(Some(bytes)) => return Ok(LoadOutcome::Loaded(source.decode(&bytes)?)),
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        archive = %archive.path().display(),
                        entry = %name,
                        error = %e,
                        "Failed to read archive entry"
                    );
                }
            }
        }

        Ok(LoadOutcome::Missing)
    }
}
