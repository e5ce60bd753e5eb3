//! Archive writer.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use super::{
    ArchiveError, ArchiveIndex, EntryLocation, ARCHIVE_MAGIC, ARCHIVE_VERSION,
};
use crate::cache::TileStore;

/// Collects entries in memory and writes them out as one archive.
#[derive(Debug, Default)]
pub struct TileArchiveWriter {
    entries: BTreeMap<String, Vec<u8>>,
}

impl TileArchiveWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn add(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(name.into(), bytes);
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries were added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the archive to `path`.
    ///
    /// Writes to a temp file first, then renames for atomicity.
    pub fn write_to(&self, path: &Path) -> Result<(), ArchiveError> {
        let mut index = ArchiveIndex::default();
        let mut offset = 0u64;
        for (name, bytes) in &self.entries {
            let len = bytes.len() as u64;
            index
                .entries
                .insert(name.clone(), EntryLocation { offset, len });
            offset += len;
        }

        let encoded_index =
            bincode::serialize(&index).map_err(|e| ArchiveError::Index(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            writer.write_all(ARCHIVE_MAGIC)?;
            writer.write_all(&ARCHIVE_VERSION.to_le_bytes())?;
            writer.write_all(&(encoded_index.len() as u64).to_le_bytes())?;
            writer.write_all(&encoded_index)?;
            for bytes in self.entries.values() {
                writer.write_all(bytes)?;
            }
            writer.flush()?;
        }
        fs::rename(&temp_path, path)?;

        Ok(())
    }
}

/// Pack every tile in `store` into a new archive at `output`.
///
/// Returns the number of tiles packed.
pub fn pack_store(store: &TileStore, output: &Path) -> Result<usize, ArchiveError> {
    let mut writer = TileArchiveWriter::new();

    for path in store.stored_files() {
        let Ok(relative) = path.strip_prefix(store.root()) else {
            continue;
        };
        // Entry names always use forward slashes, matching relative paths.
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.add(name, fs::read(&path)?);
    }

    writer.write_to(output)?;
    info!(
        tiles = writer.len(),
        output = %output.display(),
        "Packed tile store into archive"
    );
    Ok(writer.len())
}
