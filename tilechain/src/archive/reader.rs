//! Archive reader.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{
    ArchiveError, ArchiveIndex, EntryLocation, ARCHIVE_EXTENSION, ARCHIVE_MAGIC,
    ARCHIVE_VERSION, HEADER_LEN,
};

/// An opened tile archive.
///
/// The index is loaded once at open time; entry reads seek into the shared
/// file handle under a lock, so one archive can serve many worker threads.
pub struct TileArchive {
    path: PathBuf,
    index: ArchiveIndex,
    data_start: u64,
    data_len: u64,
    file: Mutex<File>,
}

impl TileArchive {
    /// Open an archive and load its index.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != ARCHIVE_MAGIC {
            return Err(ArchiveError::BadMagic);
        }

        let mut word = [0u8; 4];
        file.read_exact(&mut word)?;
        let version = u32::from_le_bytes(word);
        if version != ARCHIVE_VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }

        let mut long = [0u8; 8];
        file.read_exact(&mut long)?;
        let index_len = u64::from_le_bytes(long);
        if HEADER_LEN + index_len > file_len {
            return Err(ArchiveError::Index(format!(
                "index length {} exceeds file size {}",
                index_len, file_len
            )));
        }

        let mut encoded = vec![0u8; index_len as usize];
        file.read_exact(&mut encoded)?;
        let index: ArchiveIndex =
            bincode::deserialize(&encoded).map_err(|e| ArchiveError::Index(e.to_string()))?;

        let data_start = HEADER_LEN + index_len;
        debug!(
            path = %path.display(),
            entries = index.entries.len(),
            "Opened tile archive"
        );

        Ok(Self {
            path: path.to_path_buf(),
            index,
            data_start,
            data_len: file_len - data_start,
            file: Mutex::new(file),
        })
    }

    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.index.entries.len()
    }

    /// Returns true if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.index.entries.is_empty()
    }

    /// Whether an entry exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.entries.contains_key(name)
    }

    /// Entry names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.index.entries.keys().map(String::as_str)
    }

    /// Read an entry. Returns `Ok(None)` if the archive has no such entry.
    pub fn get(&self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        let Some(&EntryLocation { offset, len }) = self.index.entries.get(name) else {
            return Ok(None);
        };
        if offset.checked_add(len).map_or(true, |end| end > self.data_len) {
            return Err(ArchiveError::EntryOutOfBounds {
                name: name.to_string(),
            });
        }

        let mut bytes = vec![0u8; len as usize];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.data_start + offset))?;
        file.read_exact(&mut bytes)?;
        Ok(Some(bytes))
    }
}

impl std::fmt::Debug for TileArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileArchive")
            .field("path", &self.path)
            .field("entries", &self.index.entries.len())
            .finish()
    }
}

/// Open every `*.tcpk` archive in `dir`, sorted by file name.
///
/// Archives that fail to open are logged and skipped.
pub fn open_archives(dir: &Path) -> Vec<TileArchive> {
    let pattern = dir.join(format!("*.{}", ARCHIVE_EXTENSION));
    let pattern = pattern.to_string_lossy();

    let mut paths: Vec<PathBuf> = match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).collect(),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Invalid archive glob pattern");
            return Vec::new();
        }
    };
    paths.sort();

    let archives: Vec<TileArchive> = paths
        .iter()
        .filter_map(|path| match TileArchive::open(path) {
            Ok(archive) => Some(archive),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable tile archive");
                None
            }
        })
        .collect();

    info!(
        dir = %dir.display(),
        archives = archives.len(),
        "Loaded tile archives"
    );
    archives
}
