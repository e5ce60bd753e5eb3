//! Packaged tile archives.
//!
//! A tile archive bundles many stored tiles into a single read-only file so
//! a region can be shipped and served without network access. Entries are
//! named exactly like [`TileStore`] entries (`<relative path><extension>`),
//! so an archive can be produced directly from a populated store.
//!
//! # File Layout
//!
//! ```text
//! ┌──────────┬─────────────┬──────────────────┬─────────────────┬──────────────┐
//! │ "TCPK"   │ version u32 │ index length u64 │ bincode index   │ tile data... │
//! │ 4 bytes  │ LE          │ LE               │ name → (off,len)│              │
//! └──────────┴─────────────┴──────────────────┴─────────────────┴──────────────┘
//! ```
//!
//! Offsets in the index are relative to the start of the data region.

mod reader;
mod writer;

pub use reader::{open_archives, TileArchive};
pub use writer::{pack_store, TileArchiveWriter};

use std::collections::HashMap;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File extension of tile archives.
pub const ARCHIVE_EXTENSION: &str = "tcpk";

/// Magic bytes at the start of every archive.
pub(crate) const ARCHIVE_MAGIC: &[u8; 4] = b"TCPK";

/// Current archive format version.
pub(crate) const ARCHIVE_VERSION: u32 = 1;

/// Size of the fixed header preceding the index.
pub(crate) const HEADER_LEN: u64 = 4 + 4 + 8;

/// Errors from reading or writing archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not start with the archive magic.
    #[error("not a tile archive")]
    BadMagic,

    /// The archive was written by an unknown format version.
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u32),

    /// The index could not be encoded or decoded.
    #[error("corrupt archive index: {0}")]
    Index(String),

    /// An entry points outside the data region.
    #[error("entry {name} is out of bounds")]
    EntryOutOfBounds { name: String },
}

/// Location of one entry within the data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EntryLocation {
    pub offset: u64,
    pub len: u64,
}

/// Serialized archive index.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ArchiveIndex {
    pub entries: HashMap<String, EntryLocation>,
}
