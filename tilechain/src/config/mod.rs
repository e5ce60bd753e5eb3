//! Configuration for a tile chain.
//!
//! Settings are read from an INI file. Every key is optional; missing keys
//! keep their defaults.
//!
//! ```ini
//! [source]
//! name = Mapnik
//! url = https://tile.openstreetmap.org/{z}/{x}/{y}.png
//! min_zoom = 0
//! max_zoom = 19
//!
//! [storage]
//! directory = ~/.cache/tilechain/tiles
//! extension = .tile
//! archive_directory = ~/.cache/tilechain/archives
//! expiry_days = 7
//!
//! [memory_cache]
//! max_size = 256MB
//!
//! [chain]
//! layout = smart
//!
//! [pools]
//! filesystem_threads = 8
//! filesystem_queue = 40
//! download_threads = 2
//! download_queue = 40
//!
//! [download]
//! timeout = 30
//! user_agent = tilechain/0.1
//! ```

mod parser;

pub use parser::{format_size, parse_size};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::cache::{DEFAULT_MEMORY_CACHE_BYTES, DEFAULT_TILE_EXTENSION};
use crate::provider::PoolConfig;
use crate::source::XyzTileSource;

/// Default number of filesystem worker threads.
pub const DEFAULT_FILESYSTEM_THREADS: usize = 8;

/// Default number of download worker threads.
pub const DEFAULT_DOWNLOAD_THREADS: usize = 2;

/// Default bound of each provider queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 40;

/// Default tile expiry in days.
pub const DEFAULT_EXPIRY_DAYS: u64 = 7;

/// Default HTTP timeout in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    /// A value is malformed or out of range.
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Which providers make up the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChainLayout {
    /// One disk provider that downloads missing tiles itself.
    #[default]
    Smart,
    /// Filesystem, then archives, then downloader.
    Layered,
}

impl FromStr for ChainLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "smart" => Ok(ChainLayout::Smart),
            "layered" => Ok(ChainLayout::Layered),
            other => Err(format!("unknown chain layout '{}'", other)),
        }
    }
}

impl fmt::Display for ChainLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainLayout::Smart => write!(f, "smart"),
            ChainLayout::Layered => write!(f, "layered"),
        }
    }
}

/// `[source]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub name: String,
    pub url_template: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl SourceConfig {
    /// Build the tile source described by this section.
    pub fn to_source(&self) -> XyzTileSource {
        XyzTileSource::new(self.name.clone(), self.url_template.clone())
            .with_zoom(self.min_zoom, self.max_zoom)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        let osm = XyzTileSource::openstreetmap();
        Self {
            name: "Mapnik".to_string(),
            url_template: osm.url_template().to_string(),
            min_zoom: 0,
            max_zoom: 19,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Root of the tile store.
    pub directory: PathBuf,
    /// Extension appended to stored tiles.
    pub extension: String,
    /// Directory searched for `.tcpk` archives.
    pub archive_directory: PathBuf,
    /// Age after which a stored tile is expired.
    pub expiry: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = default_base_dir();
        Self {
            directory: base.join("tiles"),
            extension: DEFAULT_TILE_EXTENSION.to_string(),
            archive_directory: base.join("archives"),
            expiry: Duration::from_secs(DEFAULT_EXPIRY_DAYS * 24 * 60 * 60),
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            user_agent: format!("tilechain/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Complete chain configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileChainConfig {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    /// Memory cache budget in bytes.
    pub memory_cache_bytes: u64,
    pub layout: ChainLayout,
    pub filesystem_pool: PoolConfig,
    pub download_pool: PoolConfig,
    pub download: DownloadConfig,
}

impl Default for TileChainConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            memory_cache_bytes: DEFAULT_MEMORY_CACHE_BYTES,
            layout: ChainLayout::default(),
            filesystem_pool: PoolConfig::new(DEFAULT_FILESYSTEM_THREADS, DEFAULT_QUEUE_CAPACITY),
            download_pool: PoolConfig::new(DEFAULT_DOWNLOAD_THREADS, DEFAULT_QUEUE_CAPACITY),
            download: DownloadConfig::default(),
        }
    }
}

impl TileChainConfig {
    /// Load from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Overlay the values in `ini` on the defaults.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        parser::parse_ini(ini)
    }

    /// Load the file at the default location.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&default_config_path())
    }
}

/// Base directory for tiles, archives and logs.
pub fn default_base_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tilechain")
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tilechain")
        .join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TileChainConfig::default();
        assert_eq!(config.filesystem_pool, PoolConfig::new(8, 40));
        assert_eq!(config.download_pool, PoolConfig::new(2, 40));
        assert_eq!(config.storage.extension, ".tile");
        assert_eq!(config.storage.expiry, Duration::from_secs(7 * 86400));
        assert_eq!(config.layout, ChainLayout::Smart);
        assert_eq!(config.memory_cache_bytes, DEFAULT_MEMORY_CACHE_BYTES);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = TileChainConfig::load(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, TileChainConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(
            &path,
            "[storage]\ndirectory = /srv/tiles\nexpiry_days = 2\n\n[chain]\nlayout = layered\n",
        )
        .unwrap();

        let config = TileChainConfig::load(&path).unwrap();
        assert_eq!(config.storage.directory, PathBuf::from("/srv/tiles"));
        assert_eq!(config.storage.expiry, Duration::from_secs(2 * 86400));
        assert_eq!(config.layout, ChainLayout::Layered);
    }

    #[test]
    fn test_chain_layout_parse() {
        assert_eq!("Layered".parse::<ChainLayout>(), Ok(ChainLayout::Layered));
        assert!("mixed".parse::<ChainLayout>().is_err());
        assert_eq!(ChainLayout::Smart.to_string(), "smart");
    }

    #[test]
    fn test_source_config_builds_source() {
        use crate::source::TileSource;

        let source = SourceConfig::default().to_source();
        assert_eq!(source.name(), "Mapnik");
        assert_eq!(source.max_zoom(), 19);
    }
}
