//! Assembling a dispatcher from configuration.
//!
//! Two layouts are supported:
//!
//! ```text
//! Smart:    [smart-fs] ──(download on miss, then re-read disk)
//! Layered:  [filesystem] → [archive]? → [downloader]
//! ```
//!
//! The archive stage is only added when the archive directory holds at
//! least one readable `.tcpk` file.

use std::sync::Arc;

use tracing::{info, warn};

use crate::archive::open_archives;
use crate::cache::{MemoryCache, MokaMemoryCache, TileStore};
use crate::config::{ChainLayout, TileChainConfig};
use crate::dispatch::{TileCallback, TileDispatcher};
use crate::network::{
    AlwaysConnected, ConnectivityProbe, HttpClient, HttpTileFetcher, ReqwestClient, TileFetcher,
};
use crate::provider::{
    ArchiveLoader, DownloaderLoader, FilesystemLoader, ModuleProvider, ProviderDescriptor,
    ProviderError, SmartFsLoader, TileProvider,
};
use crate::source::TileSource;

/// Provider names used by the built-in layouts.
pub mod names {
    pub const SMART_FS: &str = "smart-fs";
    pub const FILESYSTEM: &str = "filesystem";
    pub const ARCHIVE: &str = "archive";
    pub const DOWNLOADER: &str = "downloader";
}

/// Builds a [`TileDispatcher`] and its provider chain.
///
/// Every collaborator defaults to the production implementation derived
/// from the configuration; tests and embedders replace them individually.
pub struct TileChainBuilder {
    config: TileChainConfig,
    callback: Arc<dyn TileCallback>,
    source: Option<Arc<dyn TileSource>>,
    connectivity: Option<Arc<dyn ConnectivityProbe>>,
    http_client: Option<Arc<dyn HttpClient>>,
    memory_cache: Option<Arc<dyn MemoryCache>>,
}

impl TileChainBuilder {
    /// Start from `config`, delivering results to `callback`.
    pub fn new(config: TileChainConfig, callback: Arc<dyn TileCallback>) -> Self {
        Self {
            config,
            callback,
            source: None,
            connectivity: None,
            http_client: None,
            memory_cache: None,
        }
    }

    /// Override the configured layout.
    pub fn layout(mut self, layout: ChainLayout) -> Self {
        self.config.layout = layout;
        self
    }

    /// Use `source` instead of the one described by the configuration.
    pub fn source(mut self, source: Arc<dyn TileSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use a custom connectivity probe. Defaults to [`AlwaysConnected`].
    pub fn connectivity(mut self, connectivity: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Use a custom HTTP client. Defaults to a [`ReqwestClient`].
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Use a custom memory cache. Defaults to a [`MokaMemoryCache`].
    pub fn memory_cache(mut self, cache: Arc<dyn MemoryCache>) -> Self {
        self.memory_cache = Some(cache);
        self
    }

    /// Build the dispatcher and start every provider's workers.
    pub fn build(self) -> Result<TileDispatcher, ProviderError> {
        let config = self.config;

        let memory_cache: Arc<dyn MemoryCache> = match self.memory_cache {
            Some(cache) => cache,
            None => Arc::new(MokaMemoryCache::new(config.memory_cache_bytes)),
        };
        let connectivity: Arc<dyn ConnectivityProbe> = match self.connectivity {
            Some(probe) => probe,
            None => Arc::new(AlwaysConnected),
        };
        let http_client: Arc<dyn HttpClient> = match self.http_client {
            Some(client) => client,
            None => Arc::new(ReqwestClient::with_timeout(
                config.download.timeout_secs,
                Some(&config.download.user_agent),
            )?),
        };
        let source: Arc<dyn TileSource> = match self.source {
            Some(source) => source,
            None => Arc::new(config.source.to_source()),
        };

        let store = TileStore::with_extension(
            config.storage.directory.clone(),
            config.storage.extension.clone(),
        );
        if let Err(e) = store.create_root() {
            warn!(
                root = %store.root().display(),
                error = %e,
                "Cannot create tile store root, disk stages will miss"
            );
        }

        let dispatcher = TileDispatcher::new(memory_cache, Arc::clone(&connectivity), self.callback);
        dispatcher.set_source(source);

        let providers: Vec<Arc<dyn TileProvider>> = match config.layout {
            ChainLayout::Smart => {
                let fetcher: Arc<dyn TileFetcher> = Arc::new(HttpTileFetcher::new(
                    http_client,
                    store.clone(),
                    connectivity,
                ));
                let smart: Arc<dyn TileProvider> = Arc::new(ModuleProvider::new(
                    ProviderDescriptor::new(names::SMART_FS, true),
                    SmartFsLoader::new(store, Some(fetcher)),
                    config.filesystem_pool,
                )?);
                vec![smart]
            }
            ChainLayout::Layered => {
                let mut providers: Vec<Arc<dyn TileProvider>> = Vec::with_capacity(3);
                providers.push(Arc::new(ModuleProvider::new(
                    ProviderDescriptor::new(names::FILESYSTEM, false),
                    FilesystemLoader::new(store.clone(), config.storage.expiry),
                    config.filesystem_pool,
                )?));

                let archives = open_archives(&config.storage.archive_directory);
                if !archives.is_empty() {
                    providers.push(Arc::new(ModuleProvider::new(
                        ProviderDescriptor::new(names::ARCHIVE, false),
                        ArchiveLoader::with_extension(archives, store.extension()),
                        config.filesystem_pool,
                    )?));
                }

                providers.push(Arc::new(ModuleProvider::new(
                    ProviderDescriptor::new(names::DOWNLOADER, true),
                    DownloaderLoader::new(http_client, Some(store)),
                    config.download_pool,
                )?));
                providers
            }
        };

        for provider in providers {
            dispatcher.add_provider(provider);
        }

        info!(
            layout = %config.layout,
            providers = dispatcher.providers().len(),
            zoom = %dispatcher.zoom_range(),
            "Tile chain built"
        );
        Ok(dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::TileArchiveWriter;
    use crate::dispatch::ChannelCallback;
    use crate::network::MockHttpClient;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> TileChainConfig {
        let mut config = TileChainConfig::default();
        config.storage.directory = dir.path().join("tiles");
        config.storage.archive_directory = dir.path().join("archives");
        config
    }

    fn names_of(dispatcher: &TileDispatcher) -> Vec<String> {
        dispatcher
            .providers()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    #[test]
    fn test_smart_layout() {
        let dir = TempDir::new().unwrap();
        let (callback, _events) = ChannelCallback::new();

        let dispatcher = TileChainBuilder::new(config(&dir), Arc::new(callback))
            .http_client(Arc::new(MockHttpClient::failing(500)))
            .build()
            .unwrap();

        assert_eq!(names_of(&dispatcher), vec![names::SMART_FS]);
        assert_eq!(dispatcher.zoom_range().max(), 19);
        assert!(dispatcher.providers()[0].uses_network());
    }

    #[test]
    fn test_build_creates_store_root() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let root = config.storage.directory.clone();
        assert!(!root.exists());
        let (callback, _events) = ChannelCallback::new();

        let _dispatcher = TileChainBuilder::new(config, Arc::new(callback))
            .http_client(Arc::new(MockHttpClient::failing(500)))
            .build()
            .unwrap();

        assert!(root.is_dir());
    }

    #[test]
    fn test_layered_layout_without_archives() {
        let dir = TempDir::new().unwrap();
        let (callback, _events) = ChannelCallback::new();

        let dispatcher = TileChainBuilder::new(config(&dir), Arc::new(callback))
            .layout(ChainLayout::Layered)
            .http_client(Arc::new(MockHttpClient::failing(500)))
            .build()
            .unwrap();

        assert_eq!(names_of(&dispatcher), vec![names::FILESYSTEM, names::DOWNLOADER]);
    }

    #[test]
    fn test_layered_layout_with_archive() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        TileArchiveWriter::new()
            .write_to(&config.storage.archive_directory.join("region.tcpk"))
            .unwrap();
        let (callback, _events) = ChannelCallback::new();

        let dispatcher = TileChainBuilder::new(config, Arc::new(callback))
            .layout(ChainLayout::Layered)
            .http_client(Arc::new(MockHttpClient::failing(500)))
            .build()
            .unwrap();

        assert_eq!(
            names_of(&dispatcher),
            vec![names::FILESYSTEM, names::ARCHIVE, names::DOWNLOADER]
        );
    }
}
