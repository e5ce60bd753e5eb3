//! In-memory tile cache with LRU eviction using moka.
//!
//! The dispatcher consults the memory cache synchronously on every request,
//! so lookups must never block behind a slow writer. `moka::sync::Cache` is
//! safe to share across caller and worker threads and evicts by weight
//! without explicit locking.

use std::sync::atomic::{AtomicU64, Ordering};

use moka::sync::Cache;

use crate::tile::{TileImage, TileKey};

/// Default memory cache size (256 MiB of decoded pixels).
pub const DEFAULT_MEMORY_CACHE_BYTES: u64 = 256 * 1024 * 1024;

/// Synchronous key → image store consulted before any provider runs.
///
/// Implementations decide their own eviction policy. All methods may be
/// called concurrently from caller threads and provider worker threads.
pub trait MemoryCache: Send + Sync {
    /// Look up a previously materialized tile.
    fn get(&self, key: &TileKey) -> Option<TileImage>;

    /// Store a tile, replacing any existing entry.
    fn put(&self, key: TileKey, image: TileImage);

    /// Drop every entry. Entries put before this call are never returned
    /// afterwards.
    fn invalidate_all(&self);

    /// Approximate number of entries.
    fn entry_count(&self) -> u64;
}

/// Memory cache backed by `moka::sync::Cache`, weighted by decoded size.
pub struct MokaMemoryCache {
    cache: Cache<TileKey, TileImage>,
    max_size_bytes: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MokaMemoryCache {
    /// Create a new memory cache with the given size limit.
    ///
    /// # Arguments
    ///
    /// * `max_size_bytes` - Maximum total size of decoded pixels in bytes
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = Cache::builder()
            .weigher(|_key: &TileKey, value: &TileImage| -> u32 {
                // moka uses u32 for weights, cap at u32::MAX for very large entries
                value.byte_size().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes)
            .build();

        Self {
            cache,
            max_size_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Maximum size in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Current weighted size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.weighted_size()
    }

    /// Lookups that found an entry.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that found nothing.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl Default for MokaMemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CACHE_BYTES)
    }
}

impl MemoryCache for MokaMemoryCache {
    fn get(&self, key: &TileKey) -> Option<TileImage> {
        let result = self.cache.get(key);
        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn put(&self, key: TileKey, image: TileImage) {
        self.cache.insert(key, image);
    }

    fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}
