//! Request-coalescing tile dispatcher.
//!
//! The dispatcher is the single entry point for tile requests. It answers
//! from the memory cache when it can and otherwise walks an ordered chain of
//! [`TileProvider`]s, making sure at most one fetch is outstanding per tile.
//!
//! # Request Lifecycle
//!
//! ```text
//! get(key) ──► memory cache hit ──► Some(image)
//!    │
//!    ▼ miss
//! in-flight entry (atomic) ── present ──► None (coalesced)
//!    │ absent
//!    ▼
//! RequestState ──► provider.load_async ──► worker thread
//!                        ▲                     │
//!                        │ failure / stale     ▼
//!                        └──────────── RequestCallback ──► TileCallback
//! ```
//!
//! Results reach the caller through a [`TileCallback`]. A stale tile is
//! delivered immediately and the chain keeps looking for a fresh one, so
//! a caller may see two deliveries for the same key.

mod callback;
mod state;
mod stats;

pub use callback::{ChannelCallback, TileCallback, TileEvent};
pub use state::{RequestCallback, RequestState};
pub use stats::DispatcherStats;

#[cfg(test)]
pub(crate) use state::testing;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::MemoryCache;
use crate::network::ConnectivityProbe;
use crate::provider::TileProvider;
use crate::source::TileSource;
use crate::tile::{TileImage, TileKey, ZoomRange};
use stats::Counters;

/// Snapshot of the provider chain.
pub type ProviderChain = Arc<[Arc<dyn TileProvider>]>;

/// Coalesces tile requests and routes them through the provider chain.
///
/// Dropping the dispatcher detaches it.
pub struct TileDispatcher {
    core: Arc<DispatcherCore>,
}

struct DispatcherCore {
    self_ref: Weak<DispatcherCore>,
    memory_cache: Arc<dyn MemoryCache>,
    connectivity: Arc<dyn ConnectivityProbe>,
    callback: Arc<dyn TileCallback>,
    /// Copy-on-write; never held while touching `in_flight`.
    chain: RwLock<ProviderChain>,
    /// Also guards `generation`: a swap holds it for writing while the
    /// cache is invalidated, result handlers hold it for reading.
    source: RwLock<Option<Arc<dyn TileSource>>>,
    generation: AtomicU64,
    /// Tile → id of the request currently fetching it.
    in_flight: DashMap<TileKey, u64>,
    shutdown: CancellationToken,
    next_id: AtomicU64,
    counters: Counters,
}

impl TileDispatcher {
    /// Create a dispatcher with an empty chain and no tile source.
    pub fn new(
        memory_cache: Arc<dyn MemoryCache>,
        connectivity: Arc<dyn ConnectivityProbe>,
        callback: Arc<dyn TileCallback>,
    ) -> Self {
        let core = Arc::new_cyclic(|self_ref| DispatcherCore {
            self_ref: self_ref.clone(),
            memory_cache,
            connectivity,
            callback,
            chain: RwLock::new(Arc::from(Vec::new())),
            source: RwLock::new(None),
            generation: AtomicU64::new(0),
            in_flight: DashMap::new(),
            shutdown: CancellationToken::new(),
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
        });
        Self { core }
    }

    /// Request a tile.
    ///
    /// Returns the cached image on a memory-cache hit. Otherwise returns
    /// `None` and the result arrives later through the [`TileCallback`].
    /// Never blocks on disk or network I/O.
    pub fn get(&self, key: TileKey) -> Option<TileImage> {
        self.core.get(key)
    }

    /// Replace the tile source.
    ///
    /// Propagated to every provider in the chain. The memory cache is
    /// invalidated because cached tiles belong to the previous source.
    /// Requests already in flight are superseded: their results are
    /// discarded and the next `get` for the same tile dispatches again.
    pub fn set_source(&self, source: Arc<dyn TileSource>) {
        info!(source = source.name(), "Setting tile source");
        let chain = self.providers();
        for provider in chain.iter() {
            provider.set_source(Arc::clone(&source));
        }
        self.core.swap_source(source);
    }

    /// The current tile source.
    pub fn source(&self) -> Option<Arc<dyn TileSource>> {
        self.core.source.read().clone()
    }

    /// Append a provider to the end of the chain.
    ///
    /// Requests already in flight keep the chain they started with.
    pub fn add_provider(&self, provider: Arc<dyn TileProvider>) {
        if let Some(source) = self.source() {
            provider.set_source(source);
        }
        let mut chain = self.core.chain.write();
        let mut providers: Vec<_> = chain.iter().cloned().collect();
        debug!(
            provider = provider.name(),
            position = providers.len(),
            "Adding provider to chain"
        );
        providers.push(provider);
        *chain = Arc::from(providers);
    }

    /// Remove the first provider named `name` from the chain.
    ///
    /// In-flight requests that still hold it in their snapshot skip it. The
    /// removed provider is returned and is not detached.
    pub fn remove_provider(&self, name: &str) -> Option<Arc<dyn TileProvider>> {
        let mut chain = self.core.chain.write();
        let index = chain.iter().position(|p| p.name() == name)?;
        let mut providers: Vec<_> = chain.iter().cloned().collect();
        let removed = providers.remove(index);
        *chain = Arc::from(providers);
        debug!(provider = name, "Removed provider from chain");
        Some(removed)
    }

    /// Snapshot of the current chain.
    pub fn providers(&self) -> ProviderChain {
        self.core.chain.read().clone()
    }

    /// Union of the zoom ranges of every provider.
    ///
    /// [`ZoomRange::WORLD`] when the chain is empty.
    pub fn zoom_range(&self) -> ZoomRange {
        self.providers()
            .iter()
            .map(|p| p.zoom_range())
            .reduce(|acc, range| acc.union(&range))
            .unwrap_or(ZoomRange::WORLD)
    }

    /// Lowest zoom any provider serves.
    pub fn min_zoom(&self) -> u8 {
        self.zoom_range().min()
    }

    /// Highest zoom any provider serves.
    pub fn max_zoom(&self) -> u8 {
        self.zoom_range().max()
    }

    /// Number of tiles currently being fetched.
    pub fn in_flight_count(&self) -> usize {
        self.core.in_flight.len()
    }

    /// Whether a fetch for `key` is outstanding.
    pub fn is_in_flight(&self, key: TileKey) -> bool {
        self.core.in_flight.contains_key(&key)
    }

    /// Current counters.
    pub fn stats(&self) -> DispatcherStats {
        self.core.counters.snapshot(self.core.in_flight.len())
    }

    /// Stop all providers and drop every outstanding request.
    ///
    /// Queued requests are abandoned and late results from running workers
    /// are ignored. Memory-cache hits are still served afterwards, but
    /// nothing is dispatched. Calling this more than once is harmless.
    pub fn detach(&self) {
        self.core.detach();
    }

    /// Whether [`detach`](Self::detach) has been called.
    pub fn is_detached(&self) -> bool {
        self.core.shutdown.is_cancelled()
    }
}

impl Drop for TileDispatcher {
    fn drop(&mut self) {
        self.core.detach();
    }
}

impl std::fmt::Debug for TileDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .providers()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        f.debug_struct("TileDispatcher")
            .field("providers", &names)
            .field("in_flight", &self.core.in_flight.len())
            .finish()
    }
}

// =============================================================================
// Core
// =============================================================================

/// Providers compare by allocation, ignoring vtables.
fn same_provider(a: &Arc<dyn TileProvider>, b: &Arc<dyn TileProvider>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl DispatcherCore {
    fn get(&self, key: TileKey) -> Option<TileImage> {
        Counters::incr(&self.counters.requests);

        if let Some(image) = self.memory_cache.get(&key) {
            Counters::incr(&self.counters.cache_hits);
            return Some(image);
        }

        if self.shutdown.is_cancelled() {
            debug!(tile = %key, "Dispatcher detached, not dispatching");
            return None;
        }

        // Cloned before the in-flight region so the two locks never nest.
        let providers = self.chain.read().clone();
        // Held until the request is registered so a concurrent swap either
        // sees the entry and clears it, or happens before the generation read.
        let source = self.source.read();
        if providers.is_empty() || source.is_none() {
            drop(source);
            warn!(
                tile = %key,
                providers = providers.len(),
                "Chain has no providers or no tile source"
            );
            Counters::incr(&self.counters.unavailable);
            self.callback.on_tile_unavailable(key);
            return None;
        }

        let entry = self.in_flight.entry(key);

        // A fetch may have completed between the first check and the lock.
        if let Some(image) = self.memory_cache.get(&key) {
            Counters::incr(&self.counters.cache_hits);
            return Some(image);
        }

        let state = match entry {
            Entry::Occupied(_) => {
                Counters::incr(&self.counters.coalesced);
                debug!(tile = %key, "Coalesced with in-flight request");
                return None;
            }
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let generation = self.generation.load(Ordering::Acquire);
                vacant.insert(id);
                let owner: Weak<dyn RequestCallback> = self.self_ref.clone();
                RequestState::new(
                    id,
                    key,
                    generation,
                    providers,
                    owner,
                    self.shutdown.child_token(),
                )
            }
        };
        drop(source);

        debug!(tile = %key, request_id = state.id(), "Starting request");
        self.dispatch_next(state);
        None
    }

    /// Hand the state to the next eligible provider, or finish it.
    fn dispatch_next(&self, mut state: RequestState) {
        if self.is_superseded(&state) {
            self.discard_superseded(&state);
            return;
        }
        match self.next_eligible(&mut state) {
            Some(provider) => {
                Counters::incr(&self.counters.dispatched);
                debug!(
                    tile = %state.key(),
                    provider = provider.name(),
                    position = state.cursor() - 1,
                    "Dispatching to provider"
                );
                provider.load_async(state);
            }
            None => self.finish_exhausted(state),
        }
    }

    /// Advance the cursor past disqualified providers.
    fn next_eligible(&self, state: &mut RequestState) -> Option<Arc<dyn TileProvider>> {
        let live = self.chain.read().clone();
        let zoom = state.key().zoom();

        while let Some(provider) = state.next_provider() {
            if !live.iter().any(|p| same_provider(p, &provider)) {
                debug!(tile = %state.key(), provider = provider.name(), "Skipping removed provider");
                continue;
            }
            if provider.uses_network() && !self.connectivity.is_available() {
                debug!(tile = %state.key(), provider = provider.name(), "Skipping provider, offline");
                continue;
            }
            if !provider.zoom_range().contains(zoom) {
                debug!(
                    tile = %state.key(),
                    provider = provider.name(),
                    range = %provider.zoom_range(),
                    "Skipping provider, zoom out of range"
                );
                continue;
            }
            return Some(provider);
        }
        None
    }

    fn finish_exhausted(&self, state: RequestState) {
        let key = state.key();
        self.remove_in_flight(&state);

        if state.stale_delivered() {
            debug!(tile = %key, "Chain exhausted after stale delivery");
            return;
        }

        debug!(tile = %key, "Chain exhausted, tile unavailable");
        Counters::incr(&self.counters.unavailable);
        self.callback.on_tile_unavailable(key);
    }

    /// Remove the in-flight entry if it still belongs to this request.
    fn remove_in_flight(&self, state: &RequestState) {
        self.in_flight
            .remove_if(&state.key(), |_, id| *id == state.id());
    }

    /// Install a new source and supersede every outstanding request.
    fn swap_source(&self, source: Arc<dyn TileSource>) {
        let mut current = self.source.write();
        *current = Some(source);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let superseded = self.in_flight.len();
        self.in_flight.clear();
        self.memory_cache.invalidate_all();
        debug!(generation, superseded, "Tile source swapped");
    }

    /// Whether the request started under a source that has since been replaced.
    fn is_superseded(&self, state: &RequestState) -> bool {
        state.generation() != self.generation.load(Ordering::Acquire)
    }

    fn discard_superseded(&self, state: &RequestState) {
        self.remove_in_flight(state);
        debug!(
            tile = %state.key(),
            request_id = state.id(),
            generation = state.generation(),
            "Discarding result for replaced tile source"
        );
    }

    fn detach(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();

        let providers = self.chain.read().clone();
        for provider in providers.iter() {
            provider.detach();
        }

        let abandoned = self.in_flight.len();
        self.in_flight.clear();
        info!(
            providers = providers.len(),
            abandoned, "Tile dispatcher detached"
        );
    }
}

impl RequestCallback for DispatcherCore {
    fn on_success(&self, state: RequestState, image: TileImage) {
        if state.is_cancelled() {
            return;
        }
        let key = state.key();
        let image = image.with_expired(false);

        {
            let _source = self.source.read();
            if self.is_superseded(&state) {
                self.discard_superseded(&state);
                return;
            }
            self.memory_cache.put(key, image.clone());
            self.remove_in_flight(&state);
        }

        Counters::incr(&self.counters.delivered);
        debug!(
            tile = %key,
            provider = state.current_provider().map(|p| p.name()).unwrap_or("-"),
            "Tile delivered"
        );
        self.callback.on_tile_delivered(key, &image, false);
    }

    fn on_failure(&self, state: RequestState) {
        if state.is_cancelled() {
            return;
        }
        debug!(
            tile = %state.key(),
            provider = state.current_provider().map(|p| p.name()).unwrap_or("-"),
            "Provider failed, trying next"
        );
        self.dispatch_next(state);
    }

    fn on_stale_result(&self, mut state: RequestState, image: TileImage) {
        if state.is_cancelled() {
            return;
        }
        let key = state.key();
        let image = image.with_expired(true);

        {
            let _source = self.source.read();
            if self.is_superseded(&state) {
                self.discard_superseded(&state);
                return;
            }
            // A fresh entry must never be replaced by a stale one.
            if self.memory_cache.get(&key).is_none() {
                self.memory_cache.put(key, image.clone());
            }
        }

        Counters::incr(&self.counters.stale_delivered);
        debug!(tile = %key, "Delivering expired tile, continuing chain");
        self.callback.on_tile_delivered(key, &image, true);

        state.mark_stale_delivered();
        self.dispatch_next(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ManualConnectivity;
    use crate::provider::ProviderDescriptor;
    use crate::source::XyzTileSource;
    use image::DynamicImage;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<TileKey, TileImage>>,
    }

    impl MemoryCache for MapCache {
        fn get(&self, key: &TileKey) -> Option<TileImage> {
            self.entries.lock().get(key).cloned()
        }

        fn put(&self, key: TileKey, image: TileImage) {
            self.entries.lock().insert(key, image);
        }

        fn invalidate_all(&self) {
            self.entries.lock().clear();
        }

        fn entry_count(&self) -> u64 {
            self.entries.lock().len() as u64
        }
    }

    #[derive(Default)]
    struct RecordingTiles {
        delivered: Mutex<Vec<(TileKey, bool)>>,
        unavailable: Mutex<Vec<TileKey>>,
    }

    impl TileCallback for RecordingTiles {
        fn on_tile_delivered(&self, key: TileKey, _image: &TileImage, expired: bool) {
            self.delivered.lock().push((key, expired));
        }

        fn on_tile_unavailable(&self, key: TileKey) {
            self.unavailable.lock().push(key);
        }
    }

    /// Holds submitted states until the test completes them.
    struct HeldProvider {
        descriptor: ProviderDescriptor,
        held: Mutex<Vec<RequestState>>,
    }

    impl HeldProvider {
        fn new(name: &str, uses_network: bool, zoom: Option<ZoomRange>) -> Arc<Self> {
            Arc::new(Self {
                descriptor: ProviderDescriptor {
                    name: name.to_string(),
                    uses_network,
                    zoom,
                },
                held: Mutex::new(Vec::new()),
            })
        }

        fn take(&self) -> RequestState {
            self.held.lock().remove(0)
        }

        fn held_count(&self) -> usize {
            self.held.lock().len()
        }
    }

    impl TileProvider for HeldProvider {
        fn name(&self) -> &str {
            &self.descriptor.name
        }

        fn uses_network(&self) -> bool {
            self.descriptor.uses_network
        }

        fn zoom_range(&self) -> ZoomRange {
            self.descriptor.zoom.unwrap_or(ZoomRange::WORLD)
        }

        fn load_async(&self, state: RequestState) {
            self.held.lock().push(state);
        }

        fn set_source(&self, _source: Arc<dyn TileSource>) {}

        fn detach(&self) {
            self.held.lock().clear();
        }

        fn pending(&self) -> usize {
            self.held_count()
        }
    }

    struct Harness {
        dispatcher: TileDispatcher,
        cache: Arc<MapCache>,
        tiles: Arc<RecordingTiles>,
        connectivity: Arc<ManualConnectivity>,
    }

    fn harness() -> Harness {
        let cache = Arc::new(MapCache::default());
        let tiles = Arc::new(RecordingTiles::default());
        let connectivity = Arc::new(ManualConnectivity::new(true));
        let dispatcher = TileDispatcher::new(
            Arc::clone(&cache) as Arc<dyn MemoryCache>,
            Arc::clone(&connectivity) as Arc<dyn ConnectivityProbe>,
            Arc::clone(&tiles) as Arc<dyn TileCallback>,
        );
        dispatcher.set_source(Arc::new(XyzTileSource::openstreetmap()));
        Harness {
            dispatcher,
            cache,
            tiles,
            connectivity,
        }
    }

    fn image() -> TileImage {
        TileImage::new(DynamicImage::new_rgba8(1, 1))
    }

    #[test]
    fn test_duplicate_requests_are_coalesced() {
        let h = harness();
        let provider = HeldProvider::new("disk", false, None);
        h.dispatcher.add_provider(provider.clone());
        let key = TileKey::new(5, 1, 2);

        assert!(h.dispatcher.get(key).is_none());
        assert!(h.dispatcher.get(key).is_none());
        assert!(h.dispatcher.get(key).is_none());

        assert_eq!(provider.held_count(), 1);
        assert_eq!(h.dispatcher.in_flight_count(), 1);
        assert_eq!(h.dispatcher.stats().coalesced, 2);
    }

    #[test]
    fn test_success_caches_and_clears_in_flight() {
        let h = harness();
        let provider = HeldProvider::new("disk", false, None);
        h.dispatcher.add_provider(provider.clone());
        let key = TileKey::new(5, 1, 2);

        h.dispatcher.get(key);
        provider.take().report_success(image());

        assert!(!h.dispatcher.is_in_flight(key));
        assert_eq!(*h.tiles.delivered.lock(), vec![(key, false)]);
        assert!(h.dispatcher.get(key).is_some());
        assert_eq!(h.dispatcher.stats().cache_hits, 1);
    }

    #[test]
    fn test_failure_advances_then_exhausts() {
        let h = harness();
        let first = HeldProvider::new("first", false, None);
        let second = HeldProvider::new("second", false, None);
        h.dispatcher.add_provider(first.clone());
        h.dispatcher.add_provider(second.clone());
        let key = TileKey::new(4, 0, 0);

        h.dispatcher.get(key);
        first.take().report_failure();
        assert_eq!(second.held_count(), 1);
        assert!(h.dispatcher.is_in_flight(key));

        second.take().report_failure();
        assert!(!h.dispatcher.is_in_flight(key));
        assert_eq!(*h.tiles.unavailable.lock(), vec![key]);
    }

    #[test]
    fn test_zoom_and_network_filters() {
        let h = harness();
        let network = HeldProvider::new("network", true, None);
        let low_zoom = HeldProvider::new("low", false, Some(ZoomRange::new(0, 3)));
        let fallback = HeldProvider::new("fallback", false, None);
        h.dispatcher.add_provider(network.clone());
        h.dispatcher.add_provider(low_zoom.clone());
        h.dispatcher.add_provider(fallback.clone());
        h.connectivity.set_available(false);

        h.dispatcher.get(TileKey::new(10, 5, 5));

        assert_eq!(network.held_count(), 0);
        assert_eq!(low_zoom.held_count(), 0);
        assert_eq!(fallback.held_count(), 1);
    }

    #[test]
    fn test_removed_provider_is_skipped_by_in_flight_request() {
        let h = harness();
        let first = HeldProvider::new("first", false, None);
        let second = HeldProvider::new("second", false, None);
        let third = HeldProvider::new("third", false, None);
        h.dispatcher.add_provider(first.clone());
        h.dispatcher.add_provider(second.clone());
        h.dispatcher.add_provider(third.clone());
        let key = TileKey::new(6, 2, 2);

        h.dispatcher.get(key);
        assert!(h.dispatcher.remove_provider("second").is_some());
        first.take().report_failure();

        assert_eq!(second.held_count(), 0);
        assert_eq!(third.held_count(), 1);
    }

    #[test]
    fn test_stale_is_cached_only_when_absent() {
        let h = harness();
        let provider = HeldProvider::new("disk", false, None);
        h.dispatcher.add_provider(provider.clone());
        let key = TileKey::new(7, 3, 3);

        h.dispatcher.get(key);
        provider.take().report_stale(image());

        assert!(h.cache.get(&key).is_some_and(|img| img.is_expired()));
        assert!(!h.dispatcher.is_in_flight(key));
        assert_eq!(*h.tiles.delivered.lock(), vec![(key, true)]);
        // Chain exhausted after a stale delivery is not reported as unavailable.
        assert!(h.tiles.unavailable.lock().is_empty());
    }

    #[test]
    fn test_empty_chain_reports_unavailable_immediately() {
        let h = harness();
        let key = TileKey::new(2, 1, 1);

        assert!(h.dispatcher.get(key).is_none());
        assert_eq!(*h.tiles.unavailable.lock(), vec![key]);
        assert_eq!(h.dispatcher.in_flight_count(), 0);
    }

    #[test]
    fn test_missing_source_reports_unavailable() {
        let cache = Arc::new(MapCache::default());
        let tiles = Arc::new(RecordingTiles::default());
        let dispatcher = TileDispatcher::new(
            cache,
            Arc::new(ManualConnectivity::default()),
            Arc::clone(&tiles) as Arc<dyn TileCallback>,
        );
        let provider = HeldProvider::new("disk", false, None);
        dispatcher.add_provider(provider.clone());
        let key = TileKey::new(2, 1, 1);

        dispatcher.get(key);

        assert_eq!(provider.held_count(), 0);
        assert_eq!(*tiles.unavailable.lock(), vec![key]);
    }

    #[test]
    fn test_zoom_range_union() {
        let h = harness();
        assert_eq!(h.dispatcher.zoom_range(), ZoomRange::WORLD);

        h.dispatcher
            .add_provider(HeldProvider::new("a", false, Some(ZoomRange::new(3, 8))));
        h.dispatcher
            .add_provider(HeldProvider::new("b", false, Some(ZoomRange::new(6, 14))));

        assert_eq!(h.dispatcher.min_zoom(), 3);
        assert_eq!(h.dispatcher.max_zoom(), 14);
    }

    #[test]
    fn test_detach_drops_late_results() {
        let h = harness();
        let provider = HeldProvider::new("disk", false, None);
        h.dispatcher.add_provider(provider.clone());
        let key = TileKey::new(5, 5, 5);

        h.dispatcher.get(key);
        let state = provider.take();
        h.dispatcher.detach();
        h.dispatcher.detach();
        state.report_success(image());

        assert!(h.dispatcher.is_detached());
        assert_eq!(h.dispatcher.in_flight_count(), 0);
        assert!(h.tiles.delivered.lock().is_empty());
        assert!(h.dispatcher.get(key).is_none());
        assert_eq!(provider.held_count(), 0);
    }

    #[test]
    fn test_set_source_invalidates_cache() {
        let h = harness();
        let key = TileKey::new(1, 0, 0);
        h.cache.put(key, image());

        assert!(h.dispatcher.get(key).is_some());
        h.dispatcher
            .set_source(Arc::new(XyzTileSource::new("Other", "https://other/{z}/{x}/{y}.png")));

        assert_eq!(h.cache.entry_count(), 0);
        assert_eq!(h.dispatcher.source().map(|s| s.name().to_string()).as_deref(), Some("Other"));
    }

    #[test]
    fn test_source_swap_supersedes_in_flight_request() {
        let h = harness();
        let provider = HeldProvider::new("disk", false, None);
        h.dispatcher.add_provider(provider.clone());
        let key = TileKey::new(9, 4, 4);

        assert!(h.dispatcher.get(key).is_none());
        let old = provider.take();
        h.dispatcher
            .set_source(Arc::new(XyzTileSource::new("Other", "https://other/{z}/{x}/{y}.png")));

        assert!(!h.dispatcher.is_in_flight(key));
        assert!(h.dispatcher.get(key).is_none());
        assert_eq!(provider.held_count(), 1);
        assert_eq!(h.dispatcher.stats().coalesced, 0);

        old.report_success(image());

        assert_eq!(h.cache.entry_count(), 0);
        assert!(h.tiles.delivered.lock().is_empty());
        assert!(h.dispatcher.is_in_flight(key));

        provider.take().report_success(image());

        assert!(h.cache.get(&key).is_some());
        assert_eq!(*h.tiles.delivered.lock(), vec![(key, false)]);
        assert!(!h.dispatcher.is_in_flight(key));
    }

    #[test]
    fn test_stale_and_failure_from_replaced_source_are_dropped() {
        let h = harness();
        let first = HeldProvider::new("first", false, None);
        let second = HeldProvider::new("second", false, None);
        h.dispatcher.add_provider(first.clone());
        h.dispatcher.add_provider(second.clone());
        let stale_key = TileKey::new(8, 1, 1);
        let failed_key = TileKey::new(8, 2, 2);

        h.dispatcher.get(stale_key);
        h.dispatcher.get(failed_key);
        let stale = first.take();
        let failed = first.take();
        h.dispatcher
            .set_source(Arc::new(XyzTileSource::new("Other", "https://other/{z}/{x}/{y}.png")));

        stale.report_stale(image());
        failed.report_failure();

        assert_eq!(h.cache.entry_count(), 0);
        assert!(h.tiles.delivered.lock().is_empty());
        assert!(h.tiles.unavailable.lock().is_empty());
        // Neither superseded request moves on down the chain.
        assert_eq!(second.held_count(), 0);
        assert_eq!(h.dispatcher.in_flight_count(), 0);
    }
}
