//! Generic provider harness.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::{
    LoadError, LoadOutcome, PoolConfig, ProviderDescriptor, ProviderError, TileLoader,
    TileProvider, WorkerPool, WorkerSignal,
};
use crate::dispatch::RequestState;
use crate::source::TileSource;
use crate::tile::ZoomRange;

struct ModuleInner<L> {
    descriptor: ProviderDescriptor,
    source: RwLock<Option<Arc<dyn TileSource>>>,
    loader: L,
}

/// A [`TileProvider`] running a [`TileLoader`] on its own [`WorkerPool`].
pub struct ModuleProvider<L: TileLoader> {
    inner: Arc<ModuleInner<L>>,
    pool: WorkerPool,
}

impl<L: TileLoader> ModuleProvider<L> {
    /// Create the provider and start its workers.
    pub fn new(
        descriptor: ProviderDescriptor,
        loader: L,
        pool: PoolConfig,
    ) -> Result<Self, ProviderError> {
        let inner = Arc::new(ModuleInner {
            descriptor,
            source: RwLock::new(None),
            loader,
        });

        let worker_inner = Arc::clone(&inner);
        let pool = WorkerPool::new(&inner.descriptor.name, pool, move |state| {
            worker_inner.run(state)
        })?;

        Ok(Self { inner, pool })
    }

    /// The loader run by this provider.
    pub fn loader(&self) -> &L {
        &self.inner.loader
    }

    /// The provider's metadata.
    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.inner.descriptor
    }
}

impl<L: TileLoader> ModuleInner<L> {
    fn run(&self, state: RequestState) -> WorkerSignal {
        let name = self.descriptor.name.as_str();
        let key = state.key();

        if state.is_cancelled() {
            trace!(provider = name, tile = %key, "Request cancelled before load");
            state.report_failure();
            return WorkerSignal::Continue;
        }

        let Some(source) = self.source.read().clone() else {
            debug!(provider = name, tile = %key, "No tile source set");
            state.report_failure();
            return WorkerSignal::Continue;
        };

        match self.loader.load(key, source.as_ref()) {
            Ok(LoadOutcome::Loaded(image)) => {
                trace!(provider = name, tile = %key, "Loaded");
                state.report_success(image);
                WorkerSignal::Continue
            }
            Ok(LoadOutcome::Expired(image)) => {
                trace!(provider = name, tile = %key, "Loaded expired tile");
                state.report_stale(image);
                WorkerSignal::Continue
            }
            Ok(LoadOutcome::Missing) => {
                trace!(provider = name, tile = %key, "Not found");
                state.report_failure();
                WorkerSignal::Continue
            }
            Err(LoadError::Failed(reason)) => {
                debug!(provider = name, tile = %key, reason = %reason, "Load failed");
                state.report_failure();
                WorkerSignal::Continue
            }
            Err(LoadError::CantContinue(reason)) => {
                warn!(provider = name, tile = %key, reason = %reason, "Provider cannot continue");
                state.report_failure();
                WorkerSignal::Drain
            }
        }
    }
}

impl<L: TileLoader> TileProvider for ModuleProvider<L> {
    fn name(&self) -> &str {
        &self.inner.descriptor.name
    }

    fn uses_network(&self) -> bool {
        self.inner.descriptor.uses_network
    }

    fn zoom_range(&self) -> ZoomRange {
        if let Some(zoom) = self.inner.descriptor.zoom {
            return zoom;
        }
        self.inner
            .source
            .read()
            .as_ref()
            .map(|s| s.zoom_range())
            .unwrap_or(ZoomRange::WORLD)
    }

    fn load_async(&self, state: RequestState) {
        if let Err(state) = self.pool.submit(state) {
            debug!(
                provider = %self.inner.descriptor.name,
                tile = %state.key(),
                "Provider queue full or stopped, rejecting"
            );
            state.report_failure();
        }
    }

    fn set_source(&self, source: Arc<dyn TileSource>) {
        *self.inner.source.write() = Some(source);
    }

    fn detach(&self) {
        self.pool.shutdown();
    }

    fn pending(&self) -> usize {
        self.pool.pending()
    }
}
