//! Per-request state carried through the provider chain.

use std::fmt;
use std::sync::{Arc, Weak};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::provider::TileProvider;
use crate::tile::{TileImage, TileKey};

/// Receives the outcome of one provider attempt.
///
/// Implemented by the dispatcher. Each method consumes the state, so a
/// provider can report at most once per attempt.
pub trait RequestCallback: Send + Sync {
    /// The provider produced a fresh tile.
    fn on_success(&self, state: RequestState, image: TileImage);

    /// The provider could not produce the tile.
    fn on_failure(&self, state: RequestState);

    /// The provider produced a usable but expired tile.
    fn on_stale_result(&self, state: RequestState, image: TileImage);
}

/// A request in progress.
///
/// Holds an immutable snapshot of the provider chain taken when the request
/// was created and a cursor into it. The state is moved from the dispatcher
/// to a provider's queue, to a worker, and back through [`RequestCallback`];
/// whoever holds it owns the cursor.
pub struct RequestState {
    id: u64,
    key: TileKey,
    /// Source generation the request started under.
    generation: u64,
    providers: Arc<[Arc<dyn TileProvider>]>,
    cursor: usize,
    owner: Weak<dyn RequestCallback>,
    cancel: CancellationToken,
    stale_delivered: bool,
}

impl RequestState {
    pub(crate) fn new(
        id: u64,
        key: TileKey,
        generation: u64,
        providers: Arc<[Arc<dyn TileProvider>]>,
        owner: Weak<dyn RequestCallback>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            key,
            generation,
            providers,
            cursor: 0,
            owner,
            cancel,
            stale_delivered: false,
        }
    }

    /// Identifier of this request, unique per dispatcher.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The requested tile.
    pub fn key(&self) -> TileKey {
        self.key
    }

    /// Tile source generation this request was created under.
    ///
    /// Bumped by every source swap; results from an older generation are
    /// discarded by the dispatcher.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Index of the next provider to try.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The provider currently handling this request, if any was selected.
    pub fn current_provider(&self) -> Option<&Arc<dyn TileProvider>> {
        self.cursor
            .checked_sub(1)
            .and_then(|index| self.providers.get(index))
    }

    /// Whether the owning dispatcher has been detached.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether an expired tile was already delivered for this request.
    pub fn stale_delivered(&self) -> bool {
        self.stale_delivered
    }

    pub(crate) fn mark_stale_delivered(&mut self) {
        self.stale_delivered = true;
    }

    /// Take the provider at the cursor and advance past it.
    ///
    /// The cursor only moves forward; a skipped provider is never revisited.
    pub(crate) fn next_provider(&mut self) -> Option<Arc<dyn TileProvider>> {
        let provider = Arc::clone(self.providers.get(self.cursor)?);
        self.cursor += 1;
        Some(provider)
    }

    /// Report a fresh tile.
    pub fn report_success(self, image: TileImage) {
        match self.owner.upgrade() {
            Some(owner) => owner.on_success(self, image),
            None => debug!(tile = %self.key, "Dispatcher gone, dropping result"),
        }
    }

    /// Report that the current provider could not produce the tile.
    pub fn report_failure(self) {
        match self.owner.upgrade() {
            Some(owner) => owner.on_failure(self),
            None => debug!(tile = %self.key, "Dispatcher gone, dropping failure"),
        }
    }

    /// Report a usable but expired tile.
    pub fn report_stale(self, image: TileImage) {
        match self.owner.upgrade() {
            Some(owner) => owner.on_stale_result(self, image),
            None => debug!(tile = %self.key, "Dispatcher gone, dropping stale result"),
        }
    }
}

impl fmt::Debug for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestState")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("generation", &self.generation)
            .field("cursor", &self.cursor)
            .field("providers", &self.providers.len())
            .field("stale_delivered", &self.stale_delivered)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{next_report, RecordingCallback, Report};
    use super::*;
    use image::DynamicImage;

    #[test]
    fn test_reports_reach_owner() {
        let (recorder, reports) = RecordingCallback::new();
        let key = TileKey::new(3, 1, 1);

        recorder.state(1, key).report_failure();
        recorder
            .state(2, key)
            .report_success(TileImage::new(DynamicImage::new_rgba8(1, 1)));

        assert!(matches!(next_report(&reports), Report::Failure(k) if k == key));
        assert!(matches!(next_report(&reports), Report::Success(k, _) if k == key));
    }

    #[test]
    fn test_report_after_owner_dropped_is_ignored() {
        let (recorder, _reports) = RecordingCallback::new();
        let weak: Weak<dyn RequestCallback> = {
            let owner: Arc<dyn RequestCallback> = Arc::clone(&recorder) as Arc<dyn RequestCallback>;
            Arc::downgrade(&owner)
        };
        drop(recorder);

        let state = RequestState::new(
            7,
            TileKey::new(1, 0, 0),
            0,
            Arc::from(Vec::new()),
            weak,
            CancellationToken::new(),
        );
        // Must not panic.
        state.report_failure();
    }

    #[test]
    fn test_empty_chain_has_no_provider() {
        let (recorder, _reports) = RecordingCallback::new();
        let mut state = recorder.state(1, TileKey::new(1, 0, 0));

        assert!(state.current_provider().is_none());
        assert!(state.next_provider().is_none());
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn test_cancelled_token_is_visible() {
        let (recorder, _reports) = RecordingCallback::new();
        let owner: Arc<dyn RequestCallback> = Arc::clone(&recorder) as Arc<dyn RequestCallback>;
        let parent = CancellationToken::new();
        let state = RequestState::new(
            1,
            TileKey::new(1, 0, 0),
            0,
            Arc::from(Vec::new()),
            Arc::downgrade(&owner),
            parent.child_token(),
        );

        assert!(!state.is_cancelled());
        parent.cancel();
        assert!(state.is_cancelled());
    }
}
