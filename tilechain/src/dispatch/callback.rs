//! Caller-facing delivery of tile results.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use crate::tile::{TileImage, TileKey};

/// Receives tiles resolved asynchronously by the dispatcher.
///
/// Called from provider worker threads (and, for immediate configuration
/// errors, from the thread calling `get`). Implementations must not block.
pub trait TileCallback: Send + Sync {
    /// A tile is ready. `expired` is true for a usable but stale tile; a
    /// fresh copy may follow for the same key.
    fn on_tile_delivered(&self, key: TileKey, image: &TileImage, expired: bool);

    /// No provider could produce the tile.
    fn on_tile_unavailable(&self, key: TileKey);
}

/// A delivery, as seen through [`ChannelCallback`].
#[derive(Debug, Clone)]
pub enum TileEvent {
    /// A tile was delivered.
    Delivered {
        key: TileKey,
        image: TileImage,
        expired: bool,
    },
    /// The chain was exhausted.
    Unavailable { key: TileKey },
}

impl TileEvent {
    /// The tile this event is about.
    pub fn key(&self) -> TileKey {
        match self {
            TileEvent::Delivered { key, .. } | TileEvent::Unavailable { key } => *key,
        }
    }
}

/// [`TileCallback`] forwarding every delivery onto a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelCallback {
    sender: UnboundedSender<TileEvent>,
}

impl ChannelCallback {
    /// Create the callback and the receiving end of its channel.
    pub fn new() -> (Self, UnboundedReceiver<TileEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl TileCallback for ChannelCallback {
    fn on_tile_delivered(&self, key: TileKey, image: &TileImage, expired: bool) {
        let event = TileEvent::Delivered {
            key,
            image: image.clone(),
            expired,
        };
        if self.sender.send(event).is_err() {
            trace!(tile = %key, "Tile receiver dropped");
        }
    }

    fn on_tile_unavailable(&self, key: TileKey) {
        if self.sender.send(TileEvent::Unavailable { key }).is_err() {
            trace!(tile = %key, "Tile receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    #[tokio::test]
    async fn test_channel_callback_forwards_events() {
        let (callback, mut events) = ChannelCallback::new();
        let key = TileKey::new(5, 10, 12);
        let image = TileImage::new(DynamicImage::new_rgba8(2, 2));

        callback.on_tile_delivered(key, &image, true);
        callback.on_tile_unavailable(key);

        match events.recv().await {
            Some(TileEvent::Delivered {
                key: k,
                image: delivered,
                expired,
            }) => {
                assert_eq!(k, key);
                assert!(expired);
                assert!(delivered.same_pixels(&image));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(events.recv().await, Some(TileEvent::Unavailable { key: k }) if k == key));
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (callback, events) = ChannelCallback::new();
        drop(events);
        callback.on_tile_unavailable(TileKey::new(1, 1, 1));
    }
}
