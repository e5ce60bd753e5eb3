//! Decoded tile image.

use std::sync::Arc;

use image::DynamicImage;

/// A decoded tile, ready to hand back to a caller.
///
/// The pixel data is shared behind an `Arc`, so clones are cheap and the
/// memory cache can hold the same image the caller received. The `expired`
/// flag marks a tile that is usable but should be refreshed.
#[derive(Debug, Clone)]
pub struct TileImage {
    pixels: Arc<DynamicImage>,
    expired: bool,
}

impl TileImage {
    /// Wrap a decoded image. The tile starts out fresh.
    pub fn new(image: DynamicImage) -> Self {
        Self {
            pixels: Arc::new(image),
            expired: false,
        }
    }

    /// Returns a copy of this tile carrying the given expiry flag.
    ///
    /// The pixel data is shared, not copied.
    pub fn with_expired(&self, expired: bool) -> Self {
        Self {
            pixels: Arc::clone(&self.pixels),
            expired,
        }
    }

    /// Whether the tile is past its expiry and should be refreshed.
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// The decoded pixels.
    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Size of the decoded pixel buffer in bytes.
    ///
    /// Used to weigh entries in the memory cache.
    pub fn byte_size(&self) -> usize {
        self.pixels.as_bytes().len()
    }

    /// Returns true if both tiles share the same pixel buffer.
    pub fn same_pixels(&self, other: &TileImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tile_is_fresh() {
        let tile = TileImage::new(DynamicImage::new_rgba8(4, 2));
        assert!(!tile.is_expired());
        assert_eq!(tile.width(), 4);
        assert_eq!(tile.height(), 2);
        assert_eq!(tile.byte_size(), 4 * 2 * 4);
    }

    #[test]
    fn test_with_expired_shares_pixels() {
        let tile = TileImage::new(DynamicImage::new_rgba8(1, 1));
        let expired = tile.with_expired(true);

        assert!(expired.is_expired());
        assert!(!tile.is_expired());
        assert!(tile.same_pixels(&expired));
    }
}
