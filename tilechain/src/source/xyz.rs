//! URL-template tile source for `{z}/{x}/{y}` slippy-map servers.

use std::io::Cursor;

use image::error::{ImageError, LimitErrorKind};
use image::{ImageReader, Limits};

use super::{DecodeError, TileSource};
use crate::tile::{TileImage, TileKey, MAXIMUM_ZOOM, MINIMUM_ZOOM};

/// Default decoder allocation limit (64 MiB), far above any 256 or 512 px tile.
pub const DEFAULT_MAX_DECODE_ALLOC: u64 = 64 * 1024 * 1024;

/// Tile source backed by a slippy-map URL template.
///
/// The template may contain `{z}`, `{x}` and `{y}` placeholders. Tiles are
/// stored under `<name>/<z>/<x>/<y><ending>`, where `ending` defaults to
/// `.png`.
#[derive(Debug, Clone)]
pub struct XyzTileSource {
    name: String,
    url_template: String,
    filename_ending: String,
    min_zoom: u8,
    max_zoom: u8,
    max_decode_alloc: u64,
}

impl XyzTileSource {
    /// Create a source covering the full zoom range.
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            filename_ending: ".png".to_string(),
            min_zoom: MINIMUM_ZOOM,
            max_zoom: MAXIMUM_ZOOM,
            max_decode_alloc: DEFAULT_MAX_DECODE_ALLOC,
        }
    }

    /// OpenStreetMap standard tile layer.
    pub fn openstreetmap() -> Self {
        Self::new("Mapnik", "https://tile.openstreetmap.org/{z}/{x}/{y}.png").with_zoom(0, 19)
    }

    /// Restrict the zoom levels served.
    pub fn with_zoom(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom.min(max_zoom);
        self.max_zoom = max_zoom.max(min_zoom);
        self
    }

    /// Set the filename ending used for storage paths (e.g. `.jpg`).
    pub fn with_filename_ending(mut self, ending: impl Into<String>) -> Self {
        self.filename_ending = ending.into();
        self
    }

    /// Set the maximum number of bytes the decoder may allocate for a tile.
    pub fn with_max_decode_alloc(mut self, bytes: u64) -> Self {
        self.max_decode_alloc = bytes;
        self
    }

    /// The URL template.
    pub fn url_template(&self) -> &str {
        &self.url_template
    }
}

impl TileSource for XyzTileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn relative_path(&self, key: TileKey) -> String {
        format!(
            "{}/{}/{}/{}{}",
            self.name,
            key.zoom(),
            key.col(),
            key.row(),
            self.filename_ending
        )
    }

    fn decode(&self, bytes: &[u8]) -> Result<TileImage, DecodeError> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError::Invalid(e.to_string()))?;

        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_decode_alloc);
        reader.limits(limits);

        match reader.decode() {
            Ok(image) => Ok(TileImage::new(image)),
            Err(ImageError::Limits(e)) if e.kind() == LimitErrorKind::InsufficientMemory => {
                Err(DecodeError::OutOfMemory(e.to_string()))
            }
            Err(e) => Err(DecodeError::Invalid(e.to_string())),
        }
    }

    fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    fn tile_url(&self, key: TileKey) -> Option<String> {
        // An empty template marks an offline-only source.
        if self.url_template.is_empty() {
            return None;
        }
        Some(
            self.url_template
                .replace("{z}", &key.zoom().to_string())
                .replace("{x}", &key.col().to_string())
                .replace("{y}", &key.row().to_string()),
        )
    }
}
