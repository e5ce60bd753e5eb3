//! Tile key and zoom range types.
//!
//! Provides the `TileKey` type that identifies a single tile in the Web
//! Mercator grid, and `ZoomRange`, the inclusive interval of zoom levels a
//! tile source or provider can serve.

use std::fmt;

/// Lowest zoom level any provider can serve.
pub const MINIMUM_ZOOM: u8 = 0;

/// Highest zoom level any provider can serve.
pub const MAXIMUM_ZOOM: u8 = 22;

/// Identifies one tile of map imagery.
///
/// Contains the zoom level and the column/row indices in the Web Mercator
/// grid at that zoom:
/// - Column increases eastward (`x` in `{z}/{x}/{y}` URL templates)
/// - Row increases southward (`y` in `{z}/{x}/{y}` URL templates)
///
/// # Example
///
/// ```
/// use tilechain::tile::TileKey;
///
/// let key = TileKey::new(12, 2200, 1343);
/// assert_eq!(key.zoom(), 12);
/// assert_eq!(key.col(), 2200);
/// assert_eq!(key.row(), 1343);
/// assert_eq!(key.to_string(), "12/2200/1343");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Zoom level
    zoom: u8,
    /// Tile column (X coordinate in Web Mercator grid)
    col: u32,
    /// Tile row (Y coordinate in Web Mercator grid)
    row: u32,
}

impl TileKey {
    /// Create a new tile key.
    ///
    /// # Arguments
    ///
    /// * `zoom` - Zoom level
    /// * `col` - Tile column (X coordinate)
    /// * `row` - Tile row (Y coordinate)
    pub const fn new(zoom: u8, col: u32, row: u32) -> Self {
        Self { zoom, col, row }
    }

    /// Get the zoom level.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Get the tile column.
    pub fn col(&self) -> u32 {
        self.col
    }

    /// Get the tile row.
    pub fn row(&self) -> u32 {
        self.row
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

/// Inclusive range of zoom levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoomRange {
    min: u8,
    max: u8,
}

impl ZoomRange {
    /// The full range of zoom levels. Used when nothing narrower is known,
    /// e.g. for an empty provider chain.
    pub const WORLD: ZoomRange = ZoomRange {
        min: MINIMUM_ZOOM,
        max: MAXIMUM_ZOOM,
    };

    /// Create a zoom range. The bounds are reordered if given backwards.
    pub const fn new(min: u8, max: u8) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Lowest zoom level in the range.
    pub fn min(&self) -> u8 {
        self.min
    }

    /// Highest zoom level in the range.
    pub fn max(&self) -> u8 {
        self.max
    }

    /// Returns true if `zoom` lies within the range.
    pub fn contains(&self, zoom: u8) -> bool {
        (self.min..=self.max).contains(&zoom)
    }

    /// Smallest range covering both `self` and `other`.
    pub fn union(&self, other: &ZoomRange) -> ZoomRange {
        ZoomRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self::WORLD
    }
}

impl fmt::Display for ZoomRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}
