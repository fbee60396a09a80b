// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types: pixel formats, tile coordinates and geometry, validation flags and options.

use core::time::Duration;

use understory_region::IntRect;
use understory_region::chunk::{DEFAULT_CELL_SIZE, DEFAULT_INTERVAL};

/// Pixel layout of a tiled buffer.
///
/// Only the byte size of a pixel matters to the cache; channel semantics and
/// conversions belong to the renderer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit gray.
    Y8,
    /// 8-bit gray with alpha.
    Ya8,
    /// 8-bit RGB.
    Rgb8,
    /// 8-bit RGBA.
    Rgba8,
    /// 16-bit RGBA.
    Rgba16,
    /// 32-bit float RGBA.
    RgbaF32,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Y8 => 1,
            Self::Ya8 => 2,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
            Self::Rgba16 => 8,
            Self::RgbaF32 => 16,
        }
    }
}

/// Grid position of a tile: column, row and mip level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Tile column.
    pub x: i32,
    /// Tile row.
    pub y: i32,
    /// Mip level; `0` is full resolution.
    pub z: u32,
}

impl TileCoord {
    /// Create a coordinate.
    pub const fn new(x: i32, y: i32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// Tile size and pixel format of a store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileGeometry {
    /// Tile width in pixels.
    pub tile_width: i32,
    /// Tile height in pixels.
    pub tile_height: i32,
    /// Pixel format of every tile.
    pub format: PixelFormat,
}

impl TileGeometry {
    /// Create a geometry.
    pub const fn new(tile_width: i32, tile_height: i32, format: PixelFormat) -> Self {
        Self {
            tile_width,
            tile_height,
            format,
        }
    }

    /// Bytes per pixel of the format.
    pub const fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    /// Bytes per tile row.
    #[allow(
        clippy::cast_sign_loss,
        reason = "Tile sizes are positive by construction."
    )]
    pub const fn row_stride(&self) -> usize {
        self.tile_width as usize * self.bytes_per_pixel()
    }

    /// Bytes per tile.
    #[allow(
        clippy::cast_sign_loss,
        reason = "Tile sizes are positive by construction."
    )]
    pub const fn tile_bytes(&self) -> usize {
        self.row_stride() * self.tile_height as usize
    }

    /// Level-0 pixel rectangle of the tile at column `x`, row `y`.
    pub const fn tile_rect(&self, x: i32, y: i32) -> IntRect {
        IntRect::new(
            x * self.tile_width,
            y * self.tile_height,
            self.tile_width,
            self.tile_height,
        )
    }

    /// Column and row of the tile containing pixel `(px, py)`.
    pub const fn tile_of(&self, px: i32, py: i32) -> (i32, i32) {
        (px.div_euclid(self.tile_width), py.div_euclid(self.tile_height))
    }

    /// Level-0 tiles overlapping `rect`, row by row.
    pub fn tiles_in(&self, rect: IntRect) -> impl Iterator<Item = (i32, i32)> + use<> {
        let (x0, y0, x1, y1) = if rect.is_empty() {
            (0, 0, -1, -1)
        } else {
            let (x0, y0) = self.tile_of(rect.x, rect.y);
            let (x1, y1) = self.tile_of(rect.max_x() - 1, rect.max_y() - 1);
            (x0, y0, x1, y1)
        };
        (y0..=y1).flat_map(move |ty| (x0..=x1).map(move |tx| (tx, ty)))
    }

    /// Byte length of a tightly packed buffer covering `rect`.
    #[allow(
        clippy::cast_sign_loss,
        reason = "Empty rectangles are mapped to zero before the cast."
    )]
    pub const fn packed_len(&self, rect: IntRect) -> usize {
        if rect.is_empty() {
            0
        } else {
            rect.width as usize * rect.height as usize * self.bytes_per_pixel()
        }
    }
}

bitflags::bitflags! {
    /// Modes of [`TileValidateCache::validate`](crate::TileValidateCache::validate).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ValidateFlags: u8 {
        /// Only render the part of the rectangle that is currently dirty.
        const INTERSECT = 0b0000_0001;
        /// Render in bounded, tile-aligned chunks.
        const CHUNKED   = 0b0000_0010;
    }
}

/// Tunables of a [`TileValidateCache`](crate::TileValidateCache).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ValidateOptions {
    /// Render the whole tile whenever any part of it is dirty.
    pub whole_tile: bool,
    /// Target time per chunk for chunked validation.
    pub chunk_interval: Duration,
    /// Initial pixel budget per chunk for chunked validation.
    pub chunk_budget: u64,
    /// Area rendered first during chunked validation (for example the visible viewport).
    pub priority_rect: Option<IntRect>,
}

impl Default for ValidateOptions {
    #[allow(
        clippy::cast_sign_loss,
        reason = "The default cell size is a positive constant."
    )]
    fn default() -> Self {
        Self {
            whole_tile: false,
            chunk_interval: DEFAULT_INTERVAL,
            chunk_budget: 4 * (DEFAULT_CELL_SIZE as u64) * (DEFAULT_CELL_SIZE as u64),
            priority_rect: None,
        }
    }
}

/// Snap a float rectangle outward to whole pixels.
///
/// Coordinates are clamped to the `i32` range.
pub fn pixel_bounds(rect: kurbo::Rect) -> IntRect {
    let r = rect.abs().expand();
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Values are clamped to the i32 range first."
    )]
    let clamp = |v: f64| v.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
    IntRect::from_min_max(clamp(r.x0), clamp(r.y0), clamp(r.x1), clamp(r.y1))
}
