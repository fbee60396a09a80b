// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tiled pixel storage: the [`TileStore`] trait and an in-memory implementation.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use understory_region::IntRect;

use crate::blit;
use crate::cache::TileValidateCache;
use crate::error::{StoreError, ValidateError};
use crate::tile::Tile;
use crate::types::{TileCoord, TileGeometry};

/// Tiled pixel buffer abstraction consumed by [`TileValidateCache`].
///
/// Trait methods are raw and never trigger validation. Fetches that should
/// see validated pixels go through `get_tile` on `dyn TileStore`.
pub trait TileStore {
    /// Tile size and pixel format. Fixed for the lifetime of the store.
    fn geometry(&self) -> TileGeometry;

    /// Logical pixel extent of the buffer.
    fn extent(&self) -> IntRect;

    /// Fetch a tile, creating a zero-filled one if absent.
    ///
    /// With `initialize == false` the caller intends to overwrite the whole
    /// tile and the store may skip preserving or clearing its contents.
    fn fetch_or_create_tile(
        &self,
        coord: TileCoord,
        initialize: bool,
    ) -> Result<Rc<Tile>, StoreError>;

    /// Replace the tile at `coord` with one sharing `tile`'s pixel data.
    fn adopt_tile(&self, coord: TileCoord, tile: &Tile) -> Result<(), StoreError>;

    /// Change the logical extent.
    fn resize_extent(&self, extent: IntRect) -> Result<(), StoreError>;

    /// Pixels in `rect` may have changed; drop anything derived from them.
    fn damage_rect(&self, rect: IntRect) {
        let _ = rect;
    }

    /// Copy `src_rect` of `src` into `dst_rect` of this store without validation.
    fn raw_copy(
        &self,
        src: &dyn TileStore,
        src_rect: IntRect,
        dst_rect: IntRect,
    ) -> Result<(), StoreError>;

    /// The cache currently intercepting tile fetches, if any.
    fn attached_cache(&self) -> Option<Rc<TileValidateCache>>;

    /// Install (`Some`) or remove (`None`) the intercepting cache.
    fn set_attached_cache(&self, cache: Option<Weak<TileValidateCache>>);
}

impl dyn TileStore + '_ {
    /// Fetch a tile, routing through the attached cache so dirty area is
    /// rendered before the tile is returned.
    pub fn get_tile(&self, coord: TileCoord) -> Result<Rc<Tile>, ValidateError> {
        match self.attached_cache() {
            Some(cache) => cache.fetch_tile(self, coord),
            None => Ok(self.fetch_or_create_tile(coord, true)?),
        }
    }
}

/// A [`TileStore`] keeping every tile in memory.
pub struct MemoryTileStore {
    geometry: TileGeometry,
    extent: Cell<IntRect>,
    max_area: Option<i64>,
    max_tiles: Option<usize>,
    tiles: RefCell<HashMap<TileCoord, Rc<Tile>>>,
    cache: RefCell<Option<Weak<TileValidateCache>>>,
}

impl core::fmt::Debug for MemoryTileStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryTileStore")
            .field("geometry", &self.geometry)
            .field("extent", &self.extent.get())
            .field("tiles", &self.tiles.borrow().len())
            .field("attached", &self.attached_cache().is_some())
            .finish_non_exhaustive()
    }
}

impl MemoryTileStore {
    /// Create an empty store.
    pub fn new(extent: IntRect, geometry: TileGeometry) -> Self {
        debug_assert!(
            geometry.tile_width > 0 && geometry.tile_height > 0,
            "tiles must have positive size"
        );
        Self {
            geometry,
            extent: Cell::new(extent),
            max_area: None,
            max_tiles: None,
            tiles: RefCell::new(HashMap::new()),
            cache: RefCell::new(None),
        }
    }

    /// Reject resizes to extents larger than `pixels`.
    #[must_use]
    pub fn with_max_area(mut self, pixels: i64) -> Self {
        self.max_area = Some(pixels);
        self
    }

    /// Refuse to allocate more than `count` tiles, all levels.
    #[must_use]
    pub fn with_max_tiles(mut self, count: usize) -> Self {
        self.max_tiles = Some(count);
        self
    }

    /// Number of allocated tiles, all levels.
    pub fn tile_count(&self) -> usize {
        self.tiles.borrow().len()
    }

    /// True if a tile exists at `coord`.
    pub fn has_tile(&self, coord: TileCoord) -> bool {
        self.tiles.borrow().contains_key(&coord)
    }

    /// Fetch a tile through the attached cache, if any.
    pub fn get_tile(&self, coord: TileCoord) -> Result<Rc<Tile>, ValidateError> {
        (self as &dyn TileStore).get_tile(coord)
    }

    /// Read `rect` into a packed buffer without validation.
    pub fn read_pixels(&self, rect: IntRect) -> Result<Vec<u8>, StoreError> {
        blit::read_rect(self, rect)
    }

    /// Write a packed buffer covering `rect` without validation.
    pub fn write_pixels(&self, rect: IntRect, pixels: &[u8]) -> Result<(), StoreError> {
        blit::write_rect(self, rect, pixels)
    }

    fn level_footprint(&self, coord: TileCoord) -> IntRect {
        let r = self.geometry.tile_rect(coord.x, coord.y);
        let s = 1_i32.checked_shl(coord.z).unwrap_or(i32::MAX);
        IntRect::new(
            r.x.saturating_mul(s),
            r.y.saturating_mul(s),
            r.width.saturating_mul(s),
            r.height.saturating_mul(s),
        )
    }
}

impl TileStore for MemoryTileStore {
    fn geometry(&self) -> TileGeometry {
        self.geometry
    }

    fn extent(&self) -> IntRect {
        self.extent.get()
    }

    fn fetch_or_create_tile(
        &self,
        coord: TileCoord,
        _initialize: bool,
    ) -> Result<Rc<Tile>, StoreError> {
        let mut tiles = self.tiles.borrow_mut();
        if let Some(tile) = tiles.get(&coord) {
            return Ok(Rc::clone(tile));
        }
        if self.max_tiles.is_some_and(|max| tiles.len() >= max) {
            tracing::warn!(?coord, "memory store tile limit reached");
            return Err(StoreError::TileUnavailable { coord });
        }
        let tile = Rc::new(Tile::new(coord, self.geometry));
        tiles.insert(coord, Rc::clone(&tile));
        Ok(tile)
    }

    fn adopt_tile(&self, coord: TileCoord, tile: &Tile) -> Result<(), StoreError> {
        if tile.geometry() != self.geometry {
            return Err(StoreError::FormatMismatch {
                src: tile.geometry().format,
                dst: self.geometry.format,
            });
        }
        let adopted = Rc::new(Tile::sharing(coord, tile)?);
        self.tiles.borrow_mut().insert(coord, adopted);
        Ok(())
    }

    fn resize_extent(&self, extent: IntRect) -> Result<(), StoreError> {
        if self.max_area.is_some_and(|max| extent.area() > max) {
            return Err(StoreError::ExtentRejected { extent });
        }
        self.extent.set(extent);
        let geometry = self.geometry;
        self.tiles.borrow_mut().retain(|coord, _| {
            coord.z != 0 || geometry.tile_rect(coord.x, coord.y).intersects(&extent)
        });
        tracing::debug!(?extent, "memory store resized");
        Ok(())
    }

    fn damage_rect(&self, rect: IntRect) {
        if rect.is_empty() {
            return;
        }
        let stale: Vec<TileCoord> = self
            .tiles
            .borrow()
            .keys()
            .filter(|c| c.z > 0 && self.level_footprint(**c).intersects(&rect))
            .copied()
            .collect();
        let mut tiles = self.tiles.borrow_mut();
        for coord in stale {
            tiles.remove(&coord);
        }
    }

    fn raw_copy(
        &self,
        src: &dyn TileStore,
        src_rect: IntRect,
        dst_rect: IntRect,
    ) -> Result<(), StoreError> {
        blit::copy_rect(src, src_rect, self, dst_rect)
    }

    fn attached_cache(&self) -> Option<Rc<TileValidateCache>> {
        self.cache.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn set_attached_cache(&self, cache: Option<Weak<TileValidateCache>>) {
        *self.cache.borrow_mut() = cache;
    }
}
