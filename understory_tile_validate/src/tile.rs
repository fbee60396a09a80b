// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tiles: fixed-size blocks of pixel memory with an exclusive write lock.
//!
//! Pixel data is reference counted so a store can adopt a tile from another
//! store without copying. The first write through a [`TileLock`] after such an
//! adoption copies the data.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use understory_region::IntRect;

use crate::blit::{Origin, copy_block};
use crate::error::StoreError;
use crate::types::{TileCoord, TileGeometry};

/// A block of `tile_width` by `tile_height` pixels, row-major, tightly packed.
pub struct Tile {
    coord: TileCoord,
    geometry: TileGeometry,
    data: RefCell<Rc<Vec<u8>>>,
    locked: Cell<bool>,
}

impl core::fmt::Debug for Tile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tile")
            .field("coord", &self.coord)
            .field("geometry", &self.geometry)
            .field("locked", &self.locked.get())
            .finish_non_exhaustive()
    }
}

impl Tile {
    /// A zero-filled tile.
    pub fn new(coord: TileCoord, geometry: TileGeometry) -> Self {
        Self {
            coord,
            geometry,
            data: RefCell::new(Rc::new(vec![0; geometry.tile_bytes()])),
            locked: Cell::new(false),
        }
    }

    /// A tile at `coord` sharing `other`'s pixel data until either is written.
    ///
    /// Fails while `other` is locked.
    pub fn sharing(coord: TileCoord, other: &Self) -> Result<Self, StoreError> {
        let data = other.read_shared()?;
        Ok(Self {
            coord,
            geometry: other.geometry,
            data: RefCell::new(data),
            locked: Cell::new(false),
        })
    }

    /// Grid position.
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// Size and format.
    pub fn geometry(&self) -> TileGeometry {
        self.geometry
    }

    /// Bytes per row.
    pub fn row_stride(&self) -> usize {
        self.geometry.row_stride()
    }

    /// Level-0 pixel rectangle covered by this tile.
    pub fn rect(&self) -> IntRect {
        self.geometry.tile_rect(self.coord.x, self.coord.y)
    }

    /// True while a [`TileLock`] is alive.
    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    /// True if both tiles currently share pixel memory.
    pub fn shares_data_with(&self, other: &Self) -> bool {
        match (self.read_shared(), other.read_shared()) {
            (Ok(a), Ok(b)) => Rc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    fn read_shared(&self) -> Result<Rc<Vec<u8>>, StoreError> {
        if self.locked.get() {
            return Err(StoreError::TileLocked { coord: self.coord });
        }
        self.data
            .try_borrow()
            .map(|d| Rc::clone(&d))
            .map_err(|_| StoreError::TileLocked { coord: self.coord })
    }

    /// Read access to the pixel data. Fails while the tile is locked.
    pub fn read(&self) -> Result<Ref<'_, [u8]>, StoreError> {
        if self.locked.get() {
            return Err(StoreError::TileLocked { coord: self.coord });
        }
        self.data
            .try_borrow()
            .map(|d| Ref::map(d, |v| v.as_slice()))
            .map_err(|_| StoreError::TileLocked { coord: self.coord })
    }

    /// Copy the tile-relative rectangle `local` into `dst` at (`dst_col`, `dst_row`).
    pub(crate) fn read_block(
        &self,
        local: IntRect,
        dst: &mut [u8],
        dst_stride: usize,
        dst_col: usize,
        dst_row: usize,
    ) -> Result<(), StoreError> {
        let data = self.read()?;
        copy_block(
            &data,
            Origin::new(self.row_stride(), to_index(local.x), to_index(local.y)),
            dst,
            Origin::new(dst_stride, dst_col, dst_row),
            to_index(local.width),
            to_index(local.height),
            self.geometry.bytes_per_pixel(),
        );
        Ok(())
    }

    /// Lock the tile for exclusive in-place mutation.
    pub fn lock(&self) -> Result<TileLock<'_>, StoreError> {
        if self.locked.get() {
            return Err(StoreError::TileLocked { coord: self.coord });
        }
        let data = self
            .data
            .try_borrow_mut()
            .map_err(|_| StoreError::TileLocked { coord: self.coord })?;
        self.locked.set(true);
        Ok(TileLock { tile: self, data })
    }
}

/// Exclusive write access to a tile. Unlocks on drop.
pub struct TileLock<'a> {
    tile: &'a Tile,
    data: RefMut<'a, Rc<Vec<u8>>>,
}

impl core::fmt::Debug for TileLock<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileLock")
            .field("coord", &self.tile.coord)
            .finish_non_exhaustive()
    }
}

impl TileLock<'_> {
    /// Mutable pixel data; copies first if the data is shared.
    pub fn data_mut(&mut self) -> &mut [u8] {
        Rc::make_mut(&mut self.data).as_mut_slice()
    }

    /// Bytes per row.
    pub fn row_stride(&self) -> usize {
        self.tile.row_stride()
    }

    /// Copy `src` (row stride `src_stride`, starting at (`src_col`, `src_row`))
    /// into the tile-relative rectangle `local`.
    pub fn write_block(
        &mut self,
        local: IntRect,
        src: &[u8],
        src_stride: usize,
        src_col: usize,
        src_row: usize,
    ) {
        debug_assert!(
            IntRect::new(0, 0, self.tile.geometry.tile_width, self.tile.geometry.tile_height)
                .contains_rect(&local),
            "write {local:?} outside tile"
        );
        let stride = self.row_stride();
        let bpp = self.tile.geometry.bytes_per_pixel();
        copy_block(
            src,
            Origin::new(src_stride, src_col, src_row),
            self.data_mut(),
            Origin::new(stride, to_index(local.x), to_index(local.y)),
            to_index(local.width),
            to_index(local.height),
            bpp,
        );
    }

    /// Fill the whole tile with a byte value.
    pub fn fill(&mut self, value: u8) {
        self.data_mut().fill(value);
    }
}

impl Drop for TileLock<'_> {
    fn drop(&mut self) {
        self.tile.locked.set(false);
    }
}

#[allow(
    clippy::cast_sign_loss,
    reason = "Callers pass tile-relative, non-negative coordinates."
)]
fn to_index(v: i32) -> usize {
    debug_assert!(v >= 0, "negative pixel index {v}");
    v.max(0) as usize
}
