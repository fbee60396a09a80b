// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raw pixel transfer between packed buffers and tiled stores.
//!
//! Everything here bypasses validation: tiles are fetched with
//! [`TileStore::fetch_or_create_tile`] and written under a [`TileLock`](crate::TileLock)
//! held only for the duration of one tile's copy.
//!
//! Buffers are row-major. A position inside a buffer is an [`Origin`]: the row
//! stride in bytes plus the `(col, row)` pixel index of the first pixel.

use understory_region::IntRect;

use crate::error::StoreError;
use crate::store::TileStore;
use crate::tile::Tile;
use crate::types::{TileCoord, TileGeometry};

/// Row stride and `(col, row)` pixel position inside a row-major buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Origin {
    stride: usize,
    col: usize,
    row: usize,
}

impl Origin {
    pub(crate) const fn new(stride: usize, col: usize, row: usize) -> Self {
        Self { stride, col, row }
    }

    #[inline]
    fn offset(&self, row: usize, bpp: usize) -> usize {
        (self.row + row) * self.stride + self.col * bpp
    }
}

/// Copy a `width` by `height` pixel block between row-major buffers.
pub(crate) fn copy_block(
    src: &[u8],
    src_at: Origin,
    dst: &mut [u8],
    dst_at: Origin,
    width: usize,
    height: usize,
    bpp: usize,
) {
    let row_bytes = width * bpp;
    if row_bytes == 0 || height == 0 {
        return;
    }
    debug_assert!(
        src_at.offset(height - 1, bpp) + row_bytes <= src.len(),
        "source block out of bounds"
    );
    debug_assert!(
        dst_at.offset(height - 1, bpp) + row_bytes <= dst.len(),
        "destination block out of bounds"
    );
    for row in 0..height {
        let s = src_at.offset(row, bpp);
        let d = dst_at.offset(row, bpp);
        dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
    }
}

/// Parts of `rect` falling into each level-0 tile, with the tile-relative
/// rectangle and the offset of the part inside `rect`.
fn tile_parts(
    geometry: TileGeometry,
    rect: IntRect,
) -> impl Iterator<Item = (TileCoord, IntRect, usize, usize)> {
    geometry.tiles_in(rect).map(move |(tx, ty)| {
        let tile_rect = geometry.tile_rect(tx, ty);
        let part = tile_rect.intersect(&rect);
        (
            TileCoord::new(tx, ty, 0),
            part.translate(-tile_rect.x, -tile_rect.y),
            index(part.x - rect.x),
            index(part.y - rect.y),
        )
    })
}

/// Read `rect` from `store` into a tightly packed buffer.
pub fn read_rect(store: &dyn TileStore, rect: IntRect) -> Result<Vec<u8>, StoreError> {
    let geometry = store.geometry();
    let bpp = geometry.bytes_per_pixel();
    let stride = index(rect.width) * bpp;
    let mut out = vec![0; geometry.packed_len(rect)];
    for (coord, local, col, row) in tile_parts(geometry, rect) {
        let tile = store.fetch_or_create_tile(coord, true)?;
        tile.read_block(local, &mut out, stride, col, row)?;
    }
    Ok(out)
}

/// Write a tightly packed buffer covering `rect` into `store`.
///
/// Tiles fully covered by `rect` are fetched without preserving their
/// previous contents.
pub fn write_rect(store: &dyn TileStore, rect: IntRect, pixels: &[u8]) -> Result<(), StoreError> {
    let geometry = store.geometry();
    let expected = geometry.packed_len(rect);
    if pixels.len() != expected {
        return Err(StoreError::BufferSize {
            rect,
            expected,
            actual: pixels.len(),
        });
    }
    let stride = index(rect.width) * geometry.bytes_per_pixel();
    for (coord, local, col, row) in tile_parts(geometry, rect) {
        let whole = local.width == geometry.tile_width && local.height == geometry.tile_height;
        let tile = store.fetch_or_create_tile(coord, !whole)?;
        write_tile(&tile, local, pixels, stride, col, row)?;
    }
    Ok(())
}

/// Lock `tile`, copy one block into it and unlock.
pub(crate) fn write_tile(
    tile: &Tile,
    local: IntRect,
    src: &[u8],
    src_stride: usize,
    src_col: usize,
    src_row: usize,
) -> Result<(), StoreError> {
    let mut lock = tile.lock()?;
    lock.write_block(local, src, src_stride, src_col, src_row);
    Ok(())
}

/// Copy `src_rect` of `src` to `dst_rect` of `dst` (same size, clamping done by the caller).
///
/// When `src` has no attached cache, both stores share a geometry, and the
/// offset between the rectangles is tile aligned, every destination tile that
/// is fully covered adopts the source tile's data without copying. All other
/// tiles are copied pixel by pixel.
pub fn copy_rect(
    src: &dyn TileStore,
    src_rect: IntRect,
    dst: &dyn TileStore,
    dst_rect: IntRect,
) -> Result<(), StoreError> {
    let sg = src.geometry();
    let dg = dst.geometry();
    if sg.format != dg.format {
        return Err(StoreError::FormatMismatch {
            src: sg.format,
            dst: dg.format,
        });
    }
    debug_assert!(
        src_rect.width == dst_rect.width && src_rect.height == dst_rect.height,
        "copy rectangles must have equal size"
    );
    if std::ptr::addr_eq(src, dst) {
        // Overlapping moves within one store must read everything first.
        let pixels = read_rect(src, src_rect)?;
        return write_rect(dst, dst_rect, &pixels);
    }
    let dx = dst_rect.x - src_rect.x;
    let dy = dst_rect.y - src_rect.y;
    let fast = src.attached_cache().is_none()
        && sg == dg
        && dx.rem_euclid(dg.tile_width) == 0
        && dy.rem_euclid(dg.tile_height) == 0;

    let mut slow = Vec::new();
    for (tx, ty) in dg.tiles_in(dst_rect) {
        let tile_rect = dg.tile_rect(tx, ty);
        let part = tile_rect.intersect(&dst_rect);
        if fast && part == tile_rect {
            let from = TileCoord::new(tx - dx / dg.tile_width, ty - dy / dg.tile_height, 0);
            let tile = src.fetch_or_create_tile(from, true)?;
            dst.adopt_tile(TileCoord::new(tx, ty, 0), &tile)?;
        } else {
            slow.push(part);
        }
    }
    for part in slow {
        let pixels = read_rect(src, part.translate(-dx, -dy))?;
        write_rect(dst, part, &pixels)?;
    }
    Ok(())
}

#[allow(
    clippy::cast_sign_loss,
    reason = "Offsets inside a rectangle are non-negative."
)]
fn index(v: i32) -> usize {
    v.max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTileStore;
    use crate::types::PixelFormat;

    fn store(w: i32, h: i32) -> MemoryTileStore {
        MemoryTileStore::new(
            IntRect::new(0, 0, w, h),
            TileGeometry::new(8, 8, PixelFormat::Y8),
        )
    }

    fn ramp(rect: IntRect) -> Vec<u8> {
        let mut v = Vec::new();
        for y in rect.y..rect.max_y() {
            for x in rect.x..rect.max_x() {
                v.push(((x + 3 * y) & 0xff) as u8);
            }
        }
        v
    }

    #[test]
    fn copy_block_respects_strides() {
        let src: Vec<u8> = (0..16).collect();
        let mut dst = vec![0_u8; 9];
        copy_block(
            &src,
            Origin::new(4, 1, 1),
            &mut dst,
            Origin::new(3, 1, 0),
            2,
            2,
            1,
        );
        assert_eq!(dst, [0, 5, 6, 0, 9, 10, 0, 0, 0]);
    }

    #[test]
    fn write_then_read_across_tiles() {
        let s = store(32, 32);
        let rect = IntRect::new(5, 3, 13, 11);
        write_rect(&s, rect, &ramp(rect)).unwrap();
        assert_eq!(read_rect(&s, rect).unwrap(), ramp(rect));
        let inner = IntRect::new(7, 9, 4, 2);
        assert_eq!(read_rect(&s, inner).unwrap(), ramp(inner));
        assert_eq!(read_rect(&s, IntRect::new(0, 0, 1, 1)).unwrap(), [0]);
    }

    #[test]
    fn write_rejects_wrong_length() {
        let s = store(16, 16);
        let err = write_rect(&s, IntRect::new(0, 0, 2, 2), &[0; 3]).unwrap_err();
        assert!(matches!(err, StoreError::BufferSize { expected: 4, .. }));
    }

    #[test]
    fn aligned_copy_adopts_tiles() {
        let src = store(32, 32);
        let dst = store(32, 32);
        let full = IntRect::new(0, 0, 32, 32);
        write_rect(&src, full, &ramp(full)).unwrap();

        let s_rect = IntRect::new(0, 0, 16, 12);
        let d_rect = IntRect::new(8, 16, 16, 12);
        copy_rect(&src, s_rect, &dst, d_rect).unwrap();

        let a = src.fetch_or_create_tile(TileCoord::new(0, 0, 0), true).unwrap();
        let b = dst.fetch_or_create_tile(TileCoord::new(1, 2, 0), true).unwrap();
        assert!(a.shares_data_with(&b));
        assert_eq!(read_rect(&dst, d_rect).unwrap(), ramp(s_rect));
    }

    #[test]
    fn unaligned_copy_moves_pixels() {
        let src = store(32, 32);
        let dst = store(32, 32);
        let full = IntRect::new(0, 0, 32, 32);
        write_rect(&src, full, &ramp(full)).unwrap();
        let s_rect = IntRect::new(3, 1, 20, 9);
        let d_rect = IntRect::new(1, 2, 20, 9);
        copy_rect(&src, s_rect, &dst, d_rect).unwrap();
        assert_eq!(read_rect(&dst, d_rect).unwrap(), ramp(s_rect));
    }
}
