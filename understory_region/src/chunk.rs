// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chunked iteration over a region for incremental processing.
//!
//! A [`ChunkIterator`] takes a snapshot of a [`RectSet`] and hands it out as a
//! finite sequence of [`Chunk`]s. Each chunk is a batch of rectangles, each
//! clipped to one cell of an aligned grid, so no single rectangle exceeds the
//! grid cell size. A chunk stops growing once its pixel budget is reached.
//!
//! The budget adapts: after processing a chunk, report how long it took with
//! [`ChunkIterator::report_chunk_time`] and the next chunk is scaled toward the
//! target [interval](ChunkIterator::set_interval).
//!
//! ```
//! use understory_region::{ChunkIterator, IntRect, RectSet};
//!
//! let region = RectSet::from_rect(IntRect::new(0, 0, 1000, 700));
//! let mut iter = ChunkIterator::with_grid(region, 128, 128);
//! let mut total = 0;
//! while let Some(mut chunk) = iter.next_chunk() {
//!     while let Some(rect) = chunk.next_rect() {
//!         assert!(rect.width <= 128 && rect.height <= 128);
//!         total += rect.area();
//!     }
//! }
//! assert_eq!(total, 1000 * 700);
//! ```

use alloc::vec::Vec;
use core::time::Duration;

use crate::region::RectSet;
use crate::types::IntRect;

/// Default grid cell width and height.
pub const DEFAULT_CELL_SIZE: i32 = 128;

/// Default target time per chunk (one fifteenth of a second).
pub const DEFAULT_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 15);

const MIN_BUDGET: u64 = 64 * 64;
const MAX_BUDGET: u64 = 2048 * 2048;
const DEFAULT_BUDGET: u64 = 4 * (DEFAULT_CELL_SIZE as u64) * (DEFAULT_CELL_SIZE as u64);

/// A batch of rectangles handed out by [`ChunkIterator::next_chunk`].
#[derive(Clone, Debug, Default)]
pub struct Chunk {
    rects: Vec<IntRect>,
    next: usize,
    area: i64,
}

impl Chunk {
    /// Next rectangle of this chunk, or `None` once the chunk is exhausted.
    pub fn next_rect(&mut self) -> Option<IntRect> {
        let r = self.rects.get(self.next).copied()?;
        self.next += 1;
        Some(r)
    }

    /// Total pixel area of the chunk.
    pub fn area(&self) -> i64 {
        self.area
    }

    /// Number of rectangles in the chunk.
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    /// True if the chunk holds no rectangles.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    fn push(&mut self, r: IntRect) {
        self.area += r.area();
        self.rects.push(r);
    }
}

impl Iterator for Chunk {
    type Item = IntRect;

    fn next(&mut self) -> Option<IntRect> {
        self.next_rect()
    }
}

/// Finite, non-restartable chunked traversal of a region snapshot.
///
/// Every pixel of the source region is yielded exactly once across all chunks.
#[derive(Clone, Debug)]
pub struct ChunkIterator {
    remaining: RectSet,
    priority: Option<IntRect>,
    cell_width: i32,
    cell_height: i32,
    budget: u64,
    interval: Duration,
}

impl ChunkIterator {
    /// Iterate `region` on the default grid.
    pub fn new(region: RectSet) -> Self {
        Self::with_grid(region, DEFAULT_CELL_SIZE, DEFAULT_CELL_SIZE)
    }

    /// Iterate `region` on a grid of `cell_width` by `cell_height` cells
    /// anchored at the origin. Align this with the tile size so pieces never
    /// straddle tiles.
    pub fn with_grid(region: RectSet, cell_width: i32, cell_height: i32) -> Self {
        debug_assert!(
            cell_width > 0 && cell_height > 0,
            "chunk cells must have positive size"
        );
        Self {
            remaining: region,
            priority: None,
            cell_width: cell_width.max(1),
            cell_height: cell_height.max(1),
            budget: DEFAULT_BUDGET,
            interval: DEFAULT_INTERVAL,
        }
    }

    /// Area in this rectangle is handed out before anything else.
    pub fn set_priority_rect(&mut self, rect: Option<IntRect>) {
        self.priority = rect.filter(|r| !r.is_empty());
    }

    /// Target processing time per chunk used by [`ChunkIterator::report_chunk_time`].
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Override the pixel budget of the next chunk.
    pub fn set_chunk_budget(&mut self, pixels: u64) {
        self.budget = pixels.clamp(MIN_BUDGET, MAX_BUDGET);
    }

    /// Pixel budget of the next chunk.
    pub fn chunk_budget(&self) -> u64 {
        self.budget
    }

    /// True while there is area left to hand out.
    pub fn has_more_chunks(&self) -> bool {
        !self.remaining.is_empty()
    }

    /// Area not yet handed out.
    pub fn remaining(&self) -> &RectSet {
        &self.remaining
    }

    /// Stop iterating and return the area not yet handed out.
    pub fn into_remaining(self) -> RectSet {
        self.remaining
    }

    /// Carve the next chunk off the remaining region.
    pub fn next_chunk(&mut self) -> Option<Chunk> {
        if self.remaining.is_empty() {
            return None;
        }
        let mut chunk = Chunk::default();
        while let Some(seed) = self.next_seed() {
            let cell = self.cell_at(seed.x, seed.y);
            for r in self.remaining.intersection_copy(cell).rectangles() {
                chunk.push(r);
            }
            self.remaining.subtract_rect(cell);
            if chunk.area.unsigned_abs() >= self.budget {
                break;
            }
        }
        Some(chunk)
    }

    /// Feed back how long the last chunk took to process.
    ///
    /// The next budget is scaled by `interval / elapsed`, at most halving or
    /// doubling per call.
    pub fn report_chunk_time(&mut self, elapsed: Duration) {
        let target = self.interval.as_secs_f64();
        let took = elapsed.as_secs_f64();
        let ratio = if took <= 0.0 {
            2.0
        } else {
            (target / took).clamp(0.5, 2.0)
        };
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "ratio is clamped positive and the result is clamped to the budget range."
        )]
        let scaled = (self.budget as f64 * ratio) as u64;
        self.budget = scaled.clamp(MIN_BUDGET, MAX_BUDGET);
    }

    fn next_seed(&mut self) -> Option<IntRect> {
        if let Some(p) = self.priority {
            let urgent = self.remaining.intersection_copy(p);
            if let Some(r) = urgent.first_rect() {
                return Some(r);
            }
            self.priority = None;
        }
        self.remaining.first_rect()
    }

    fn cell_at(&self, x: i32, y: i32) -> IntRect {
        let cx = x.div_euclid(self.cell_width) * self.cell_width;
        let cy = y.div_euclid(self.cell_height) * self.cell_height;
        IntRect::new(cx, cy, self.cell_width, self.cell_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::tests::{Grid, N, Rng, rasterize};

    fn drain(iter: &mut ChunkIterator) -> Vec<Vec<IntRect>> {
        let mut out = Vec::new();
        while iter.has_more_chunks() {
            let mut chunk = iter.next_chunk().unwrap();
            let mut rects = Vec::new();
            while let Some(r) = chunk.next_rect() {
                rects.push(r);
            }
            out.push(rects);
        }
        assert!(iter.next_chunk().is_none());
        out
    }

    #[test]
    fn empty_region_has_no_chunks() {
        let mut iter = ChunkIterator::new(RectSet::new());
        assert!(!iter.has_more_chunks());
        assert!(iter.next_chunk().is_none());
    }

    #[test]
    fn pieces_respect_cell_bounds() {
        let region = RectSet::from_rect(IntRect::new(-20, 5, 300, 90));
        let mut iter = ChunkIterator::with_grid(region, 64, 32);
        for rects in drain(&mut iter) {
            for r in rects {
                assert!(r.width <= 64 && r.height <= 32, "{r:?}");
                assert_eq!(r.x.div_euclid(64), (r.max_x() - 1).div_euclid(64));
                assert_eq!(r.y.div_euclid(32), (r.max_y() - 1).div_euclid(32));
            }
        }
    }

    #[test]
    fn snapshot_ignores_later_mutation() {
        let mut region = RectSet::from_rect(IntRect::new(0, 0, 16, 16));
        let mut iter = ChunkIterator::with_grid(region.clone(), 8, 8);
        region.union_rect(IntRect::new(100, 100, 16, 16));
        let total: i64 = drain(&mut iter).iter().flatten().map(IntRect::area).sum();
        assert_eq!(total, 256);
    }

    #[test]
    fn chunks_cover_region_exactly() {
        let mut rng = Rng::new(7);
        for _ in 0..30 {
            let mut region = RectSet::new();
            for _ in 0..5 {
                region.union_rect(rng.rect());
            }
            region.subtract_rect(rng.rect());
            let expected = rasterize(&region);

            let mut iter = ChunkIterator::with_grid(region.clone(), 5, 7);
            let mut seen = Grid::new();
            for r in drain(&mut iter).into_iter().flatten() {
                for y in r.y..r.max_y() {
                    for x in r.x..r.max_x() {
                        let cell = &mut seen.0[(y * N + x) as usize];
                        assert!(!*cell, "pixel ({x}, {y}) yielded twice");
                        *cell = true;
                    }
                }
            }
            assert!(seen.0 == expected.0, "chunks do not cover the region");
        }
    }

    #[test]
    fn priority_area_comes_first() {
        let region = RectSet::from_rect(IntRect::new(0, 0, 256, 256));
        let mut iter = ChunkIterator::with_grid(region, 64, 64);
        iter.set_chunk_budget(0);
        iter.set_priority_rect(Some(IntRect::new(192, 192, 64, 64)));
        let first = iter.next_chunk().unwrap().next_rect().unwrap();
        assert_eq!(first, IntRect::new(192, 192, 64, 64));
        let second = iter.next_chunk().unwrap().next_rect().unwrap();
        assert_eq!(second, IntRect::new(0, 0, 64, 64));
    }

    #[test]
    fn budget_adapts_to_reported_time() {
        let mut iter = ChunkIterator::new(RectSet::new());
        iter.set_interval(Duration::from_millis(10));
        iter.set_chunk_budget(100_000);
        iter.report_chunk_time(Duration::from_millis(5));
        assert_eq!(iter.chunk_budget(), 200_000);
        iter.report_chunk_time(Duration::from_millis(100));
        assert_eq!(iter.chunk_budget(), 100_000);
        iter.report_chunk_time(Duration::ZERO);
        assert_eq!(iter.chunk_budget(), 200_000);
    }

    #[test]
    fn chunk_stops_at_budget() {
        let region = RectSet::from_rect(IntRect::new(0, 0, 256, 256));
        let mut iter = ChunkIterator::with_grid(region, 64, 64);
        iter.set_chunk_budget(MIN_BUDGET);
        let chunk = iter.next_chunk().unwrap();
        assert_eq!(chunk.len(), 1);
        assert_eq!(chunk.area(), 4096);
        assert_eq!(iter.remaining().area(), 256 * 256 - 4096);
    }

    #[test]
    fn into_remaining_returns_unvisited_area() {
        let region = RectSet::from_rect(IntRect::new(0, 0, 128, 64));
        let mut iter = ChunkIterator::with_grid(region, 64, 64);
        iter.set_chunk_budget(0);
        let first = iter.next_chunk().unwrap();
        assert_eq!(first.area(), 64 * 64);
        assert_eq!(
            iter.into_remaining(),
            RectSet::from_rect(IntRect::new(64, 0, 64, 64))
        );
    }
}
