// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalidation summary returned by [`TileValidateCache::take_damage`](crate::TileValidateCache::take_damage).

use understory_region::{IntRect, RectSet};

/// Rectangles passed to `invalidate` since the damage was last taken,
/// in call order and unmerged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Damage {
    /// Invalidated rectangles.
    pub rects: Vec<IntRect>,
}

impl Damage {
    /// True if nothing was invalidated.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Bounding box of all damage. Returns `None` if empty.
    pub fn union(&self) -> Option<IntRect> {
        let mut it = self.rects.iter().copied();
        let first = it.next()?;
        Some(it.fold(first, |acc, r| acc.union_bounds(&r)))
    }

    /// Exact damaged area.
    pub fn to_region(&self) -> RectSet {
        self.rects.iter().copied().collect()
    }

    pub(crate) fn push(&mut self, rect: IntRect) {
        if !rect.is_empty() {
            self.rects.push(rect);
        }
    }
}
