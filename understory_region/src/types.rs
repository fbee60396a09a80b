// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer pixel rectangles.

/// Axis-aligned integer rectangle in pixel space.
///
/// The rectangle covers the half-open ranges `x..x + width` and `y..y + height`.
/// A rectangle with a non-positive width or height is empty; empty rectangles
/// are legal everywhere and behave as "no area". Right and bottom edges
/// saturate at `i32::MAX`, so a rectangle reaching past it is cut off there.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    /// Left edge (inclusive).
    pub x: i32,
    /// Top edge (inclusive).
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl IntRect {
    /// The empty rectangle at the origin.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Create a rectangle from origin and size.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from min/max corners (max exclusive).
    ///
    /// Inverted corners produce an empty rectangle anchored at the min corner.
    pub const fn from_min_max(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        let width = if max_x > min_x { max_x - min_x } else { 0 };
        let height = if max_y > min_y { max_y - min_y } else { 0 };
        Self::new(min_x, min_y, width, height)
    }

    /// Right edge (exclusive), saturating at `i32::MAX`.
    #[inline]
    pub const fn max_x(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive), saturating at `i32::MAX`.
    #[inline]
    pub const fn max_y(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// True if the rectangle covers no pixels.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of covered pixels (zero for empty rectangles).
    #[inline]
    pub const fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// The overlap of two rectangles. Empty when they do not overlap.
    pub fn intersect(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::ZERO;
        }
        let r = Self::from_min_max(
            self.x.max(other.x),
            self.y.max(other.y),
            self.max_x().min(other.max_x()),
            self.max_y().min(other.max_y()),
        );
        if r.is_empty() { Self::ZERO } else { r }
    }

    /// True if the rectangles share at least one pixel.
    pub fn intersects(&self, other: &Self) -> bool {
        !self.intersect(other).is_empty()
    }

    /// True if every pixel of `other` lies inside `self`.
    ///
    /// An empty `other` is contained by any rectangle.
    pub fn contains_rect(&self, other: &Self) -> bool {
        other.is_empty()
            || (!self.is_empty()
                && self.x <= other.x
                && self.y <= other.y
                && other.max_x() <= self.max_x()
                && other.max_y() <= self.max_y())
    }

    /// True if the pixel at `(x, y)` lies inside the rectangle.
    pub const fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.max_x() && y < self.max_y()
    }

    /// The smallest rectangle covering both. Empty inputs are ignored.
    pub fn union_bounds(&self, other: &Self) -> Self {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => Self::ZERO,
            (true, false) => *other,
            (false, true) => *self,
            (false, false) => Self::from_min_max(
                self.x.min(other.x),
                self.y.min(other.y),
                self.max_x().max(other.max_x()),
                self.max_y().max(other.max_y()),
            ),
        }
    }

    /// The rectangle shifted by `(dx, dy)`.
    #[must_use]
    pub const fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}
