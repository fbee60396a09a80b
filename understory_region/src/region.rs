// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exact pixel regions stored as disjoint rectangles.
//!
//! A [`RectSet`] keeps its area in y-x banded form: the region is cut into
//! horizontal bands of equal vertical extent, and each band holds a sorted list
//! of non-touching horizontal spans. Vertically adjacent bands with identical
//! spans are coalesced. The representation is canonical, so two sets covering
//! the same pixels compare equal and enumerate the same rectangles in the same
//! order.
//!
//! All boolean operations run a single sweep over the band edges of both
//! operands and combine the spans of each horizontal slab.

use alloc::vec::Vec;

use crate::types::IntRect;

/// How a query rectangle relates to a region.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Containment {
    /// The rectangle shares no pixel with the region.
    Outside,
    /// Every pixel of the rectangle is in the region.
    Inside,
    /// Some, but not all, pixels of the rectangle are in the region.
    Partial,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Span {
    x0: i32,
    x1: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Band {
    y0: i32,
    y1: i32,
    spans: Vec<Span>,
}

impl Band {
    fn from_rect(r: IntRect) -> Self {
        Self {
            y0: r.y,
            y1: r.max_y(),
            spans: alloc::vec![Span {
                x0: r.x,
                x1: r.max_x(),
            }],
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum Op {
    Union,
    Intersect,
    Subtract,
}

/// A set of pairwise disjoint rectangles describing an integer region.
///
/// Member rectangles never overlap (they may touch). Operations with an empty
/// rectangle are no-ops.
///
/// ```
/// use understory_region::{Containment, IntRect, RectSet};
///
/// let mut dirty = RectSet::from_rect(IntRect::new(0, 0, 128, 128));
/// dirty.subtract_rect(IntRect::new(0, 0, 64, 64));
/// assert_eq!(dirty.area(), 128 * 128 - 64 * 64);
/// assert_eq!(dirty.contains_classify(IntRect::new(0, 0, 64, 64)), Containment::Outside);
/// assert_eq!(dirty.contains_classify(IntRect::new(64, 64, 64, 64)), Containment::Inside);
/// assert_eq!(dirty.contains_classify(IntRect::new(32, 32, 64, 64)), Containment::Partial);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RectSet {
    bands: Vec<Band>,
}

impl RectSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self { bands: Vec::new() }
    }

    /// Create a set covering exactly `rect`.
    pub fn from_rect(rect: IntRect) -> Self {
        if rect.is_empty() {
            Self::new()
        } else {
            Self {
                bands: alloc::vec![Band::from_rect(rect)],
            }
        }
    }

    /// Create a set covering the union of `rects`.
    pub fn from_rects<I: IntoIterator<Item = IntRect>>(rects: I) -> Self {
        let mut set = Self::new();
        for r in rects {
            set.union_rect(r);
        }
        set
    }

    /// True if the set covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Remove every rectangle.
    pub fn clear(&mut self) {
        self.bands.clear();
    }

    /// Add `rect` to the covered area.
    pub fn union_rect(&mut self, rect: IntRect) {
        if rect.is_empty() {
            return;
        }
        if self.is_empty() {
            self.bands.push(Band::from_rect(rect));
            return;
        }
        self.bands = combine(&self.bands, &[Band::from_rect(rect)], Op::Union);
    }

    /// Remove `rect` from the covered area.
    pub fn subtract_rect(&mut self, rect: IntRect) {
        if rect.is_empty() || self.is_empty() {
            return;
        }
        self.bands = combine(&self.bands, &[Band::from_rect(rect)], Op::Subtract);
    }

    /// Restrict the covered area to its overlap with `rect`.
    pub fn intersect_rect(&mut self, rect: IntRect) {
        if rect.is_empty() || self.is_empty() {
            return;
        }
        self.bands = combine(&self.bands, &[Band::from_rect(rect)], Op::Intersect);
    }

    /// Copy of the set restricted to `rect`. See [`RectSet::intersect_rect`].
    pub fn intersection_copy(&self, rect: IntRect) -> Self {
        let mut out = self.clone();
        out.intersect_rect(rect);
        out
    }

    /// Add every pixel of `other`.
    pub fn union(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            self.bands = other.bands.clone();
            return;
        }
        self.bands = combine(&self.bands, &other.bands, Op::Union);
    }

    /// Remove every pixel of `other`.
    pub fn subtract(&mut self, other: &Self) {
        if other.is_empty() || self.is_empty() {
            return;
        }
        self.bands = combine(&self.bands, &other.bands, Op::Subtract);
    }

    /// Keep only pixels also covered by `other`.
    pub fn intersect(&mut self, other: &Self) {
        if self.is_empty() {
            return;
        }
        self.bands = combine(&self.bands, &other.bands, Op::Intersect);
    }

    /// Classify `rect` against the region.
    ///
    /// The result is exact: `Inside` iff every pixel of `rect` is covered,
    /// `Outside` iff none is. An empty `rect` is `Outside`.
    pub fn contains_classify(&self, rect: IntRect) -> Containment {
        if rect.is_empty() || self.is_empty() {
            return Containment::Outside;
        }
        let covered = self.covered_area(rect);
        if covered == 0 {
            Containment::Outside
        } else if covered == rect.area() {
            Containment::Inside
        } else {
            Containment::Partial
        }
    }

    /// True if the pixel at `(x, y)` is covered.
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        self.bands
            .iter()
            .find(|b| y >= b.y0 && y < b.y1)
            .is_some_and(|b| b.spans.iter().any(|s| x >= s.x0 && x < s.x1))
    }

    /// Bounding rectangle of the region, or [`IntRect::ZERO`] when empty.
    pub fn extents(&self) -> IntRect {
        let (Some(first), Some(last)) = (self.bands.first(), self.bands.last()) else {
            return IntRect::ZERO;
        };
        let mut min_x = i32::MAX;
        let mut max_x = i32::MIN;
        for band in &self.bands {
            if let (Some(a), Some(b)) = (band.spans.first(), band.spans.last()) {
                min_x = min_x.min(a.x0);
                max_x = max_x.max(b.x1);
            }
        }
        IntRect::from_min_max(min_x, first.y0, max_x, last.y1)
    }

    /// Number of covered pixels.
    pub fn area(&self) -> i64 {
        self.bands
            .iter()
            .map(|b| {
                let h = i64::from(b.y1 - b.y0);
                b.spans.iter().map(|s| i64::from(s.x1 - s.x0) * h).sum::<i64>()
            })
            .sum()
    }

    /// Number of member rectangles.
    pub fn num_rectangles(&self) -> usize {
        self.bands.iter().map(|b| b.spans.len()).sum()
    }

    /// Member rectangles in top-to-bottom, left-to-right order.
    ///
    /// The order is stable for a given region.
    pub fn rectangles(&self) -> impl Iterator<Item = IntRect> + '_ {
        self.bands.iter().flat_map(|b| {
            b.spans
                .iter()
                .map(move |s| IntRect::from_min_max(s.x0, b.y0, s.x1, b.y1))
        })
    }

    /// First member rectangle in enumeration order.
    pub fn first_rect(&self) -> Option<IntRect> {
        self.rectangles().next()
    }

    /// Shift the whole region by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        for band in &mut self.bands {
            band.y0 += dy;
            band.y1 += dy;
            for span in &mut band.spans {
                span.x0 += dx;
                span.x1 += dx;
            }
        }
    }

    fn covered_area(&self, rect: IntRect) -> i64 {
        let (rx0, ry0, rx1, ry1) = (rect.x, rect.y, rect.max_x(), rect.max_y());
        let mut covered = 0_i64;
        for band in &self.bands {
            if band.y1 <= ry0 {
                continue;
            }
            if band.y0 >= ry1 {
                break;
            }
            let h = i64::from(band.y1.min(ry1) - band.y0.max(ry0));
            for span in &band.spans {
                if span.x1 <= rx0 {
                    continue;
                }
                if span.x0 >= rx1 {
                    break;
                }
                covered += i64::from(span.x1.min(rx1) - span.x0.max(rx0)) * h;
            }
        }
        covered
    }
}

impl From<IntRect> for RectSet {
    fn from(rect: IntRect) -> Self {
        Self::from_rect(rect)
    }
}

impl FromIterator<IntRect> for RectSet {
    fn from_iter<I: IntoIterator<Item = IntRect>>(iter: I) -> Self {
        Self::from_rects(iter)
    }
}

impl Extend<IntRect> for RectSet {
    fn extend<I: IntoIterator<Item = IntRect>>(&mut self, iter: I) {
        for r in iter {
            self.union_rect(r);
        }
    }
}

fn combine(a: &[Band], b: &[Band], op: Op) -> Vec<Band> {
    let mut ys: Vec<i32> = Vec::with_capacity(2 * (a.len() + b.len()));
    for band in a.iter().chain(b) {
        ys.push(band.y0);
        ys.push(band.y1);
    }
    ys.sort_unstable();
    ys.dedup();

    let mut out: Vec<Band> = Vec::new();
    let mut scratch: Vec<Span> = Vec::new();
    let (mut ia, mut ib) = (0_usize, 0_usize);
    for w in ys.windows(2) {
        let (top, bottom) = (w[0], w[1]);
        let sa = spans_at(a, &mut ia, top);
        let sb = spans_at(b, &mut ib, top);
        scratch.clear();
        match op {
            Op::Union => union_spans(sa, sb, &mut scratch),
            Op::Intersect => intersect_spans(sa, sb, &mut scratch),
            Op::Subtract => subtract_spans(sa, sb, &mut scratch),
        }
        push_band(&mut out, top, bottom, &scratch);
    }
    out
}

/// Spans of the band covering the slab starting at `top`.
///
/// Every band edge is a slab edge, so a band that starts at or above `top`
/// and ends below it covers the whole slab.
fn spans_at<'a>(bands: &'a [Band], cursor: &mut usize, top: i32) -> &'a [Span] {
    while *cursor < bands.len() && bands[*cursor].y1 <= top {
        *cursor += 1;
    }
    match bands.get(*cursor) {
        Some(band) if band.y0 <= top => &band.spans,
        _ => &[],
    }
}

fn push_band(out: &mut Vec<Band>, top: i32, bottom: i32, spans: &[Span]) {
    if spans.is_empty() {
        return;
    }
    if let Some(last) = out.last_mut()
        && last.y1 == top
        && last.spans == spans
    {
        last.y1 = bottom;
        return;
    }
    out.push(Band {
        y0: top,
        y1: bottom,
        spans: spans.to_vec(),
    });
}

fn push_span(out: &mut Vec<Span>, x0: i32, x1: i32) {
    if x0 >= x1 {
        return;
    }
    if let Some(last) = out.last_mut()
        && last.x1 >= x0
    {
        last.x1 = last.x1.max(x1);
        return;
    }
    out.push(Span { x0, x1 });
}

fn union_spans(a: &[Span], b: &[Span], out: &mut Vec<Span>) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        let take_a = j >= b.len() || (i < a.len() && a[i].x0 <= b[j].x0);
        let s = if take_a {
            i += 1;
            a[i - 1]
        } else {
            j += 1;
            b[j - 1]
        };
        push_span(out, s.x0, s.x1);
    }
}

fn intersect_spans(a: &[Span], b: &[Span], out: &mut Vec<Span>) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let x0 = a[i].x0.max(b[j].x0);
        let x1 = a[i].x1.min(b[j].x1);
        push_span(out, x0, x1);
        if a[i].x1 < b[j].x1 {
            i += 1;
        } else {
            j += 1;
        }
    }
}

fn subtract_spans(a: &[Span], b: &[Span], out: &mut Vec<Span>) {
    let mut j = 0;
    for s in a {
        let mut cur = s.x0;
        while j < b.len() && b[j].x1 <= cur {
            j += 1;
        }
        let mut k = j;
        while k < b.len() && b[k].x0 < s.x1 {
            push_span(out, cur, b[k].x0);
            cur = cur.max(b[k].x1);
            if cur >= s.x1 {
                break;
            }
            k += 1;
        }
        push_span(out, cur, s.x1);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloc::vec;

    /// Brute-force pixel grid over `0..N` squared.
    pub(crate) const N: i32 = 32;

    #[derive(Clone)]
    pub(crate) struct Grid(pub(crate) Vec<bool>);

    impl Grid {
        pub(crate) fn new() -> Self {
            Self(vec![false; (N * N) as usize])
        }

        fn apply(&mut self, r: IntRect, f: impl Fn(bool) -> bool) {
            for y in 0..N {
                for x in 0..N {
                    let inside = r.contains_point(x, y);
                    let cell = &mut self.0[(y * N + x) as usize];
                    *cell = if inside { f(*cell) } else { *cell };
                }
            }
        }

        pub(crate) fn union(&mut self, r: IntRect) {
            self.apply(r, |_| true);
        }

        pub(crate) fn subtract(&mut self, r: IntRect) {
            self.apply(r, |_| false);
        }

        pub(crate) fn intersect(&mut self, r: IntRect) {
            if r.is_empty() {
                return;
            }
            for y in 0..N {
                for x in 0..N {
                    if !r.contains_point(x, y) {
                        self.0[(y * N + x) as usize] = false;
                    }
                }
            }
        }

        pub(crate) fn get(&self, x: i32, y: i32) -> bool {
            self.0[(y * N + x) as usize]
        }

        pub(crate) fn count_in(&self, r: IntRect) -> i64 {
            let mut n = 0;
            for y in 0..N {
                for x in 0..N {
                    if r.contains_point(x, y) && self.get(x, y) {
                        n += 1;
                    }
                }
            }
            n
        }
    }

    pub(crate) struct Rng(u64);

    impl Rng {
        pub(crate) fn new(seed: u64) -> Self {
            Self(seed)
        }

        pub(crate) fn next_u64(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        pub(crate) fn below(&mut self, n: i32) -> i32 {
            (self.next_u64() % n as u64) as i32
        }

        pub(crate) fn rect(&mut self) -> IntRect {
            let x = self.below(N);
            let y = self.below(N);
            let w = self.below(N - x + 1);
            let h = self.below(N - y + 1);
            IntRect::new(x, y, w, h)
        }
    }

    /// Rasterize a set and assert its members are pairwise disjoint.
    pub(crate) fn rasterize(set: &RectSet) -> Grid {
        let mut g = Grid::new();
        for r in set.rectangles() {
            assert!(!r.is_empty(), "member rectangles are never empty");
            for y in r.y..r.max_y() {
                for x in r.x..r.max_x() {
                    let cell = &mut g.0[(y * N + x) as usize];
                    assert!(!*cell, "pixel ({x}, {y}) covered twice");
                    *cell = true;
                }
            }
        }
        g
    }

    #[test]
    fn empty_rect_ops_are_noops() {
        let mut s = RectSet::from_rect(IntRect::new(0, 0, 10, 10));
        let before = s.clone();
        s.union_rect(IntRect::new(20, 20, 0, 5));
        s.subtract_rect(IntRect::new(2, 2, 5, 0));
        s.intersect_rect(IntRect::ZERO);
        assert_eq!(s, before);
        assert_eq!(s.intersection_copy(IntRect::new(4, 4, -1, 3)), before);
    }

    #[test]
    fn union_of_adjacent_coalesces() {
        let mut s = RectSet::new();
        s.union_rect(IntRect::new(0, 0, 10, 10));
        s.union_rect(IntRect::new(10, 0, 10, 10));
        s.union_rect(IntRect::new(0, 10, 20, 5));
        assert_eq!(s.num_rectangles(), 1);
        assert_eq!(s.first_rect(), Some(IntRect::new(0, 0, 20, 15)));
    }

    #[test]
    fn subtract_hole_splits_into_bands() {
        let mut s = RectSet::from_rect(IntRect::new(0, 0, 30, 30));
        s.subtract_rect(IntRect::new(10, 10, 10, 10));
        let rects: Vec<_> = s.rectangles().collect();
        assert_eq!(
            rects,
            vec![
                IntRect::new(0, 0, 30, 10),
                IntRect::new(0, 10, 10, 10),
                IntRect::new(20, 10, 10, 10),
                IntRect::new(0, 20, 30, 10),
            ]
        );
        assert_eq!(s.area(), 900 - 100);
        assert!(!s.contains_point(15, 15));
        assert!(s.contains_point(25, 15));
    }

    #[test]
    fn canonical_form_is_order_independent() {
        let a = RectSet::from_rects([IntRect::new(0, 0, 8, 8), IntRect::new(4, 4, 8, 8)]);
        let b = RectSet::from_rects([
            IntRect::new(4, 4, 8, 8),
            IntRect::new(0, 0, 8, 4),
            IntRect::new(0, 4, 4, 4),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn extents_and_translate() {
        let mut s = RectSet::from_rects([IntRect::new(0, 0, 4, 4), IntRect::new(10, 6, 2, 2)]);
        assert_eq!(s.extents(), IntRect::new(0, 0, 12, 8));
        s.translate(-3, 5);
        assert_eq!(s.extents(), IntRect::new(-3, 5, 12, 8));
        assert_eq!(RectSet::new().extents(), IntRect::ZERO);
    }

    #[test]
    fn set_operations_match_rect_operations() {
        let a = RectSet::from_rects([IntRect::new(0, 0, 10, 10), IntRect::new(20, 0, 5, 5)]);
        let b = RectSet::from_rects([IntRect::new(5, 5, 20, 2)]);

        let mut u = a.clone();
        u.union(&b);
        let mut u2 = a.clone();
        u2.union_rect(IntRect::new(5, 5, 20, 2));
        assert_eq!(u, u2);

        let mut d = a.clone();
        d.subtract(&b);
        let mut d2 = a.clone();
        d2.subtract_rect(IntRect::new(5, 5, 20, 2));
        assert_eq!(d, d2);

        let mut i = a.clone();
        i.intersect(&RectSet::new());
        assert!(i.is_empty());
    }

    #[test]
    fn random_ops_match_pixel_oracle() {
        let mut rng = Rng::new(0x9e37_79b9_7f4a_7c15);
        for _ in 0..40 {
            let mut set = RectSet::new();
            let mut oracle = Grid::new();
            for _ in 0..24 {
                let r = rng.rect();
                match rng.below(3) {
                    0 => {
                        set.union_rect(r);
                        oracle.union(r);
                    }
                    1 => {
                        set.subtract_rect(r);
                        oracle.subtract(r);
                    }
                    _ => {
                        set.intersect_rect(r);
                        oracle.intersect(r);
                    }
                }
                let raster = rasterize(&set);
                assert!(raster.0 == oracle.0, "region diverged from oracle");
                let expected: i64 = oracle.0.iter().filter(|c| **c).count() as i64;
                assert_eq!(set.area(), expected);
            }
        }
    }

    #[test]
    fn classification_is_exact() {
        let mut rng = Rng::new(42);
        for _ in 0..40 {
            let mut set = RectSet::new();
            let mut oracle = Grid::new();
            for _ in 0..6 {
                let r = rng.rect();
                if rng.below(4) == 0 {
                    set.subtract_rect(r);
                    oracle.subtract(r);
                } else {
                    set.union_rect(r);
                    oracle.union(r);
                }
            }
            for _ in 0..30 {
                let q = rng.rect();
                let covered = oracle.count_in(q);
                let expected = if covered == 0 {
                    Containment::Outside
                } else if covered == q.area() {
                    Containment::Inside
                } else {
                    Containment::Partial
                };
                assert_eq!(set.contains_classify(q), expected, "query {q:?}");
            }
        }
    }
}
