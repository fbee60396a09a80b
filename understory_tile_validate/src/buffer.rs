// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer-level operations that keep dirty regions consistent.

use std::rc::Rc;

use tracing::{debug, error};
use understory_region::IntRect;

use crate::error::ValidateError;
use crate::store::TileStore;

/// Resize `store`, going through its attached cache if there is one.
pub fn buffer_set_extent(store: &dyn TileStore, extent: IntRect) -> Result<(), ValidateError> {
    match store.attached_cache() {
        Some(cache) => cache.set_extent(extent),
        None => Ok(store.resize_extent(extent)?),
    }
}

/// Copy pixels from `src` to the cache-managed `dst` and carry dirtiness over.
///
/// Both rectangles default to their store's extent. The copied size is the
/// smaller of the two rectangles, further clipped so both sides stay inside
/// their extents; whatever does not fit is dropped.
///
/// The destination area becomes clean, except for the part that was dirty in
/// `src`: copied pixels that were stale in the source stay dirty in the
/// destination.
pub fn buffer_copy(
    src: &dyn TileStore,
    src_rect: Option<IntRect>,
    dst: &dyn TileStore,
    dst_rect: Option<IntRect>,
) -> Result<(), ValidateError> {
    let Some(dst_cache) = dst.attached_cache() else {
        error!("buffer_copy: destination has no validate cache");
        return Err(ValidateError::NotAttached);
    };
    let src_cache = src.attached_cache();
    let src_dirty = src_cache.as_ref().map(|c| c.dirty_region());

    let (s, d) = clamp_pair(
        src_rect.unwrap_or_else(|| src.extent()),
        src.extent(),
        dst_rect.unwrap_or_else(|| dst.extent()),
        dst.extent(),
    );
    if s.is_empty() {
        return Ok(());
    }
    debug!(?s, ?d, "buffer copy");

    if src_cache.is_some() {
        src.set_attached_cache(None);
    }
    let copied = {
        let _suspended = dst_cache.suspend();
        dst.raw_copy(src, s, d)
    };
    if let Some(cache) = &src_cache {
        src.set_attached_cache(Some(Rc::downgrade(cache)));
    }
    copied?;

    dst_cache.undo_invalidate(d);
    if let Some(src_dirty) = src_dirty {
        let (dx, dy) = (d.x - s.x, d.y - s.y);
        if dx == 0 && dy == 0 && s.contains_rect(&src_dirty.extents()) {
            dst_cache.mark_dirty(&src_dirty);
        } else {
            let mut inherited = src_dirty.intersection_copy(s);
            inherited.translate(dx, dy);
            dst_cache.mark_dirty(&inherited);
        }
    }
    dst.damage_rect(d);
    Ok(())
}

/// Shrink `s` and `d` to a common size that fits both extents, moving them
/// in lockstep so they keep corresponding pixel for pixel.
fn clamp_pair(
    s: IntRect,
    src_extent: IntRect,
    d: IntRect,
    dst_extent: IntRect,
) -> (IntRect, IntRect) {
    let width = s.width.min(d.width);
    let height = s.height.min(d.height);
    let s = IntRect::new(s.x, s.y, width, height);
    let d = IntRect::new(d.x, d.y, width, height);

    let d_clip = d.intersect(&dst_extent);
    let s = IntRect::new(
        s.x + (d_clip.x - d.x),
        s.y + (d_clip.y - d.y),
        d_clip.width,
        d_clip.height,
    );
    let s_clip = s.intersect(&src_extent);
    let d = IntRect::new(
        d_clip.x + (s_clip.x - s.x),
        d_clip.y + (s_clip.y - s.y),
        s_clip.width,
        s_clip.height,
    );
    (s_clip, d)
}
