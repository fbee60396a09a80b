// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The validation cache: dirty-region bookkeeping and lazy rendering of tiles.
//!
//! A [`TileValidateCache`] is assigned to one [`TileStore`]. From then on every
//! `get_tile` on that store is routed through
//! [`TileValidateCache::fetch_tile`], which renders whatever part of the tile is
//! dirty before handing it out.
//!
//! ## Claiming
//!
//! Before rendering, the area about to be produced is subtracted from the dirty
//! region. If rendering or writing fails, the claimed area is put back. Area
//! invalidated while the renderer runs is therefore kept, and a failed piece is
//! never reported as clean.
//!
//! ## Reentrancy
//!
//! The cache is single threaded and uses interior mutability. No internal borrow
//! is held while the renderer or a listener runs, so both may call back into the
//! cache or read the store. Fetches issued while validating bypass the dirty
//! check ([`suspend_depth`](TileValidateCache::suspend_depth) is non-zero).

use core::ops::ControlFlow;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Instant;

use tracing::{debug, error, trace, warn};
use understory_region::{ChunkIterator, Containment, IntRect, RectSet};

use crate::blit;
use crate::damage::Damage;
use crate::error::{RenderError, ValidateError};
use crate::renderer::Renderer;
use crate::store::TileStore;
use crate::tile::Tile;
use crate::types::{
    TileCoord, TileGeometry, ValidateFlags, ValidateOptions, pixel_bounds,
};

/// Handle returned by [`TileValidateCache::add_listener`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Progress of a chunked validation, passed to the callback of
/// [`TileValidateCache::validate_with_progress`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ValidateProgress {
    /// Pixels handed to the renderer so far.
    pub processed: i64,
    /// Pixels in the working region.
    pub total: i64,
}

impl ValidateProgress {
    /// Completed share in `0.0..=1.0`.
    #[allow(
        clippy::cast_precision_loss,
        reason = "Progress is approximate."
    )]
    pub fn fraction(&self) -> f64 {
        if self.total <= 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

type Listener = Rc<dyn Fn(IntRect)>;

/// Renders dirty areas of a tiled buffer on demand.
pub struct TileValidateCache {
    this: Weak<Self>,
    renderer: Rc<dyn Renderer>,
    store: RefCell<Option<Weak<dyn TileStore>>>,
    geometry: Cell<Option<TileGeometry>>,
    dirty: RefCell<RectSet>,
    damage: RefCell<Damage>,
    suspend_depth: Cell<u32>,
    validating_depth: Cell<u32>,
    options: Cell<ValidateOptions>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<u64>,
}

impl core::fmt::Debug for TileValidateCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileValidateCache")
            .field("attached", &self.is_attached())
            .field("geometry", &self.geometry.get())
            .field("dirty", &self.dirty.borrow().extents())
            .field("suspend_depth", &self.suspend_depth.get())
            .field("validating_depth", &self.validating_depth.get())
            .field("options", &self.options.get())
            .field("listeners", &self.listeners.borrow().len())
            .finish_non_exhaustive()
    }
}

impl TileValidateCache {
    /// Create an unattached cache with default options.
    pub fn new(renderer: Rc<dyn Renderer>) -> Rc<Self> {
        Self::with_options(renderer, ValidateOptions::default())
    }

    /// Create an unattached cache.
    pub fn with_options(renderer: Rc<dyn Renderer>, options: ValidateOptions) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            renderer,
            store: RefCell::new(None),
            geometry: Cell::new(None),
            dirty: RefCell::new(RectSet::new()),
            damage: RefCell::new(Damage::default()),
            suspend_depth: Cell::new(0),
            validating_depth: Cell::new(0),
            options: Cell::new(options),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        })
    }

    /// Current options.
    pub fn options(&self) -> ValidateOptions {
        self.options.get()
    }

    /// Replace the options. Takes effect on the next fetch or validation.
    pub fn set_options(&self, options: ValidateOptions) {
        self.options.set(options);
    }

    /// The cache installed on `store`, if any.
    pub fn assigned_cache(store: &dyn TileStore) -> Option<Rc<Self>> {
        store.attached_cache()
    }

    /// Attach to `store` and intercept its tile fetches.
    ///
    /// Captures the store's tile geometry. Fails if the store already has a
    /// cache or this cache is attached elsewhere.
    pub fn assign(&self, store: &Rc<dyn TileStore>) -> Result<(), ValidateError> {
        if store.attached_cache().is_some() {
            error!("assign: store already has a validate cache");
            return Err(ValidateError::AlreadyAssigned);
        }
        if self.is_attached() {
            error!("assign: cache is already attached to another store");
            return Err(ValidateError::CacheAlreadyAttached);
        }
        let geometry = store.geometry();
        self.geometry.set(Some(geometry));
        *self.store.borrow_mut() = Some(Rc::downgrade(store));
        store.set_attached_cache(Some(self.this.clone()));
        debug!(?geometry, extent = ?store.extent(), "validate cache assigned");
        Ok(())
    }

    /// Detach from `store`; its fetches go straight to storage again.
    pub fn unassign(&self, store: &dyn TileStore) -> Result<(), ValidateError> {
        match store.attached_cache() {
            Some(cache) if core::ptr::eq(Rc::as_ptr(&cache), self) => {}
            _ => {
                error!("unassign: store is not assigned to this cache");
                return Err(ValidateError::NotAssignedHere);
            }
        }
        store.set_attached_cache(None);
        *self.store.borrow_mut() = None;
        self.geometry.set(None);
        debug!("validate cache unassigned");
        Ok(())
    }

    /// True while attached to a live store.
    pub fn is_attached(&self) -> bool {
        self.store
            .borrow()
            .as_ref()
            .is_some_and(|s| s.strong_count() > 0)
    }

    /// Tile geometry captured at assign time.
    pub fn geometry(&self) -> Option<TileGeometry> {
        self.geometry.get()
    }

    fn store(&self) -> Result<Rc<dyn TileStore>, ValidateError> {
        let store = self.store.borrow();
        let weak = store.as_ref().ok_or(ValidateError::NotAttached)?;
        weak.upgrade().ok_or(ValidateError::StoreDropped)
    }

    /// Copy of the dirty region.
    pub fn dirty_region(&self) -> RectSet {
        self.dirty.borrow().clone()
    }

    /// True if any pixel of `rect` is dirty.
    pub fn is_dirty(&self, rect: IntRect) -> bool {
        self.dirty.borrow().contains_classify(rect) != Containment::Outside
    }

    /// Nesting depth of suspension; fetches bypass validation while non-zero.
    pub fn suspend_depth(&self) -> u32 {
        self.suspend_depth.get()
    }

    /// Nesting depth of validation brackets.
    pub fn validating_depth(&self) -> u32 {
        self.validating_depth.get()
    }

    /// Mark `rect` as needing to be rendered again.
    ///
    /// Records damage, forwards it to the store and notifies listeners with
    /// `rect` as passed. Empty rectangles are ignored. Allowed at any time,
    /// including from a renderer or listener, and before the cache is attached.
    pub fn invalidate(&self, rect: IntRect) {
        if rect.is_empty() {
            return;
        }
        self.dirty.borrow_mut().union_rect(rect);
        self.damage.borrow_mut().push(rect);
        if let Ok(store) = self.store() {
            store.damage_rect(rect);
        }
        trace!(?rect, "invalidate");
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(rect);
        }
    }

    /// Invalidate a float-space area, snapped outward to whole pixels.
    pub fn invalidate_area(&self, area: kurbo::Rect) {
        self.invalidate(pixel_bounds(area));
    }

    /// Mark `rect` as valid without rendering it. No listeners are notified.
    pub fn undo_invalidate(&self, rect: IntRect) {
        self.dirty.borrow_mut().subtract_rect(rect);
    }

    /// Add `region` to the dirty area without damage or notification.
    pub(crate) fn mark_dirty(&self, region: &RectSet) {
        self.dirty.borrow_mut().union(region);
    }

    /// Drain the rectangles invalidated since the last call.
    pub fn take_damage(&self) -> Damage {
        core::mem::take(&mut *self.damage.borrow_mut())
    }

    /// Call `listener` with the rectangle of every subsequent [`invalidate`](Self::invalidate).
    pub fn add_listener(&self, listener: impl Fn(IntRect) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was already removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != id);
        listeners.len() != before
    }

    /// Enter a validation bracket.
    ///
    /// Suspends validation of fetches until the matching
    /// [`end_validate`](Self::end_validate). The renderer's
    /// [`on_begin`](Renderer::on_begin) runs for the outermost bracket only.
    pub fn begin_validate(&self) {
        let depth = self.validating_depth.get();
        self.validating_depth.set(depth + 1);
        self.suspend_depth.set(self.suspend_depth.get() + 1);
        if depth == 0 {
            self.renderer.on_begin();
        }
    }

    /// Leave a validation bracket.
    pub fn end_validate(&self) -> Result<(), ValidateError> {
        if self.validating_depth.get() == 0 {
            error!("end_validate without begin_validate");
            return Err(ValidateError::UnbalancedValidate);
        }
        self.leave_validate();
        Ok(())
    }

    fn leave_validate(&self) {
        let depth = self.validating_depth.get().saturating_sub(1);
        self.validating_depth.set(depth);
        self.suspend_depth
            .set(self.suspend_depth.get().saturating_sub(1));
        if depth == 0 {
            self.renderer.on_end();
        }
    }

    fn enter_validate(&self) -> ValidateScope<'_> {
        self.begin_validate();
        ValidateScope(self)
    }

    /// Bypass validation of fetches until the guard is dropped.
    pub fn suspend(&self) -> SuspendGuard<'_> {
        self.suspend_depth.set(self.suspend_depth.get() + 1);
        SuspendGuard { cache: self }
    }

    /// Fetch a tile of `store`, rendering its dirty part first.
    ///
    /// Normally reached through `get_tile` on the store. Tiles above level 0,
    /// fetches while suspended and tiles with no dirty pixels come straight from
    /// storage.
    pub fn fetch_tile(
        &self,
        store: &dyn TileStore,
        coord: TileCoord,
    ) -> Result<Rc<Tile>, ValidateError> {
        let geometry = match self.geometry.get() {
            Some(g) if self.suspend_depth.get() == 0 && coord.z == 0 => g,
            _ => return Ok(store.fetch_or_create_tile(coord, true)?),
        };
        if self.dirty.borrow().is_empty() {
            return Ok(store.fetch_or_create_tile(coord, true)?);
        }
        let tile_rect = geometry.tile_rect(coord.x, coord.y);
        let containment = self.dirty.borrow().contains_classify(tile_rect);
        debug!(?coord, ?containment, "fetch dirty tile");
        match containment {
            Containment::Outside => Ok(store.fetch_or_create_tile(coord, true)?),
            Containment::Inside => self.render_whole_tile(store, geometry, coord, tile_rect),
            Containment::Partial if self.options.get().whole_tile => {
                self.render_whole_tile(store, geometry, coord, tile_rect)
            }
            Containment::Partial => self.render_tile_parts(store, geometry, coord, tile_rect),
        }
    }

    fn claim(&self, rect: IntRect) -> RectSet {
        let mut dirty = self.dirty.borrow_mut();
        let claimed = dirty.intersection_copy(rect);
        dirty.subtract_rect(rect);
        claimed
    }

    fn render_whole_tile(
        &self,
        store: &dyn TileStore,
        geometry: TileGeometry,
        coord: TileCoord,
        tile_rect: IntRect,
    ) -> Result<Rc<Tile>, ValidateError> {
        let claimed = self.claim(tile_rect);
        let result = store
            .fetch_or_create_tile(coord, false)
            .map_err(ValidateError::from)
            .and_then(|tile| {
                let _scope = self.enter_validate();
                self.render_into_tile(&tile, geometry, tile_rect, tile_rect)?;
                Ok(tile)
            });
        if let Err(err) = &result {
            warn!(?coord, %err, "tile render failed");
            self.dirty.borrow_mut().union(&claimed);
        }
        result
    }

    fn render_tile_parts(
        &self,
        store: &dyn TileStore,
        geometry: TileGeometry,
        coord: TileCoord,
        tile_rect: IntRect,
    ) -> Result<Rc<Tile>, ValidateError> {
        let claimed = self.claim(tile_rect);
        let tile = match store.fetch_or_create_tile(coord, true) {
            Ok(tile) => tile,
            Err(err) => {
                warn!(?coord, %err, "tile unavailable");
                self.dirty.borrow_mut().union(&claimed);
                return Err(err.into());
            }
        };
        let _scope = self.enter_validate();
        let mut first_err = None;
        for rect in claimed.rectangles() {
            if let Err(err) = self.render_into_tile(&tile, geometry, tile_rect, rect) {
                warn!(?rect, %err, "tile part render failed");
                self.dirty.borrow_mut().union_rect(rect);
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(tile),
        }
    }

    /// Render `rect` (inside `tile_rect`) and copy it into the tile.
    ///
    /// The tile is locked only for the copy, after rendering has finished.
    fn render_into_tile(
        &self,
        tile: &Tile,
        geometry: TileGeometry,
        tile_rect: IntRect,
        rect: IntRect,
    ) -> Result<(), ValidateError> {
        let pixels = self.render(geometry, rect)?;
        let local = rect.translate(-tile_rect.x, -tile_rect.y);
        blit::write_tile(tile, local, &pixels, packed_stride(geometry, rect), 0, 0)?;
        Ok(())
    }

    fn render(&self, geometry: TileGeometry, rect: IntRect) -> Result<Vec<u8>, RenderError> {
        trace!(?rect, "render");
        let pixels = self.renderer.render(rect, geometry.format)?;
        let expected = geometry.packed_len(rect);
        if pixels.len() != expected {
            return Err(RenderError::SizeMismatch {
                rect,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(pixels)
    }

    /// Render part of the buffer eagerly.
    ///
    /// `rect` defaults to the store extent. With [`ValidateFlags::INTERSECT`]
    /// only the dirty part of `rect` is rendered; otherwise all of `rect` is
    /// rendered regardless of its dirty state. With [`ValidateFlags::CHUNKED`]
    /// the work is split into tile-aligned pieces. An empty `rect`, or an empty
    /// extent when `rect` is `None`, renders nothing.
    ///
    /// Pieces that fail stay dirty; the first failure is returned after all
    /// other pieces were attempted.
    pub fn validate(&self, rect: Option<IntRect>, flags: ValidateFlags) -> Result<(), ValidateError> {
        self.validate_with_progress(rect, flags, |_| ControlFlow::Continue(()))
            .map(|_| ())
    }

    /// [`validate`](Self::validate) with a callback between chunks.
    ///
    /// Returns `Ok(false)` if the callback stopped the validation early; the
    /// area not yet processed stays dirty.
    pub fn validate_with_progress(
        &self,
        rect: Option<IntRect>,
        flags: ValidateFlags,
        mut progress: impl FnMut(ValidateProgress) -> ControlFlow<()>,
    ) -> Result<bool, ValidateError> {
        let store = self.store().inspect_err(|err| error!(%err, "validate"))?;
        let geometry = store.geometry();
        let rect = rect.unwrap_or_else(|| store.extent());
        // Intersecting with an empty rect keeps the set as is.
        if rect.is_empty() {
            return Ok(true);
        }
        let region = if flags.contains(ValidateFlags::INTERSECT) {
            self.dirty.borrow().intersection_copy(rect)
        } else {
            RectSet::from_rect(rect)
        };
        if region.is_empty() {
            return Ok(true);
        }
        let total = region.area();
        debug!(?rect, ?flags, total, "validate");

        let _scope = self.enter_validate();
        let mut first_err = None;
        let mut completed = true;
        if flags.contains(ValidateFlags::CHUNKED) {
            let options = self.options.get();
            let mut chunks =
                ChunkIterator::with_grid(region, geometry.tile_width, geometry.tile_height);
            chunks.set_interval(options.chunk_interval);
            chunks.set_chunk_budget(options.chunk_budget);
            chunks.set_priority_rect(options.priority_rect);
            let mut processed = 0;
            while let Some(chunk) = chunks.next_chunk() {
                let started = Instant::now();
                processed += chunk.area();
                for piece in chunk {
                    self.validate_piece(&*store, geometry, piece, &mut first_err);
                }
                chunks.report_chunk_time(started.elapsed());
                debug!(processed, total, budget = chunks.chunk_budget(), "chunk validated");
                if chunks.has_more_chunks()
                    && progress(ValidateProgress { processed, total }).is_break()
                {
                    let remaining = chunks.into_remaining();
                    debug!(remaining = remaining.area(), "validation stopped");
                    completed = false;
                    break;
                }
            }
        } else {
            for piece in region.rectangles() {
                self.validate_piece(&*store, geometry, piece, &mut first_err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(completed),
        }
    }

    fn validate_piece(
        &self,
        store: &dyn TileStore,
        geometry: TileGeometry,
        rect: IntRect,
        first_err: &mut Option<ValidateError>,
    ) {
        let result = self
            .render(geometry, rect)
            .map_err(ValidateError::from)
            .and_then(|pixels| Ok(blit::write_rect(store, rect, &pixels)?));
        match result {
            Ok(()) => self.dirty.borrow_mut().subtract_rect(rect),
            Err(err) => {
                warn!(?rect, %err, "validate piece failed");
                first_err.get_or_insert(err);
            }
        }
    }

    /// Resize the attached store's extent and drop dirty area outside it.
    ///
    /// Validation is suspended during the resize. On failure the dirty region
    /// is unchanged.
    pub fn set_extent(&self, extent: IntRect) -> Result<(), ValidateError> {
        let store = self.store().inspect_err(|err| error!(%err, "set_extent"))?;
        {
            let _suspended = self.suspend();
            store.resize_extent(extent).inspect_err(|err| {
                warn!(?extent, %err, "store rejected resize");
            })?;
        }
        let mut dirty = self.dirty.borrow_mut();
        if extent.is_empty() {
            dirty.clear();
        } else {
            dirty.intersect_rect(extent);
        }
        Ok(())
    }
}

/// Keeps a [`TileValidateCache`] suspended while alive.
///
/// Returned by [`TileValidateCache::suspend`].
pub struct SuspendGuard<'a> {
    cache: &'a TileValidateCache,
}

impl core::fmt::Debug for SuspendGuard<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SuspendGuard")
            .field("depth", &self.cache.suspend_depth.get())
            .finish_non_exhaustive()
    }
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        let depth = &self.cache.suspend_depth;
        depth.set(depth.get().saturating_sub(1));
    }
}

struct ValidateScope<'a>(&'a TileValidateCache);

impl Drop for ValidateScope<'_> {
    fn drop(&mut self) {
        self.0.leave_validate();
    }
}

fn packed_stride(geometry: TileGeometry, rect: IntRect) -> usize {
    usize::try_from(rect.width).unwrap_or(0) * geometry.bytes_per_pixel()
}
