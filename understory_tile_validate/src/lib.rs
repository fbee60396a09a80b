// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_tile_validate --heading-base-level=0

//! Understory Tile Validate: lazy, demand-driven rendering of tiled pixel buffers.
//!
//! A [`TileValidateCache`] sits between a [`TileStore`] and a [`Renderer`] that can
//! produce the pixels of any rectangle. It tracks the area that is not yet valid
//! (the dirty region) and renders exactly that area when tiles are fetched.
//!
//! - [`TileValidateCache::invalidate`] marks pixels stale and notifies listeners.
//! - Fetching a tile through `get_tile` renders its dirty part first: a fully
//!   dirty tile in one render call, a partly dirty one rectangle by rectangle.
//! - [`TileValidateCache::validate`] renders eagerly, optionally in tile-aligned
//!   chunks whose size adapts to a target interval.
//! - [`buffer_copy`] and [`buffer_set_extent`] keep dirty regions correct across
//!   copies and resizes.
//!
//! A region is removed from the dirty set only once its pixels were rendered and
//! written. Failed pieces stay dirty and are retried by the next fetch.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use understory_tile_validate::{
//!     IntRect, MemoryTileStore, PixelFormat, RenderError, TileCoord, TileGeometry, TileStore,
//!     TileValidateCache,
//! };
//!
//! let store: Rc<dyn TileStore> = Rc::new(MemoryTileStore::new(
//!     IntRect::new(0, 0, 128, 128),
//!     TileGeometry::new(64, 64, PixelFormat::Y8),
//! ));
//! let renderer = |rect: IntRect, format: PixelFormat| -> Result<Vec<u8>, RenderError> {
//!     Ok(vec![255; rect.area() as usize * format.bytes_per_pixel()])
//! };
//! let cache = TileValidateCache::new(Rc::new(renderer));
//! cache.assign(&store)?;
//!
//! cache.invalidate(IntRect::new(0, 0, 128, 128));
//! let tile = store.get_tile(TileCoord::new(1, 0, 0))?;
//! assert!(tile.read()?.iter().all(|&b| b == 255));
//! assert_eq!(cache.dirty_region().area(), 3 * 64 * 64);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Everything is single threaded: stores and caches are shared with [`Rc`](std::rc::Rc)
//! and mutate through `&self`. Renderers and listeners may call back into the cache.

pub mod blit;
pub mod buffer;
pub mod cache;
pub mod damage;
pub mod error;
pub mod renderer;
pub mod store;
pub mod tile;
pub mod types;

pub use buffer::{buffer_copy, buffer_set_extent};
pub use cache::{ListenerId, SuspendGuard, TileValidateCache, ValidateProgress};
pub use damage::Damage;
pub use error::{RenderError, StoreError, ValidateError};
pub use renderer::{Renderer, SolidRenderer};
pub use store::{MemoryTileStore, TileStore};
pub use tile::{Tile, TileLock};
pub use types::{PixelFormat, TileCoord, TileGeometry, ValidateFlags, ValidateOptions};
pub use understory_region::{Containment, IntRect, RectSet};
