// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_region --heading-base-level=0

//! Understory Region: exact integer pixel regions.
//!
//! Understory Region is the bookkeeping layer for dirty-area tracking in tiled pixel buffers.
//!
//! - [`IntRect`]: an integer rectangle (origin and size); empty rectangles are legal.
//! - [`RectSet`]: a set of pairwise disjoint rectangles with in-place union, subtraction and
//!   intersection, plus exact three-way [`Containment`] classification of a query rectangle.
//! - [`ChunkIterator`]: hands a region out in bounded, grid-aligned pieces, batched into
//!   [`Chunk`]s whose size adapts to a target processing interval.
//!
//! Regions are stored in canonical y-x banded form, so equal areas compare equal and
//! enumerate in a stable order. Operations never fail.
//!
//! # Example
//!
//! ```rust
//! use understory_region::{Containment, IntRect, RectSet};
//!
//! // Everything is dirty after loading an image.
//! let mut dirty = RectSet::from_rect(IntRect::new(0, 0, 128, 128));
//!
//! // The first tile was rendered.
//! dirty.subtract_rect(IntRect::new(0, 0, 64, 64));
//!
//! // A brush stroke invalidates a small area inside the clean tile.
//! dirty.union_rect(IntRect::new(16, 16, 8, 8));
//!
//! assert_eq!(dirty.contains_classify(IntRect::new(0, 0, 64, 64)), Containment::Partial);
//! assert_eq!(dirty.contains_classify(IntRect::new(64, 0, 64, 64)), Containment::Inside);
//! assert_eq!(dirty.area(), 3 * 64 * 64 + 64);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod chunk;
pub mod region;
pub mod types;

pub use chunk::{Chunk, ChunkIterator};
pub use region::{Containment, RectSet};
pub use types::IntRect;
