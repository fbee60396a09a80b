// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Geometry never fails. Store and renderer failures are recoverable and leave
//! the dirty region as it was before the failed piece. [`ValidateError`] also
//! carries precondition violations; see [`ValidateError::is_programming_error`].

use understory_region::IntRect;

use crate::types::{PixelFormat, TileCoord};

/// Failures reported by a [`TileStore`](crate::TileStore).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store refused to resize to `extent`.
    #[error("store rejected extent {extent:?}")]
    ExtentRejected {
        /// Requested extent.
        extent: IntRect,
    },
    /// The store could not provide the tile.
    #[error("tile {coord:?} unavailable")]
    TileUnavailable {
        /// Requested tile.
        coord: TileCoord,
    },
    /// The tile is already locked for writing.
    #[error("tile {coord:?} is locked")]
    TileLocked {
        /// Locked tile.
        coord: TileCoord,
    },
    /// Source and destination formats differ.
    #[error("pixel format mismatch: {src:?} -> {dst:?}")]
    FormatMismatch {
        /// Source format.
        src: PixelFormat,
        /// Destination format.
        dst: PixelFormat,
    },
    /// A pixel buffer does not match the rectangle it is meant to cover.
    #[error("pixel buffer for {rect:?} has {actual} bytes, expected {expected}")]
    BufferSize {
        /// Target rectangle.
        rect: IntRect,
        /// Required length.
        expected: usize,
        /// Provided length.
        actual: usize,
    },
}

/// Failures reported by a [`Renderer`](crate::Renderer).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The renderer could not produce pixels for `rect`.
    #[error("rendering {rect:?} failed: {reason}")]
    Failed {
        /// Requested rectangle.
        rect: IntRect,
        /// Human readable cause.
        reason: String,
    },
    /// The renderer returned a buffer of the wrong size.
    #[error("renderer returned {actual} bytes for {rect:?}, expected {expected}")]
    SizeMismatch {
        /// Requested rectangle.
        rect: IntRect,
        /// Required length.
        expected: usize,
        /// Returned length.
        actual: usize,
    },
    /// Rendering was cancelled.
    #[error("rendering {rect:?} cancelled")]
    Cancelled {
        /// Requested rectangle.
        rect: IntRect,
    },
}

/// Errors surfaced by [`TileValidateCache`](crate::TileValidateCache) operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidateError {
    /// The store already has a cache assigned.
    #[error("store already has a validate cache assigned")]
    AlreadyAssigned,
    /// This cache is already attached to a store.
    #[error("validate cache is already attached to a store")]
    CacheAlreadyAttached,
    /// The store's assigned cache is not this one.
    #[error("store is not assigned to this validate cache")]
    NotAssignedHere,
    /// The operation needs an attached cache.
    #[error("validate cache is not attached")]
    NotAttached,
    /// `end_validate` without a matching `begin_validate`.
    #[error("end_validate without matching begin_validate")]
    UnbalancedValidate,
    /// The attached store was dropped.
    #[error("attached store was dropped")]
    StoreDropped,
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The renderer failed.
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ValidateError {
    /// True for precondition violations by the caller, false for recoverable
    /// store or renderer failures.
    pub fn is_programming_error(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Render(_))
    }
}
