// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The [`Renderer`] capability consumed by the cache.

use understory_region::IntRect;

use crate::error::RenderError;
use crate::types::PixelFormat;

/// Produces pixels for arbitrary rectangles of a buffer.
///
/// `render` returns a tightly packed, row-major buffer of exactly
/// `rect.width * rect.height * format.bytes_per_pixel()` bytes. It may read
/// from the store being validated; such reads bypass validation.
///
/// Closures `Fn(IntRect, PixelFormat) -> Result<Vec<u8>, RenderError>` are
/// renderers without lifecycle hooks.
pub trait Renderer {
    /// Compute the pixels of `rect`.
    fn render(&self, rect: IntRect, format: PixelFormat) -> Result<Vec<u8>, RenderError>;

    /// Called when the outermost validation starts.
    fn on_begin(&self) {}

    /// Called when the outermost validation ends.
    fn on_end(&self) {}
}

impl<F> Renderer for F
where
    F: Fn(IntRect, PixelFormat) -> Result<Vec<u8>, RenderError>,
{
    fn render(&self, rect: IntRect, format: PixelFormat) -> Result<Vec<u8>, RenderError> {
        self(rect, format)
    }
}

/// A renderer filling every pixel with the same bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolidRenderer {
    pixel: Vec<u8>,
}

impl SolidRenderer {
    /// Fill with `pixel`, which must be one pixel of the target format.
    pub fn new(pixel: impl Into<Vec<u8>>) -> Self {
        Self {
            pixel: pixel.into(),
        }
    }
}

impl Renderer for SolidRenderer {
    fn render(&self, rect: IntRect, format: PixelFormat) -> Result<Vec<u8>, RenderError> {
        let bpp = format.bytes_per_pixel();
        if self.pixel.len() != bpp {
            return Err(RenderError::Failed {
                rect,
                reason: format!("fill pixel has {} bytes, format needs {bpp}", self.pixel.len()),
            });
        }
        #[allow(
            clippy::cast_sign_loss,
            reason = "Empty rectangles render to an empty buffer."
        )]
        let count = if rect.is_empty() {
            0
        } else {
            rect.width as usize * rect.height as usize
        };
        Ok(self.pixel.repeat(count))
    }
}
