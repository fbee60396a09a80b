// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Progressive validation.
//!
//! Validate a large dirty buffer in chunks, visible viewport first, reporting
//! progress between chunks and stopping after a frame budget is spent.
//!
//! Run:
//! - `RUST_LOG=understory_tile_validate=debug cargo run -p understory_demos --example progressive_validate`

use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;
use understory_tile_validate::{
    IntRect, MemoryTileStore, PixelFormat, RenderError, TileGeometry, TileStore,
    TileValidateCache, ValidateFlags, ValidateOptions,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store: Rc<dyn TileStore> = Rc::new(MemoryTileStore::new(
        IntRect::new(0, 0, 2048, 2048),
        TileGeometry::new(128, 128, PixelFormat::Rgba8),
    ));
    // A gradient that costs a little per pixel.
    let renderer = |rect: IntRect, format: PixelFormat| -> Result<Vec<u8>, RenderError> {
        let mut px = Vec::with_capacity(rect.area() as usize * format.bytes_per_pixel());
        for y in rect.y..rect.max_y() {
            for x in rect.x..rect.max_x() {
                let v = ((x ^ y) & 0xff) as u8;
                px.extend_from_slice(&[v, v / 2, 255 - v, 255]);
            }
        }
        Ok(px)
    };
    let viewport = IntRect::new(700, 900, 400, 300);
    let cache = TileValidateCache::with_options(
        Rc::new(renderer),
        ValidateOptions {
            chunk_interval: Duration::from_millis(5),
            priority_rect: Some(viewport),
            ..ValidateOptions::default()
        },
    );
    cache.assign(&store).expect("fresh store");
    cache.invalidate(IntRect::new(0, 0, 2048, 2048));

    let mut frames = 0;
    loop {
        frames += 1;
        let done = cache
            .validate_with_progress(
                None,
                ValidateFlags::INTERSECT | ValidateFlags::CHUNKED,
                |p| {
                    info!(percent = (p.fraction() * 100.0).round(), "progress");
                    // One chunk per frame.
                    ControlFlow::Break(())
                },
            )
            .expect("render");
        println!(
            "frame {frames}: viewport dirty = {}, {} px left",
            cache.is_dirty(viewport),
            cache.dirty_region().area()
        );
        if done {
            break;
        }
    }
}
