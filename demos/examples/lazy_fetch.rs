// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lazy tile fetch.
//!
//! Attach a validate cache to a tiled buffer, paint a few strokes, and watch
//! tiles get rendered only when fetched, and only where they are dirty.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example lazy_fetch`

use std::cell::RefCell;
use std::rc::Rc;

use tracing_subscriber::EnvFilter;
use understory_tile_validate::{
    IntRect, MemoryTileStore, PixelFormat, RenderError, TileCoord, TileGeometry, TileStore,
    TileValidateCache, ValidateFlags,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store: Rc<dyn TileStore> = Rc::new(MemoryTileStore::new(
        IntRect::new(0, 0, 256, 256),
        TileGeometry::new(64, 64, PixelFormat::Y8),
    ));

    // A checkerboard "graph" that logs what it is asked to compute.
    let requests = Rc::new(RefCell::new(Vec::new()));
    let log = requests.clone();
    let renderer = move |rect: IntRect, format: PixelFormat| -> Result<Vec<u8>, RenderError> {
        log.borrow_mut().push(rect);
        let mut px = Vec::with_capacity(rect.area() as usize * format.bytes_per_pixel());
        for y in rect.y..rect.max_y() {
            for x in rect.x..rect.max_x() {
                px.push(if (x / 8 + y / 8) % 2 == 0 { 255 } else { 0 });
            }
        }
        Ok(px)
    };
    let cache = TileValidateCache::new(Rc::new(renderer));
    cache.assign(&store).expect("fresh store");
    cache.add_listener(|r| println!("invalidated {r:?}"));

    // Loading an image: everything is dirty.
    cache.invalidate(IntRect::new(0, 0, 256, 256));
    let _ = store.get_tile(TileCoord::new(0, 0, 0)).expect("render");
    println!("after first tile: {} px dirty", cache.dirty_region().area());

    // Validate the rest, then paint two strokes.
    cache.validate(None, ValidateFlags::empty()).expect("render");
    cache.invalidate(IntRect::new(10, 10, 20, 4));
    cache.invalidate_area(kurbo::Rect::new(100.5, 30.2, 140.0, 33.9));
    requests.borrow_mut().clear();

    for ty in 0..4 {
        for tx in 0..4 {
            let _ = store.get_tile(TileCoord::new(tx, ty, 0)).expect("render");
        }
    }
    println!("strokes re-rendered as:");
    for r in requests.borrow().iter() {
        println!("  {r:?}");
    }
    println!("damage this frame: {:?}", cache.take_damage().union());
    assert!(cache.dirty_region().is_empty());
}
