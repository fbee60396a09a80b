// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::rc::Rc;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_tile_validate::{
    IntRect, MemoryTileStore, PixelFormat, SolidRenderer, TileCoord, TileGeometry, TileStore,
    TileValidateCache, ValidateFlags,
};

const EXTENT: i32 = 1024;
const TILE: i32 = 64;

fn setup() -> (Rc<dyn TileStore>, Rc<TileValidateCache>) {
    let store: Rc<dyn TileStore> = Rc::new(MemoryTileStore::new(
        IntRect::new(0, 0, EXTENT, EXTENT),
        TileGeometry::new(TILE, TILE, PixelFormat::Rgba8),
    ));
    let cache = TileValidateCache::new(Rc::new(SolidRenderer::new([10, 20, 30, 255])));
    cache.assign(&store).unwrap();
    (store, cache)
}

fn bench_lazy_fetch(c: &mut Criterion) {
    let mut group = c.benchmark_group("lazy_fetch");
    let tiles = (EXTENT / TILE) * (EXTENT / TILE);
    group.throughput(Throughput::Elements(tiles as u64));
    group.bench_function("whole_tiles", |b| {
        b.iter_batched(
            || {
                let (store, cache) = setup();
                cache.invalidate(IntRect::new(0, 0, EXTENT, EXTENT));
                (store, cache)
            },
            |(store, _cache)| {
                for ty in 0..EXTENT / TILE {
                    for tx in 0..EXTENT / TILE {
                        black_box(store.get_tile(TileCoord::new(tx, ty, 0)).unwrap());
                    }
                }
            },
            BatchSize::LargeInput,
        );
    });
    group.bench_function("partial_tiles", |b| {
        b.iter_batched(
            || {
                let (store, cache) = setup();
                for i in 0..EXTENT / 16 {
                    cache.invalidate(IntRect::new(i * 16, i * 16 % EXTENT, 24, 24));
                }
                (store, cache)
            },
            |(store, _cache)| {
                for ty in 0..EXTENT / TILE {
                    for tx in 0..EXTENT / TILE {
                        black_box(store.get_tile(TileCoord::new(tx, ty, 0)).unwrap());
                    }
                }
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");
    group.throughput(Throughput::Elements((EXTENT * EXTENT) as u64));
    for (name, flags) in [
        ("intersect", ValidateFlags::INTERSECT),
        ("intersect_chunked", ValidateFlags::INTERSECT | ValidateFlags::CHUNKED),
    ] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || {
                    let (store, cache) = setup();
                    cache.invalidate(IntRect::new(0, 0, EXTENT, EXTENT));
                    (store, cache)
                },
                |(_store, cache)| {
                    cache.validate(None, flags).unwrap();
                    black_box(cache.dirty_region().is_empty());
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lazy_fetch, bench_validate);
criterion_main!(benches);
