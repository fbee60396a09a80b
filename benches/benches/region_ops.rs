// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_region::{ChunkIterator, IntRect, RectSet};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn below(&mut self, n: i32) -> i32 {
        (self.next_u64() % n as u64) as i32
    }
}

/// Brush-stroke like invalidations: many small, overlapping rectangles.
fn gen_strokes(count: usize, extent: i32, max_size: i32) -> Vec<IntRect> {
    let mut rng = Rng::new(0x9e37_79b9_7f4a_7c15);
    (0..count)
        .map(|_| {
            IntRect::new(
                rng.below(extent),
                rng.below(extent),
                1 + rng.below(max_size),
                1 + rng.below(max_size),
            )
        })
        .collect()
}

fn gen_tiles(n: i32, tile: i32) -> Vec<IntRect> {
    let mut out = Vec::with_capacity((n * n) as usize);
    for y in 0..n {
        for x in 0..n {
            out.push(IntRect::new(x * tile, y * tile, tile, tile));
        }
    }
    out
}

fn bench_union(c: &mut Criterion) {
    let mut group = c.benchmark_group("rectset_union");
    for &count in &[100_usize, 1_000, 5_000] {
        let strokes = gen_strokes(count, 4096, 64);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("strokes_{count}"), |b| {
            b.iter(|| {
                let mut dirty = RectSet::new();
                for r in &strokes {
                    dirty.union_rect(*r);
                }
                black_box(dirty.num_rectangles());
            });
        });
    }
    group.finish();
}

fn bench_tile_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("rectset_tile_drain");
    for &n in &[16_i32, 64] {
        let tiles = gen_tiles(n, 64);
        group.throughput(Throughput::Elements(tiles.len() as u64));
        group.bench_function(format!("classify_subtract_n{n}"), |b| {
            b.iter_batched(
                || {
                    let mut dirty = RectSet::from_rect(IntRect::new(0, 0, n * 64, n * 64));
                    for r in gen_strokes(200, n * 64, 200) {
                        dirty.subtract_rect(r);
                    }
                    dirty
                },
                |mut dirty| {
                    for t in &tiles {
                        black_box(dirty.contains_classify(*t));
                        dirty.subtract_rect(*t);
                    }
                    black_box(dirty.is_empty());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_chunks(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_iterator");
    let mut region = RectSet::from_rect(IntRect::new(0, 0, 8192, 8192));
    for r in gen_strokes(500, 8192, 300) {
        region.subtract_rect(r);
    }
    group.throughput(Throughput::Elements(1));
    group.bench_function("drain_8k_tile128", |b| {
        b.iter_batched(
            || ChunkIterator::with_grid(region.clone(), 128, 128),
            |mut iter| {
                let mut area = 0_i64;
                while let Some(chunk) = iter.next_chunk() {
                    area += chunk.area();
                }
                black_box(area);
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_union, bench_tile_drain, bench_chunks);
criterion_main!(benches);
