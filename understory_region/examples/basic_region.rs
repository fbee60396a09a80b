// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Understory Region: track dirty area, classify tiles, and chunk the rest.

use understory_region::{ChunkIterator, IntRect, RectSet};

fn main() {
    let mut dirty = RectSet::from_rect(IntRect::new(0, 0, 256, 256));
    dirty.subtract_rect(IntRect::new(0, 0, 128, 128));
    dirty.union_rect(IntRect::new(40, 40, 20, 20));

    for ty in 0..2 {
        for tx in 0..2 {
            let tile = IntRect::new(tx * 128, ty * 128, 128, 128);
            println!("tile ({tx}, {ty}): {:?}", dirty.contains_classify(tile));
        }
    }

    let mut iter = ChunkIterator::with_grid(dirty, 64, 64);
    let mut n = 0;
    while let Some(chunk) = iter.next_chunk() {
        n += 1;
        println!("chunk {n}: {} rects, {} px", chunk.len(), chunk.area());
    }
}
