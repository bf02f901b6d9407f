// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use jpeg2png::{ChannelWeights, NoTelemetry, RestoreOptions, jpeg, restore_jpeg};
use jpeg2png_test_utils::JpegBuilder;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use std::hint::black_box;

fn synthetic_jpeg(size: u16) -> Vec<u8> {
    let builder = JpegBuilder::new(size, size)
        .component(2, 2, std::array::from_fn(|k| 2 + k as u16))
        .component(1, 1, std::array::from_fn(|k| 4 + k as u16))
        .component(1, 1, std::array::from_fn(|k| 4 + k as u16));
    let mut rng = XorShiftRng::seed_from_u64(0);
    let mut levels = builder.empty_levels();
    for component in levels.iter_mut() {
        for block in component.chunks_exact_mut(64) {
            block[0] = rng.random_range(-100..100);
            for level in block[1..20].iter_mut() {
                *level = rng.random_range(-4..=4);
            }
        }
    }
    builder.baseline(&levels)
}

fn bench_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("restore");
    group.sample_size(10);
    for size in [64u16, 256] {
        let data = synthetic_jpeg(size);
        group.bench_function(BenchmarkId::new("decode", size), |b| {
            b.iter(|| jpeg::decode(black_box(&data)).unwrap())
        });
        let mut options = RestoreOptions::default();
        for channel in options.channels.iter_mut() {
            *channel = ChannelWeights::new(channel.weight(), channel.pweight(), 10).unwrap();
        }
        group.bench_function(BenchmarkId::new("10 iterations", size), |b| {
            b.iter(|| restore_jpeg(black_box(&data), &options, &NoTelemetry).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_restore);
criterion_main!(benches);
