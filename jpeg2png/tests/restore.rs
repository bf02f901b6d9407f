// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::num::NonZeroUsize;

use jpeg2png::{
    ChannelWeights, ChromaUpsampler, CoefficientStore, NoTelemetry, Plane, RecordingTelemetry,
    RestoreOptions, Result, box_transform::unbox, jpeg, restore_jpeg, solver::Solver,
};
use jpeg2png_test_utils::{JpegBuilder, assert_all_within, assert_almost_eq};
use jpeg2png_transforms::{dct8x8, idct8x8};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use test_log::test;

fn random_levels(builder: &JpegBuilder, seed: u64) -> Vec<Vec<i16>> {
    let mut rng = XorShiftRng::seed_from_u64(seed);
    let mut levels = builder.empty_levels();
    for component in levels.iter_mut() {
        for block in component.chunks_exact_mut(64) {
            block[0] = rng.random_range(-60..60);
            for level in block[1..10].iter_mut() {
                *level = rng.random_range(-3..=3);
            }
        }
    }
    levels
}

fn options(iterations: usize, threads: Option<usize>) -> RestoreOptions {
    let mut options = RestoreOptions::default();
    for (c, channel) in options.channels.iter_mut().enumerate() {
        let weight = if c == 0 { 0.3 } else { 0.0 };
        *channel = ChannelWeights::new(weight, 0.001, iterations).unwrap();
    }
    options.threads = threads.and_then(NonZeroUsize::new);
    options
}

#[test]
fn single_block_stays_in_reconstruction_interval() -> Result<()> {
    let mut levels = [0i16; 64];
    levels[0] = -37;
    levels[1] = 12;
    levels[8] = -5;
    levels[9] = 3;
    levels[63] = 1;
    let builder = JpegBuilder::new(8, 8).component(1, 1, [1; 64]);
    let data = builder.baseline(&[levels.to_vec()]);

    let sink = RecordingTelemetry::new();
    let image = restore_jpeg(&data, &options(1, None), &sink)?;
    assert_eq!((image.width(), image.height(), image.num_channels()), (8, 8, 1));
    assert_eq!(sink.records().len(), 1);

    // Each coefficient moves by at most 0.49, so each pixel by at most 8 * 0.49.
    let mut naive: [f32; 64] = std::array::from_fn(|k| levels[k] as f32);
    idct8x8(&mut naive);
    let lo: Vec<f32> = naive.iter().map(|v| v + 128.0 - 3.92).collect();
    let hi: Vec<f32> = naive.iter().map(|v| v + 128.0 + 3.92).collect();
    let restored = image.planes()[0].data();
    assert_all_within!(restored, lo, hi, 1e-3);

    let mut coefficients: [f32; 64] = std::array::from_fn(|k| restored[k] - 128.0);
    dct8x8(&mut coefficients);
    for k in 0..64 {
        assert_almost_eq!(coefficients[k], levels[k] as f32, 0.5);
    }
    Ok(())
}

#[test]
fn subsampled_chroma_is_exact_at_even_positions() -> Result<()> {
    let builder = JpegBuilder::new(32, 24)
        .component(2, 2, [2; 64])
        .component(1, 1, [3; 64])
        .component(1, 1, [3; 64]);
    let decoded = jpeg::decode(&builder.baseline(&random_levels(&builder, 1)))?;
    let stores = CoefficientStore::from_jpeg(decoded)?;
    let mut chroma = stores[1].clone();
    assert_eq!(chroma.sampling_ratio(), (2, 2));

    let (width, height) = (chroma.width(), chroma.height());
    chroma.decode_coefficients()?;
    let spatial = unbox(&chroma.take_fdata(), width, height)?;
    let solved = Solver::new(&chroma, ChannelWeights::default_chroma(), 1)
        .solve(spatial, &NoTelemetry)?;
    let low = Plane::from_vec((width, height), solved)?;
    let full = ChromaUpsampler::new(2, 2)?.upsample(&low, 32, 24)?;
    for y in (0..24).step_by(2) {
        for x in (0..32).step_by(2) {
            assert_eq!(full.row(y)[x], low.row(y / 2)[x / 2]);
        }
    }
    Ok(())
}

#[test]
fn unrestored_decode_matches_reference_decoder() {
    use image::{ImageEncoder, codecs::jpeg::JpegEncoder};

    let (width, height) = (61u32, 45u32);
    let mut rng = XorShiftRng::seed_from_u64(2);
    let pixels: Vec<u8> = (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            let base = (x * 3 + y * 2) as i32;
            (base + rng.random_range(-10..=10)).clamp(0, 255) as u8
        })
        .collect();
    let mut jpeg_data = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_data, 85)
        .write_image(&pixels, width, height, image::ExtendedColorType::L8)
        .unwrap();

    let reference = image::load_from_memory_with_format(&jpeg_data, image::ImageFormat::Jpeg)
        .unwrap()
        .into_luma8();
    let image = restore_jpeg(&jpeg_data, &options(0, None), &NoTelemetry).unwrap();
    assert_eq!((image.width(), image.height()), (61, 45));
    let ours = image.planes()[0].data();
    for (i, &theirs) in reference.as_raw().iter().enumerate() {
        let ours = ours[i].clamp(0.0, 255.0).round();
        assert_almost_eq!(ours, theirs as f32, 3.0);
    }
}

#[test]
fn results_do_not_depend_on_thread_count() -> Result<()> {
    let builder = JpegBuilder::new(40, 24)
        .component(2, 1, [4; 64])
        .component(1, 1, [6; 64])
        .component(1, 1, [6; 64])
        .restart_interval(2);
    let data = builder.progressive(&random_levels(&builder, 3));
    let one = restore_jpeg(&data, &options(8, Some(1)), &NoTelemetry)?;
    let three = restore_jpeg(&data, &options(8, Some(3)), &NoTelemetry)?;
    assert_eq!(one, three);
    assert_eq!(one.to_u16_samples()?, three.to_u16_samples()?);
    Ok(())
}

#[test]
fn every_channel_reports_monotone_energy() -> Result<()> {
    let builder = JpegBuilder::new(24, 16)
        .component(1, 1, [5; 64])
        .component(1, 1, [7; 64])
        .component(1, 1, [7; 64]);
    let data = builder.baseline(&random_levels(&builder, 4));
    let sink = RecordingTelemetry::new();
    let image = restore_jpeg(&data, &options(12, None), &sink)?;
    assert_eq!(image.num_channels(), 3);
    assert_eq!(sink.records().len(), 36);
    for channel in 0..3 {
        let records = sink.channel(channel);
        assert_eq!(records.len(), 12);
        for pair in records.windows(2) {
            assert!(pair[1].energy <= pair[0].energy);
        }
    }
    Ok(())
}

#[test]
fn rejects_non_jpeg_input() {
    let err = restore_jpeg(b"\x89PNG\r\n\x1a\n", &RestoreOptions::default(), &NoTelemetry)
        .unwrap_err();
    assert!(err.is_format_error());
}
