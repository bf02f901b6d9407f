// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![allow(clippy::needless_range_loop)]

//! The 8x8 DCT used by baseline JPEG.
//!
//! Both directions are orthonormal: `F(u, v) = C(u) C(v) / 4 * sum f(x, y) cos(..) cos(..)`
//! with `C(0) = 1 / sqrt(2)`, which is exactly the scaling JPEG quantizes. Because the
//! transform is orthonormal, Euclidean distances (and therefore projections onto boxes
//! defined in coefficient space) are the same in both domains.

pub const BLOCK_DIM: usize = 8;
pub const BLOCK_SIZE: usize = BLOCK_DIM * BLOCK_DIM;

/// `DCT8_BASIS[u][x] = C(u) / 2 * cos((2x + 1) u pi / 16)`.
#[allow(clippy::excessive_precision)]
const DCT8_BASIS: [[f32; BLOCK_DIM]; BLOCK_DIM] = [
    [
        0.353553391,
        0.353553391,
        0.353553391,
        0.353553391,
        0.353553391,
        0.353553391,
        0.353553391,
        0.353553391,
    ],
    [
        0.490392640,
        0.415734806,
        0.277785117,
        0.097545161,
        -0.097545161,
        -0.277785117,
        -0.415734806,
        -0.490392640,
    ],
    [
        0.461939766,
        0.191341716,
        -0.191341716,
        -0.461939766,
        -0.461939766,
        -0.191341716,
        0.191341716,
        0.461939766,
    ],
    [
        0.415734806,
        -0.097545161,
        -0.490392640,
        -0.277785117,
        0.277785117,
        0.490392640,
        0.097545161,
        -0.415734806,
    ],
    [
        0.353553391,
        -0.353553391,
        -0.353553391,
        0.353553391,
        0.353553391,
        -0.353553391,
        -0.353553391,
        0.353553391,
    ],
    [
        0.277785117,
        -0.490392640,
        0.097545161,
        0.415734806,
        -0.415734806,
        -0.097545161,
        0.490392640,
        -0.277785117,
    ],
    [
        0.191341716,
        -0.461939766,
        0.461939766,
        -0.191341716,
        -0.191341716,
        0.461939766,
        -0.461939766,
        0.191341716,
    ],
    [
        0.097545161,
        -0.277785117,
        0.415734806,
        -0.490392640,
        0.490392640,
        -0.415734806,
        0.277785117,
        -0.097545161,
    ],
];

/// Forward 8-point DCT of `input`, which is read with the given stride.
#[inline(always)]
fn dct1d(input: &[f32], stride: usize, output: &mut [f32; BLOCK_DIM]) {
    for (u, out) in output.iter_mut().enumerate() {
        let basis = &DCT8_BASIS[u];
        let mut sum = 0.0f32;
        for x in 0..BLOCK_DIM {
            sum = basis[x].mul_add(input[x * stride], sum);
        }
        *out = sum;
    }
}

/// Inverse 8-point DCT of `input`, which is read with the given stride.
#[inline(always)]
fn idct1d(input: &[f32], stride: usize, output: &mut [f32; BLOCK_DIM]) {
    for (x, out) in output.iter_mut().enumerate() {
        let mut sum = 0.0f32;
        for u in 0..BLOCK_DIM {
            sum = DCT8_BASIS[u][x].mul_add(input[u * stride], sum);
        }
        *out = sum;
    }
}

/// In-place forward 2D DCT of a row-major 8x8 block.
///
/// On output, `block[v * 8 + u]` holds the coefficient of horizontal frequency `u`
/// and vertical frequency `v` (JPEG natural order).
pub fn dct8x8(block: &mut [f32; BLOCK_SIZE]) {
    let mut tmp = [0.0f32; BLOCK_SIZE];
    let mut line = [0.0f32; BLOCK_DIM];
    for y in 0..BLOCK_DIM {
        dct1d(&block[y * BLOCK_DIM..], 1, &mut line);
        tmp[y * BLOCK_DIM..(y + 1) * BLOCK_DIM].copy_from_slice(&line);
    }
    for u in 0..BLOCK_DIM {
        dct1d(&tmp[u..], BLOCK_DIM, &mut line);
        for v in 0..BLOCK_DIM {
            block[v * BLOCK_DIM + u] = line[v];
        }
    }
}

/// In-place inverse 2D DCT; exact inverse of [`dct8x8`] up to rounding.
pub fn idct8x8(block: &mut [f32; BLOCK_SIZE]) {
    let mut tmp = [0.0f32; BLOCK_SIZE];
    let mut line = [0.0f32; BLOCK_DIM];
    for v in 0..BLOCK_DIM {
        idct1d(&block[v * BLOCK_DIM..], 1, &mut line);
        tmp[v * BLOCK_DIM..(v + 1) * BLOCK_DIM].copy_from_slice(&line);
    }
    for x in 0..BLOCK_DIM {
        idct1d(&tmp[x..], BLOCK_DIM, &mut line);
        for y in 0..BLOCK_DIM {
            block[y * BLOCK_DIM + x] = line[y];
        }
    }
}
