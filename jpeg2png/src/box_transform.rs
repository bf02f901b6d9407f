// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Moves data between the block-major layout JPEG uses and the row-major layout
//! the solver works in, and enforces the quantization constraint.

use jpeg2png_transforms::{BLOCK_DIM, BLOCK_SIZE, dct8x8, idct8x8};

use crate::{
    error::{Error, Result},
    util::{try_clone, try_filled},
};

/// Half-width of the quantization box, in quantization steps.
///
/// Slightly under 0.5 so that the rounding of a float DCT round trip cannot move a
/// coefficient on the box boundary into the neighboring quantization bin.
pub const BOX_HALF_WIDTH: f32 = 0.49;

fn check_layout(len: usize, width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 || width % BLOCK_DIM != 0 || height % BLOCK_DIM != 0 {
        return Err(Error::InvalidLayout(format!(
            "{width}x{height} is not a whole number of blocks"
        )));
    }
    if width.checked_mul(height) != Some(len) {
        return Err(Error::InvalidLayout(format!(
            "{len} samples for a {width}x{height} plane"
        )));
    }
    Ok(())
}

/// Rearranges 64-sample blocks, stored one after another in raster block order,
/// into a row-major `width` x `height` plane.
pub fn unbox(blocked: &[f32], width: usize, height: usize) -> Result<Vec<f32>> {
    check_layout(blocked.len(), width, height)?;
    let mut spatial = try_filled(blocked.len(), 0.0f32)?;
    let blocks_wide = width / BLOCK_DIM;
    for (b, block) in blocked.chunks_exact(BLOCK_SIZE).enumerate() {
        let (bx, by) = (b % blocks_wide, b / blocks_wide);
        for (y, row) in block.chunks_exact(BLOCK_DIM).enumerate() {
            let start = (by * BLOCK_DIM + y) * width + bx * BLOCK_DIM;
            spatial[start..start + BLOCK_DIM].copy_from_slice(row);
        }
    }
    Ok(spatial)
}

/// Inverse of [`unbox`].
pub fn rebox(spatial: &[f32], width: usize, height: usize) -> Result<Vec<f32>> {
    check_layout(spatial.len(), width, height)?;
    let mut blocked = try_filled(spatial.len(), 0.0f32)?;
    let blocks_wide = width / BLOCK_DIM;
    for (b, block) in blocked.chunks_exact_mut(BLOCK_SIZE).enumerate() {
        let (bx, by) = (b % blocks_wide, b / blocks_wide);
        for (y, row) in block.chunks_exact_mut(BLOCK_DIM).enumerate() {
            let start = (by * BLOCK_DIM + y) * width + bx * BLOCK_DIM;
            row.copy_from_slice(&spatial[start..start + BLOCK_DIM]);
        }
    }
    Ok(blocked)
}

/// Interval of DCT values that quantize back to `level` with step `q`.
#[inline]
pub fn coefficient_bounds(level: i16, q: u16) -> (f32, f32) {
    let q = q as f32;
    let center = level as f32 * q;
    (center - BOX_HALF_WIDTH * q, center + BOX_HALF_WIDTH * q)
}

/// Runs `f` on the DCT of every block of a row-major plane and writes the
/// inverse DCT of the result back.
///
/// `f` receives the block index in raster order and the coefficients in natural order.
pub(crate) fn map_blocks<F>(spatial: &mut [f32], width: usize, mut f: F)
where
    F: FnMut(usize, &mut [f32; BLOCK_SIZE]),
{
    let blocks_wide = width / BLOCK_DIM;
    let blocks_tall = spatial.len() / width / BLOCK_DIM;
    let mut block = [0.0f32; BLOCK_SIZE];
    for by in 0..blocks_tall {
        for bx in 0..blocks_wide {
            for y in 0..BLOCK_DIM {
                let start = (by * BLOCK_DIM + y) * width + bx * BLOCK_DIM;
                block[y * BLOCK_DIM..(y + 1) * BLOCK_DIM]
                    .copy_from_slice(&spatial[start..start + BLOCK_DIM]);
            }
            dct8x8(&mut block);
            f(by * blocks_wide + bx, &mut block);
            idct8x8(&mut block);
            for y in 0..BLOCK_DIM {
                let start = (by * BLOCK_DIM + y) * width + bx * BLOCK_DIM;
                spatial[start..start + BLOCK_DIM]
                    .copy_from_slice(&block[y * BLOCK_DIM..(y + 1) * BLOCK_DIM]);
            }
        }
    }
}

/// Clamps every DCT coefficient of a row-major plane into its quantization box.
///
/// `levels` holds the observed levels block-major, natural order within blocks.
pub fn project(
    spatial: &[f32],
    width: usize,
    height: usize,
    quant_table: &[u16; BLOCK_SIZE],
    levels: &[i16],
) -> Result<Vec<f32>> {
    check_layout(spatial.len(), width, height)?;
    if levels.len() != spatial.len() {
        return Err(Error::InvalidLayout(format!(
            "{} levels for {} samples",
            levels.len(),
            spatial.len()
        )));
    }
    let mut projected = try_clone(spatial)?;
    map_blocks(&mut projected, width, |b, coefficients| {
        let block_levels = &levels[b * BLOCK_SIZE..(b + 1) * BLOCK_SIZE];
        for k in 0..BLOCK_SIZE {
            let (lo, hi) = coefficient_bounds(block_levels[k], quant_table[k]);
            coefficients[k] = coefficients[k].clamp(lo, hi);
        }
    });
    Ok(projected)
}
