// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

/// Converts YCbCr to RGB in place: the luma row receives red, the blue
/// difference row green and the red difference row blue.
///
/// Luma is in `[0, 255]` and chroma is centered on zero.
pub fn ycbcr_to_rgb(row_y: &mut [f32], row_cb: &mut [f32], row_cr: &mut [f32]) {
    assert!(row_y.len() == row_cb.len() && row_y.len() == row_cr.len());
    for idx in 0..row_y.len() {
        let y = row_y[idx];
        let cb = row_cb[idx];
        let cr = row_cr[idx];

        // Full-range BT.601 as defined by JFIF Clause 7:
        // https://www.itu.int/rec/T-REC-T.871-201105-I/en
        row_y[idx] = cr.mul_add(1.402, y);
        row_cb[idx] = cr.mul_add(
            -0.299 * 1.402 / 0.587,
            cb.mul_add(-0.114 * 1.772 / 0.587, y),
        );
        row_cr[idx] = cb.mul_add(1.772, y);
    }
}

/// Clamps a sample to `[0, 255]` and scales it to the full 16-bit range.
#[inline]
pub fn to_u16(sample: f32) -> u16 {
    (sample.clamp(0.0, 255.0) * 257.0).round() as u16
}
