// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Finite difference operators on row-major planes.
//!
//! Differences are forward with a zero at the last row or column, so the
//! gradient of a constant plane is exactly zero.

use std::f32::consts::SQRT_2;

/// `gx = Fx u`, `gy = Fy u`.
pub(super) fn gradient(u: &[f32], width: usize, gx: &mut [f32], gy: &mut [f32]) {
    let height = u.len() / width;
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let i = row + x;
            gx[i] = if x + 1 < width { u[i + 1] - u[i] } else { 0.0 };
            gy[i] = if y + 1 < height { u[i + width] - u[i] } else { 0.0 };
        }
    }
}

/// `out = Fxᵀ gx + Fyᵀ gy`, the negated discrete divergence.
pub(super) fn gradient_adjoint(gx: &[f32], gy: &[f32], width: usize, out: &mut [f32]) {
    let height = gx.len() / width;
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let i = row + x;
            let mut v = 0.0;
            if x >= 1 {
                v += gx[i - 1];
            }
            if x + 1 < width {
                v -= gx[i];
            }
            if y >= 1 {
                v += gy[i - width];
            }
            if y + 1 < height {
                v -= gy[i];
            }
            out[i] = v;
        }
    }
}

/// Second derivatives `(dxx, dyy, dxy)` at sample `i`, from the gradient of the plane.
#[inline]
pub(super) fn hessian(gx: &[f32], gy: &[f32], width: usize, i: usize) -> [f32; 3] {
    let (x, y) = (i % width, i / width);
    let height = gx.len() / width;
    let dxx = if x >= 1 { gx[i] - gx[i - 1] } else { gx[i] };
    let dyy = if y >= 1 { gy[i] - gy[i - width] } else { gy[i] };
    let dxy = if y + 1 < height {
        gx[i + width] - gx[i]
    } else {
        0.0
    };
    [dxx, dyy, dxy]
}

/// Frobenius norm of the Hessian, counting the mixed derivative twice.
#[inline]
pub(super) fn hessian_norm([dxx, dyy, dxy]: [f32; 3]) -> f32 {
    (dxx * dxx + dyy * dyy + 2.0 * dxy * dxy).sqrt()
}

/// Adds the adjoint of `u -> (dxx, dyy, sqrt(2) dxy)` applied to `(qxx, qyy, qxy)`,
/// expressed before the final [`gradient_adjoint`]: afterwards
/// `gradient_adjoint(gx, gy)` includes the second order contribution.
pub(super) fn add_hessian_adjoint(
    qxx: &[f32],
    qyy: &[f32],
    qxy: &[f32],
    width: usize,
    gx: &mut [f32],
    gy: &mut [f32],
) {
    let height = gx.len() / width;
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let i = row + x;
            let fx_qxx = if x + 1 < width { qxx[i + 1] - qxx[i] } else { 0.0 };
            let fy_qyy = if y + 1 < height { qyy[i + width] - qyy[i] } else { 0.0 };
            let mut fyt_qxy = 0.0;
            if y >= 1 {
                fyt_qxy += qxy[i - width];
            }
            if y + 1 < height {
                fyt_qxy -= qxy[i];
            }
            gx[i] += SQRT_2 * fyt_qxy - fx_qxx;
            gy[i] -= fy_qyy;
        }
    }
}
