// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Regularized reconstruction of one channel.
//!
//! The solver minimizes
//!
//! ```text
//! E(x) = TV1(x) + weight * TV2(x) + pweight * D(x)
//! ```
//!
//! over the planes whose DCT coefficients quantize back to the observed levels.
//! `TV1` is the isotropic total variation, `TV2` the Frobenius norm of the
//! discrete Hessian, and `D` the sum of squared distances, in quantization
//! steps, between each coefficient and its dequantized value (a Gaussian prior
//! centered on the decoder's reconstruction).
//!
//! Minimization uses the Chambolle-Pock primal-dual algorithm. The regularizers
//! are handled through their dual variables; the fidelity term and the
//! quantization constraint are handled exactly by a proximal step computed per
//! block in the DCT domain.

mod operators;

use std::f32::consts::SQRT_2;

use jpeg2png_transforms::BLOCK_SIZE;
use operators::{add_hessian_adjoint, gradient, gradient_adjoint, hessian, hessian_norm};

use crate::{
    box_transform::{coefficient_bounds, map_blocks},
    coefficients::CoefficientStore,
    error::{Error, Result},
    options::ChannelWeights,
    telemetry::{IterationRecord, TelemetrySink},
    util::{tracing_wrappers::*, try_clone, try_filled},
};

// Squared operator norms of the gradient and of the scaled Hessian.
const FIRST_ORDER_NORM_SQ: f32 = 8.0;
const SECOND_ORDER_NORM_SQ: f32 = 64.0;

#[derive(Debug, Clone, Copy)]
struct Energy {
    total: f64,
    tv1: f64,
    tv2: f64,
    fidelity: f64,
}

/// Dual variables of the second order term.
struct HessianDual {
    xx: Vec<f32>,
    yy: Vec<f32>,
    xy: Vec<f32>,
}

impl HessianDual {
    fn new(len: usize) -> Result<HessianDual> {
        Ok(HessianDual {
            xx: try_filled(len, 0.0)?,
            yy: try_filled(len, 0.0)?,
            xy: try_filled(len, 0.0)?,
        })
    }

    /// Gradient ascent from the gradient of the extrapolated plane, then projection
    /// onto the ball of radius `weight`.
    fn ascend(&mut self, gx: &[f32], gy: &[f32], width: usize, sigma: f32, weight: f32) {
        for i in 0..gx.len() {
            let [dxx, dyy, dxy] = hessian(gx, gy, width, i);
            let xx = self.xx[i] + sigma * dxx;
            let yy = self.yy[i] + sigma * dyy;
            let xy = self.xy[i] + sigma * SQRT_2 * dxy;
            let norm = (xx * xx + yy * yy + xy * xy).sqrt();
            let scale = if norm > weight { weight / norm } else { 1.0 };
            self.xx[i] = xx * scale;
            self.yy[i] = yy * scale;
            self.xy[i] = xy * scale;
        }
    }
}

/// Solves one channel. Owns nothing but a view of its coefficients.
#[derive(Debug)]
pub struct Solver<'a> {
    store: &'a CoefficientStore,
    weights: ChannelWeights,
    channel: usize,
}

impl<'a> Solver<'a> {
    /// `channel` is only used to label telemetry.
    pub fn new(store: &'a CoefficientStore, weights: ChannelWeights, channel: usize) -> Self {
        Solver {
            store,
            weights,
            channel,
        }
    }

    fn step_sizes(&self) -> (f32, f32) {
        let mut norm_sq = FIRST_ORDER_NORM_SQ;
        if self.weights.weight() > 0.0 {
            norm_sq += SECOND_ORDER_NORM_SQ;
        }
        let norm = norm_sq.sqrt();
        // tau * sigma * norm^2 < 1.
        (4.0 / norm, 0.99 / (4.0 * norm))
    }

    /// Replaces `x` by the minimizer of `|y - x|^2 / (2 tau) + pweight * D(y)` over the
    /// quantization box, and returns `D` of the result.
    ///
    /// With `tau == 0` this is the projection onto the box.
    fn prox(&self, x: &mut [f32], tau: f32) -> f64 {
        let strength = 2.0 * tau * self.weights.pweight();
        let quant_table = self.store.quant_table();
        let levels = self.store.levels();
        let mut fidelity = 0.0f64;
        map_blocks(x, self.store.width(), |b, coefficients| {
            let block_levels = &levels[b * BLOCK_SIZE..(b + 1) * BLOCK_SIZE];
            for k in 0..BLOCK_SIZE {
                let q = quant_table[k] as f32;
                let mean = block_levels[k] as f32 * q;
                let s = strength / (q * q);
                let (lo, hi) = coefficient_bounds(block_levels[k], quant_table[k]);
                let c = ((coefficients[k] + s * mean) / (1.0 + s)).clamp(lo, hi);
                coefficients[k] = c;
                let d = (c - mean) / q;
                fidelity += (d * d) as f64;
            }
        });
        fidelity
    }

    /// Uses `gx` and `gy` as scratch.
    fn energy(&self, x: &[f32], fidelity: f64, gx: &mut [f32], gy: &mut [f32]) -> Energy {
        let width = self.store.width();
        gradient(x, width, gx, gy);
        let tv1: f64 = gx
            .iter()
            .zip(gy.iter())
            .map(|(&dx, &dy)| (dx * dx + dy * dy).sqrt() as f64)
            .sum();
        let weight = self.weights.weight();
        let tv2: f64 = if weight > 0.0 {
            (0..x.len())
                .map(|i| hessian_norm(hessian(gx, gy, width, i)) as f64)
                .sum()
        } else {
            0.0
        };
        Energy {
            total: tv1 + weight as f64 * tv2 + self.weights.pweight() as f64 * fidelity,
            tv1,
            tv2,
            fidelity,
        }
    }

    /// Runs the configured number of steps starting from `initial`, a row-major
    /// plane of the store's size, and returns the lowest energy iterate.
    ///
    /// Every returned plane lies inside the quantization box. One record per step is
    /// sent to `sink`; zero iterations return the projection of `initial`.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn solve(&self, initial: Vec<f32>, sink: &dyn TelemetrySink) -> Result<Vec<f32>> {
        let width = self.store.width();
        let len = width * self.store.height();
        if initial.len() != len {
            return Err(Error::InvalidLayout(format!(
                "{} samples for a {}x{} channel",
                initial.len(),
                width,
                self.store.height()
            )));
        }
        let weight = self.weights.weight();
        let iterations = self.weights.iterations();

        let mut x = initial;
        let mut gx = try_filled(len, 0.0f32)?;
        let mut gy = try_filled(len, 0.0f32)?;
        let fidelity = self.prox(&mut x, 0.0);
        let mut best_energy = self.energy(&x, fidelity, &mut gx, &mut gy);
        if iterations == 0 {
            return Ok(x);
        }

        let (tau, sigma) = self.step_sizes();
        debug!(
            "channel {}: {} steps, tau {tau}, sigma {sigma}, initial energy {}",
            self.channel, iterations, best_energy.total
        );
        let mut best = try_clone(&x)?;
        let mut x_bar = try_clone(&x)?;
        let mut x_new = try_filled(len, 0.0f32)?;
        let mut px = try_filled(len, 0.0f32)?;
        let mut py = try_filled(len, 0.0f32)?;
        let mut q = if weight > 0.0 {
            Some(HessianDual::new(len)?)
        } else {
            None
        };

        for iteration in 0..iterations {
            // Dual ascent.
            gradient(&x_bar, width, &mut gx, &mut gy);
            for i in 0..len {
                let dx = px[i] + sigma * gx[i];
                let dy = py[i] + sigma * gy[i];
                let norm = (dx * dx + dy * dy).sqrt().max(1.0);
                px[i] = dx / norm;
                py[i] = dy / norm;
            }
            if let Some(q) = q.as_mut() {
                q.ascend(&gx, &gy, width, sigma, weight);
            }

            // Primal descent.
            gx.copy_from_slice(&px);
            gy.copy_from_slice(&py);
            if let Some(q) = q.as_ref() {
                add_hessian_adjoint(&q.xx, &q.yy, &q.xy, width, &mut gx, &mut gy);
            }
            gradient_adjoint(&gx, &gy, width, &mut x_new);
            for (new, &old) in x_new.iter_mut().zip(x.iter()) {
                *new = old - tau * *new;
            }
            let fidelity = self.prox(&mut x_new, tau);

            // Extrapolation.
            let mut change = 0.0f64;
            for i in 0..len {
                let delta = x_new[i] - x[i];
                change += (delta as f64) * (delta as f64);
                x_bar[i] = x_new[i] + delta;
            }
            std::mem::swap(&mut x, &mut x_new);

            let energy = self.energy(&x, fidelity, &mut gx, &mut gy);
            if energy.total <= best_energy.total {
                best.copy_from_slice(&x);
                best_energy = energy;
            }
            let record = IterationRecord {
                channel: self.channel,
                iteration,
                energy: best_energy.total,
                residual: (change / len as f64).sqrt(),
                tv1: best_energy.tv1,
                tv2: best_energy.tv2,
                fidelity: best_energy.fidelity,
            };
            trace!(
                "channel {} step {iteration}: energy {}, residual {}",
                self.channel, record.energy, record.residual
            );
            sink.record(&record);
        }
        Ok(best)
    }
}
