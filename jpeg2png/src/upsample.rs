// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    error::{Error, Result},
    image::Plane,
    util::tracing_wrappers::*,
};

// Block grids are padded to whole MCUs, which are at most 16 samples wide.
const MAX_PADDING: usize = 16;

/// Four-tap interpolation halfway between `a` and `b`, limited to the range they span
/// so that edges do not ring.
#[inline]
fn cubic(p: f32, a: f32, b: f32, n: f32) -> f32 {
    let value = (9.0 * (a + b) - p - n) * (1.0 / 16.0);
    value.clamp(a.min(b), a.max(b))
}

/// Upsamples one line of samples by `factor` into `out`.
///
/// Only the first `out.len().div_ceil(factor)` samples of `src` are read; the line
/// is clamped at that point.
fn upsample_line(src: &[f32], factor: usize, out: &mut [f32]) {
    if factor == 1 {
        out.copy_from_slice(&src[..out.len()]);
        return;
    }
    let last = (out.len().div_ceil(2) - 1) as isize;
    let at = |i: isize| src[i.clamp(0, last) as usize];
    for (o, value) in out.iter_mut().enumerate() {
        let k = (o / 2) as isize;
        *value = if o % 2 == 0 {
            src[k as usize]
        } else {
            cubic(at(k - 1), at(k), at(k + 1), at(k + 2))
        };
    }
}

/// Expands a subsampled chroma plane to the image size.
///
/// Output samples at multiples of the factor are copies of the source samples;
/// the ones in between are interpolated separably, horizontally first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromaUpsampler {
    factors: (usize, usize),
}

impl ChromaUpsampler {
    /// Horizontal and vertical factors, each 1 or 2.
    pub fn new(fx: usize, fy: usize) -> Result<ChromaUpsampler> {
        if !matches!((fx, fy), (1 | 2, 1 | 2)) {
            return Err(Error::InvalidUpsampling(fx, fy));
        }
        Ok(ChromaUpsampler { factors: (fx, fy) })
    }

    pub fn factors(&self) -> (usize, usize) {
        self.factors
    }

    fn check_axis(source: usize, factor: usize, target: usize) -> bool {
        target > 0 && source * factor >= target && source * factor - target < MAX_PADDING
    }

    /// Produces a `target_width` x `target_height` plane from `plane`.
    ///
    /// `plane` may be larger than needed by less than the padding of a block grid;
    /// samples past the image area are ignored.
    pub fn upsample(&self, plane: &Plane, target_width: usize, target_height: usize) -> Result<Plane> {
        let (fx, fy) = self.factors;
        let (width, height) = plane.size();
        if !Self::check_axis(width, fx, target_width) || !Self::check_axis(height, fy, target_height) {
            return Err(Error::DimensionMismatch(
                width,
                height,
                target_width,
                target_height,
            ));
        }
        trace!("upsampling {width}x{height} by {fx}x{fy} to {target_width}x{target_height}");

        let rows = target_height.div_ceil(fy);
        let mut wide = Plane::new((target_width, rows))?;
        for y in 0..rows {
            upsample_line(plane.row(y), fx, wide.row_mut(y));
        }
        if fy == 1 {
            return Ok(wide);
        }

        let mut out = Plane::new((target_width, target_height))?;
        let last = rows as isize - 1;
        let row_at = |y: isize| wide.row(y.clamp(0, last) as usize);
        for y in 0..target_height {
            let k = (y / 2) as isize;
            if y % 2 == 0 {
                out.row_mut(y).copy_from_slice(wide.row(k as usize));
                continue;
            }
            let (p, a, b, n) = (row_at(k - 1), row_at(k), row_at(k + 1), row_at(k + 2));
            for (x, value) in out.row_mut(y).iter_mut().enumerate() {
                *value = cubic(p[x], a[x], b[x], n[x]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::random_samples;
    use test_log::test;

    #[test]
    fn test_rejects_factors() {
        assert!(matches!(
            ChromaUpsampler::new(4, 2),
            Err(Error::InvalidUpsampling(4, 2))
        ));
        assert!(ChromaUpsampler::new(0, 1).is_err());
        assert_eq!(ChromaUpsampler::new(2, 1).unwrap().factors(), (2, 1));
    }

    #[test]
    fn test_identity_crops() -> Result<()> {
        let plane = Plane::from_vec((16, 8), random_samples(128, -50.0, 50.0, 1))?;
        let out = ChromaUpsampler::new(1, 1)?.upsample(&plane, 13, 5)?;
        assert_eq!(out, plane.crop((13, 5))?);
        Ok(())
    }

    #[test]
    fn test_co_sited_samples_are_exact() -> Result<()> {
        let plane = Plane::from_vec((16, 16), random_samples(256, -100.0, 100.0, 2))?;
        let out = ChromaUpsampler::new(2, 2)?.upsample(&plane, 32, 32)?;
        assert_eq!(out.size(), (32, 32));
        for y in (0..32).step_by(2) {
            for x in (0..32).step_by(2) {
                assert_eq!(out.row(y)[x], plane.row(y / 2)[x / 2]);
            }
        }
        Ok(())
    }

    #[test]
    fn test_ramp_is_interpolated_linearly() -> Result<()> {
        let plane = Plane::from_vec((8, 8), (0..64).map(|i| (i % 8) as f32).collect())?;
        let out = ChromaUpsampler::new(2, 1)?.upsample(&plane, 16, 8)?;
        for x in 2..13 {
            assert_eq!(out.row(3)[x], x as f32 / 2.0);
        }
        // Clamped at the right border.
        assert_eq!(out.row(3)[15], 7.0);
        Ok(())
    }

    #[test]
    fn test_no_overshoot_at_edges() -> Result<()> {
        let row = [0.0, 0.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0];
        let plane = Plane::from_vec((8, 1), row.to_vec())?;
        let out = ChromaUpsampler::new(2, 1)?.upsample(&plane, 16, 1)?;
        assert_eq!(out.row(0)[1], 0.0);
        assert_eq!(out.row(0)[3], 5.0);
        assert_eq!(out.row(0)[5], 10.0);
        assert!(out.data().iter().all(|&v| (0.0..=10.0).contains(&v)));
        Ok(())
    }

    #[test]
    fn test_odd_target_clamps_to_image() -> Result<()> {
        // 35x21 from a padded 24x16 grid: samples past column 17 and row 10 are ignored.
        let mut plane = Plane::new((24, 16))?;
        plane.apply(|v| *v = 1.0);
        for y in 0..16 {
            plane.row_mut(y)[18..].fill(1000.0);
        }
        plane.row_mut(11).fill(1000.0);
        let out = ChromaUpsampler::new(2, 2)?.upsample(&plane, 35, 21)?;
        assert_eq!(out.size(), (35, 21));
        assert!(out.data().iter().all(|&v| v == 1.0));
        Ok(())
    }

    #[test]
    fn test_dimension_mismatch() -> Result<()> {
        let plane = Plane::new((8, 8))?;
        let upsampler = ChromaUpsampler::new(2, 2)?;
        assert!(matches!(
            upsampler.upsample(&plane, 40, 16),
            Err(Error::DimensionMismatch(8, 8, 40, 16))
        ));
        let plane = Plane::new((40, 8))?;
        assert!(upsampler.upsample(&plane, 8, 16).is_err());
        assert!(upsampler.upsample(&plane, 80, 0).is_err());
        Ok(())
    }
}
