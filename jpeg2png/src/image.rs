// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use crate::{
    error::{Error, Result},
    util::{TryWithCapacity, tracing_wrappers::*},
};

/// A row-major plane of `f32` samples.
#[derive(Clone, PartialEq)]
pub struct Plane {
    size: (usize, usize),
    data: Vec<f32>,
}

impl Debug for Plane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Plane {}x{}", self.size.0, self.size.1)
    }
}

fn checked_area(xsize: usize, ysize: usize) -> Result<usize> {
    if xsize == 0 || ysize == 0 {
        return Err(Error::InvalidImageSize(xsize, ysize));
    }
    // These limits let us not worry about overflows.
    if xsize as u64 >= i64::MAX as u64 / 4 || ysize as u64 >= i64::MAX as u64 / 4 {
        return Err(Error::InvalidImageSize(xsize, ysize));
    }
    xsize
        .checked_mul(ysize)
        .ok_or(Error::InvalidImageSize(xsize, ysize))
}

impl Plane {
    /// A zero-filled plane.
    pub fn new(size: (usize, usize)) -> Result<Plane> {
        let total_size = checked_area(size.0, size.1)?;
        trace!("allocating {}x{} plane", size.0, size.1);
        let mut data = Vec::try_with_capacity(total_size)?;
        data.resize(total_size, 0.0);
        Ok(Plane { size, data })
    }

    pub fn from_vec(size: (usize, usize), data: Vec<f32>) -> Result<Plane> {
        let total_size = checked_area(size.0, size.1)?;
        if data.len() != total_size {
            return Err(Error::InvalidLayout(format!(
                "{} samples for a {}x{} plane",
                data.len(),
                size.0,
                size.1
            )));
        }
        Ok(Plane { size, data })
    }

    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size.0
    }

    pub fn height(&self) -> usize {
        self.size.1
    }

    pub fn row(&self, row: usize) -> &[f32] {
        debug_assert!(row < self.size.1);
        let start = row * self.size.0;
        &self.data[start..start + self.size.0]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        debug_assert!(row < self.size.1);
        let start = row * self.size.0;
        &mut self.data[start..start + self.size.0]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Copies the top-left `size` corner into a new plane.
    pub fn crop(&self, size: (usize, usize)) -> Result<Plane> {
        if size.0 > self.size.0 || size.1 > self.size.1 {
            return Err(Error::DimensionMismatch(
                self.size.0,
                self.size.1,
                size.0,
                size.1,
            ));
        }
        let total_size = checked_area(size.0, size.1)?;
        let mut data = Vec::try_with_capacity(total_size)?;
        for y in 0..size.1 {
            data.extend_from_slice(&self.row(y)[..size.0]);
        }
        Ok(Plane { size, data })
    }

    /// Applies `f` to every sample.
    pub fn apply<F: FnMut(&mut f32)>(&mut self, f: F) {
        self.data.iter_mut().for_each(f);
    }
}
