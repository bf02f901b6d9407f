// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The whole restoration: solve every channel, recenter luma, bring chroma to full
//! resolution and convert to RGB.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    LUMA_OFFSET,
    box_transform::unbox,
    coefficients::CoefficientStore,
    color::{to_u16, ycbcr_to_rgb},
    error::{Error, Result},
    image::Plane,
    jpeg,
    options::RestoreOptions,
    solver::Solver,
    telemetry::TelemetrySink,
    upsample::ChromaUpsampler,
    util::{TryWithCapacity, tracing_wrappers::*},
};

/// Full resolution output planes, either one gray plane or red, green and blue,
/// with samples nominally in `[0, 255]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredImage {
    width: usize,
    height: usize,
    planes: Vec<Plane>,
}

impl RestoredImage {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn num_channels(&self) -> usize {
        self.planes.len()
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Interleaved 16-bit samples, row by row.
    pub fn to_u16_samples(&self) -> Result<Vec<u16>> {
        let mut samples =
            Vec::try_with_capacity(self.width * self.height * self.planes.len())?;
        for y in 0..self.height {
            let rows: Vec<&[f32]> = self.planes.iter().map(|p| p.row(y)).collect();
            for x in 0..self.width {
                samples.extend(rows.iter().map(|row| to_u16(row[x])));
            }
        }
        Ok(samples)
    }
}

fn restore_channel(
    mut store: CoefficientStore,
    channel: usize,
    size: (usize, usize),
    options: &RestoreOptions,
    sink: &dyn TelemetrySink,
) -> Result<Plane> {
    let (width, height) = (store.width(), store.height());
    store.decode_coefficients()?;
    let spatial = unbox(&store.take_fdata(), width, height)?;
    let mut solved = Solver::new(&store, options.channels[channel], channel).solve(spatial, sink)?;
    if channel == 0 {
        solved.iter_mut().for_each(|v| *v += LUMA_OFFSET);
    }
    let plane = Plane::from_vec((width, height), solved)?;
    let (fx, fy) = store.sampling_ratio();
    ChromaUpsampler::new(fx, fy)?.upsample(&plane, size.0, size.1)
}

#[cfg(feature = "parallel")]
fn restore_channels(
    stores: Vec<CoefficientStore>,
    size: (usize, usize),
    options: &RestoreOptions,
    sink: &dyn TelemetrySink,
) -> Result<Vec<Plane>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.map_or(0, |n| n.get()))
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;
    pool.install(|| {
        stores
            .into_par_iter()
            .enumerate()
            .map(|(c, store)| restore_channel(store, c, size, options, sink))
            .collect()
    })
}

#[cfg(not(feature = "parallel"))]
fn restore_channels(
    stores: Vec<CoefficientStore>,
    size: (usize, usize),
    options: &RestoreOptions,
    sink: &dyn TelemetrySink,
) -> Result<Vec<Plane>> {
    stores
        .into_iter()
        .enumerate()
        .map(|(c, store)| restore_channel(store, c, size, options, sink))
        .collect()
}

/// Restores a `width` x `height` image from one (gray) or three (YCbCr) channels.
///
/// Channels are solved independently, concurrently when the `parallel` feature is
/// enabled; results do not depend on the number of threads.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
pub fn restore(
    stores: Vec<CoefficientStore>,
    width: usize,
    height: usize,
    options: &RestoreOptions,
    sink: &dyn TelemetrySink,
) -> Result<RestoredImage> {
    if !matches!(stores.len(), 1 | 3) {
        return Err(Error::InvalidLayout(format!(
            "{} channels; expected 1 or 3",
            stores.len()
        )));
    }
    if width == 0 || height == 0 {
        return Err(Error::InvalidImageSize(width, height));
    }
    info!(
        "restoring {width}x{height} image with {} channel(s)",
        stores.len()
    );
    let mut planes = restore_channels(stores, (width, height), options, sink)?;
    if let [y, cb, cr] = planes.as_mut_slice() {
        ycbcr_to_rgb(y.data_mut(), cb.data_mut(), cr.data_mut());
    }
    Ok(RestoredImage {
        width,
        height,
        planes,
    })
}

/// Decodes a JPEG file and restores it.
pub fn restore_jpeg(
    data: &[u8],
    options: &RestoreOptions,
    sink: &dyn TelemetrySink,
) -> Result<RestoredImage> {
    let decoded = jpeg::decode(data)?;
    let (width, height) = (decoded.width, decoded.height);
    let stores = CoefficientStore::from_jpeg(decoded)?;
    restore(stores, width, height, options, sink)
}
