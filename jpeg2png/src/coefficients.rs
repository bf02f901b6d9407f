// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use jpeg2png_transforms::{BLOCK_DIM, BLOCK_SIZE, idct8x8};

use crate::{
    error::{Error, Result},
    jpeg::DecodedJpeg,
    util::{tracing_wrappers::*, try_filled},
};

/// The DCT data of one channel: observed levels, their quantization table and a
/// float working array.
///
/// Dimensions are in samples of this channel and always whole blocks.
#[derive(Debug, Clone)]
pub struct CoefficientStore {
    width: usize,
    height: usize,
    sampling_ratio: (usize, usize),
    quant_table: [u16; BLOCK_SIZE],
    levels: Vec<i16>,
    fdata: Vec<f32>,
}

impl CoefficientStore {
    /// Wraps `levels`, 64 per block in natural order with blocks in raster order.
    ///
    /// `sampling_ratio` is how many image pixels one sample of this channel covers
    /// horizontally and vertically; each must be 1 or 2.
    pub fn new(
        blocks_wide: usize,
        blocks_tall: usize,
        sampling_ratio: (usize, usize),
        quant_table: [u16; BLOCK_SIZE],
        levels: Vec<i16>,
    ) -> Result<CoefficientStore> {
        if blocks_wide == 0 || blocks_tall == 0 {
            return Err(Error::InvalidLayout(format!(
                "empty block grid {blocks_wide}x{blocks_tall}"
            )));
        }
        let expected = blocks_wide
            .checked_mul(blocks_tall)
            .and_then(|n| n.checked_mul(BLOCK_SIZE))
            .ok_or(Error::InvalidImageSize(blocks_wide, blocks_tall))?;
        if levels.len() != expected {
            return Err(Error::InvalidLayout(format!(
                "{} levels for {blocks_wide}x{blocks_tall} blocks",
                levels.len()
            )));
        }
        if !matches!(sampling_ratio, (1 | 2, 1 | 2)) {
            return Err(Error::InvalidUpsampling(sampling_ratio.0, sampling_ratio.1));
        }
        if let Some(k) = quant_table.iter().position(|&q| q == 0) {
            return Err(Error::InvalidLayout(format!(
                "quantization step {k} is zero"
            )));
        }
        Ok(CoefficientStore {
            width: blocks_wide * BLOCK_DIM,
            height: blocks_tall * BLOCK_DIM,
            sampling_ratio,
            quant_table,
            levels,
            fdata: Vec::new(),
        })
    }

    /// Splits a decoded file into one store per component.
    ///
    /// The first component must be at full resolution; the others may be
    /// subsampled by 2 along either axis.
    pub fn from_jpeg(jpeg: DecodedJpeg) -> Result<Vec<CoefficientStore>> {
        let (hmax, vmax) = jpeg.max_sampling();
        let mut stores = Vec::with_capacity(jpeg.components.len());
        for (c, component) in jpeg.components.into_iter().enumerate() {
            let (h, v) = (component.h_samp_factor, component.v_samp_factor);
            if hmax % h != 0 || vmax % v != 0 {
                return Err(Error::Unsupported(format!(
                    "sampling factors {h}x{v} of component {c} do not divide {hmax}x{vmax}"
                )));
            }
            let ratio = ((hmax / h) as usize, (vmax / v) as usize);
            if c == 0 && ratio != (1, 1) {
                return Err(Error::Unsupported("subsampled luma".to_string()));
            }
            if ratio.0 > 2 || ratio.1 > 2 {
                return Err(Error::Unsupported(format!(
                    "component {c} is subsampled {}x{}",
                    ratio.0, ratio.1
                )));
            }
            debug!(
                "component {c}: {}x{} blocks, subsampled {}x{}",
                component.blocks_wide, component.blocks_tall, ratio.0, ratio.1
            );
            stores.push(CoefficientStore::new(
                component.blocks_wide,
                component.blocks_tall,
                ratio,
                component.quant_table,
                component.levels,
            )?);
        }
        Ok(stores)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn blocks_wide(&self) -> usize {
        self.width / BLOCK_DIM
    }

    pub fn blocks_tall(&self) -> usize {
        self.height / BLOCK_DIM
    }

    pub fn sampling_ratio(&self) -> (usize, usize) {
        self.sampling_ratio
    }

    pub fn quant_table(&self) -> &[u16; BLOCK_SIZE] {
        &self.quant_table
    }

    pub fn levels(&self) -> &[i16] {
        &self.levels
    }

    /// The working array, block-major. Empty until [`Self::decode_coefficients`].
    pub fn fdata(&self) -> &[f32] {
        &self.fdata
    }

    /// Moves the working array out, leaving an empty one behind.
    pub fn take_fdata(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.fdata)
    }

    /// Dequantizes every block and transforms it to the spatial domain.
    ///
    /// The result is centered on zero: no level shift is applied.
    pub fn decode_coefficients(&mut self) -> Result<()> {
        let mut fdata = try_filled(self.levels.len(), 0.0f32)?;
        let mut block = [0.0f32; BLOCK_SIZE];
        for (levels, out) in self
            .levels
            .chunks_exact(BLOCK_SIZE)
            .zip(fdata.chunks_exact_mut(BLOCK_SIZE))
        {
            for k in 0..BLOCK_SIZE {
                block[k] = levels[k] as f32 * self.quant_table[k] as f32;
            }
            idct8x8(&mut block);
            out.copy_from_slice(&block);
        }
        self.fdata = fdata;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{jpeg, util::test::assert_all_almost_eq};
    use jpeg2png_test_utils::JpegBuilder;
    use test_log::test;

    #[test]
    fn test_new_validates() {
        assert!(CoefficientStore::new(1, 1, (1, 1), [1; 64], vec![0; 64]).is_ok());
        assert!(matches!(
            CoefficientStore::new(1, 1, (1, 1), [1; 64], vec![0; 63]),
            Err(Error::InvalidLayout(_))
        ));
        assert!(matches!(
            CoefficientStore::new(0, 1, (1, 1), [1; 64], vec![]),
            Err(Error::InvalidLayout(_))
        ));
        assert!(matches!(
            CoefficientStore::new(1, 1, (3, 1), [1; 64], vec![0; 64]),
            Err(Error::InvalidUpsampling(3, 1))
        ));
        let mut quant = [1; 64];
        quant[5] = 0;
        assert!(CoefficientStore::new(1, 1, (1, 1), quant, vec![0; 64]).is_err());
    }

    #[test]
    fn test_decode_dc_only() -> Result<()> {
        let mut levels = vec![0i16; 128];
        levels[0] = 4;
        levels[64] = -2;
        let mut store = CoefficientStore::new(2, 1, (1, 1), [8; 64], levels)?;
        assert_eq!((store.width(), store.height()), (16, 8));
        assert!(store.fdata().is_empty());
        store.decode_coefficients()?;
        // An orthonormal 8x8 DCT maps a DC of d to a flat block of d / 8.
        assert_all_almost_eq!(store.fdata()[..64], [4.0f32; 64], 1e-4);
        assert_all_almost_eq!(store.fdata()[64..], [-2.0f32; 64], 1e-4);
        let fdata = store.take_fdata();
        assert_eq!(fdata.len(), 128);
        assert!(store.fdata().is_empty());
        Ok(())
    }

    #[test]
    fn test_from_jpeg_420() -> Result<()> {
        let builder = JpegBuilder::new(33, 17)
            .component(2, 2, [2; 64])
            .component(1, 1, [3; 64])
            .component(1, 1, [4; 64]);
        let decoded = jpeg::decode(&builder.baseline(&builder.empty_levels()))?;
        let stores = CoefficientStore::from_jpeg(decoded)?;
        assert_eq!(stores.len(), 3);
        assert_eq!((stores[0].width(), stores[0].height()), (48, 32));
        assert_eq!(stores[0].sampling_ratio(), (1, 1));
        assert_eq!((stores[1].width(), stores[1].height()), (24, 16));
        assert_eq!(stores[1].sampling_ratio(), (2, 2));
        assert_eq!(stores[2].quant_table(), &[4; 64]);
        Ok(())
    }

    #[test]
    fn test_from_jpeg_rejects_odd_sampling() -> Result<()> {
        let builder = JpegBuilder::new(16, 16)
            .component(1, 1, [2; 64])
            .component(2, 2, [3; 64])
            .component(2, 2, [4; 64]);
        let decoded = jpeg::decode(&builder.baseline(&builder.empty_levels()))?;
        assert!(matches!(
            CoefficientStore::from_jpeg(decoded),
            Err(Error::Unsupported(_))
        ));

        let builder = JpegBuilder::new(32, 8)
            .component(4, 1, [2; 64])
            .component(1, 1, [3; 64])
            .component(1, 1, [4; 64]);
        let decoded = jpeg::decode(&builder.baseline(&builder.empty_levels()))?;
        assert!(CoefficientStore::from_jpeg(decoded).is_err());
        Ok(())
    }
}
