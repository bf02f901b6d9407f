// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use color_eyre::eyre::{Result, eyre};
use jpeg2png::RestoredImage;

use std::io::Write;

fn png_color(num_channels: usize) -> Result<png::ColorType> {
    match num_channels {
        1 => Ok(png::ColorType::Grayscale),
        3 => Ok(png::ColorType::Rgb),
        _ => Err(eyre!(
            "Invalid number of channels for PNG output {:?}",
            num_channels
        )),
    }
}

/// Writes `image` as a 16-bit sRGB PNG.
pub fn to_png<Writer: Write>(image: &RestoredImage, buf: &mut Writer) -> Result<()> {
    let (width, height) = (image.width(), image.height());
    let width_u32 = u32::try_from(width).map_err(|_| eyre!("image too wide for PNG: {width}"))?;
    let height_u32 =
        u32::try_from(height).map_err(|_| eyre!("image too tall for PNG: {height}"))?;

    let mut info = png::Info::with_size(width_u32, height_u32);
    info.srgb = Some(png::SrgbRenderingIntent::Perceptual);
    info.source_gamma = Some(png::ScaledFloat::from_scaled(45455));
    info.source_chromaticities = Some(png::SourceChromaticities {
        white: (
            png::ScaledFloat::from_scaled(31270),
            png::ScaledFloat::from_scaled(32900),
        ),
        red: (
            png::ScaledFloat::from_scaled(64000),
            png::ScaledFloat::from_scaled(33000),
        ),
        green: (
            png::ScaledFloat::from_scaled(30000),
            png::ScaledFloat::from_scaled(60000),
        ),
        blue: (
            png::ScaledFloat::from_scaled(15000),
            png::ScaledFloat::from_scaled(6000),
        ),
    });
    let mut encoder = png::Encoder::with_info(buf, info)?;
    encoder.set_color(png_color(image.num_channels())?);
    encoder.set_compression(png::Compression::Fast);
    encoder.set_depth(png::BitDepth::Sixteen);
    let mut writer = encoder.write_header()?;

    let samples = image.to_u16_samples()?;
    let row_len = width * image.num_channels();
    let mut buffer: Vec<u8> = vec![0; 2 * row_len];
    let mut ww = writer.stream_writer()?;
    for row in samples.chunks_exact(row_len) {
        for (bytes, sample) in buffer.chunks_exact_mut(2).zip(row) {
            bytes.copy_from_slice(&sample.to_be_bytes());
        }
        ww.write_all(&buffer)?;
    }
    ww.finish()?;
    Ok(())
}
