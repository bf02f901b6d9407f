// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Huffman-coded JPEG decoding down to quantized DCT coefficients.
//!
//! Only the entropy layer is undone: the result keeps each component's quantized
//! levels and its quantization table, which is exactly the information the
//! restoration needs to know which images are consistent with the file.

mod huffman;
mod markers;
mod scan;

use markers::*;
use scan::{HuffmanTables, decode_scan};

use crate::{
    error::{Error, Result},
    util::{tracing_wrappers::*, try_filled},
};

/// `ZIGZAG_TO_NATURAL[k]` is the row-major position of the `k`-th coefficient in
/// zigzag order.
pub const ZIGZAG_TO_NATURAL: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// One color component of a decoded JPEG.
#[derive(Debug, Clone)]
pub struct JpegComponent {
    /// Component ID from the frame header.
    pub id: u8,
    pub h_samp_factor: u8,
    pub v_samp_factor: u8,
    /// Quantization step sizes in natural (row-major) order.
    pub quant_table: [u16; 64],
    /// Width of the block grid, padded to whole MCUs.
    pub blocks_wide: usize,
    /// Height of the block grid, padded to whole MCUs.
    pub blocks_tall: usize,
    /// Quantized levels, 64 per block in natural order, blocks in raster order.
    pub levels: Vec<i16>,
    quant_slot: usize,
    // Blocks covered by a single-component scan.
    scan_blocks: (usize, usize),
}

impl JpegComponent {
    pub fn block(&self, bx: usize, by: usize) -> &[i16] {
        let b = by * self.blocks_wide + bx;
        &self.levels[b * 64..(b + 1) * 64]
    }
}

#[derive(Debug, Clone)]
pub struct DecodedJpeg {
    pub width: usize,
    pub height: usize,
    pub progressive: bool,
    pub components: Vec<JpegComponent>,
}

impl DecodedJpeg {
    pub fn max_sampling(&self) -> (u8, u8) {
        let h = self.components.iter().map(|c| c.h_samp_factor).max();
        let v = self.components.iter().map(|c| c.v_samp_factor).max();
        (h.unwrap_or(1), v.unwrap_or(1))
    }
}

fn allocate_components(frame: &FrameHeader) -> Result<(Vec<JpegComponent>, (usize, usize))> {
    let hmax = frame.components.iter().map(|c| c.h as usize).max().unwrap_or(1);
    let vmax = frame.components.iter().map(|c| c.v as usize).max().unwrap_or(1);
    let mcus = (
        frame.width.div_ceil(8 * hmax),
        frame.height.div_ceil(8 * vmax),
    );
    let mut components = Vec::with_capacity(frame.components.len());
    for fc in &frame.components {
        let (h, v) = (fc.h as usize, fc.v as usize);
        let blocks_wide = mcus.0 * h;
        let blocks_tall = mcus.1 * v;
        let scan_blocks = (
            (frame.width * h).div_ceil(hmax).div_ceil(8),
            (frame.height * v).div_ceil(vmax).div_ceil(8),
        );
        let len = blocks_wide
            .checked_mul(blocks_tall)
            .and_then(|n| n.checked_mul(64))
            .ok_or(Error::InvalidImageSize(frame.width, frame.height))?;
        components.push(JpegComponent {
            id: fc.id,
            h_samp_factor: fc.h,
            v_samp_factor: fc.v,
            quant_table: [0; 64],
            blocks_wide,
            blocks_tall,
            levels: try_filled(len, 0i16)?,
            quant_slot: fc.quant_slot,
            scan_blocks,
        });
    }
    Ok((components, mcus))
}

struct Frame {
    header: FrameHeader,
    components: Vec<JpegComponent>,
    mcus: (usize, usize),
}

/// Parses a JPEG file and entropy-decodes all of its scans.
///
/// Baseline, extended sequential and progressive Huffman-coded files with 8-bit
/// samples and one or three components are supported. Quantization tables are
/// resolved after the last scan, so each component uses the final definition of
/// its table slot.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
pub fn decode(data: &[u8]) -> Result<DecodedJpeg> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return Err(Error::NotAJpeg);
    }
    let mut pos = 2;
    let mut quant_tables: [Option<[u16; 64]>; 4] = [None; 4];
    let mut tables = HuffmanTables::new();
    let mut restart_interval = 0;
    let mut frame: Option<Frame> = None;
    let mut num_scans = 0;

    loop {
        let Some(marker) = next_marker(data, &mut pos) else {
            warn!("missing EOI marker");
            break;
        };
        match marker {
            EOI => break,
            SOI | TEM => continue,
            m if is_rst(m) => continue,
            _ => {}
        }
        let body = segment_body(data, &mut pos, marker)?;
        match marker {
            SOF0 | SOF1 | SOF2 => {
                if frame.is_some() {
                    return Err(Error::Unsupported("multiple frames".to_string()));
                }
                let header = parse_sof(body, marker)?;
                debug!(
                    "frame {}x{}, {} component(s), progressive: {}",
                    header.width,
                    header.height,
                    header.components.len(),
                    header.progressive
                );
                let (components, mcus) = allocate_components(&header)?;
                frame = Some(Frame {
                    header,
                    components,
                    mcus,
                });
            }
            DHT => parse_dht(body, &mut tables.dc, &mut tables.ac)?,
            DQT => parse_dqt(body, &mut quant_tables)?,
            DRI => restart_interval = parse_dri(body)?,
            SOS => {
                let frame = frame.as_mut().ok_or(Error::MissingFrame)?;
                let scan = parse_sos(body, &frame.header)?;
                let end = entropy_data_end(data, pos);
                decode_scan(
                    &data[pos..end],
                    &scan,
                    frame.header.progressive,
                    frame.mcus,
                    restart_interval,
                    &tables,
                    &mut frame.components,
                )?;
                pos = end;
                num_scans += 1;
            }
            m => {
                if let Some(what) = unsupported_sof(m) {
                    return Err(Error::Unsupported(what.to_string()));
                }
                trace!("skipping marker {m:#04x} with {} bytes", body.len());
            }
        }
    }

    let Frame {
        header,
        mut components,
        ..
    } = frame.ok_or(Error::MissingFrame)?;
    if num_scans == 0 {
        return Err(Error::NoScans);
    }
    for component in components.iter_mut() {
        component.quant_table =
            quant_tables[component.quant_slot].ok_or(Error::MissingQuantTable(component.quant_slot))?;
    }
    Ok(DecodedJpeg {
        width: header.width,
        height: header.height,
        progressive: header.progressive,
        components,
    })
}
