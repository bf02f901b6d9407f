// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use byteorder::{BigEndian, ByteOrder};

use super::{ZIGZAG_TO_NATURAL, huffman::HuffmanTable};
use crate::error::{Error, Result};

pub(crate) const SOF0: u8 = 0xC0;
pub(crate) const SOF1: u8 = 0xC1;
pub(crate) const SOF2: u8 = 0xC2;
pub(crate) const DHT: u8 = 0xC4;
pub(crate) const SOI: u8 = 0xD8;
pub(crate) const EOI: u8 = 0xD9;
pub(crate) const SOS: u8 = 0xDA;
pub(crate) const DQT: u8 = 0xDB;
pub(crate) const DRI: u8 = 0xDD;
pub(crate) const TEM: u8 = 0x01;

pub(crate) fn is_rst(marker: u8) -> bool {
    (0xD0..=0xD7).contains(&marker)
}

/// Frame types this decoder cannot handle: lossless, hierarchical and arithmetic coded.
pub(crate) fn unsupported_sof(marker: u8) -> Option<&'static str> {
    match marker {
        0xC3 | 0xC7 | 0xCB | 0xCF => Some("lossless coding"),
        0xC5 | 0xC6 | 0xCD | 0xCE => Some("hierarchical coding"),
        0xC9 | 0xCA => Some("arithmetic coding"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FrameComponent {
    pub id: u8,
    pub h: u8,
    pub v: u8,
    pub quant_slot: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct FrameHeader {
    pub progressive: bool,
    pub width: usize,
    pub height: usize,
    pub components: Vec<FrameComponent>,
}

#[derive(Debug, Clone)]
pub(crate) struct ScanComponent {
    /// Index into the frame's component list.
    pub index: usize,
    pub dc_table: usize,
    pub ac_table: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct ScanHeader {
    pub components: Vec<ScanComponent>,
    pub ss: usize,
    pub se: usize,
    pub ah: u8,
    pub al: u8,
}

fn need(body: &[u8], len: usize, marker: u8) -> Result<()> {
    if body.len() < len {
        Err(Error::InvalidSegment(marker, body.len()))
    } else {
        Ok(())
    }
}

/// Advances `pos` past the next marker and returns its code, or `None` at end of data.
pub(crate) fn next_marker(data: &[u8], pos: &mut usize) -> Option<u8> {
    while *pos < data.len() && data[*pos] != 0xFF {
        *pos += 1;
    }
    while *pos < data.len() && data[*pos] == 0xFF {
        *pos += 1;
    }
    let marker = *data.get(*pos)?;
    *pos += 1;
    Some(marker)
}

/// Reads a length-prefixed segment body starting at `pos` and advances past it.
pub(crate) fn segment_body<'a>(data: &'a [u8], pos: &mut usize, marker: u8) -> Result<&'a [u8]> {
    let header = data.get(*pos..*pos + 2).ok_or(Error::FileTruncated)?;
    let len = BigEndian::read_u16(header) as usize;
    if len < 2 {
        return Err(Error::InvalidSegment(marker, len));
    }
    let body = data
        .get(*pos + 2..*pos + len)
        .ok_or(Error::FileTruncated)?;
    *pos += len;
    Ok(body)
}

/// Position of the first marker after entropy-coded data starting at `start`,
/// skipping stuffed bytes and restart markers.
pub(crate) fn entropy_data_end(data: &[u8], start: usize) -> usize {
    let mut i = start;
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }
        match data[i + 1] {
            0x00 => i += 2,
            m if is_rst(m) => i += 2,
            0xFF => i += 1,
            _ => return i,
        }
    }
    data.len()
}

pub(crate) fn parse_dqt(body: &[u8], tables: &mut [Option<[u16; 64]>; 4]) -> Result<()> {
    let mut rest = body;
    while !rest.is_empty() {
        let precision = rest[0] >> 4;
        let slot = (rest[0] & 0xF) as usize;
        if slot >= 4 {
            return Err(Error::InvalidQuantTable(slot));
        }
        let mut table = [0u16; 64];
        let used = match precision {
            0 => {
                need(rest, 65, DQT)?;
                for (k, &natural) in ZIGZAG_TO_NATURAL.iter().enumerate() {
                    table[natural] = rest[1 + k] as u16;
                }
                65
            }
            1 => {
                need(rest, 129, DQT)?;
                for (k, &natural) in ZIGZAG_TO_NATURAL.iter().enumerate() {
                    table[natural] = BigEndian::read_u16(&rest[1 + 2 * k..]);
                }
                129
            }
            _ => return Err(Error::InvalidQuantTable(slot)),
        };
        if table.contains(&0) {
            return Err(Error::InvalidQuantTable(slot));
        }
        tables[slot] = Some(table);
        rest = &rest[used..];
    }
    Ok(())
}

pub(crate) fn parse_dht(
    body: &[u8],
    dc_tables: &mut [Option<HuffmanTable>; 4],
    ac_tables: &mut [Option<HuffmanTable>; 4],
) -> Result<()> {
    let mut rest = body;
    while !rest.is_empty() {
        need(rest, 17, DHT)?;
        let class = rest[0] >> 4;
        let slot = (rest[0] & 0xF) as usize;
        if class > 1 || slot >= 4 {
            return Err(Error::InvalidHuffmanTable);
        }
        let mut counts = [0u8; 16];
        counts.copy_from_slice(&rest[1..17]);
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        need(rest, 17 + total, DHT)?;
        let table = HuffmanTable::new(&counts, &rest[17..17 + total])?;
        if class == 0 {
            dc_tables[slot] = Some(table);
        } else {
            ac_tables[slot] = Some(table);
        }
        rest = &rest[17 + total..];
    }
    Ok(())
}

pub(crate) fn parse_dri(body: &[u8]) -> Result<usize> {
    need(body, 2, DRI)?;
    Ok(BigEndian::read_u16(body) as usize)
}

pub(crate) fn parse_sof(body: &[u8], marker: u8) -> Result<FrameHeader> {
    need(body, 6, marker)?;
    let precision = body[0];
    if precision != 8 {
        return Err(Error::Unsupported(format!("{precision}-bit samples")));
    }
    let height = BigEndian::read_u16(&body[1..]) as usize;
    let width = BigEndian::read_u16(&body[3..]) as usize;
    if height == 0 {
        return Err(Error::Unsupported("height defined by DNL marker".to_string()));
    }
    if width == 0 {
        return Err(Error::InvalidImageSize(width, height));
    }
    let num_components = body[5] as usize;
    if num_components != 1 && num_components != 3 {
        return Err(Error::Unsupported(format!("{num_components} components")));
    }
    need(body, 6 + 3 * num_components, marker)?;
    let mut components: Vec<FrameComponent> = Vec::with_capacity(num_components);
    for c in 0..num_components {
        let entry = &body[6 + 3 * c..9 + 3 * c];
        let (h, v) = (entry[1] >> 4, entry[1] & 0xF);
        if !(1..=4).contains(&h) || !(1..=4).contains(&v) {
            return Err(Error::InvalidSampling(h, v, c));
        }
        let quant_slot = entry[2] as usize;
        if quant_slot >= 4 {
            return Err(Error::InvalidQuantTable(quant_slot));
        }
        if components.iter().any(|other| other.id == entry[0]) {
            return Err(Error::InvalidSegment(marker, body.len()));
        }
        components.push(FrameComponent {
            id: entry[0],
            h,
            v,
            quant_slot,
        });
    }
    Ok(FrameHeader {
        progressive: marker == SOF2,
        width,
        height,
        components,
    })
}

pub(crate) fn parse_sos(body: &[u8], frame: &FrameHeader) -> Result<ScanHeader> {
    need(body, 1, SOS)?;
    let num_components = body[0] as usize;
    if !(1..=4).contains(&num_components) {
        return Err(Error::InvalidScan(format!("{num_components} components")));
    }
    need(body, 4 + 2 * num_components, SOS)?;
    let mut components: Vec<ScanComponent> = Vec::with_capacity(num_components);
    for i in 0..num_components {
        let id = body[1 + 2 * i];
        let tables = body[2 + 2 * i];
        let index = frame
            .components
            .iter()
            .position(|c| c.id == id)
            .ok_or(Error::UnknownComponent(id))?;
        if components.iter().any(|c| c.index == index) {
            return Err(Error::InvalidScan(format!("component {id} listed twice")));
        }
        let (dc_table, ac_table) = ((tables >> 4) as usize, (tables & 0xF) as usize);
        if dc_table >= 4 || ac_table >= 4 {
            return Err(Error::InvalidHuffmanTable);
        }
        components.push(ScanComponent {
            index,
            dc_table,
            ac_table,
        });
    }
    let params = &body[1 + 2 * num_components..];
    let (ss, se) = (params[0] as usize, params[1] as usize);
    let (ah, al) = (params[2] >> 4, params[2] & 0xF);

    if num_components > 1 {
        let blocks_per_mcu: usize = components
            .iter()
            .map(|c| {
                let fc = &frame.components[c.index];
                fc.h as usize * fc.v as usize
            })
            .sum();
        if blocks_per_mcu > 10 {
            return Err(Error::InvalidScan(format!(
                "{blocks_per_mcu} blocks per MCU"
            )));
        }
    }
    if frame.progressive {
        if ss > se || se > 63 {
            return Err(Error::InvalidScan(format!("spectral range {ss}..={se}")));
        }
        if ss == 0 && se != 0 {
            return Err(Error::InvalidScan("DC scan with AC coefficients".to_string()));
        }
        if ss > 0 && num_components != 1 {
            return Err(Error::InvalidScan("interleaved AC scan".to_string()));
        }
        if al > 13 || (ah != 0 && ah != al + 1) {
            return Err(Error::InvalidScan(format!(
                "successive approximation {ah}/{al}"
            )));
        }
    }
    Ok(ScanHeader {
        components,
        ss,
        se,
        ah,
        al,
    })
}
