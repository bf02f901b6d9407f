// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{
    JpegComponent, ZIGZAG_TO_NATURAL,
    huffman::HuffmanTable,
    markers::ScanHeader,
};
use crate::{
    bit_reader::BitReader,
    error::{Error, Result},
    util::tracing_wrappers::*,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanKind {
    Sequential,
    DcFirst,
    DcRefine,
    AcFirst,
    AcRefine,
}

impl ScanKind {
    fn of(scan: &ScanHeader, progressive: bool) -> ScanKind {
        match (progressive, scan.ss == 0, scan.ah == 0) {
            (false, _, _) => ScanKind::Sequential,
            (true, true, true) => ScanKind::DcFirst,
            (true, true, false) => ScanKind::DcRefine,
            (true, false, true) => ScanKind::AcFirst,
            (true, false, false) => ScanKind::AcRefine,
        }
    }

    fn needs_dc_table(self) -> bool {
        matches!(self, ScanKind::Sequential | ScanKind::DcFirst)
    }

    fn needs_ac_table(self) -> bool {
        matches!(
            self,
            ScanKind::Sequential | ScanKind::AcFirst | ScanKind::AcRefine
        )
    }
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Huffman tables currently defined, indexed by table slot.
pub(crate) struct HuffmanTables {
    pub dc: [Option<HuffmanTable>; 4],
    pub ac: [Option<HuffmanTable>; 4],
}

impl HuffmanTables {
    pub fn new() -> HuffmanTables {
        HuffmanTables {
            dc: std::array::from_fn(|_| None),
            ac: std::array::from_fn(|_| None),
        }
    }
}

struct ScanDecoder<'a, 't> {
    br: BitReader<'a>,
    kind: ScanKind,
    ss: usize,
    se: usize,
    al: u8,
    dc_pred: [i32; 4],
    eobrun: u32,
    dc_tables: Vec<Option<&'t HuffmanTable>>,
    ac_tables: Vec<Option<&'t HuffmanTable>>,
    restart_interval: usize,
    mcus_started: usize,
}

impl<'t> ScanDecoder<'_, 't> {
    fn dc_table(&self, slot: usize) -> Result<&'t HuffmanTable> {
        self.dc_tables[slot].ok_or(Error::InvalidHuffmanTable)
    }

    fn ac_table(&self, slot: usize) -> Result<&'t HuffmanTable> {
        self.ac_tables[slot].ok_or(Error::InvalidHuffmanTable)
    }

    /// Consumes a restart marker if one is due before the next MCU.
    fn start_mcu(&mut self) -> Result<()> {
        let ri = self.restart_interval;
        if ri > 0 && self.mcus_started > 0 && self.mcus_started % ri == 0 {
            self.br.restart()?;
            self.dc_pred = [0; 4];
            self.eobrun = 0;
        }
        self.mcus_started += 1;
        Ok(())
    }

    fn decode_block(&mut self, slot: usize, block: &mut [i16]) -> Result<()> {
        match self.kind {
            ScanKind::Sequential => self.sequential(slot, block),
            ScanKind::DcFirst => self.dc_first(slot, block),
            ScanKind::DcRefine => {
                if self.br.read_bit() {
                    block[0] |= 1 << self.al;
                }
                Ok(())
            }
            ScanKind::AcFirst => self.ac_first(slot, block),
            ScanKind::AcRefine => self.ac_refine(slot, block),
        }
    }

    fn decode_dc_diff(&mut self, slot: usize) -> Result<i32> {
        let size = self.dc_table(slot)?.decode(&mut self.br)? as usize;
        if size > 15 {
            return Err(Error::InvalidHuffmanCode);
        }
        Ok(self.br.receive_extend(size))
    }

    /// Adds the next DC difference to the predictor of `slot` and returns it.
    fn predict_dc(&mut self, slot: usize) -> Result<i32> {
        let diff = self.decode_dc_diff(slot)?;
        let dc = self.dc_pred[slot]
            .checked_add(diff)
            .ok_or_else(|| Error::InvalidScan("DC coefficient out of range".to_string()))?;
        self.dc_pred[slot] = dc;
        Ok(dc)
    }

    fn sequential(&mut self, slot: usize, block: &mut [i16]) -> Result<()> {
        block[0] = clamp_i16(self.predict_dc(slot)?);

        let table = self.ac_table(slot)?;
        let mut k = 1;
        while k < 64 {
            let rs = table.decode(&mut self.br)?;
            let (run, size) = ((rs >> 4) as usize, (rs & 15) as usize);
            if size == 0 {
                if run != 15 {
                    break;
                }
                k += 16;
                continue;
            }
            k += run;
            if k > 63 {
                return Err(Error::InvalidHuffmanCode);
            }
            block[ZIGZAG_TO_NATURAL[k]] = clamp_i16(self.br.receive_extend(size));
            k += 1;
        }
        Ok(())
    }

    fn dc_first(&mut self, slot: usize, block: &mut [i16]) -> Result<()> {
        let dc = self
            .predict_dc(slot)?
            .checked_mul(1 << self.al)
            .ok_or_else(|| Error::InvalidScan("DC coefficient out of range".to_string()))?;
        block[0] = clamp_i16(dc);
        Ok(())
    }

    fn read_eobrun(&mut self, run: u32) -> u32 {
        let mut eobrun = 1 << run;
        if run > 0 {
            eobrun += self.br.read(run as usize);
        }
        eobrun
    }

    fn ac_first(&mut self, slot: usize, block: &mut [i16]) -> Result<()> {
        if self.eobrun > 0 {
            self.eobrun -= 1;
            return Ok(());
        }
        let table = self.ac_table(slot)?;
        let mut k = self.ss;
        while k <= self.se {
            let rs = table.decode(&mut self.br)?;
            let (run, size) = ((rs >> 4) as u32, (rs & 15) as usize);
            if size == 0 {
                if run == 15 {
                    k += 16;
                    continue;
                }
                self.eobrun = self.read_eobrun(run) - 1;
                break;
            }
            k += run as usize;
            if k > self.se {
                return Err(Error::InvalidHuffmanCode);
            }
            let value = self.br.receive_extend(size);
            block[ZIGZAG_TO_NATURAL[k]] = clamp_i16(value * (1 << self.al));
            k += 1;
        }
        Ok(())
    }

    /// Applies one correction bit to an already nonzero coefficient.
    fn refine(&mut self, coefficient: &mut i16) {
        let p1 = 1i32 << self.al;
        let value = *coefficient as i32;
        if self.br.read_bit() && (value & p1) == 0 {
            *coefficient = clamp_i16(if value >= 0 { value + p1 } else { value - p1 });
        }
    }

    fn ac_refine(&mut self, slot: usize, block: &mut [i16]) -> Result<()> {
        let p1 = 1i32 << self.al;
        let mut k = self.ss;
        if self.eobrun == 0 {
            let table = self.ac_table(slot)?;
            while k <= self.se {
                let rs = table.decode(&mut self.br)?;
                let (mut run, size) = ((rs >> 4) as u32, rs & 15);
                let mut new_value = 0;
                if size != 0 {
                    if size != 1 {
                        debug!("refinement scan with {size}-bit coefficient");
                    }
                    new_value = if self.br.read_bit() { p1 } else { -p1 };
                } else if run != 15 {
                    self.eobrun = self.read_eobrun(run);
                    break;
                }
                // Skip `run` zero coefficients, refining the nonzero ones on the way.
                while k <= self.se {
                    let coefficient = &mut block[ZIGZAG_TO_NATURAL[k]];
                    if *coefficient != 0 {
                        self.refine(coefficient);
                    } else {
                        if run == 0 {
                            break;
                        }
                        run -= 1;
                    }
                    k += 1;
                }
                if new_value != 0 {
                    if k > self.se {
                        return Err(Error::InvalidHuffmanCode);
                    }
                    block[ZIGZAG_TO_NATURAL[k]] = new_value as i16;
                }
                k += 1;
            }
        }
        if self.eobrun > 0 {
            while k <= self.se {
                let coefficient = &mut block[ZIGZAG_TO_NATURAL[k]];
                if *coefficient != 0 {
                    self.refine(coefficient);
                }
                k += 1;
            }
            self.eobrun -= 1;
        }
        Ok(())
    }
}

/// Decodes one scan's entropy-coded segment into the component coefficient grids.
///
/// Single-component scans cover the blocks that intersect the component; scans with
/// more components walk whole MCUs, including blocks that only exist as padding.
pub(crate) fn decode_scan(
    data: &[u8],
    scan: &ScanHeader,
    progressive: bool,
    mcus: (usize, usize),
    restart_interval: usize,
    tables: &HuffmanTables,
    components: &mut [JpegComponent],
) -> Result<()> {
    let kind = ScanKind::of(scan, progressive);
    let mut dc_tables = Vec::with_capacity(scan.components.len());
    let mut ac_tables = Vec::with_capacity(scan.components.len());
    for sc in &scan.components {
        let dc = tables.dc[sc.dc_table].as_ref();
        if kind.needs_dc_table() && dc.is_none() {
            return Err(Error::MissingHuffmanTable(0, sc.dc_table));
        }
        let ac = tables.ac[sc.ac_table].as_ref();
        if kind.needs_ac_table() && ac.is_none() {
            return Err(Error::MissingHuffmanTable(1, sc.ac_table));
        }
        dc_tables.push(dc);
        ac_tables.push(ac);
    }
    trace!(
        "{kind:?} scan over {} component(s), bands {}..={}, al {}",
        scan.components.len(),
        scan.ss,
        scan.se,
        scan.al
    );

    let mut decoder = ScanDecoder {
        br: BitReader::new(data),
        kind,
        ss: scan.ss,
        se: scan.se,
        al: scan.al,
        dc_pred: [0; 4],
        eobrun: 0,
        dc_tables,
        ac_tables,
        restart_interval,
        mcus_started: 0,
    };

    if scan.components.len() == 1 {
        let component = &mut components[scan.components[0].index];
        let (width, height) = component.scan_blocks;
        for by in 0..height {
            for bx in 0..width {
                decoder.start_mcu()?;
                let b = by * component.blocks_wide + bx;
                decoder.decode_block(0, &mut component.levels[b * 64..(b + 1) * 64])?;
            }
        }
    } else {
        for my in 0..mcus.1 {
            for mx in 0..mcus.0 {
                decoder.start_mcu()?;
                for (slot, sc) in scan.components.iter().enumerate() {
                    let component = &mut components[sc.index];
                    let (h, v) = (
                        component.h_samp_factor as usize,
                        component.v_samp_factor as usize,
                    );
                    for y in 0..v {
                        for x in 0..h {
                            let b = (my * v + y) * component.blocks_wide + mx * h + x;
                            decoder.decode_block(slot, &mut component.levels[b * 64..(b + 1) * 64])?;
                        }
                    }
                }
            }
        }
    }
    if decoder.br.overran() {
        warn!("scan data ended early; missing coefficients are left at zero");
    }
    Ok(())
}
