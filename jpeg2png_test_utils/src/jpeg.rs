// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Writes small JPEG streams from explicit quantized coefficients.
//!
//! Every stream uses the same pair of Huffman tables: the DC table codes categories
//! `0..=11` with 4 bits each, and the AC table codes every symbol a baseline or
//! progressive scan can need with 8 bits each. That keeps the writer trivial while
//! still exercising the decoder's table parsing and code lookup.

pub const ZIGZAG_TO_NATURAL: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

const NUM_DC_SYMBOLS: usize = 12;

fn ac_symbols() -> Vec<u8> {
    let mut symbols = vec![0x00];
    // EOB runs, used by progressive scans only.
    symbols.extend((1..15u8).map(|r| r << 4));
    symbols.push(0xF0);
    for run in 0..16u8 {
        for size in 1..=10u8 {
            symbols.push((run << 4) | size);
        }
    }
    symbols
}

/// One scan of the stream, with component indices into the builder's component list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanSpec {
    pub components: Vec<usize>,
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
}

impl ScanSpec {
    pub fn new(components: &[usize], ss: u8, se: u8, ah: u8, al: u8) -> Self {
        Self {
            components: components.to_vec(),
            ss,
            se,
            ah,
            al,
        }
    }

    pub fn sequential(components: &[usize]) -> Self {
        Self::new(components, 0, 63, 0, 0)
    }
}

#[derive(Clone, Debug)]
struct ComponentSpec {
    h: u8,
    v: u8,
    quant: [u16; 64],
}

#[derive(Clone, Debug)]
pub struct JpegBuilder {
    width: u16,
    height: u16,
    components: Vec<ComponentSpec>,
    restart_interval: u16,
}

impl JpegBuilder {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            components: Vec::new(),
            restart_interval: 0,
        }
    }

    /// Adds a component with sampling factors `h`x`v` and a quantization table in
    /// natural (row-major) order.
    pub fn component(mut self, h: u8, v: u8, quant: [u16; 64]) -> Self {
        self.components.push(ComponentSpec { h, v, quant });
        self
    }

    pub fn restart_interval(mut self, mcus: u16) -> Self {
        self.restart_interval = mcus;
        self
    }

    fn max_sampling(&self) -> (usize, usize) {
        let h = self.components.iter().map(|c| c.h).max().unwrap_or(1);
        let v = self.components.iter().map(|c| c.v).max().unwrap_or(1);
        (h as usize, v as usize)
    }

    fn mcus(&self) -> (usize, usize) {
        let (hmax, vmax) = self.max_sampling();
        (
            (self.width as usize).div_ceil(8 * hmax),
            (self.height as usize).div_ceil(8 * vmax),
        )
    }

    /// Block grid of component `c`, padded to whole MCUs. Coefficient input for the
    /// component is `64 * w * h` levels, block-major, natural order inside each block.
    pub fn block_grid(&self, c: usize) -> (usize, usize) {
        let (mx, my) = self.mcus();
        let comp = &self.components[c];
        (mx * comp.h as usize, my * comp.v as usize)
    }

    fn exact_block_grid(&self, c: usize) -> (usize, usize) {
        let (hmax, vmax) = self.max_sampling();
        let comp = &self.components[c];
        let w = (self.width as usize * comp.h as usize).div_ceil(hmax);
        let h = (self.height as usize * comp.v as usize).div_ceil(vmax);
        (w.div_ceil(8), h.div_ceil(8))
    }

    /// Zeroed coefficient storage for every component.
    pub fn empty_levels(&self) -> Vec<Vec<i16>> {
        (0..self.components.len())
            .map(|c| {
                let (w, h) = self.block_grid(c);
                vec![0; w * h * 64]
            })
            .collect()
    }

    /// Baseline stream with a single interleaved scan.
    pub fn baseline(&self, levels: &[Vec<i16>]) -> Vec<u8> {
        let all: Vec<usize> = (0..self.components.len()).collect();
        self.encode(levels, false, &[ScanSpec::sequential(&all)])
    }

    /// Progressive stream using [`Self::progressive_script`].
    pub fn progressive(&self, levels: &[Vec<i16>]) -> Vec<u8> {
        self.encode(levels, true, &self.progressive_script())
    }

    /// Spectral selection plus two rounds of successive approximation, for all components.
    pub fn progressive_script(&self) -> Vec<ScanSpec> {
        let all: Vec<usize> = (0..self.components.len()).collect();
        let mut scans = vec![ScanSpec::new(&all, 0, 0, 0, 1)];
        for c in all.iter().copied() {
            scans.push(ScanSpec::new(&[c], 1, 5, 0, 2));
        }
        for c in all.iter().copied() {
            scans.push(ScanSpec::new(&[c], 6, 63, 0, 2));
        }
        for c in all.iter().copied() {
            scans.push(ScanSpec::new(&[c], 1, 63, 2, 1));
        }
        scans.push(ScanSpec::new(&all, 0, 0, 1, 0));
        for c in all.iter().copied() {
            scans.push(ScanSpec::new(&[c], 1, 63, 1, 0));
        }
        scans
    }

    pub fn encode(&self, levels: &[Vec<i16>], progressive: bool, scans: &[ScanSpec]) -> Vec<u8> {
        assert_eq!(levels.len(), self.components.len());
        for (c, component_levels) in levels.iter().enumerate() {
            let (w, h) = self.block_grid(c);
            assert_eq!(component_levels.len(), w * h * 64);
        }
        let mut out = vec![0xFF, 0xD8];
        self.write_tables(&mut out, progressive);
        for scan in scans {
            let ns = scan.components.len();
            push_segment(&mut out, 0xDA, &{
                let mut body = vec![ns as u8];
                for &c in &scan.components {
                    body.extend([c as u8 + 1, 0x00]);
                }
                body.extend([scan.ss, scan.se, (scan.ah << 4) | scan.al]);
                body
            });
            self.encode_scan(&mut out, levels, scan, progressive);
        }
        out.extend([0xFF, 0xD9]);
        out
    }

    fn write_tables(&self, out: &mut Vec<u8>, progressive: bool) {
        for (c, comp) in self.components.iter().enumerate() {
            let wide = comp.quant.iter().any(|&q| q > 255);
            let mut body = vec![((wide as u8) << 4) | c as u8];
            for &natural in ZIGZAG_TO_NATURAL.iter() {
                let q = comp.quant[natural];
                if wide {
                    body.extend(q.to_be_bytes());
                } else {
                    body.push(q as u8);
                }
            }
            push_segment(out, 0xDB, &body);
        }

        let mut sof = vec![8];
        sof.extend(self.height.to_be_bytes());
        sof.extend(self.width.to_be_bytes());
        sof.push(self.components.len() as u8);
        for (c, comp) in self.components.iter().enumerate() {
            sof.extend([c as u8 + 1, (comp.h << 4) | comp.v, c as u8]);
        }
        push_segment(out, if progressive { 0xC2 } else { 0xC0 }, &sof);

        let mut dht = vec![0x00];
        let mut counts = [0u8; 16];
        counts[3] = NUM_DC_SYMBOLS as u8;
        dht.extend(counts);
        dht.extend(0..NUM_DC_SYMBOLS as u8);
        let symbols = ac_symbols();
        dht.push(0x10);
        let mut counts = [0u8; 16];
        counts[7] = symbols.len() as u8;
        dht.extend(counts);
        dht.extend(&symbols);
        push_segment(out, 0xC4, &dht);

        if self.restart_interval > 0 {
            push_segment(out, 0xDD, &self.restart_interval.to_be_bytes());
        }
    }

    fn encode_scan(&self, out: &mut Vec<u8>, levels: &[Vec<i16>], scan: &ScanSpec, progressive: bool) {
        let mut mcus: Vec<Vec<(usize, usize)>> = Vec::new();
        if scan.components.len() > 1 {
            let (mx, my) = self.mcus();
            for y in 0..my {
                for x in 0..mx {
                    let mut mcu = Vec::new();
                    for &c in &scan.components {
                        let comp = &self.components[c];
                        let (stride, _) = self.block_grid(c);
                        for by in 0..comp.v as usize {
                            for bx in 0..comp.h as usize {
                                let row = y * comp.v as usize + by;
                                let col = x * comp.h as usize + bx;
                                mcu.push((c, row * stride + col));
                            }
                        }
                    }
                    mcus.push(mcu);
                }
            }
        } else {
            let c = scan.components[0];
            let (stride, _) = self.block_grid(c);
            let (w, h) = self.exact_block_grid(c);
            for y in 0..h {
                for x in 0..w {
                    mcus.push(vec![(c, y * stride + x)]);
                }
            }
        }

        let mut encoder = ScanEncoder::new(self.components.len());
        let ri = self.restart_interval as usize;
        for (i, mcu) in mcus.iter().enumerate() {
            if ri > 0 && i > 0 && i % ri == 0 {
                encoder.emit_eobrun();
                encoder.writer.flush();
                out.append(&mut encoder.writer.out);
                out.extend([0xFF, 0xD0 + ((i / ri - 1) % 8) as u8]);
                encoder.dc_pred.iter_mut().for_each(|p| *p = 0);
            }
            for &(c, b) in mcu {
                let block = &levels[c][b * 64..(b + 1) * 64];
                if !progressive {
                    encoder.sequential(c, block);
                } else if scan.ss == 0 && scan.ah == 0 {
                    encoder.dc_first(c, block, scan.al);
                } else if scan.ss == 0 {
                    let bit = (block[0] as i32 >> scan.al) & 1;
                    encoder.writer.put(bit as u32, 1);
                } else if scan.ah == 0 {
                    encoder.ac_first(block, scan);
                } else {
                    encoder.ac_refine(block, scan);
                }
            }
        }
        encoder.emit_eobrun();
        encoder.writer.flush();
        out.append(&mut encoder.writer.out);
    }
}

fn push_segment(out: &mut Vec<u8>, marker: u8, body: &[u8]) {
    out.extend([0xFF, marker]);
    out.extend(((body.len() + 2) as u16).to_be_bytes());
    out.extend(body);
}

#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    acc: u8,
    nbits: u32,
}

impl BitWriter {
    fn put(&mut self, bits: u32, n: u32) {
        for i in (0..n).rev() {
            self.acc = (self.acc << 1) | ((bits >> i) & 1) as u8;
            self.nbits += 1;
            if self.nbits == 8 {
                self.out.push(self.acc);
                if self.acc == 0xFF {
                    self.out.push(0x00);
                }
                self.acc = 0;
                self.nbits = 0;
            }
        }
    }

    fn flush(&mut self) {
        while self.nbits != 0 {
            self.put(1, 1);
        }
    }
}

fn bit_length(value: i32) -> u32 {
    32 - value.unsigned_abs().leading_zeros()
}

fn value_bits(value: i32, size: u32) -> u32 {
    if value >= 0 {
        value as u32
    } else {
        (value + (1 << size) - 1) as u32
    }
}

struct ScanEncoder {
    writer: BitWriter,
    dc_pred: Vec<i32>,
    eobrun: u32,
    // Refinement bits owed by the blocks in the pending EOB run.
    pending_bits: Vec<u8>,
    ac_codes: [u16; 256],
}

impl ScanEncoder {
    fn new(num_components: usize) -> Self {
        let mut ac_codes = [u16::MAX; 256];
        for (code, symbol) in ac_symbols().into_iter().enumerate() {
            ac_codes[symbol as usize] = code as u16;
        }
        Self {
            writer: BitWriter::default(),
            dc_pred: vec![0; num_components],
            eobrun: 0,
            pending_bits: Vec::new(),
            ac_codes,
        }
    }

    fn emit_dc(&mut self, diff: i32) {
        let size = bit_length(diff);
        assert!(size < NUM_DC_SYMBOLS as u32, "DC difference {diff} too large");
        self.writer.put(size, 4);
        self.writer.put(value_bits(diff, size), size);
    }

    fn emit_ac_symbol(&mut self, symbol: u8) {
        let code = self.ac_codes[symbol as usize];
        assert_ne!(code, u16::MAX, "no code for AC symbol {symbol:#x}");
        self.writer.put(code as u32, 8);
    }

    fn emit_ac(&mut self, run: u32, value: i32) {
        let size = bit_length(value);
        assert!((1..=10).contains(&size), "AC value {value} out of range");
        self.emit_ac_symbol(((run << 4) | size) as u8);
        self.writer.put(value_bits(value, size), size);
    }

    fn emit_eobrun(&mut self) {
        if self.eobrun > 0 {
            let nbits = 31 - self.eobrun.leading_zeros();
            self.emit_ac_symbol((nbits << 4) as u8);
            self.writer.put(self.eobrun & ((1 << nbits) - 1), nbits);
            self.eobrun = 0;
            for bit in std::mem::take(&mut self.pending_bits) {
                self.writer.put(bit as u32, 1);
            }
        }
    }

    fn sequential(&mut self, c: usize, block: &[i16]) {
        let dc = block[0] as i32;
        self.emit_dc(dc - self.dc_pred[c]);
        self.dc_pred[c] = dc;
        let mut run = 0;
        for &natural in ZIGZAG_TO_NATURAL.iter().skip(1) {
            let value = block[natural] as i32;
            if value == 0 {
                run += 1;
                continue;
            }
            while run > 15 {
                self.emit_ac_symbol(0xF0);
                run -= 16;
            }
            self.emit_ac(run, value);
            run = 0;
        }
        if run > 0 {
            self.emit_ac_symbol(0x00);
        }
    }

    fn dc_first(&mut self, c: usize, block: &[i16], al: u8) {
        let dc = block[0] as i32 >> al;
        self.emit_dc(dc - self.dc_pred[c]);
        self.dc_pred[c] = dc;
    }

    fn ac_first(&mut self, block: &[i16], scan: &ScanSpec) {
        let mut run = 0;
        for k in scan.ss as usize..=scan.se as usize {
            let level = block[ZIGZAG_TO_NATURAL[k]] as i32;
            let magnitude = level.abs() >> scan.al;
            if magnitude == 0 {
                run += 1;
                continue;
            }
            self.emit_eobrun();
            while run > 15 {
                self.emit_ac_symbol(0xF0);
                run -= 16;
            }
            self.emit_ac(run, if level < 0 { -magnitude } else { magnitude });
            run = 0;
        }
        if run > 0 {
            self.eobrun += 1;
            if self.eobrun == 0x7FFF {
                self.emit_eobrun();
            }
        }
    }

    fn ac_refine(&mut self, block: &[i16], scan: &ScanSpec) {
        let (ss, se) = (scan.ss as usize, scan.se as usize);
        let mut magnitudes = [0i32; 64];
        let mut last_new = 0;
        for k in ss..=se {
            magnitudes[k] = (block[ZIGZAG_TO_NATURAL[k]] as i32).abs() >> scan.al;
            if magnitudes[k] == 1 {
                last_new = k;
            }
        }

        let mut run = 0;
        let mut correction: Vec<u8> = Vec::new();
        for k in ss..=se {
            let magnitude = magnitudes[k];
            if magnitude == 0 {
                run += 1;
                continue;
            }
            while run > 15 && k <= last_new {
                self.emit_eobrun();
                self.emit_ac_symbol(0xF0);
                run -= 16;
                for bit in correction.drain(..) {
                    self.writer.put(bit as u32, 1);
                }
            }
            if magnitude > 1 {
                correction.push((magnitude & 1) as u8);
                continue;
            }
            self.emit_eobrun();
            self.emit_ac_symbol(((run << 4) | 1) as u8);
            let positive = block[ZIGZAG_TO_NATURAL[k]] > 0;
            self.writer.put(positive as u32, 1);
            for bit in correction.drain(..) {
                self.writer.put(bit as u32, 1);
            }
            run = 0;
        }
        if run > 0 || !correction.is_empty() {
            self.eobrun += 1;
            self.pending_bits.append(&mut correction);
            if self.eobrun == 0x7FFF || self.pending_bits.len() > 900 {
                self.emit_eobrun();
            }
        }
    }
}
