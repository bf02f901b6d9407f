// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    bit_reader::BitReader,
    error::{Error, Result},
};

pub(crate) const HUFFMAN_MAX_BITS: usize = 16;
const LOOKUP_BITS: usize = 8;

/// A canonical JPEG Huffman code.
///
/// Codes up to [`LOOKUP_BITS`] long are resolved with one table lookup; longer codes
/// fall back to comparing against the largest code of each length.
#[derive(Clone)]
pub(crate) struct HuffmanTable {
    // (code length, symbol); a length of 0 means the code is longer than LOOKUP_BITS.
    lookup: [(u8, u8); 1 << LOOKUP_BITS],
    max_code: [i32; HUFFMAN_MAX_BITS + 1],
    value_offset: [i32; HUFFMAN_MAX_BITS + 1],
    symbols: Vec<u8>,
}

impl std::fmt::Debug for HuffmanTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HuffmanTable {{ {} symbols }}", self.symbols.len())
    }
}

impl HuffmanTable {
    /// Builds the table from the `BITS` counts and `HUFFVAL` symbols of a DHT segment.
    pub fn new(counts: &[u8; HUFFMAN_MAX_BITS], symbols: &[u8]) -> Result<HuffmanTable> {
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if total == 0 || total > 256 || total != symbols.len() {
            return Err(Error::InvalidHuffmanTable);
        }
        let mut lookup = [(0u8, 0u8); 1 << LOOKUP_BITS];
        let mut max_code = [-1i32; HUFFMAN_MAX_BITS + 1];
        let mut value_offset = [0i32; HUFFMAN_MAX_BITS + 1];
        let mut code = 0u32;
        let mut k = 0usize;
        for len in 1..=HUFFMAN_MAX_BITS {
            let count = counts[len - 1] as usize;
            value_offset[len] = k as i32 - code as i32;
            for _ in 0..count {
                if code >= (1 << len) {
                    return Err(Error::InvalidHuffmanTable);
                }
                if len <= LOOKUP_BITS {
                    let shift = LOOKUP_BITS - len;
                    let first = (code << shift) as usize;
                    for entry in &mut lookup[first..first + (1 << shift)] {
                        *entry = (len as u8, symbols[k]);
                    }
                }
                code += 1;
                k += 1;
            }
            if count > 0 {
                max_code[len] = code as i32 - 1;
            }
            code <<= 1;
        }
        Ok(HuffmanTable {
            lookup,
            max_code,
            value_offset,
            symbols: symbols.to_vec(),
        })
    }

    #[inline]
    pub fn decode(&self, br: &mut BitReader) -> Result<u8> {
        let bits = br.peek(HUFFMAN_MAX_BITS);
        let (len, symbol) = self.lookup[(bits >> (HUFFMAN_MAX_BITS - LOOKUP_BITS)) as usize];
        if len > 0 {
            br.consume(len as usize);
            return Ok(symbol);
        }
        self.decode_slow(br, bits)
    }

    #[inline(never)]
    fn decode_slow(&self, br: &mut BitReader, bits: u32) -> Result<u8> {
        for len in LOOKUP_BITS + 1..=HUFFMAN_MAX_BITS {
            let code = (bits >> (HUFFMAN_MAX_BITS - len)) as i32;
            if code <= self.max_code[len] {
                br.consume(len);
                let index = (self.value_offset[len] + code) as usize;
                return self
                    .symbols
                    .get(index)
                    .copied()
                    .ok_or(Error::InvalidHuffmanCode);
            }
        }
        Err(Error::InvalidHuffmanCode)
    }
}
