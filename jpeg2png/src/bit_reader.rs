// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use crate::error::{Error, Result};

/// Reads bits, most significant first, from JPEG entropy-coded data.
///
/// Stuffed `0xFF 0x00` pairs are read as a single `0xFF`. When a marker or the end
/// of the data is reached the reader keeps returning zero bits, which is how
/// decoders conventionally treat truncated scans.
#[derive(Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buf: u64,
    bits_in_buf: usize,
    at_marker: bool,
    padding_bytes: usize,
}

impl Debug for BitReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BitReader{{ data: [{} bytes], pos: {}, bits_in_buf: {}, at_marker: {} }}",
            self.data.len(),
            self.pos,
            self.bits_in_buf,
            self.at_marker
        )
    }
}

pub const MAX_BITS_PER_CALL: usize = 16;

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> BitReader<'a> {
        BitReader {
            data,
            pos: 0,
            bit_buf: 0,
            bits_in_buf: 0,
            at_marker: false,
            padding_bytes: 0,
        }
    }

    fn next_byte(&mut self) -> u8 {
        if self.at_marker || self.pos >= self.data.len() {
            self.padding_bytes += 1;
            return 0;
        }
        let byte = self.data[self.pos];
        if byte != 0xFF {
            self.pos += 1;
            return byte;
        }
        match self.data.get(self.pos + 1) {
            Some(0x00) => {
                self.pos += 2;
                0xFF
            }
            _ => {
                self.at_marker = true;
                self.padding_bytes += 1;
                0
            }
        }
    }

    fn refill(&mut self) {
        while self.bits_in_buf <= 56 {
            self.bit_buf = (self.bit_buf << 8) | self.next_byte() as u64;
            self.bits_in_buf += 8;
        }
    }

    /// Returns the next `num` bits without consuming them.
    #[inline]
    pub fn peek(&mut self, num: usize) -> u32 {
        debug_assert!(num <= MAX_BITS_PER_CALL);
        if self.bits_in_buf < num {
            self.refill();
        }
        if num == 0 {
            return 0;
        }
        ((self.bit_buf >> (self.bits_in_buf - num)) & ((1u64 << num) - 1)) as u32
    }

    #[inline]
    pub fn consume(&mut self, num: usize) {
        debug_assert!(num <= self.bits_in_buf);
        self.bits_in_buf -= num;
    }

    /// Reads `num` bits.
    /// ```
    /// # use jpeg2png::bit_reader::BitReader;
    /// let mut br = BitReader::new(&[0xAB, 0xFF, 0x00, 0x12]);
    /// assert_eq!(br.read(4), 0xA);
    /// assert_eq!(br.read(12), 0xBFF);
    /// assert_eq!(br.read(8), 0x12);
    /// ```
    #[inline]
    pub fn read(&mut self, num: usize) -> u32 {
        let ret = self.peek(num);
        self.consume(num);
        ret
    }

    pub fn read_bit(&mut self) -> bool {
        self.read(1) != 0
    }

    /// Reads `size` magnitude bits and applies JPEG sign extension.
    #[inline]
    pub fn receive_extend(&mut self, size: usize) -> i32 {
        if size == 0 {
            return 0;
        }
        let value = self.read(size) as i32;
        if value < (1 << (size - 1)) {
            value - (1 << size) + 1
        } else {
            value
        }
    }

    /// Whether the reader had to invent bits past the end of the data.
    pub fn overran(&self) -> bool {
        // Bits still buffered may all be padding; only count padding that was consumed.
        self.padding_bytes * 8 > self.bits_in_buf
    }

    /// Drops buffered bits and consumes the restart marker that must come next.
    pub fn restart(&mut self) -> Result<()> {
        self.bit_buf = 0;
        self.bits_in_buf = 0;
        self.at_marker = false;
        self.padding_bytes = 0;
        while self.pos + 1 < self.data.len()
            && self.data[self.pos] == 0xFF
            && self.data[self.pos + 1] == 0xFF
        {
            self.pos += 1;
        }
        match self.data.get(self.pos..self.pos + 2) {
            Some([0xFF, m]) if (0xD0..=0xD7).contains(m) => {
                self.pos += 2;
                Ok(())
            }
            _ => Err(Error::MissingRestartMarker),
        }
    }
}
