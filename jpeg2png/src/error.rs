// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // JPEG format errors
    #[error("Not a JPEG file: missing SOI marker")]
    NotAJpeg,
    #[error("File truncated")]
    FileTruncated,
    #[error("Invalid marker segment {0:#04x} of length {1}")]
    InvalidSegment(u8, usize),
    #[error("Unsupported JPEG: {0}")]
    Unsupported(String),
    #[error("Invalid image size: {0}x{1}")]
    InvalidImageSize(usize, usize),
    #[error("Invalid sampling factors {0}x{1} for component {2}")]
    InvalidSampling(u8, u8, usize),
    #[error("Invalid quantization table {0}")]
    InvalidQuantTable(usize),
    #[error("Quantization table {0} is used but never defined")]
    MissingQuantTable(usize),
    #[error("Huffman table {1} of class {0} is used but never defined")]
    MissingHuffmanTable(u8, usize),
    #[error("Invalid Huffman table")]
    InvalidHuffmanTable,
    #[error("Invalid Huffman code")]
    InvalidHuffmanCode,
    #[error("Invalid scan: {0}")]
    InvalidScan(String),
    #[error("Scan references unknown component id {0}")]
    UnknownComponent(u8),
    #[error("Expected restart marker")]
    MissingRestartMarker,
    #[error("No frame header before first scan")]
    MissingFrame,
    #[error("No scan data")]
    NoScans,
    // Restoration errors
    #[error("Invalid coefficient layout: {0}")]
    InvalidLayout(String),
    #[error("Invalid {0} weight {1}: must be finite and non-negative")]
    InvalidWeight(&'static str, f32),
    #[error("Dimension mismatch: {0}x{1} plane cannot produce {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
    #[error("Unsupported upsampling factors {0}x{1}")]
    InvalidUpsampling(usize, usize),
    #[error("Failed to start worker threads: {0}")]
    ThreadPool(String),
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
}

impl Error {
    /// True for errors caused by the input file rather than by the caller.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::NotAJpeg
                | Error::FileTruncated
                | Error::InvalidSegment(..)
                | Error::Unsupported(_)
                | Error::InvalidImageSize(..)
                | Error::InvalidSampling(..)
                | Error::InvalidQuantTable(_)
                | Error::MissingQuantTable(_)
                | Error::MissingHuffmanTable(..)
                | Error::InvalidHuffmanTable
                | Error::InvalidHuffmanCode
                | Error::InvalidScan(_)
                | Error::UnknownComponent(_)
                | Error::MissingRestartMarker
                | Error::MissingFrame
                | Error::NoScans
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
