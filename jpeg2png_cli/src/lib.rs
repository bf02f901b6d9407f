// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod args;
pub mod enc;
pub mod telemetry;

use std::{
    io::{self, BufWriter, Write},
    path::Path,
};

use color_eyre::eyre::{Result, WrapErr};
use jpeg2png::{CoefficientStore, jpeg, restore};
use tempfile::NamedTempFile;

use args::Opt;
use telemetry::{CliTelemetry, CsvLog, progress_bar};

/// A file in the directory of `path` that only takes the final name once
/// everything has been written to it.
pub(crate) fn create_beside(path: &Path) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    NamedTempFile::new_in(dir)
}

/// Runs one conversion. All files are opened before any decoding starts; on
/// failure neither the output file nor the log is left behind.
pub fn run(opt: &Opt) -> Result<()> {
    let options = opt.restore_options()?;

    let data = std::fs::read(&opt.input)
        .wrap_err_with(|| format!("could not open input file `{}`", opt.input.display()))?;
    let mut output = create_beside(&opt.output)
        .wrap_err_with(|| format!("could not open output file `{}`", opt.output.display()))?;
    let log = opt.csv_log.as_deref().map(CsvLog::create).transpose()?;

    let decoded = jpeg::decode(&data)
        .wrap_err_with(|| format!("could not decode `{}`", opt.input.display()))?;
    let (width, height) = (decoded.width, decoded.height);
    let stores = CoefficientStore::from_jpeg(decoded)
        .wrap_err_with(|| format!("could not decode `{}`", opt.input.display()))?;

    let progress = (!opt.quiet).then(|| progress_bar(options.total_iterations(stores.len())));
    let telemetry = CliTelemetry::new(log, progress);
    let image = restore(stores, width, height, &options, &telemetry)?;
    let log = telemetry.finish()?;

    {
        let mut writer = BufWriter::new(output.as_file_mut());
        enc::png::to_png(&image, &mut writer)?;
        writer.flush()?;
    }
    output
        .persist(&opt.output)
        .map_err(|e| e.error)
        .wrap_err_with(|| format!("could not write output file `{}`", opt.output.display()))?;
    if let Some(log) = log {
        log.persist()?;
    }
    Ok(())
}
