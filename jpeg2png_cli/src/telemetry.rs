// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::{
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use jpeg2png::{IterationRecord, TelemetrySink};
use tempfile::NamedTempFile;

use crate::create_beside;

pub const CSV_HEADER: &str = "channel,iteration,energy,residual,tv1,tv2,fidelity";

struct CsvState {
    writer: BufWriter<NamedTempFile>,
    // First write failure; later records are dropped.
    error: Option<io::Error>,
}

/// Optimization log, one line per solver step.
///
/// Written to a temporary file next to `path` that only takes its name in
/// [`FinishedLog::persist`].
pub struct CsvLog {
    path: PathBuf,
    state: Mutex<CsvState>,
}

impl CsvLog {
    pub fn create(path: &Path) -> Result<CsvLog> {
        let file = create_beside(path)
            .wrap_err_with(|| format!("could not open csv log `{}`", path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{CSV_HEADER}")
            .wrap_err_with(|| format!("could not write csv log `{}`", path.display()))?;
        Ok(CsvLog {
            path: path.to_path_buf(),
            state: Mutex::new(CsvState {
                writer,
                error: None,
            }),
        })
    }

    fn write(&self, r: &IterationRecord) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.error.is_some() {
            return;
        }
        let result = writeln!(
            state.writer,
            "{},{},{},{},{},{},{}",
            r.channel, r.iteration, r.energy, r.residual, r.tv1, r.tv2, r.fidelity
        );
        if let Err(err) = result {
            state.error = Some(err);
        }
    }

    /// Flushes the log and reports the first write failure, if any.
    pub fn finish(self) -> Result<FinishedLog> {
        let path = self.path;
        let mut state = self.state.into_inner().unwrap_or_else(|e| e.into_inner());
        let result = match state.error.take() {
            Some(err) => Err(err),
            None => state.writer.into_inner().map_err(|e| e.into_error()),
        };
        let file =
            result.wrap_err_with(|| format!("could not write csv log `{}`", path.display()))?;
        Ok(FinishedLog { path, file })
    }
}

/// A complete log that has not taken its final name yet. Dropping it deletes it.
pub struct FinishedLog {
    path: PathBuf,
    file: NamedTempFile,
}

impl FinishedLog {
    pub fn persist(self) -> Result<()> {
        let path = self.path;
        self.file
            .persist(&path)
            .map_err(|e| e.error)
            .wrap_err_with(|| format!("could not write csv log `{}`", path.display()))?;
        Ok(())
    }
}

pub fn progress_bar(total_iterations: usize) -> ProgressBar {
    let progress = ProgressBar::new(total_iterations as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] [{bar:40}] {pos:>4}/{len:4} steps")
    {
        progress.set_style(style.progress_chars("=> "));
    }
    progress
}

/// Everything the command line tool does with solver records.
#[derive(Default)]
pub struct CliTelemetry {
    log: Option<CsvLog>,
    progress: Option<ProgressBar>,
}

impl CliTelemetry {
    pub fn new(log: Option<CsvLog>, progress: Option<ProgressBar>) -> CliTelemetry {
        CliTelemetry { log, progress }
    }

    pub fn finish(self) -> Result<Option<FinishedLog>> {
        if let Some(progress) = self.progress {
            progress.finish_and_clear();
        }
        self.log.map(CsvLog::finish).transpose()
    }
}

impl TelemetrySink for CliTelemetry {
    fn record(&self, record: &IterationRecord) {
        if let Some(log) = &self.log {
            log.write(record);
        }
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
    }
}
