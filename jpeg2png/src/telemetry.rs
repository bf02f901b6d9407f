// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Per-iteration reporting out of the solver.

use std::sync::Mutex;

/// What one solver step reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationRecord {
    /// 0 for luma, 1 and 2 for chroma.
    pub channel: usize,
    /// Zero-based step index.
    pub iteration: usize,
    /// Objective of the accepted iterate; never increases within a channel.
    pub energy: f64,
    /// Root mean square change of the estimate during this step.
    pub residual: f64,
    /// First-order total variation of the accepted iterate.
    pub tv1: f64,
    /// Second-order total variation of the accepted iterate, before weighting.
    pub tv2: f64,
    /// Probabilistic fidelity term of the accepted iterate, before weighting.
    pub fidelity: f64,
}

/// Receives records from solvers, possibly from several threads at once.
///
/// Implementations must handle each call atomically: a record is either
/// delivered whole or not at all, and never interleaved with another one.
pub trait TelemetrySink: Sync {
    fn record(&self, record: &IterationRecord);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTelemetry;

impl TelemetrySink for NoTelemetry {
    fn record(&self, _record: &IterationRecord) {}
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    records: Mutex<Vec<IterationRecord>>,
}

impl RecordingTelemetry {
    pub fn new() -> RecordingTelemetry {
        Self::default()
    }

    pub fn records(&self) -> Vec<IterationRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Records of one channel, in iteration order.
    pub fn channel(&self, channel: usize) -> Vec<IterationRecord> {
        let mut records: Vec<_> = self
            .records()
            .into_iter()
            .filter(|r| r.channel == channel)
            .collect();
        records.sort_by_key(|r| r.iteration);
        records
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record(&self, record: &IterationRecord) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(*record);
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &T {
    fn record(&self, record: &IterationRecord) {
        (**self).record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn record(channel: usize, iteration: usize) -> IterationRecord {
        IterationRecord {
            channel,
            iteration,
            energy: 1.0,
            residual: 0.5,
            tv1: 1.0,
            tv2: 0.0,
            fidelity: 0.0,
        }
    }

    #[test]
    fn test_recording_from_threads() {
        let sink = RecordingTelemetry::new();
        std::thread::scope(|scope| {
            for channel in 0..3 {
                let sink = &sink;
                scope.spawn(move || {
                    for iteration in 0..100 {
                        sink.record(&record(channel, iteration));
                    }
                });
            }
        });
        assert_eq!(sink.records().len(), 300);
        for channel in 0..3 {
            let records = sink.channel(channel);
            assert_eq!(records.len(), 100);
            assert!(records.iter().enumerate().all(|(i, r)| r.iteration == i));
        }
    }
}
