// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Transfer metrics

use std::fmt::{self, Display, Formatter};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::batch::Batch;

/// Running counters of a pipeline, updated by the pump while the transfer runs.
#[derive(Debug)]
pub struct MetricsRecorder {
    records_processed: AtomicU64,
    total_bytes: AtomicU64,
    batches_processed: AtomicU64,
    batches_skipped: AtomicU64,
    start_time: Instant,
    end_time: OnceLock<Instant>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            records_processed: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            batches_processed: AtomicU64::new(0),
            batches_skipped: AtomicU64::new(0),
            start_time: Instant::now(),
            end_time: OnceLock::new(),
        }
    }

    /// Counts a batch handed to the writer side.
    pub fn record_batch(&self, batch: &Batch) {
        self.records_processed
            .fetch_add(batch.num_rows() as u64, Ordering::Relaxed);
        self.total_bytes
            .fetch_add(batch.memory_size() as u64, Ordering::Relaxed);
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a batch dropped for having no rows or no columns.
    pub fn record_skipped(&self) {
        self.batches_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Stamps the end time. Only the first call has an effect.
    pub fn finish(&self) {
        let _ = self.end_time.set(Instant::now());
    }

    pub fn snapshot(&self) -> Metrics {
        Metrics {
            records_processed: self.records_processed.load(Ordering::Acquire),
            total_bytes: self.total_bytes.load(Ordering::Acquire),
            batches_processed: self.batches_processed.load(Ordering::Acquire),
            batches_skipped: self.batches_skipped.load(Ordering::Acquire),
            start_time: self.start_time,
            end_time: self.end_time.get().copied(),
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub records_processed: u64,
    /// In-memory size of the transferred arrays
    pub total_bytes: u64,
    pub batches_processed: u64,
    pub batches_skipped: u64,
    pub start_time: Instant,
    /// Unset while the pipeline is running
    pub end_time: Option<Instant>,
}

impl Metrics {
    /// Time from pipeline construction until it finished, or until now if it has not.
    pub fn duration(&self) -> Duration {
        self.end_time
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.start_time)
    }

    pub fn records_per_second(&self) -> f64 {
        per_second(self.records_processed, self.duration())
    }

    pub fn bytes_per_second(&self) -> f64 {
        per_second(self.total_bytes, self.duration())
    }

    /// Human readable summary of the transfer.
    pub fn report(&self) -> String {
        let duration = self.duration();
        format!(
            "Records processed: {}\nTotal bytes: {}\nDuration: {:?}\nThroughput: {:.2} records/sec, {:.2} bytes/sec",
            self.records_processed,
            self.total_bytes,
            duration,
            per_second(self.records_processed, duration),
            per_second(self.total_bytes, duration),
        )
    }
}

impl Display for Metrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

fn per_second(count: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}
