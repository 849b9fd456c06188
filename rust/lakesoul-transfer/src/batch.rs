// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Reference counted record batches.
//!
//! A [`Batch`] is an Arrow [`RecordBatch`] plus an optional lease. All clones of a batch share
//! one lease, and the last clone to be dropped (or [released](Batch::release)) ends it. Leases
//! handed out by a [`BatchTracker`] report back to the tracker, which is how callers check that
//! no batch outlives the stage that owns it.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::SchemaRef;

/// Lease stats of tracked batches.
pub trait BatchStats: Sync + Send + Debug {
    /// Total leases handed out.
    fn retained(&self) -> u64;

    /// Total leases ended.
    fn released(&self) -> u64;

    /// Leases still alive.
    fn outstanding(&self) -> u64 {
        self.retained().saturating_sub(self.released())
    }
}

/// Atomic integer lease stats.
#[derive(Debug, Default)]
pub struct BatchTracker {
    retained: AtomicU64,
    released: AtomicU64,
}

impl BatchTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wraps `record` in a batch whose release is reported to this tracker.
    pub fn track(self: &Arc<Self>, record: RecordBatch) -> Batch {
        self.retained.fetch_add(1, Ordering::Relaxed);
        Batch {
            record,
            lease: Some(Arc::new(Lease {
                tracker: Arc::clone(self),
            })),
        }
    }
}

impl BatchStats for BatchTracker {
    fn retained(&self) -> u64 {
        self.retained.load(Ordering::Acquire)
    }

    fn released(&self) -> u64 {
        self.released.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct Lease {
    tracker: Arc<BatchTracker>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.tracker.released.fetch_add(1, Ordering::AcqRel);
    }
}

/// An immutable, shared columnar record.
#[derive(Debug, Clone)]
pub struct Batch {
    record: RecordBatch,
    lease: Option<Arc<Lease>>,
}

impl Batch {
    /// Creates an untracked batch.
    pub fn new(record: RecordBatch) -> Self {
        Self { record, lease: None }
    }

    pub fn num_rows(&self) -> usize {
        self.record.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.record.num_columns()
    }

    pub fn schema(&self) -> SchemaRef {
        self.record.schema()
    }

    pub fn column(&self, index: usize) -> &ArrayRef {
        self.record.column(index)
    }

    pub fn record_batch(&self) -> &RecordBatch {
        &self.record
    }

    /// Returns the underlying record batch and releases this handle's share of the lease.
    pub fn into_record_batch(self) -> RecordBatch {
        self.record
    }

    /// Memory held by the batch's arrays, in bytes.
    pub fn memory_size(&self) -> usize {
        self.record.get_array_memory_size()
    }

    /// A batch with no columns or no rows carries nothing to transfer.
    pub fn is_valid(&self) -> bool {
        self.num_columns() > 0 && self.num_rows() > 0
    }

    /// Gives up this handle. The lease ends once every clone has been released.
    pub fn release(self) {
        drop(self)
    }
}

impl From<RecordBatch> for Batch {
    fn from(record: RecordBatch) -> Self {
        Batch::new(record)
    }
}
