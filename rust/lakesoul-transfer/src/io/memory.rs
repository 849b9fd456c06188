// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use arrow_array::RecordBatch;
use parking_lot::Mutex;

use super::{BatchReader, BatchWriter};
use crate::batch::Batch;
use crate::error::Result;

/// Yields a fixed queue of batches.
#[derive(Debug, Default)]
pub struct MemoryReader {
    batches: VecDeque<Batch>,
}

impl MemoryReader {
    pub fn new(batches: impl IntoIterator<Item = Batch>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
        }
    }

    pub fn from_record_batches(batches: impl IntoIterator<Item = RecordBatch>) -> Self {
        Self::new(batches.into_iter().map(Batch::new))
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

#[async_trait::async_trait]
impl BatchReader for MemoryReader {
    async fn read(&mut self) -> Result<Option<Batch>> {
        Ok(self.batches.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        // unread batches are released here
        self.batches.clear();
        Ok(())
    }
}

/// Collects written batches. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryWriter {
    batches: Arc<Mutex<Vec<Batch>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().clone()
    }

    pub fn record_batches(&self) -> Vec<RecordBatch> {
        self.batches.lock().iter().map(|b| b.record_batch().clone()).collect()
    }

    pub fn num_rows(&self) -> usize {
        self.batches.lock().iter().map(Batch::num_rows).sum()
    }

    /// Returns true once the writer was closed after a complete transfer.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drops every collected batch.
    pub fn clear(&self) {
        self.batches.lock().clear();
    }
}

#[async_trait::async_trait]
impl BatchWriter for MemoryWriter {
    async fn write(&mut self, batch: Batch) -> Result<()> {
        self.batches.lock().push(batch);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        self.clear();
        Ok(())
    }
}

/// Discards every batch, counting what passes through.
#[derive(Debug, Default, Clone)]
pub struct NoopWriter {
    rows: Arc<AtomicU64>,
    batches: Arc<AtomicU64>,
}

impl NoopWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows_written(&self) -> u64 {
        self.rows.load(Ordering::Acquire)
    }

    pub fn batches_written(&self) -> u64 {
        self.batches.load(Ordering::Acquire)
    }
}

#[async_trait::async_trait]
impl BatchWriter for NoopWriter {
    async fn write(&mut self, batch: Batch) -> Result<()> {
        self.rows.fetch_add(batch.num_rows() as u64, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
        batch.release();
        Ok(())
    }
}
