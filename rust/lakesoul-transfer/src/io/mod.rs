// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Batch sources and sinks consumed by the pipeline and the sorted merge reader.

mod memory;
pub use memory::{MemoryReader, MemoryWriter, NoopWriter};

mod stream;
pub use stream::StreamReader;

use crate::batch::Batch;
use crate::error::Result;

/// The trait for a source of batches.
#[async_trait::async_trait]
pub trait BatchReader: Send {
    /// Read the next batch, `None` once the source is exhausted.
    async fn read(&mut self) -> Result<Option<Batch>>;

    /// Release the resources of the source.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The trait for a sink of batches.
#[async_trait::async_trait]
pub trait BatchWriter: Send {
    /// Write a batch to the sink. The sink owns the batch from then on.
    async fn write(&mut self, batch: Batch) -> Result<()>;

    /// Flush the sink and close it.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Close the sink when an error occurs or the transfer is cancelled.
    async fn abort(&mut self) -> Result<()> {
        self.close().await
    }
}

#[async_trait::async_trait]
impl<R: BatchReader + ?Sized> BatchReader for Box<R> {
    async fn read(&mut self) -> Result<Option<Batch>> {
        (**self).read().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

#[async_trait::async_trait]
impl<W: BatchWriter + ?Sized> BatchWriter for Box<W> {
    async fn write(&mut self, batch: Batch) -> Result<()> {
        (**self).write(batch).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }

    async fn abort(&mut self) -> Result<()> {
        (**self).abort().await
    }
}
