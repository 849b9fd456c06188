// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::result;
use std::sync::Arc;

use arrow_array::RecordBatch;
use futures::{Stream, StreamExt};

use super::BatchReader;
use crate::batch::{Batch, BatchTracker};
use crate::error::{GenericError, Result, TransferError};

/// Reads batches from a stream of record batches, e.g. the output of a query engine.
pub struct StreamReader<S> {
    stream: S,
    tracker: Option<Arc<BatchTracker>>,
}

impl<S> StreamReader<S> {
    pub fn new(stream: S) -> Self {
        Self { stream, tracker: None }
    }

    /// Reports every batch read from the stream to `tracker`.
    pub fn with_tracker(mut self, tracker: Arc<BatchTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }
}

#[async_trait::async_trait]
impl<S, E> BatchReader for StreamReader<S>
where
    S: Stream<Item = result::Result<RecordBatch, E>> + Send + Unpin,
    E: Into<GenericError> + Send,
{
    async fn read(&mut self) -> Result<Option<Batch>> {
        match self.stream.next().await {
            Some(Ok(record)) => Ok(Some(match &self.tracker {
                Some(tracker) => tracker.track(record),
                None => Batch::new(record),
            })),
            Some(Err(e)) => Err(TransferError::External(e.into())),
            None => Ok(None),
        }
    }
}
