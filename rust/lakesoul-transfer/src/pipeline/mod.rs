// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Bounded, cancellable transfer of batches from one reader to one writer.
//!
//! [`Pipeline::start`] runs two tasks connected by a bounded channel: the pump reads from the
//! [`BatchReader`] and sends, the drain receives and writes to the [`BatchWriter`]. A full
//! channel slows the pump down. The first error raised by either task is kept in a one-slot
//! error channel and cancels the other task; every wait in both tasks also watches the
//! cancellation token, so neither can hang once the transfer is stopped. Closing or aborting the
//! reader and writer after a stop is bounded by [`TransferConfig::close_timeout`].

pub mod metrics;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{Instrument, debug, error, info, instrument, trace, warn};

use crate::batch::Batch;
use crate::config::TransferConfig;
use crate::error::{Result, TransferError};
use crate::io::{BatchReader, BatchWriter};
use metrics::{Metrics, MetricsRecorder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// How a worker task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerExit {
    Finished,
    Cancelled,
    Failed,
}

/// Moves batches from a reader to a writer.
pub struct Pipeline {
    reader: Option<Box<dyn BatchReader>>,
    writer: Option<Box<dyn BatchWriter>>,
    config: TransferConfig,
    metrics: Arc<MetricsRecorder>,
    state: PipelineState,
}

impl Pipeline {
    /// Creates a pipeline with the default config. The metrics clock starts here.
    pub fn new(reader: impl BatchReader + 'static, writer: impl BatchWriter + 'static) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            writer: Some(Box::new(writer)),
            config: TransferConfig::default(),
            metrics: Arc::new(MetricsRecorder::new()),
            state: PipelineState::Idle,
        }
    }

    pub fn with_config(
        reader: impl BatchReader + 'static,
        writer: impl BatchWriter + 'static,
        config: TransferConfig,
    ) -> Result<Self> {
        config.validate()?;
        let mut pipeline = Self::new(reader, writer);
        pipeline.config = config;
        Ok(pipeline)
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Current counters. After a failed or cancelled run they cover the work done until then.
    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    /// Runs the transfer until the reader is exhausted, an error occurs or `cancel` fires.
    ///
    /// Returns the final metrics, the first error raised by either side, or
    /// [`TransferError::Cancelled`]. A pipeline can only be started once.
    #[instrument(skip_all, fields(channel_capacity = self.config.channel_capacity()))]
    pub async fn start(&mut self, cancel: CancellationToken) -> Result<Metrics> {
        let (Some(reader), Some(writer)) = (self.reader.take(), self.writer.take()) else {
            return Err(TransferError::AlreadyStarted);
        };
        self.state = PipelineState::Running;
        info!("pipeline started");

        // cancelled by worker failures without touching the caller's token
        let token = cancel.child_token();
        let (tx, rx) = mpsc::channel::<Batch>(self.config.channel_capacity());
        let (err_tx, mut err_rx) = mpsc::channel::<TransferError>(1);

        let close_timeout = self.config.close_timeout();
        let pump_task = AbortOnDropHandle::new(tokio::spawn(
            pump(
                reader,
                tx,
                Arc::clone(&self.metrics),
                err_tx.clone(),
                token.clone(),
                close_timeout,
            )
            .in_current_span(),
        ));
        let drain_task = AbortOnDropHandle::new(tokio::spawn(
            drain(writer, rx, err_tx, token.clone(), close_timeout).in_current_span(),
        ));
        let (pumped, drained) = tokio::join!(
            supervise(pump_task, &token),
            supervise(drain_task, &token)
        );

        self.metrics.finish();
        err_rx.close();
        let published = err_rx.try_recv().ok();
        let panicked = [&pumped, &drained]
            .into_iter()
            .find_map(|joined| joined.as_ref().err())
            .map(|e| TransferError::WorkerPanicked(e.to_string()));
        let cancelled = [pumped, drained]
            .into_iter()
            .any(|joined| matches!(joined, Ok(WorkerExit::Cancelled)));

        match published.or(panicked) {
            Some(err) => {
                error!("pipeline failed: {err}");
                self.state = PipelineState::Failed;
                Err(err)
            }
            None if cancelled => {
                warn!("pipeline cancelled");
                self.state = PipelineState::Cancelled;
                Err(TransferError::Cancelled)
            }
            None => {
                let metrics = self.metrics.snapshot();
                info!(
                    records = metrics.records_processed,
                    bytes = metrics.total_bytes,
                    "pipeline completed"
                );
                self.state = PipelineState::Completed;
                Ok(metrics)
            }
        }
    }
}

/// Waits for a worker and stops its sibling if it panicked.
async fn supervise(
    task: AbortOnDropHandle<WorkerExit>,
    token: &CancellationToken,
) -> std::result::Result<WorkerExit, JoinError> {
    let joined = task.await;
    if joined.is_err() {
        token.cancel();
    }
    joined
}

/// Keeps the first error and stops both workers.
fn publish(err_tx: &Sender<TransferError>, token: &CancellationToken, err: TransferError) {
    match err_tx.try_send(err) {
        Ok(()) => {}
        Err(TrySendError::Full(err)) | Err(TrySendError::Closed(err)) => {
            warn!("dropping error raised after the first one: {err}");
        }
    }
    token.cancel();
}

/// Shuts down a reader or writer of a stopped transfer, giving up after `limit`.
async fn shutdown(what: &str, fut: impl Future<Output = Result<()>>, limit: Duration) {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("failed to {what}: {e}"),
        Err(_) => warn!(?limit, "gave up waiting to {what}"),
    }
}

async fn pump(
    mut reader: Box<dyn BatchReader>,
    tx: Sender<Batch>,
    metrics: Arc<MetricsRecorder>,
    err_tx: Sender<TransferError>,
    token: CancellationToken,
    close_timeout: Duration,
) -> WorkerExit {
    debug!("pump started");
    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break WorkerExit::Cancelled,
            next = reader.read() => next,
        };
        let batch = match next {
            Ok(Some(batch)) => batch,
            Ok(None) => break WorkerExit::Finished,
            Err(e) => {
                publish(&err_tx, &token, TransferError::read(e));
                break WorkerExit::Failed;
            }
        };
        if !batch.is_valid() {
            debug!(
                rows = batch.num_rows(),
                columns = batch.num_columns(),
                "skipping empty batch"
            );
            metrics.record_skipped();
            batch.release();
            continue;
        }
        metrics.record_batch(&batch);
        // a batch held by an unfinished send is released when the send is dropped
        tokio::select! {
            biased;
            _ = token.cancelled() => break WorkerExit::Cancelled,
            sent = tx.send(batch) => {
                if sent.is_err() {
                    // the drain is gone, it has either failed or been cancelled
                    break WorkerExit::Cancelled;
                }
            }
        }
    };
    // closes the channel
    drop(tx);

    let exit = if exit == WorkerExit::Finished {
        let closed = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            closed = reader.close() => Some(closed),
        };
        match closed {
            Some(Ok(())) => WorkerExit::Finished,
            Some(Err(e)) => {
                publish(&err_tx, &token, TransferError::read(e));
                WorkerExit::Failed
            }
            None => WorkerExit::Cancelled,
        }
    } else {
        shutdown("close reader", reader.close(), close_timeout).await;
        exit
    };
    debug!(?exit, "pump stopped");
    exit
}

async fn drain(
    mut writer: Box<dyn BatchWriter>,
    mut rx: Receiver<Batch>,
    err_tx: Sender<TransferError>,
    token: CancellationToken,
    close_timeout: Duration,
) -> WorkerExit {
    debug!("drain started");
    let exit = loop {
        let batch = tokio::select! {
            biased;
            _ = token.cancelled() => break WorkerExit::Cancelled,
            received = rx.recv() => match received {
                Some(batch) => batch,
                None => break WorkerExit::Finished,
            },
        };
        if !batch.is_valid() {
            batch.release();
            continue;
        }
        let rows = batch.num_rows();
        let written = tokio::select! {
            biased;
            _ = token.cancelled() => break WorkerExit::Cancelled,
            written = writer.write(batch) => written,
        };
        if let Err(e) = written {
            publish(&err_tx, &token, TransferError::write(e));
            break WorkerExit::Failed;
        }
        trace!(rows, "batch written");
    };

    rx.close();
    while let Ok(batch) = rx.try_recv() {
        batch.release();
    }

    let exit = if exit == WorkerExit::Finished {
        let closed = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            closed = writer.close() => Some(closed),
        };
        match closed {
            Some(Ok(())) => WorkerExit::Finished,
            Some(Err(e)) => {
                publish(&err_tx, &token, TransferError::write(e));
                WorkerExit::Failed
            }
            None => WorkerExit::Cancelled,
        }
    } else {
        exit
    };
    if exit != WorkerExit::Finished {
        shutdown("abort writer", writer.abort(), close_timeout).await;
    }
    debug!(?exit, "drain stopped");
    exit
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::{Array, ArrayRef, Int32Array, RecordBatch};

    use super::*;
    use crate::io::{MemoryReader, MemoryWriter};

    fn record(values: Vec<i32>) -> RecordBatch {
        RecordBatch::try_from_iter(vec![("a", Arc::new(Int32Array::from(values)) as ArrayRef)]).unwrap()
    }

    #[tokio::test]
    async fn test_transfer_keeps_order() {
        let writer = MemoryWriter::new();
        let reader = MemoryReader::from_record_batches((0..10).map(|i| record(vec![i, i + 100])));
        let config = TransferConfig::builder().with_channel_capacity(2).build();
        let mut pipeline = Pipeline::with_config(reader, writer.clone(), config).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let metrics = pipeline.start(CancellationToken::new()).await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Completed);
        assert_eq!(metrics.records_processed, 20);
        assert_eq!(metrics.batches_processed, 10);
        assert!(metrics.end_time.is_some());
        assert!(writer.is_closed());

        let firsts = writer
            .record_batches()
            .iter()
            .map(|b| b.column(0).as_any().downcast_ref::<Int32Array>().unwrap().value(0))
            .collect::<Vec<_>>();
        assert_eq!(firsts, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let config = TransferConfig::builder().with_channel_capacity(0).build();
        let result = Pipeline::with_config(MemoryReader::default(), MemoryWriter::new(), config);
        assert!(matches!(result, Err(TransferError::Config(_))));
    }
}
