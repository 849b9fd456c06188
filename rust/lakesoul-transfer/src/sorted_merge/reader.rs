// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

use arrow::compute::concat_batches;
use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use tracing::{debug, info, warn};

use super::{SortingColumn, merge};
use crate::batch::Batch;
use crate::config::TransferConfig;
use crate::error::{Result, TransferError};
use crate::io::BatchReader;

/// Exposes the sorted merge of several sorted sources as a single [`BatchReader`].
///
/// Each source must yield its batches in sort order. On the first read every source is drained
/// and merged, and the result is handed out in slices of at most `batch_size` rows. A failed
/// merge leaves the sources partly drained, so every later read fails as well.
pub struct SortedMergeReader {
    sources: Vec<Box<dyn BatchReader>>,
    sort_columns: Vec<SortingColumn>,
    limit: usize,
    batch_size: usize,
    merged: Option<RecordBatch>,
    offset: usize,
    failure: Option<String>,
}

impl SortedMergeReader {
    pub fn new(sources: Vec<Box<dyn BatchReader>>, sort_columns: Vec<SortingColumn>) -> Self {
        let config = TransferConfig::default();
        Self {
            sources,
            sort_columns,
            limit: config.merge_limit(),
            batch_size: config.batch_size(),
            merged: None,
            offset: 0,
            failure: None,
        }
    }

    /// Takes the sort key, limit and batch size from `config`.
    pub fn try_new_with_config(sources: Vec<Box<dyn BatchReader>>, config: &TransferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sources,
            sort_columns: config.sort_columns().to_vec(),
            limit: config.merge_limit(),
            batch_size: config.batch_size(),
            merged: None,
            offset: 0,
            failure: None,
        })
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn load(&mut self) -> Result<RecordBatch> {
        let mut inputs = Vec::with_capacity(self.sources.len());
        let mut schema: Option<SchemaRef> = None;
        for (idx, source) in self.sources.iter_mut().enumerate() {
            let mut records = vec![];
            while let Some(batch) = source.read().await? {
                records.push(batch.into_record_batch());
            }
            let Some(first) = records.first() else {
                debug!(source = idx, "source produced no batch");
                continue;
            };
            let source_schema = first.schema();
            let combined = concat_batches(&source_schema, &records)?;
            schema.get_or_insert(source_schema);
            if combined.num_rows() == 0 {
                debug!(source = idx, "source produced no rows");
                continue;
            }
            inputs.push(Batch::new(combined));
        }

        if inputs.is_empty() {
            return match schema {
                Some(schema) => Ok(RecordBatch::new_empty(schema)),
                None => Err(TransferError::NoRecordsProvided),
            };
        }
        let merged = merge(inputs, &self.sort_columns, self.limit)?.into_record_batch();
        info!(
            sources = self.sources.len(),
            rows = merged.num_rows(),
            "sorted merge finished"
        );
        Ok(merged)
    }
}

#[async_trait::async_trait]
impl BatchReader for SortedMergeReader {
    async fn read(&mut self) -> Result<Option<Batch>> {
        if let Some(failure) = &self.failure {
            return Err(TransferError::External(
                format!("sorted merge failed earlier: {failure}").into(),
            ));
        }
        if self.merged.is_none() {
            match self.load().await {
                Ok(merged) => self.merged = Some(merged),
                Err(e) => {
                    self.failure = Some(e.to_string());
                    return Err(e);
                }
            }
        }
        let Some(merged) = &self.merged else {
            return Ok(None);
        };
        if self.offset >= merged.num_rows() {
            return Ok(None);
        }
        let len = self.batch_size.min(merged.num_rows() - self.offset);
        let slice = merged.slice(self.offset, len);
        self.offset += len;
        Ok(Some(Batch::new(slice)))
    }

    async fn close(&mut self) -> Result<()> {
        let mut result = Ok(());
        for source in self.sources.iter_mut() {
            if let Err(e) = source.close().await {
                warn!("failed to close merge source: {e}");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}
