// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use arrow::compute::interleave;
use arrow_array::{Array, ArrayRef, RecordBatch, RecordBatchOptions};
use arrow_cast::cast::{CastOptions, can_cast_types, cast_with_options};
use arrow_schema::DataType;
use tracing::{debug, instrument};

use super::SortingColumn;
use super::cursor::BatchCursor;
use super::merge_heap::MergeHeap;
use crate::batch::Batch;
use crate::error::{Result, TransferError};

/// Merges batches that are each sorted by `sort_columns` into one sorted batch.
///
/// The output has the schema of the first batch. Every input must have the same column names;
/// a column whose type differs from the first batch's (a dictionary column merged with a plain
/// one, say) is cast to the first batch's type. A cast that would lose or change a value fails
/// with [`TransferError::SchemaMismatch`]. Rows with equal keys come out in input order.
///
/// # Arguments
///
/// * `batches` - The inputs, at least one. Zero-row inputs are allowed.
/// * `sort_columns` - The composite sort key. An empty key concatenates the inputs.
/// * `limit` - Maximum number of output rows, 0 for no limit.
#[instrument(skip(batches, sort_columns), fields(inputs = batches.len()))]
pub fn merge(batches: Vec<Batch>, sort_columns: &[SortingColumn], limit: usize) -> Result<Batch> {
    let Some(first) = batches.first() else {
        return Err(TransferError::NoRecordsProvided);
    };
    let schema = first.schema();
    let num_columns = schema.fields().len();

    if let Some(key) = sort_columns.iter().find(|key| key.column_index >= num_columns) {
        return Err(TransferError::InvalidSortColumn {
            column: key.column_index,
            num_columns,
        });
    }
    for (idx, batch) in batches.iter().enumerate().skip(1) {
        let other = batch.schema();
        let same_names = other.fields().len() == num_columns
            && other.fields().iter().zip(schema.fields()).all(|(l, r)| l.name() == r.name());
        if !same_names {
            return Err(TransferError::SchemaMismatch(format!(
                "input {idx} has columns {:?}, expected {:?}",
                other.fields().iter().map(|f| f.name()).collect::<Vec<_>>(),
                schema.fields().iter().map(|f| f.name()).collect::<Vec<_>>()
            )));
        }
    }

    let records = batches.iter().map(|b| b.record_batch().clone()).collect::<Vec<_>>();
    let total_rows = records.iter().map(RecordBatch::num_rows).sum::<usize>();
    let capacity = if limit == 0 { total_rows } else { limit.min(total_rows) };
    debug!(total_rows, capacity, keys = sort_columns.len(), "merging sorted batches");

    let cursors = batches
        .into_iter()
        .enumerate()
        .map(|(idx, batch)| BatchCursor::try_new(idx, batch, sort_columns))
        .collect::<Result<Vec<_>>>()?;
    let mut heap = MergeHeap::try_new(cursors, sort_columns)?;

    let mut indices = Vec::<(usize, usize)>::with_capacity(capacity);
    while indices.len() < capacity {
        match heap.advance_smallest() {
            Some(next) => indices.push(next),
            None => break,
        }
    }
    if let Some(cursor) = heap.peek() {
        debug!(
            source = cursor.source_idx(),
            row = cursor.row(),
            remaining_inputs = heap.len(),
            "merge limit reached"
        );
    }
    // releases the inputs still held by unfinished cursors
    drop(heap);

    let columns = (0..num_columns)
        .map(|col| -> Result<ArrayRef> {
            let target = schema.field(col).data_type();
            let arrays = records
                .iter()
                .enumerate()
                .map(|(idx, record)| align_column(record.column(col), target, idx, col))
                .collect::<Result<Vec<_>>>()?;
            let arrays = arrays.iter().map(|array| array.as_ref()).collect::<Vec<&dyn Array>>();
            Ok(interleave(&arrays, &indices)?)
        })
        .collect::<Result<Vec<_>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(indices.len()));
    let merged = RecordBatch::try_new_with_options(schema, columns, &options)?;
    Ok(Batch::new(merged))
}

fn align_column(array: &ArrayRef, target: &DataType, input: usize, column: usize) -> Result<ArrayRef> {
    let from = array.data_type();
    if from == target {
        Ok(Arc::clone(array))
    } else if can_cast_types(from, target) {
        // unsafe casts fail on overflow or unparsable values instead of producing nulls
        let options = CastOptions {
            safe: false,
            ..Default::default()
        };
        cast_with_options(array, target, &options).map_err(|e| {
            TransferError::SchemaMismatch(format!(
                "column {column} of input {input} cannot be cast from {from} to {target}: {e}"
            ))
        })
    } else {
        Err(TransferError::SchemaMismatch(format!(
            "column {column} of input {input} has type {from}, expected {target}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use arrow_array::{Int32Array, StringArray};

    use super::*;
    use crate::batch::{BatchStats, BatchTracker};

    fn create_batch(ids: Vec<i32>, names: Vec<&str>) -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            ("id", Arc::new(Int32Array::from(ids)) as ArrayRef),
            ("name", Arc::new(StringArray::from(names)) as ArrayRef),
        ])
        .unwrap()
    }

    fn ids(batch: &Batch) -> Vec<i32> {
        batch
            .column(0)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap()
            .values()
            .to_vec()
    }

    #[test]
    fn test_merge_carries_all_columns() {
        let merged = merge(
            vec![
                Batch::new(create_batch(vec![1, 4], vec!["a", "d"])),
                Batch::new(create_batch(vec![2, 3], vec!["b", "c"])),
            ],
            &[SortingColumn::asc(0)],
            0,
        )
        .unwrap();
        assert_eq!(ids(&merged), vec![1, 2, 3, 4]);
        let names = merged.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(names.iter().flatten().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_limit_releases_inputs() {
        let tracker = BatchTracker::new();
        let merged = merge(
            vec![
                tracker.track(create_batch(vec![1, 2, 3], vec!["a", "b", "c"])),
                tracker.track(create_batch(vec![4, 5], vec!["d", "e"])),
            ],
            &[SortingColumn::asc(0)],
            2,
        )
        .unwrap();
        assert_eq!(ids(&merged), vec![1, 2]);
        assert_eq!(tracker.outstanding(), 0);
    }

    #[test]
    fn test_empty_key_concatenates() {
        let merged = merge(
            vec![
                Batch::new(create_batch(vec![9, 1], vec!["x", "y"])),
                Batch::new(create_batch(vec![5], vec!["z"])),
            ],
            &[],
            0,
        )
        .unwrap();
        assert_eq!(ids(&merged), vec![9, 1, 5]);
    }

    #[test]
    fn test_mismatched_inputs() {
        let other = RecordBatch::try_from_iter(vec![("key", Arc::new(Int32Array::from(vec![1])) as ArrayRef)]).unwrap();
        let err = merge(
            vec![Batch::new(create_batch(vec![1], vec!["a"])), Batch::new(other)],
            &[SortingColumn::asc(0)],
            0,
        )
        .unwrap_err();
        assert!(matches!(err, TransferError::SchemaMismatch(_)));

        let err = merge(
            vec![Batch::new(create_batch(vec![1], vec!["a"]))],
            &[SortingColumn::asc(2)],
            0,
        )
        .unwrap_err();
        assert!(matches!(err, TransferError::InvalidSortColumn { column: 2, num_columns: 2 }));
    }
}
