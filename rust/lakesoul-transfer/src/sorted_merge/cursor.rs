// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::cmp::Ordering;

use super::SortingColumn;
use super::comparator::{ColumnComparator, ValueDomain, compare_keys};
use crate::batch::Batch;
use crate::error::{Result, TransferError};

/// A batch being consumed row by row during a merge.
///
/// The cursor holds a share of the batch until it is dropped, which the merge heap does as soon
/// as the cursor is exhausted.
#[derive(Debug)]
pub(crate) struct BatchCursor {
    batch: Batch,
    row: usize,
    /// position of the batch among the merge inputs
    source_idx: usize,
    /// one per sort key
    comparators: Vec<ColumnComparator>,
}

impl BatchCursor {
    pub(crate) fn try_new(source_idx: usize, batch: Batch, sort_columns: &[SortingColumn]) -> Result<Self> {
        let comparators = sort_columns
            .iter()
            .map(|key| {
                if key.column_index >= batch.num_columns() {
                    return Err(TransferError::InvalidSortColumn {
                        column: key.column_index,
                        num_columns: batch.num_columns(),
                    });
                }
                ColumnComparator::try_new(key.column_index, batch.column(key.column_index))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            batch,
            row: 0,
            source_idx,
            comparators,
        })
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.row >= self.batch.num_rows()
    }

    /// Consumes the current row and returns its index.
    pub(crate) fn advance(&mut self) -> usize {
        let row = self.row;
        self.row += 1;
        row
    }

    pub(crate) fn row(&self) -> usize {
        self.row
    }

    pub(crate) fn source_idx(&self) -> usize {
        self.source_idx
    }

    pub(crate) fn domains(&self) -> impl Iterator<Item = ValueDomain> + '_ {
        self.comparators.iter().map(ColumnComparator::domain)
    }

    /// Orders the current rows of two cursors. Full key ties go to the lower source index.
    pub(crate) fn cmp_current(&self, other: &BatchCursor, sort_columns: &[SortingColumn]) -> Ordering {
        compare_keys(&self.comparators, self.row, &other.comparators, other.row, sort_columns)
            .then_with(|| self.source_idx.cmp(&other.source_idx))
    }
}
