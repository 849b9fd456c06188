// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

use super::SortingColumn;
use super::cursor::BatchCursor;
use crate::error::{Result, TransferError};

/// A binary min-heap over a fixed set of cursors.
///
/// All cursors are known when the heap is built; it only ever shrinks, so there is no way to
/// insert into it. The smallest cursor is at index 0.
#[derive(Debug)]
pub(crate) struct MergeHeap {
    cursors: Vec<BatchCursor>,
    sort_columns: Vec<SortingColumn>,
}

impl MergeHeap {
    /// Arranges `cursors` into heap order. Exhausted cursors are dropped first.
    ///
    /// Fails with [`TransferError::SchemaMismatch`] if two cursors decode a sort column into
    /// different value domains.
    pub(crate) fn try_new(cursors: Vec<BatchCursor>, sort_columns: &[SortingColumn]) -> Result<Self> {
        if let Some(first) = cursors.first() {
            let expected = first.domains().collect::<Vec<_>>();
            for cursor in &cursors[1..] {
                for ((key, left), right) in sort_columns.iter().zip(&expected).zip(cursor.domains()) {
                    if *left != right {
                        return Err(TransferError::SchemaMismatch(format!(
                            "sort column {} of input {} has values of {:?}, expected {:?}",
                            key.column_index,
                            cursor.source_idx(),
                            right,
                            left
                        )));
                    }
                }
            }
        }

        let mut heap = Self {
            cursors: cursors.into_iter().filter(|cursor| !cursor.is_finished()).collect(),
            sort_columns: sort_columns.to_vec(),
        };
        for i in (0..heap.len() / 2).rev() {
            heap.sift_down(i);
        }
        Ok(heap)
    }

    pub(crate) fn len(&self) -> usize {
        self.cursors.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub(crate) fn peek(&self) -> Option<&BatchCursor> {
        self.cursors.first()
    }

    /// Whether the current row of cursor `i` sorts strictly before that of cursor `j`.
    fn less(&self, i: usize, j: usize) -> bool {
        self.cursors[i].cmp_current(&self.cursors[j], &self.sort_columns).is_lt()
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.cursors.swap(i, j);
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.len();
        loop {
            let left = 2 * i + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(right, left) { right } else { left };
            if !self.less(child, i) {
                break;
            }
            self.swap(i, child);
            i = child;
        }
    }

    /// Pops the smallest cursor.
    pub(crate) fn remove_smallest(&mut self) -> Option<BatchCursor> {
        if self.is_empty() {
            return None;
        }
        let last = self.len() - 1;
        self.swap(0, last);
        let smallest = self.cursors.pop();
        self.sift_down(0);
        smallest
    }

    /// Consumes the smallest row, returning `(source index, row index)`.
    ///
    /// The cursor it came from is advanced and re-sifted, or removed once exhausted.
    pub(crate) fn advance_smallest(&mut self) -> Option<(usize, usize)> {
        let cursor = self.cursors.first_mut()?;
        let next = (cursor.source_idx(), cursor.advance());
        if cursor.is_finished() {
            self.remove_smallest();
        } else {
            self.sift_down(0);
        }
        Some(next)
    }
}
