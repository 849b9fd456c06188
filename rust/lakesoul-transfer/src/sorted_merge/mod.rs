// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! K-way merge of sorted record batches.

pub mod comparator;
mod cursor;
mod merge_heap;
mod merger;
mod reader;
mod sorting_column;

pub use comparator::{ColumnComparator, ValueDomain, compare_rows};
pub use merger::merge;
pub use reader::SortedMergeReader;
pub use sorting_column::{SortDirection, SortingColumn};
