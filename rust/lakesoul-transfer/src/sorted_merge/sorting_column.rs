// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// One key of a composite sort key.
///
/// Null placement is decided by `nulls_first` alone; the direction only reverses the order of
/// non-null values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortingColumn {
    pub column_index: usize,
    pub direction: SortDirection,
    pub nulls_first: bool,
}

impl SortingColumn {
    pub fn new(column_index: usize, direction: SortDirection, nulls_first: bool) -> Self {
        Self {
            column_index,
            direction,
            nulls_first,
        }
    }

    /// Ascending, nulls last.
    pub fn asc(column_index: usize) -> Self {
        Self::new(column_index, SortDirection::Ascending, false)
    }

    /// Descending, nulls last.
    pub fn desc(column_index: usize) -> Self {
        Self::new(column_index, SortDirection::Descending, false)
    }

    pub fn with_nulls_first(mut self, nulls_first: bool) -> Self {
        self.nulls_first = nulls_first;
        self
    }

    pub fn is_descending(&self) -> bool {
        self.direction == SortDirection::Descending
    }
}
