// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Row comparison over the supported column encodings.
//!
//! A [`ColumnComparator`] is built once per (batch, sort key). Building it is where unsupported
//! column types are rejected, so comparing two rows afterwards cannot fail.

use std::cmp::Ordering;

use arrow::buffer::NullBuffer;
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, UInt8Type, UInt16Type,
    UInt32Type, UInt64Type,
};
use arrow_array::{
    Array, ArrayRef, BinaryArray, BinaryViewArray, BooleanArray, FixedSizeBinaryArray,
    Float32Array, Float64Array, Int8Array, Int16Array, Int32Array, Int64Array, LargeBinaryArray,
    LargeStringArray, StringArray, StringViewArray, UInt8Array, UInt16Array, UInt32Array,
    UInt64Array,
};
use arrow_schema::DataType;

use super::SortingColumn;
use crate::error::{Result, TransferError};

/// The decoded value space of a column. Columns compare with each other iff their domains match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueDomain {
    Utf8,
    Bytes,
    Signed,
    Unsigned,
    Float,
    Boolean,
}

/// A single decoded value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortValue<'a> {
    Str(&'a str),
    Bytes(&'a [u8]),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
}

impl SortValue<'_> {
    pub fn domain(&self) -> ValueDomain {
        match self {
            SortValue::Str(_) => ValueDomain::Utf8,
            SortValue::Bytes(_) => ValueDomain::Bytes,
            SortValue::Signed(_) => ValueDomain::Signed,
            SortValue::Unsigned(_) => ValueDomain::Unsigned,
            SortValue::Float(_) => ValueDomain::Float,
            SortValue::Bool(_) => ValueDomain::Boolean,
        }
    }

    /// Ascending order of two values. Floats use IEEE total ordering.
    pub fn compare(&self, other: &SortValue<'_>) -> Ordering {
        match (self, other) {
            (SortValue::Str(a), SortValue::Str(b)) => a.cmp(b),
            (SortValue::Bytes(a), SortValue::Bytes(b)) => a.cmp(b),
            (SortValue::Signed(a), SortValue::Signed(b)) => a.cmp(b),
            (SortValue::Unsigned(a), SortValue::Unsigned(b)) => a.cmp(b),
            (SortValue::Float(a), SortValue::Float(b)) => a.total_cmp(b),
            (SortValue::Bool(a), SortValue::Bool(b)) => a.cmp(b),
            // merge setup rejects mixed domains, keep the order total anyway
            (a, b) => a.domain().cmp(&b.domain()),
        }
    }
}

/// Values of a plain column, or the dictionary values of a dictionary column.
#[derive(Debug, Clone)]
enum TypedValues {
    Utf8(StringArray),
    LargeUtf8(LargeStringArray),
    Utf8View(StringViewArray),
    Binary(BinaryArray),
    LargeBinary(LargeBinaryArray),
    BinaryView(BinaryViewArray),
    FixedSizeBinary(FixedSizeBinaryArray),
    Int8(Int8Array),
    Int16(Int16Array),
    Int32(Int32Array),
    Int64(Int64Array),
    UInt8(UInt8Array),
    UInt16(UInt16Array),
    UInt32(UInt32Array),
    UInt64(UInt64Array),
    Float32(Float32Array),
    Float64(Float64Array),
    Boolean(BooleanArray),
}

impl TypedValues {
    fn try_new(array: &dyn Array) -> Option<Self> {
        let values = match array.data_type() {
            DataType::Utf8 => Self::Utf8(array.as_string::<i32>().clone()),
            DataType::LargeUtf8 => Self::LargeUtf8(array.as_string::<i64>().clone()),
            DataType::Utf8View => Self::Utf8View(array.as_string_view().clone()),
            DataType::Binary => Self::Binary(array.as_binary::<i32>().clone()),
            DataType::LargeBinary => Self::LargeBinary(array.as_binary::<i64>().clone()),
            DataType::BinaryView => Self::BinaryView(array.as_binary_view().clone()),
            DataType::FixedSizeBinary(_) => Self::FixedSizeBinary(array.as_fixed_size_binary().clone()),
            DataType::Int8 => Self::Int8(array.as_primitive::<Int8Type>().clone()),
            DataType::Int16 => Self::Int16(array.as_primitive::<Int16Type>().clone()),
            DataType::Int32 => Self::Int32(array.as_primitive::<Int32Type>().clone()),
            DataType::Int64 => Self::Int64(array.as_primitive::<Int64Type>().clone()),
            DataType::UInt8 => Self::UInt8(array.as_primitive::<UInt8Type>().clone()),
            DataType::UInt16 => Self::UInt16(array.as_primitive::<UInt16Type>().clone()),
            DataType::UInt32 => Self::UInt32(array.as_primitive::<UInt32Type>().clone()),
            DataType::UInt64 => Self::UInt64(array.as_primitive::<UInt64Type>().clone()),
            DataType::Float32 => Self::Float32(array.as_primitive::<Float32Type>().clone()),
            DataType::Float64 => Self::Float64(array.as_primitive::<Float64Type>().clone()),
            DataType::Boolean => Self::Boolean(array.as_boolean().clone()),
            _ => return None,
        };
        Some(values)
    }

    fn domain(&self) -> ValueDomain {
        match self {
            Self::Utf8(_) | Self::LargeUtf8(_) | Self::Utf8View(_) => ValueDomain::Utf8,
            Self::Binary(_) | Self::LargeBinary(_) | Self::BinaryView(_) | Self::FixedSizeBinary(_) => {
                ValueDomain::Bytes
            }
            Self::Int8(_) | Self::Int16(_) | Self::Int32(_) | Self::Int64(_) => ValueDomain::Signed,
            Self::UInt8(_) | Self::UInt16(_) | Self::UInt32(_) | Self::UInt64(_) => ValueDomain::Unsigned,
            Self::Float32(_) | Self::Float64(_) => ValueDomain::Float,
            Self::Boolean(_) => ValueDomain::Boolean,
        }
    }

    fn value(&self, idx: usize) -> SortValue<'_> {
        match self {
            Self::Utf8(a) => SortValue::Str(a.value(idx)),
            Self::LargeUtf8(a) => SortValue::Str(a.value(idx)),
            Self::Utf8View(a) => SortValue::Str(a.value(idx)),
            Self::Binary(a) => SortValue::Bytes(a.value(idx)),
            Self::LargeBinary(a) => SortValue::Bytes(a.value(idx)),
            Self::BinaryView(a) => SortValue::Bytes(a.value(idx)),
            Self::FixedSizeBinary(a) => SortValue::Bytes(a.value(idx)),
            Self::Int8(a) => SortValue::Signed(a.value(idx) as i64),
            Self::Int16(a) => SortValue::Signed(a.value(idx) as i64),
            Self::Int32(a) => SortValue::Signed(a.value(idx) as i64),
            Self::Int64(a) => SortValue::Signed(a.value(idx)),
            Self::UInt8(a) => SortValue::Unsigned(a.value(idx) as u64),
            Self::UInt16(a) => SortValue::Unsigned(a.value(idx) as u64),
            Self::UInt32(a) => SortValue::Unsigned(a.value(idx) as u64),
            Self::UInt64(a) => SortValue::Unsigned(a.value(idx)),
            Self::Float32(a) => SortValue::Float(a.value(idx) as f64),
            Self::Float64(a) => SortValue::Float(a.value(idx)),
            Self::Boolean(a) => SortValue::Bool(a.value(idx)),
        }
    }
}

/// Compares rows of one sort column.
#[derive(Debug, Clone)]
pub struct ColumnComparator {
    /// logical nulls, covering null dictionary values too
    nulls: Option<NullBuffer>,
    /// normalized dictionary keys
    keys: Option<Vec<usize>>,
    values: TypedValues,
}

impl ColumnComparator {
    /// Builds a comparator for `array`, the column at index `column` of its batch.
    ///
    /// Fails with [`TransferError::UnsupportedSortType`] if neither the array nor, for a
    /// dictionary array, its value type has a comparator.
    pub fn try_new(column: usize, array: &ArrayRef) -> Result<Self> {
        let unsupported = || TransferError::UnsupportedSortType {
            column,
            data_type: array.data_type().clone(),
        };
        let (keys, values) = match array.as_any_dictionary_opt() {
            Some(dict) => (
                Some(dict.normalized_keys()),
                TypedValues::try_new(dict.values().as_ref()).ok_or_else(unsupported)?,
            ),
            None => (None, TypedValues::try_new(array.as_ref()).ok_or_else(unsupported)?),
        };
        Ok(Self {
            nulls: array.logical_nulls(),
            keys,
            values,
        })
    }

    pub fn domain(&self) -> ValueDomain {
        self.values.domain()
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.nulls.as_ref().is_some_and(|nulls| nulls.is_null(row))
    }

    /// Decoded value at `row`. The row must not be null.
    pub fn value(&self, row: usize) -> SortValue<'_> {
        let idx = match &self.keys {
            Some(keys) => keys[row],
            None => row,
        };
        self.values.value(idx)
    }
}

/// Compares row `i` of `left` with row `j` of `right` under one sort key.
pub fn compare_rows(
    left: &ColumnComparator,
    i: usize,
    right: &ColumnComparator,
    j: usize,
    key: &SortingColumn,
) -> Ordering {
    match (left.is_null(i), right.is_null(j)) {
        (true, true) => Ordering::Equal,
        (true, false) if key.nulls_first => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, true) if key.nulls_first => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = left.value(i).compare(&right.value(j));
            if key.is_descending() { ord.reverse() } else { ord }
        }
    }
}

/// Compares two rows under a composite key; the first non-equal key decides.
///
/// `left` and `right` hold one comparator per entry of `keys`.
pub(crate) fn compare_keys(
    left: &[ColumnComparator],
    i: usize,
    right: &[ColumnComparator],
    j: usize,
    keys: &[SortingColumn],
) -> Ordering {
    keys.iter()
        .zip(left.iter().zip(right))
        .map(|(key, (l, r))| compare_rows(l, i, r, j, key))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}
