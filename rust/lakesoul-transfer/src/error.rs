// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Error types of the transfer crate.

use std::{error::Error, result};

use arrow_schema::{ArrowError, DataType};

/// Result type for operations that could result in a [TransferError]
pub type Result<T, E = TransferError> = result::Result<T, E>;

/// Error type for generic operations that could result in TransferError::External
pub type GenericError = Box<dyn Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// `merge` was called without any input batch.
    #[error("no records provided")]
    NoRecordsProvided,

    #[error("sort column {column} is out of range for a schema with {num_columns} columns")]
    InvalidSortColumn { column: usize, num_columns: usize },

    #[error("unsupported column type for comparison: column {column} has type {data_type}")]
    UnsupportedSortType { column: usize, data_type: DataType },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The reader side of a pipeline failed.
    #[error("failed to read batch: {0}")]
    ReadFailed(#[source] Box<TransferError>),

    /// The writer side of a pipeline failed.
    #[error("failed to write batch: {0}")]
    WriteFailed(#[source] Box<TransferError>),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("pipeline has already been started")]
    AlreadyStarted,

    #[error("pipeline worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("external error: {0}")]
    External(#[from] GenericError),
}

impl TransferError {
    /// Returns true if the error is a requested stop rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }

    pub(crate) fn read(err: TransferError) -> Self {
        TransferError::ReadFailed(Box::new(err))
    }

    pub(crate) fn write(err: TransferError) -> Self {
        TransferError::WriteFailed(Box::new(err))
    }
}
