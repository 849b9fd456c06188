// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Sorted k-way merge of Arrow record batches and a bounded, cancellable
//! transfer pipeline moving batches from a [`BatchReader`] to a [`BatchWriter`].

pub mod batch;
pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod sorted_merge;

pub use batch::{Batch, BatchTracker};
pub use config::{TransferConfig, TransferConfigBuilder};
pub use error::{Result, TransferError};
pub use io::{BatchReader, BatchWriter};
pub use pipeline::{Pipeline, PipelineState, metrics::Metrics};
pub use sorted_merge::{SortDirection, SortedMergeReader, SortingColumn, merge};

pub use arrow;
pub use tokio;
