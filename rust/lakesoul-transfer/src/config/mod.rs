// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Configuration of the transfer pipeline and the sorted merge reader.

use std::collections::HashMap;
use std::time::Duration;

use educe::Educe;

use crate::error::{Result, TransferError};
use crate::sorted_merge::SortingColumn;

mod options;
pub use options::*;

/// Configuration for transfer operations.
///
/// Typed fields carry the values used by [`crate::pipeline::Pipeline`] and
/// [`crate::sorted_merge::SortedMergeReader`]; `options` keeps any extra string options
/// the caller attached, so they can be inspected later.
#[derive(Educe, Debug, Clone)]
#[educe(Default)]
pub struct TransferConfig {
    /// Number of batches buffered between the pump and the drain
    #[educe(Default = 100)]
    pub(crate) channel_capacity: usize,
    /// Number of rows per batch yielded by the sorted merge reader
    #[educe(Default = 8192)]
    pub(crate) batch_size: usize,
    /// Row limit of a sorted merge, 0 means unbounded
    #[educe(Default = 0)]
    pub(crate) merge_limit: usize,
    /// Milliseconds a stopped transfer waits for the reader and writer to shut down
    #[educe(Default = 5000)]
    pub(crate) close_timeout_ms: u64,
    /// Composite sort key of a sorted merge
    pub(crate) sort_columns: Vec<SortingColumn>,
    /// Additional configuration options
    pub(crate) options: HashMap<String, String>,
}

impl TransferConfig {
    /// Returns a builder for TransferConfig
    pub fn builder() -> TransferConfigBuilder {
        TransferConfigBuilder::new()
    }

    /// Builds a config from string options keyed by the `OPTION_KEY_*` constants.
    ///
    /// Unknown keys are kept and can be read back with [`TransferConfig::option`].
    pub fn try_from_options(options: HashMap<String, String>) -> Result<Self> {
        let mut config = TransferConfig::default();
        if let Some(value) = options.get(OPTION_KEY_CHANNEL_CAPACITY) {
            config.channel_capacity = parse_usize(OPTION_KEY_CHANNEL_CAPACITY, value)?;
        }
        if let Some(value) = options.get(OPTION_KEY_BATCH_SIZE) {
            config.batch_size = parse_usize(OPTION_KEY_BATCH_SIZE, value)?;
        }
        if let Some(value) = options.get(OPTION_KEY_MERGE_LIMIT) {
            config.merge_limit = parse_usize(OPTION_KEY_MERGE_LIMIT, value)?;
        }
        if let Some(value) = options.get(OPTION_KEY_CLOSE_TIMEOUT_MS) {
            config.close_timeout_ms = parse_usize(OPTION_KEY_CLOSE_TIMEOUT_MS, value)? as u64;
        }
        config.options = options;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(TransferError::Config(format!(
                "{OPTION_KEY_CHANNEL_CAPACITY} must be greater than 0"
            )));
        }
        if self.batch_size == 0 {
            return Err(TransferError::Config(format!(
                "{OPTION_KEY_BATCH_SIZE} must be greater than 0"
            )));
        }
        Ok(())
    }

    /// Returns the number of batches buffered between the pump and the drain
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Returns the number of rows per batch yielded by the sorted merge reader
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the row limit of a sorted merge, 0 means unbounded
    pub fn merge_limit(&self) -> usize {
        self.merge_limit
    }

    /// Returns how long a cancelled or failed transfer waits on `close`/`abort`
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Returns the composite sort key of a sorted merge
    pub fn sort_columns(&self) -> &[SortingColumn] {
        &self.sort_columns
    }

    /// Returns the value of a configuration option by key
    pub fn option(&self, key: &str) -> Option<&String> {
        self.options.get(key)
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| TransferError::Config(format!("invalid value '{value}' for {key}: {e}")))
}

#[derive(Debug, Default, Clone)]
/// Builder for TransferConfig
///
/// This struct provides a fluent builder interface for creating TransferConfig instances.
pub struct TransferConfigBuilder {
    config: TransferConfig,
}

impl TransferConfigBuilder {
    /// Creates a new TransferConfigBuilder instance with default configuration
    pub fn new() -> Self {
        TransferConfigBuilder {
            config: TransferConfig::default(),
        }
    }

    /// Sets the number of batches buffered between the pump and the drain
    ///
    /// # Arguments
    ///
    /// * `capacity` - The channel capacity, must be greater than 0
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Sets the number of rows per batch yielded by the sorted merge reader
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Sets the row limit of a sorted merge, 0 means unbounded
    pub fn with_merge_limit(mut self, limit: usize) -> Self {
        self.config.merge_limit = limit;
        self
    }

    /// Sets how long a cancelled or failed transfer waits on `close`/`abort`
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.config.close_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Appends a column to the composite sort key
    pub fn with_sort_column(mut self, column: SortingColumn) -> Self {
        self.config.sort_columns.push(column);
        self
    }

    /// Replaces the composite sort key
    pub fn with_sort_columns(mut self, columns: Vec<SortingColumn>) -> Self {
        self.config.sort_columns = columns;
        self
    }

    /// Adds an option
    ///
    /// # Arguments
    ///
    /// * `key` - The key to add the option for
    /// * `value` - The value to add the option for
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.options.insert(key.into(), value.into());
        self
    }

    /// Builds the TransferConfig instance
    pub fn build(self) -> TransferConfig {
        self.config
    }
}

impl From<TransferConfig> for TransferConfigBuilder {
    fn from(val: TransferConfig) -> Self {
        TransferConfigBuilder { config: val }
    }
}
