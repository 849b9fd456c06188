// SPDX-FileCopyrightText: 2023 LakeSoul Contributors
//
// SPDX-License-Identifier: Apache-2.0

/// Key for the number of in-flight batches between pump and drain
pub static OPTION_KEY_CHANNEL_CAPACITY: &str = "channel_capacity";
/// Key for the number of rows per batch yielded by the sorted merge reader
pub static OPTION_KEY_BATCH_SIZE: &str = "batch_size";
/// Key for the row limit of a sorted merge, 0 means unbounded
pub static OPTION_KEY_MERGE_LIMIT: &str = "merge_limit";
/// Key for how long a cancelled or failed transfer waits on `close`/`abort`, in milliseconds
pub static OPTION_KEY_CLOSE_TIMEOUT_MS: &str = "close_timeout_ms";
