// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable byte-level key-value store.

use async_trait::async_trait;

use crate::error::PicrelayError;
use crate::traits::adapter::PluginAdapter;

/// Durable get/set store with read-your-writes consistency.
///
/// Every single `get`/`set` call is individually durable and consistent with
/// earlier calls from the same process. Sequences of calls are not atomic.
#[async_trait]
pub trait KeyValueStore: PluginAdapter {
    /// Reads the value stored under `key`.
    ///
    /// Returns [`PicrelayError::NotFound`] when the key has never been written.
    async fn get(&self, key: &[u8]) -> Result<Vec<u8>, PicrelayError>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn set(&self, key: &[u8], value: &[u8]) -> Result<(), PicrelayError>;
}
