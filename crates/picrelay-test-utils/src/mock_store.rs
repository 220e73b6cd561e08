// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`KeyValueStore`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use picrelay_core::{AdapterType, HealthStatus, KeyValueStore, PicrelayError, PluginAdapter};

/// A key-value store held in a `HashMap`.
///
/// Writes can be made to fail with [`MemoryStore::fail_writes`] to exercise
/// storage error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    fail_writes: AtomicBool,
    writes: Mutex<Vec<Vec<u8>>>,
    shut_down: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Write a raw value, bypassing failure injection.
    pub async fn insert(&self, key: &[u8], value: &[u8]) {
        self.data.lock().await.insert(key.to_vec(), value.to_vec());
    }

    /// Raw stored value, if any.
    pub async fn raw(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.lock().await.get(key).cloned()
    }

    /// Whether `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Keys passed to successful `set` calls, in order.
    pub async fn write_log(&self) -> Vec<Vec<u8>> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, PicrelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PicrelayError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &[u8]) -> Result<Vec<u8>, PicrelayError> {
        self.data
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| PicrelayError::NotFound {
                key: String::from_utf8_lossy(key).into_owned(),
            })
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<(), PicrelayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PicrelayError::storage(std::io::Error::other(
                "injected write failure",
            )));
        }
        self.data.lock().await.insert(key.to_vec(), value.to_vec());
        self.writes.lock().await.push(key.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.get(b"nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn injected_failures_leave_data_untouched() {
        let store = MemoryStore::new();
        store.set(b"k", b"v").await.unwrap();
        store.fail_writes(true);
        assert!(store.set(b"k", b"w").await.is_err());
        assert_eq!(store.get(b"k").await.unwrap(), b"v");
        assert_eq!(store.write_log().await, vec![b"k".to_vec()]);
    }
}
