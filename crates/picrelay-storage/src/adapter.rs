// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`KeyValueStore`] trait.

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};
use tokio::sync::OnceCell;
use tracing::debug;

use picrelay_config::model::StorageConfig;
use picrelay_core::{AdapterType, HealthStatus, KeyValueStore, PicrelayError, PluginAdapter};

use crate::database::{Database, map_tr_err};

/// SQLite-backed key-value store.
///
/// The database is opened by [`SqliteStore::initialize`]; every other
/// operation fails until then.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store for the configured database path. Nothing is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Create and initialize a store in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, PicrelayError> {
        let store = Self::new(config);
        store.initialize().await?;
        Ok(store)
    }

    /// Open the database and apply migrations.
    pub async fn initialize(&self) -> Result<(), PicrelayError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| PicrelayError::Internal("storage already initialized".into()))?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    fn db(&self) -> Result<&Database, PicrelayError> {
        self.db.get().ok_or_else(|| {
            PicrelayError::Internal("storage not initialized -- call initialize() first".into())
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, PicrelayError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PicrelayError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &[u8]) -> Result<Vec<u8>, PicrelayError> {
        let owned = key.to_vec();
        let value = self
            .db()?
            .connection()
            .call(move |conn| -> Result<Option<Vec<u8>>, rusqlite::Error> {
                conn.query_row(
                    "SELECT value FROM kv WHERE key = ?1",
                    params![owned],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)?;

        value.ok_or_else(|| PicrelayError::NotFound {
            key: String::from_utf8_lossy(key).into_owned(),
        })
    }

    async fn set(&self, key: &[u8], value: &[u8]) -> Result<(), PicrelayError> {
        let key = key.to_vec();
        let value = value.to_vec();
        self.db()?
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO kv (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    params![key, value],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &std::path::Path) -> StorageConfig {
        StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn adapter_metadata() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(make_config(&dir.path().join("meta.db")));
        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(make_config(&dir.path().join("lazy.db")));
        assert!(store.health_check().await.is_err());
        assert!(store.get(b"k").await.is_err());
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(make_config(&dir.path().join("twice.db")))
            .await
            .unwrap();
        assert!(store.initialize().await.is_err());
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(make_config(&dir.path().join("nf.db")))
            .await
            .unwrap();
        let err = store.get(b"https://example.com/a.png").await.unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }

    #[tokio::test]
    async fn set_overwrites_and_reads_back() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(make_config(&dir.path().join("rw.db")))
            .await
            .unwrap();

        store.set(b"flag", &[1]).await.unwrap();
        assert_eq!(store.get(b"flag").await.unwrap(), vec![1]);

        store.set(b"flag", &[0]).await.unwrap();
        assert_eq!(store.get(b"flag").await.unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("durable.db");
        {
            let store = SqliteStore::open(make_config(&path)).await.unwrap();
            store.set(b"username_alice", &42i64.to_le_bytes()).await.unwrap();
            store.shutdown().await.unwrap();
        }
        let store = SqliteStore::open(make_config(&path)).await.unwrap();
        assert_eq!(
            store.get(b"username_alice").await.unwrap(),
            42i64.to_le_bytes().to_vec()
        );
    }
}
