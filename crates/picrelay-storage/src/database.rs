// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management: PRAGMA setup, WAL mode, migrations.
//!
//! All statements run on tokio-rusqlite's single background thread. Do NOT
//! open additional connections for writes.

use std::path::Path;

use picrelay_core::PicrelayError;
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite error into [`PicrelayError::Storage`].
pub fn map_tr_err<E>(e: tokio_rusqlite::Error<E>) -> PicrelayError
where
    E: std::error::Error + Send + Sync + 'static,
{
    PicrelayError::storage(e)
}

/// Handle to the open, migrated database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` and apply migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, PicrelayError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(PicrelayError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(PicrelayError::storage)?;

        let journal = if wal_mode { "WAL" } else { "DELETE" };
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(&format!(
                "PRAGMA journal_mode = {journal};
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;"
            ))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(map_tr_err)?;

        debug!(path, journal, "database opened");
        Ok(Self { conn })
    }

    /// The single serialized connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), PicrelayError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}
