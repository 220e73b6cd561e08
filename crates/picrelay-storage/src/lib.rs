// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for picrelay.
//!
//! A single `kv` table behind the [`KeyValueStore`](picrelay_core::KeyValueStore)
//! trait, WAL mode, embedded refinery migrations, and one serialized
//! tokio-rusqlite connection.

pub mod adapter;
pub mod database;
pub mod migrations;

pub use adapter::SqliteStore;
pub use database::Database;
