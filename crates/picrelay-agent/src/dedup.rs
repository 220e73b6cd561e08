// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent delivery flags and username lookups.
//!
//! Two record kinds live in the key-value store:
//! - the processed flag of a source URL, a single byte keyed by the URL;
//! - the chat id of a username, 8 little-endian bytes keyed by
//!   `username_<lowercased name>`.

use std::io;
use std::sync::Arc;

use picrelay_core::{KeyValueStore, PicrelayError};
use tracing::{debug, info};

const DELIVERED: u8 = 1;
const NOT_DELIVERED: u8 = 0;
const USER_KEY_PREFIX: &str = "username_";

/// Store key holding the chat id of `username`.
pub fn user_key(username: &str) -> String {
    format!("{USER_KEY_PREFIX}{}", username.to_lowercase())
}

fn corrupt(key: &str, detail: String) -> PicrelayError {
    PicrelayError::storage(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("corrupt value under '{key}': {detail}"),
    ))
}

/// Registry of delivered URLs and known usernames.
#[derive(Clone)]
pub struct DedupRegistry {
    store: Arc<dyn KeyValueStore>,
}

impl DedupRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Whether `url` has already been delivered. Unknown URLs are not.
    pub async fn is_delivered(&self, url: &str) -> Result<bool, PicrelayError> {
        match self.store.get(url.as_bytes()).await {
            Ok(value) => match value.as_slice() {
                [DELIVERED] => Ok(true),
                [NOT_DELIVERED] => Ok(false),
                other => Err(corrupt(url, format!("unexpected flag {other:?}"))),
            },
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn mark_delivered(&self, url: &str) -> Result<(), PicrelayError> {
        self.store.set(url.as_bytes(), &[DELIVERED]).await?;
        debug!(url, "marked as delivered");
        Ok(())
    }

    /// Resets the flag so the next run delivers `url` again.
    pub async fn forget(&self, url: &str) -> Result<(), PicrelayError> {
        self.store.set(url.as_bytes(), &[NOT_DELIVERED]).await?;
        info!(url, "delivery flag reset");
        Ok(())
    }

    /// Chat id of a user who has messaged the bot before.
    pub async fn resolve_user_id(&self, username: &str) -> Result<i64, PicrelayError> {
        let key = user_key(username);
        let value = match self.store.get(key.as_bytes()).await {
            Ok(value) => value,
            Err(e) if e.is_not_found() => {
                return Err(PicrelayError::UnknownUser {
                    username: username.to_string(),
                });
            }
            Err(e) => return Err(e),
        };
        let bytes: [u8; 8] = value
            .as_slice()
            .try_into()
            .map_err(|_| corrupt(&key, format!("expected 8 bytes, found {}", value.len())))?;
        Ok(i64::from_le_bytes(bytes))
    }

    /// Remembers the chat id of `username`. Unchanged mappings are not rewritten.
    pub async fn record_sighting(&self, username: &str, id: i64) -> Result<(), PicrelayError> {
        if username.trim().is_empty() {
            return Err(PicrelayError::Config("username cannot be empty".into()));
        }
        match self.resolve_user_id(username).await {
            Ok(known) if known == id => return Ok(()),
            Ok(_) | Err(PicrelayError::UnknownUser { .. }) => {}
            Err(e) => return Err(e),
        }
        self.store
            .set(user_key(username).as_bytes(), &id.to_le_bytes())
            .await?;
        info!(username = %username.to_lowercase(), id, "user id recorded");
        Ok(())
    }
}
