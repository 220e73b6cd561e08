// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for picrelay.

use thiserror::Error;

/// The error type shared by every adapter trait and core operation.
#[derive(Debug, Error)]
pub enum PicrelayError {
    /// Configuration errors (invalid values, missing token, empty usernames).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence failures (database connection, query failure, corrupt values).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The requested key has no record in the store.
    ///
    /// Expected during normal operation; callers translate it into
    /// domain-level "absent" semantics.
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// No numeric id is known for a username.
    #[error(
        "cannot find ID of the user '{username}'; the user must send /start to the bot first"
    )]
    UnknownUser { username: String },

    /// A downloaded payload is not one of the supported image types.
    #[error("unsupported media type: {media_type}")]
    UnsupportedMediaType { media_type: String },

    /// Messaging platform failures (network, API rejection, rate limiting).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// HTTP failures while fetching a page or an image.
    #[error("fetch error: {message}")]
    Fetch {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation was interrupted by a shutdown request.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PicrelayError {
    /// Wraps any error as a storage failure.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        PicrelayError::Storage {
            source: Box::new(err),
        }
    }

    /// Returns `true` for the store's "no such key" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PicrelayError::NotFound { .. })
    }
}
