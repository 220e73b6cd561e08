// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the relay.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tempfile::TempPath;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Transport,
    Fetcher,
}

/// A resolved messaging destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    /// Numeric chat id (users, resolved channels).
    Id(i64),
    /// Public channel or group handle, including the leading `@`.
    Handle(String),
}

impl ChatTarget {
    /// Key identifying this destination in the limiter registry.
    pub fn limiter_key(&self) -> String {
        match self {
            ChatTarget::Id(id) => id.to_string(),
            ChatTarget::Handle(handle) => handle.to_lowercase(),
        }
    }
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTarget::Id(id) => write!(f, "{id}"),
            ChatTarget::Handle(handle) => f.write_str(handle),
        }
    }
}

/// Text formatting mode for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ParseMode {
    /// No markup; the text is shown verbatim.
    Plain,
    /// Telegram MarkdownV2; the text must already be escaped.
    MarkdownV2,
}

/// An inbound contact observed by the transport: a user who wrote to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    pub username: String,
    pub id: i64,
}

/// An image downloaded to a temporary file.
///
/// The file is deleted when the value is dropped, on every exit path.
#[derive(Debug)]
pub struct DownloadedImage {
    pub path: TempPath,
    pub media_type: String,
}

impl DownloadedImage {
    /// Location of the temporary file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Tallies of one fetch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Candidates processed (respecting the optional limit).
    pub total: u32,
    /// Candidates that had been delivered before.
    pub skipped: u32,
    /// Candidates whose delivery failed.
    pub errors: u32,
    /// Text of the most recent failure in this run, empty if none.
    pub last_error: String,
}

impl RunStats {
    /// Candidates that were not skipped: `total - skipped`.
    pub fn new_items(&self) -> u32 {
        self.total.saturating_sub(self.skipped)
    }

    /// Whether the run is worth a summary notification.
    pub fn is_eventful(&self) -> bool {
        self.errors > 0 || self.new_items() > 0
    }
}
