// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! rejected at startup instead of silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level picrelay configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PicrelayConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Telegram bot, broadcast chat and administrator.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Key-value store location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Page scraping and image download.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Outbound message throttling.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Daily administrator report.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token. Required by every command that talks to Telegram.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Handle of the channel images are broadcast to.
    #[serde(default = "default_chat")]
    pub chat: String,

    /// Username of the administrator receiving error reports and the daily
    /// report. `None` disables admin notifications.
    #[serde(default)]
    pub admin: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat: default_chat(),
            admin: None,
        }
    }
}

fn default_chat() -> String {
    "@picrelay_posts".to_string()
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("picrelay").join("picrelay.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("picrelay.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Page scraping and download configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    /// Timeout for fetching the source page, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Timeout for downloading one image, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub image_timeout_secs: u64,

    /// Regular expression locating post images. The first capture group is
    /// the image URL.
    #[serde(default = "default_post_pattern")]
    pub post_pattern: String,

    /// Image URLs that are never forwarded (placeholders, banners).
    #[serde(default = "default_ignored_images")]
    pub ignored_images: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_timeout_secs: default_timeout_secs(),
            image_timeout_secs: default_timeout_secs(),
            post_pattern: default_post_pattern(),
            ignored_images: default_ignored_images(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_post_pattern() -> String {
    r#"(?si)<div class="singlePost.*?<div class="postInner">\s*?<div class="paragraph">[^<]*<div[^<]*<img src=["'](.*?)["']"#
        .to_string()
}

fn default_ignored_images() -> Vec<String> {
    vec!["https://i.imgur.com/sMhpFyR.jpg".to_string()]
}

/// Throttling policy applied per destination.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Maximum calls to one destination within any 60 second window.
    #[serde(default = "default_max_per_minute")]
    pub max_per_minute: u32,

    /// Maximum call rate to one destination; `1 / max_per_second` is the
    /// minimum spacing between two calls.
    #[serde(default = "default_max_per_second")]
    pub max_per_second: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_minute: default_max_per_minute(),
            max_per_second: default_max_per_second(),
        }
    }
}

fn default_max_per_minute() -> u32 {
    20
}

fn default_max_per_second() -> f64 {
    1.0
}

/// Daily report configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Local hour (0-23) after which the daily report is flushed.
    #[serde(default = "default_flush_hour")]
    pub flush_hour: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            flush_hour: default_flush_hour(),
        }
    }
}

fn default_flush_hour() -> u32 {
    23
}
