// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound messaging transport (Telegram, mocks).

use std::path::Path;

use async_trait::async_trait;

use crate::error::PicrelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatTarget, ParseMode, Sighting};

/// Messaging platform client.
///
/// Implementations perform exactly one API call per method; throttling is the
/// caller's job.
#[async_trait]
pub trait Transport: PluginAdapter {
    /// Sends a text message. With [`ParseMode::MarkdownV2`] the text must
    /// already be escaped.
    async fn send_text(
        &self,
        target: &ChatTarget,
        text: &str,
        mode: ParseMode,
    ) -> Result<(), PicrelayError>;

    /// Uploads the image at `image` with an optional caption.
    async fn send_image(
        &self,
        target: &ChatTarget,
        image: &Path,
        caption: &str,
    ) -> Result<(), PicrelayError>;

    /// Resolves a public handle (`@name`) to its numeric chat id.
    async fn chat_info(&self, handle: &str) -> Result<i64, PicrelayError>;

    /// Returns users who have written to the bot since updates were last
    /// confirmed.
    async fn poll_updates(&self) -> Result<Vec<Sighting>, PicrelayError>;
}
