// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web page and image fetching.

use async_trait::async_trait;

use crate::error::PicrelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::DownloadedImage;

/// HTTP-equivalent fetcher for source pages and image payloads.
#[async_trait]
pub trait PageFetcher: PluginAdapter {
    /// Fetches the page body as text.
    async fn fetch_page(&self, url: &str) -> Result<String, PicrelayError>;

    /// Downloads an image into a temporary file.
    ///
    /// Fails with [`PicrelayError::UnsupportedMediaType`] when the response
    /// is not one of the allowed image media types.
    async fn fetch_image(&self, url: &str) -> Result<DownloadedImage, PicrelayError>;
}
