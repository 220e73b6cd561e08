// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock page fetcher serving canned pages and images.

use std::collections::HashMap;
use std::io::Write;

use async_trait::async_trait;
use tokio::sync::Mutex;

use picrelay_core::{
    AdapterType, DownloadedImage, HealthStatus, PageFetcher, PicrelayError, PluginAdapter,
};

#[derive(Debug, Clone)]
enum Canned<T> {
    Ok(T),
    Fail(String),
}

#[derive(Debug, Clone)]
struct CannedImage {
    media_type: String,
    bytes: Vec<u8>,
}

/// A [`PageFetcher`] backed by lookup tables. Unknown URLs answer with a
/// 404-style fetch error.
#[derive(Debug, Default)]
pub struct MockFetcher {
    pages: Mutex<HashMap<String, Canned<String>>>,
    images: Mutex<HashMap<String, Canned<CannedImage>>>,
    image_requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_page(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .await
            .insert(url.to_string(), Canned::Ok(html.to_string()));
    }

    pub async fn fail_page(&self, url: &str, message: &str) {
        self.pages
            .lock()
            .await
            .insert(url.to_string(), Canned::Fail(message.to_string()));
    }

    pub async fn set_image(&self, url: &str, media_type: &str, bytes: &[u8]) {
        self.images.lock().await.insert(
            url.to_string(),
            Canned::Ok(CannedImage {
                media_type: media_type.to_string(),
                bytes: bytes.to_vec(),
            }),
        );
    }

    pub async fn fail_image(&self, url: &str, message: &str) {
        self.images
            .lock()
            .await
            .insert(url.to_string(), Canned::Fail(message.to_string()));
    }

    /// Image URLs requested so far, in order.
    pub async fn image_requests(&self) -> Vec<String> {
        self.image_requests.lock().await.clone()
    }
}

fn fetch_error(message: String) -> PicrelayError {
    PicrelayError::Fetch {
        message,
        source: None,
    }
}

#[async_trait]
impl PluginAdapter for MockFetcher {
    fn name(&self) -> &str {
        "mock-fetcher"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Fetcher
    }

    async fn health_check(&self) -> Result<HealthStatus, PicrelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PicrelayError> {
        Ok(())
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, PicrelayError> {
        match self.pages.lock().await.get(url).cloned() {
            Some(Canned::Ok(html)) => Ok(html),
            Some(Canned::Fail(message)) => Err(fetch_error(message)),
            None => Err(fetch_error("http error 404:\n".into())),
        }
    }

    async fn fetch_image(&self, url: &str) -> Result<DownloadedImage, PicrelayError> {
        self.image_requests.lock().await.push(url.to_string());
        let image = match self.images.lock().await.get(url).cloned() {
            Some(Canned::Ok(image)) => image,
            Some(Canned::Fail(message)) => return Err(fetch_error(message)),
            None => return Err(fetch_error("http error 404:\n".into())),
        };

        let mut file = tempfile::NamedTempFile::new().map_err(PicrelayError::storage)?;
        file.write_all(&image.bytes).map_err(PicrelayError::storage)?;
        Ok(DownloadedImage {
            path: file.into_temp_path(),
            media_type: image.media_type,
        })
    }
}
