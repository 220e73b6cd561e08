// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP fetching for picrelay.
//!
//! [`HttpFetcher`] implements [`PageFetcher`] with reqwest: pages are read
//! as text, images are streamed into temporary files that are deleted when
//! the returned [`DownloadedImage`] is dropped.

pub mod media;

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use picrelay_config::model::FetchConfig;
use picrelay_core::{
    AdapterType, DownloadedImage, HealthStatus, PageFetcher, PicrelayError, PluginAdapter,
};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("picrelay/", env!("CARGO_PKG_VERSION"));

/// reqwest-backed [`PageFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    page_timeout: Duration,
    image_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, PicrelayError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| fetch_err("failed to build HTTP client", e))?;
        Ok(Self {
            client,
            page_timeout: Duration::from_secs(config.page_timeout_secs),
            image_timeout: Duration::from_secs(config.image_timeout_secs),
        })
    }

    /// Issues a GET and returns the response with its normalized media type.
    /// Anything but `200 OK` is turned into a [`PicrelayError::Fetch`].
    async fn get(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<(reqwest::Response, String), PicrelayError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| fetch_err(&format!("GET {url} failed"), e))?;

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media::media_type)
            .unwrap_or_default();
        debug!(url, status = %response.status(), media_type, "response received");

        if response.status() != StatusCode::OK {
            return Err(status_error(response, &media_type).await);
        }
        Ok((response, media_type))
    }
}

fn fetch_err(context: &str, e: impl std::error::Error + Send + Sync + 'static) -> PicrelayError {
    PicrelayError::Fetch {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Builds the error for a non-200 response, quoting textual bodies.
async fn status_error(response: reqwest::Response, media_type: &str) -> PicrelayError {
    let status = response.status().as_u16();
    let text = if media::is_textual(media_type) {
        match response.text().await {
            Ok(body) => media::excerpt(&body),
            Err(e) => e.to_string(),
        }
    } else {
        String::new()
    };
    PicrelayError::Fetch {
        message: format!("http error {status}:\n{text}"),
        source: None,
    }
}

#[async_trait]
impl PluginAdapter for HttpFetcher {
    fn name(&self) -> &str {
        "http"
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
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, PicrelayError> {
        let (response, _) = self.get(url, self.page_timeout).await?;
        response
            .text()
            .await
            .map_err(|e| fetch_err("failed to read page body", e))
    }

    async fn fetch_image(&self, url: &str) -> Result<DownloadedImage, PicrelayError> {
        let (mut response, media_type) = self.get(url, self.image_timeout).await?;

        let ext = media::image_extension(&media_type).ok_or_else(|| {
            PicrelayError::UnsupportedMediaType {
                media_type: media_type.clone(),
            }
        })?;

        let mut file = tempfile::Builder::new()
            .prefix("picrelay-")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .map_err(|e| fetch_err("cannot create temp file", e))?;

        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_err("failed to read image body", e))?
        {
            file.write_all(&chunk)
                .map_err(|e| fetch_err("failed to write temp file", e))?;
            written += chunk.len();
        }
        file.flush()
            .map_err(|e| fetch_err("failed to write temp file", e))?;

        let path = file.into_temp_path();
        info!(file = %path.display(), bytes = written, "image downloaded");
        Ok(DownloadedImage { path, media_type })
    }
}
