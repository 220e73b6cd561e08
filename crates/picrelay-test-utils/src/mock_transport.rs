// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic testing.
//!
//! `MockTransport` captures every text and image delivery for assertions,
//! answers chat lookups from a registered table, and hands out queued
//! sightings on `poll_updates`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use picrelay_core::{
    AdapterType, ChatTarget, HealthStatus, ParseMode, PicrelayError, PluginAdapter, Sighting,
    Transport,
};

/// One captured delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        target: ChatTarget,
        text: String,
        mode: ParseMode,
    },
    Image {
        target: ChatTarget,
        caption: String,
        /// File contents at the time of sending.
        bytes: Vec<u8>,
    },
}

impl Sent {
    pub fn target(&self) -> &ChatTarget {
        match self {
            Sent::Text { target, .. } | Sent::Image { target, .. } => target,
        }
    }
}

/// A recording [`Transport`].
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Mutex<Vec<Sent>>,
    chats: Mutex<HashMap<String, i64>>,
    pending: Mutex<Vec<Sighting>>,
    fail_texts: AtomicUsize,
    fail_images: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chat handle (e.g. `@posts`) for `chat_info`.
    pub async fn add_chat(&self, handle: &str, id: i64) {
        self.chats.lock().await.insert(handle.to_lowercase(), id);
    }

    /// Queue a sighting for the next `poll_updates`.
    pub async fn push_sighting(&self, username: &str, id: i64) {
        self.pending.lock().await.push(Sighting {
            username: username.to_lowercase(),
            id,
        });
    }

    /// Fail the next `n` text sends.
    pub fn fail_next_texts(&self, n: usize) {
        self.fail_texts.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` image sends.
    pub fn fail_next_images(&self, n: usize) {
        self.fail_images.store(n, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }

    /// Texts delivered to `target`, in order.
    pub async fn texts_to(&self, target: &ChatTarget) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::Text { target: t, text, .. } if t == target => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of images delivered to any target.
    pub async fn image_count(&self) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|s| matches!(s, Sent::Image { .. }))
            .count()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn injected(what: &str) -> PicrelayError {
    PicrelayError::Transport {
        message: format!("injected {what} failure"),
        source: None,
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, PicrelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PicrelayError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(
        &self,
        target: &ChatTarget,
        text: &str,
        mode: ParseMode,
    ) -> Result<(), PicrelayError> {
        if Self::take_failure(&self.fail_texts) {
            return Err(injected("text send"));
        }
        self.sent.lock().await.push(Sent::Text {
            target: target.clone(),
            text: text.to_string(),
            mode,
        });
        Ok(())
    }

    async fn send_image(
        &self,
        target: &ChatTarget,
        image: &Path,
        caption: &str,
    ) -> Result<(), PicrelayError> {
        if Self::take_failure(&self.fail_images) {
            return Err(injected("image send"));
        }
        let bytes = tokio::fs::read(image).await.map_err(|e| PicrelayError::Transport {
            message: format!("cannot read {}: {e}", image.display()),
            source: Some(Box::new(e)),
        })?;
        self.sent.lock().await.push(Sent::Image {
            target: target.clone(),
            caption: caption.to_string(),
            bytes,
        });
        Ok(())
    }

    async fn chat_info(&self, handle: &str) -> Result<i64, PicrelayError> {
        self.chats
            .lock()
            .await
            .get(&handle.to_lowercase())
            .copied()
            .ok_or_else(|| PicrelayError::Transport {
                message: format!("chat not found: {handle}"),
                source: None,
            })
    }

    async fn poll_updates(&self) -> Result<Vec<Sighting>, PicrelayError> {
        Ok(std::mem::take(&mut *self.pending.lock().await))
    }
}
