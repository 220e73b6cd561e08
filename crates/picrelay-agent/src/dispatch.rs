// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate-limited outbound delivery.
//!
//! Every transport call goes through [`Dispatcher`], which waits on the
//! destination's limiter first. Administrator notifications use their own
//! limiter registry so a busy broadcast chat never delays them.

use std::path::Path;
use std::sync::Arc;

use picrelay_core::{ChatTarget, ParseMode, PicrelayError, Transport};
use picrelay_ratelimit::{LimiterRegistry, RateLimitPolicy};
use picrelay_telegram::markdown::escape_markdown_v2;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dedup::DedupRegistry;

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    dedup: DedupRegistry,
    limits: LimiterRegistry,
    admin_limits: LimiterRegistry,
    chat: ChatTarget,
    admin: Option<ChatTarget>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        dedup: DedupRegistry,
        policy: RateLimitPolicy,
        chat: ChatTarget,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            dedup,
            limits: LimiterRegistry::new(policy),
            admin_limits: LimiterRegistry::new(policy),
            chat,
            admin: None,
            cancel,
        }
    }

    /// Sets the administrator chat id. `None` disables notifications.
    pub fn with_admin(mut self, admin: Option<i64>) -> Self {
        self.admin = admin.map(ChatTarget::Id);
        self
    }

    /// The broadcast chat.
    pub fn chat(&self) -> &ChatTarget {
        &self.chat
    }

    pub fn admin(&self) -> Option<&ChatTarget> {
        self.admin.as_ref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Turns a recipient string into a target.
    ///
    /// `@name` is a channel or group handle; anything else is a username
    /// that must have messaged the bot before.
    pub async fn resolve(&self, recipient: &str) -> Result<ChatTarget, PicrelayError> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(PicrelayError::Config("recipient cannot be empty".into()));
        }
        if recipient.starts_with('@') {
            return Ok(ChatTarget::Handle(recipient.to_string()));
        }
        let id = self.dedup.resolve_user_id(recipient).await?;
        Ok(ChatTarget::Id(id))
    }

    pub async fn send_text(
        &self,
        target: &ChatTarget,
        text: &str,
        mode: ParseMode,
    ) -> Result<(), PicrelayError> {
        self.limits.wait(&target.limiter_key(), &self.cancel).await?;
        self.transport.send_text(target, text, mode).await?;
        debug!(%target, %mode, "message sent");
        Ok(())
    }

    pub async fn send_image(
        &self,
        target: &ChatTarget,
        image: &Path,
        caption: &str,
    ) -> Result<(), PicrelayError> {
        self.limits.wait(&target.limiter_key(), &self.cancel).await?;
        self.transport.send_image(target, image, caption).await?;
        info!(%target, file = %image.display(), "image sent");
        Ok(())
    }

    /// Escapes `markup` and sends it to the administrator as MarkdownV2.
    ///
    /// Does nothing when no administrator is known.
    pub async fn notify_admin(&self, markup: &str) -> Result<(), PicrelayError> {
        let Some(admin) = &self.admin else {
            debug!("no administrator, notification dropped");
            return Ok(());
        };
        self.admin_limits
            .wait(&admin.limiter_key(), &self.cancel)
            .await?;
        self.transport
            .send_text(admin, &escape_markdown_v2(markup), ParseMode::MarkdownV2)
            .await
    }
}
