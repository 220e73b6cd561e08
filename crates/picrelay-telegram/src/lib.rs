// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram transport for picrelay.
//!
//! Implements [`Transport`] for the Telegram Bot API via teloxide:
//! text and photo delivery, chat lookups by handle, and polling of
//! pending updates for username sightings.

pub mod handler;
pub mod markdown;

use std::path::Path;

use async_trait::async_trait;
use picrelay_config::model::TelegramConfig;
use picrelay_core::{
    AdapterType, ChatTarget, HealthStatus, ParseMode, PicrelayError, PluginAdapter, Sighting,
    Transport,
};
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode as TgParseMode, Recipient};
use tracing::{debug, warn};

/// Telegram-backed [`Transport`].
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Creates a transport. Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, PicrelayError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            PicrelayError::Config(
                "telegram.bot_token is required (use --token or PICRELAY_BOT_TOKEN)".into(),
            )
        })?;

        if token.trim().is_empty() {
            return Err(PicrelayError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        Ok(Self {
            bot: Bot::new(token),
        })
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

fn recipient(target: &ChatTarget) -> Recipient {
    match target {
        ChatTarget::Id(id) => Recipient::Id(ChatId(*id)),
        ChatTarget::Handle(handle) => Recipient::ChannelUsername(handle.clone()),
    }
}

fn transport_err(context: &str, e: RequestError) -> PicrelayError {
    PicrelayError::Transport {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, PicrelayError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), PicrelayError> {
        debug!("Telegram transport shutting down");
        Ok(())
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(
        &self,
        target: &ChatTarget,
        text: &str,
        mode: ParseMode,
    ) -> Result<(), PicrelayError> {
        let to = recipient(target);
        if mode == ParseMode::MarkdownV2 {
            match self
                .bot
                .send_message(to.clone(), text)
                .parse_mode(TgParseMode::MarkdownV2)
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) if e.to_string().contains("can't parse entities") => {
                    warn!(error = %e, %target, "MarkdownV2 rejected, sending as plain text");
                }
                Err(e) => return Err(transport_err("failed to send message", e)),
            }
        }

        self.bot
            .send_message(to, text)
            .await
            .map_err(|e| transport_err("failed to send message", e))?;
        Ok(())
    }

    async fn send_image(
        &self,
        target: &ChatTarget,
        image: &Path,
        caption: &str,
    ) -> Result<(), PicrelayError> {
        let request = self
            .bot
            .send_photo(recipient(target), InputFile::file(image.to_path_buf()));
        let request = if caption.is_empty() {
            request
        } else {
            request.caption(caption)
        };
        request
            .await
            .map_err(|e| transport_err("failed to send image", e))?;
        Ok(())
    }

    async fn chat_info(&self, handle: &str) -> Result<i64, PicrelayError> {
        let chat = self
            .bot
            .get_chat(Recipient::ChannelUsername(handle.to_string()))
            .await
            .map_err(|e| transport_err(&format!("cannot get chat info for {handle}"), e))?;
        Ok(chat.id.0)
    }

    async fn poll_updates(&self) -> Result<Vec<Sighting>, PicrelayError> {
        let updates = self
            .bot
            .get_updates()
            .timeout(0)
            .await
            .map_err(|e| transport_err("failed to get updates", e))?;
        debug!(count = updates.len(), "received pending updates");
        Ok(handler::sightings_from_updates(&updates))
    }
}
