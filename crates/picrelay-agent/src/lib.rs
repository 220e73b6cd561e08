// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image relay core for picrelay.
//!
//! The [`Relay`] is the central coordinator that:
//! - Resolves the broadcast chat and the administrator at startup
//! - Records usernames seen in pending updates
//! - Runs the fetch-and-deliver pipeline with deduplication
//! - Accumulates and flushes the daily report
//! - Implements every operator command on top of the rate-limited dispatcher

pub mod dedup;
pub mod dispatch;
pub mod extract;
pub mod pipeline;
pub mod report;
pub mod shutdown;

use std::path::Path;
use std::sync::Arc;

use picrelay_config::PicrelayConfig;
use picrelay_core::{
    ChatTarget, Clock, KeyValueStore, PageFetcher, ParseMode, PicrelayError, RunStats, Transport,
};
use picrelay_ratelimit::RateLimitPolicy;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use dedup::DedupRegistry;
pub use dispatch::Dispatcher;
pub use extract::CandidateExtractor;
pub use pipeline::{DeliveryOutcome, DeliveryPipeline};
pub use report::{DailyReport, DailyReportAggregator};

/// The adapters a [`Relay`] is assembled from.
#[derive(Clone)]
pub struct Adapters {
    pub store: Arc<dyn KeyValueStore>,
    pub transport: Arc<dyn Transport>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub clock: Arc<dyn Clock>,
}

/// A connected relay, ready to run commands.
pub struct Relay {
    adapters: Adapters,
    dedup: DedupRegistry,
    dispatcher: Arc<Dispatcher>,
    pipeline: DeliveryPipeline,
    report: Arc<DailyReportAggregator>,
}

impl Relay {
    /// Resolves the broadcast chat, records pending sightings and looks up
    /// the administrator.
    ///
    /// An unknown administrator is not fatal: notifications are disabled
    /// with a warning.
    pub async fn connect(
        config: &PicrelayConfig,
        adapters: Adapters,
        cancel: CancellationToken,
    ) -> Result<Self, PicrelayError> {
        let policy = RateLimitPolicy::new(
            config.rate_limit.max_per_minute,
            config.rate_limit.max_per_second,
        )?;
        let extractor = CandidateExtractor::from_config(&config.fetch)?;
        let dedup = DedupRegistry::new(adapters.store.clone());

        let chat_handle = config.telegram.chat.as_str();
        let chat_id = adapters.transport.chat_info(chat_handle).await?;
        info!(chat = chat_handle, id = chat_id, "broadcast chat resolved");

        let sightings = adapters.transport.poll_updates().await?;
        debug!(count = sightings.len(), "recording sightings");
        for sighting in &sightings {
            dedup.record_sighting(&sighting.username, sighting.id).await?;
        }

        let admin = match config.telegram.admin.as_deref().map(str::trim) {
            None | Some("") => {
                info!("no administrator configured, notifications disabled");
                None
            }
            Some(name) => match dedup.resolve_user_id(name).await {
                Ok(id) => {
                    debug!(admin = name, id, "administrator resolved");
                    Some(id)
                }
                Err(e @ PicrelayError::UnknownUser { .. }) => {
                    warn!(error = %e, "administrator notifications disabled");
                    None
                }
                Err(e) => return Err(e),
            },
        };

        let dispatcher = Arc::new(
            Dispatcher::new(
                adapters.transport.clone(),
                dedup.clone(),
                policy,
                ChatTarget::Id(chat_id),
                cancel,
            )
            .with_admin(admin),
        );
        let report = Arc::new(DailyReportAggregator::new(
            adapters.store.clone(),
            dispatcher.clone(),
            adapters.clock.clone(),
            config.report.flush_hour,
        ));
        let pipeline = DeliveryPipeline::new(
            adapters.fetcher.clone(),
            dedup.clone(),
            dispatcher.clone(),
            extractor,
            report.clone(),
        );

        Ok(Self {
            adapters,
            dedup,
            dispatcher,
            pipeline,
            report,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn dedup(&self) -> &DedupRegistry {
        &self.dedup
    }

    /// Delivers new images from `url` to the broadcast chat.
    pub async fn fetch(&self, url: &str, limit: u32) -> Result<RunStats, PicrelayError> {
        self.pipeline.run(url, limit).await
    }

    /// Plain text to a user or `@handle`.
    pub async fn send_msg(&self, recipient: &str, message: &str) -> Result<(), PicrelayError> {
        let target = self.dispatcher.resolve(recipient).await?;
        self.dispatcher
            .send_text(&target, message, ParseMode::Plain)
            .await
    }

    /// Plain text to the broadcast chat.
    pub async fn send_chat_msg(&self, message: &str) -> Result<(), PicrelayError> {
        let chat = self.dispatcher.chat().clone();
        self.dispatcher
            .send_text(&chat, message, ParseMode::Plain)
            .await
    }

    pub async fn send_img(
        &self,
        recipient: &str,
        image: &Path,
        caption: &str,
    ) -> Result<(), PicrelayError> {
        let target = self.dispatcher.resolve(recipient).await?;
        self.dispatcher.send_image(&target, image, caption).await
    }

    pub async fn send_chat_img(&self, image: &Path, caption: &str) -> Result<(), PicrelayError> {
        let chat = self.dispatcher.chat().clone();
        self.dispatcher.send_image(&chat, image, caption).await
    }

    /// Escaped MarkdownV2 text to the administrator.
    pub async fn send_admin_msg(&self, message: &str) -> Result<(), PicrelayError> {
        self.require_admin()?;
        self.dispatcher.notify_admin(message).await
    }

    /// Sends the current daily report without resetting it.
    pub async fn report(&self) -> Result<(), PicrelayError> {
        self.require_admin()?;
        self.report.send_current().await
    }

    fn require_admin(&self) -> Result<(), PicrelayError> {
        if self.dispatcher.admin().is_none() {
            return Err(PicrelayError::Config(
                "administrator is not configured or has not messaged the bot".into(),
            ));
        }
        Ok(())
    }

    /// Flushes adapters before exit.
    pub async fn shutdown(&self) -> Result<(), PicrelayError> {
        self.adapters.transport.shutdown().await?;
        self.adapters.store.shutdown().await
    }
}

/// Resets the delivery flag of `url`. Touches only the store.
pub async fn forget_img(store: Arc<dyn KeyValueStore>, url: &str) -> Result<(), PicrelayError> {
    DedupRegistry::new(store).forget(url).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use picrelay_test_utils::{ManualClock, MemoryStore, MockFetcher, MockTransport};

    struct Fixture {
        store: Arc<MemoryStore>,
        transport: Arc<MockTransport>,
        adapters: Adapters,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::new());
        transport.add_chat("@picrelay_posts", -100).await;
        let adapters = Adapters {
            store: store.clone(),
            transport: transport.clone(),
            fetcher: Arc::new(MockFetcher::new()),
            clock: Arc::new(ManualClock::at(2024, 1, 1, 12, 0, 0)),
        };
        Fixture {
            store,
            transport,
            adapters,
        }
    }

    fn config(admin: Option<&str>) -> PicrelayConfig {
        let mut config = PicrelayConfig::default();
        config.telegram.admin = admin.map(str::to_string);
        config
    }

    #[tokio::test(start_paused = true)]
    async fn connect_records_sightings_and_resolves_admin() {
        let f = fixture().await;
        f.transport.push_sighting("Boss", 7).await;

        let relay = Relay::connect(&config(Some("boss")), f.adapters, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(relay.dispatcher().chat(), &ChatTarget::Id(-100));
        assert_eq!(relay.dispatcher().admin(), Some(&ChatTarget::Id(7)));
        assert_eq!(
            f.store.raw(b"username_boss").await,
            Some(7i64.to_le_bytes().to_vec())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_admin_disables_notifications() {
        let f = fixture().await;
        let relay = Relay::connect(&config(Some("ghost")), f.adapters, CancellationToken::new())
            .await
            .unwrap();
        assert!(relay.dispatcher().admin().is_none());
        assert!(matches!(
            relay.send_admin_msg("hi").await,
            Err(PicrelayError::Config(_))
        ));
        assert!(matches!(relay.report().await, Err(PicrelayError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_chat_is_fatal() {
        let f = fixture().await;
        let mut cfg = config(None);
        cfg.telegram.chat = "@missing".into();
        assert!(
            Relay::connect(&cfg, f.adapters, CancellationToken::new())
                .await
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_msg_requires_a_known_user() {
        let f = fixture().await;
        f.transport.push_sighting("alice", 42).await;
        let relay = Relay::connect(&config(None), f.adapters, CancellationToken::new())
            .await
            .unwrap();

        relay.send_msg("Alice", "test message").await.unwrap();
        assert_eq!(
            f.transport.texts_to(&ChatTarget::Id(42)).await,
            vec!["test message".to_string()]
        );
        assert!(matches!(
            relay.send_msg("bob", "x").await,
            Err(PicrelayError::UnknownUser { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn chat_commands_target_the_resolved_chat() {
        let f = fixture().await;
        let relay = Relay::connect(&config(None), f.adapters, CancellationToken::new())
            .await
            .unwrap();
        relay.send_chat_msg("hello").await.unwrap();

        let image = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(image.path(), b"gif").unwrap();
        relay.send_chat_img(image.path(), "caption").await.unwrap();

        let sent = f.transport.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|s| s.target() == &ChatTarget::Id(-100)));
    }

    #[tokio::test(start_paused = true)]
    async fn admin_message_is_escaped() {
        let f = fixture().await;
        f.transport.push_sighting("boss", 7).await;
        let relay = Relay::connect(&config(Some("boss")), f.adapters, CancellationToken::new())
            .await
            .unwrap();
        relay.send_admin_msg("v1.2 released!").await.unwrap();
        assert_eq!(
            f.transport.texts_to(&ChatTarget::Id(7)).await,
            vec![r"v1\.2 released\!".to_string()]
        );
    }

    #[tokio::test]
    async fn forget_img_only_touches_the_store() {
        let store = Arc::new(MemoryStore::new());
        store.insert(b"https://img/a.png", &[1]).await;
        forget_img(store.clone(), "https://img/a.png").await.unwrap();
        assert_eq!(store.raw(b"https://img/a.png").await, Some(vec![0]));
    }
}
