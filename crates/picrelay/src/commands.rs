// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command execution: adapter assembly and dispatch onto the [`Relay`].

use std::sync::Arc;

use picrelay_agent::shutdown::install_signal_handler;
use picrelay_agent::{Adapters, Relay, forget_img};
use picrelay_config::PicrelayConfig;
use picrelay_core::{KeyValueStore, PicrelayError, PluginAdapter, SystemClock};
use picrelay_scrape::HttpFetcher;
use picrelay_storage::SqliteStore;
use picrelay_telegram::TelegramTransport;
use tracing::{debug, info, warn};

use crate::Commands;

/// Runs one command to completion.
pub(crate) async fn run(command: Commands, config: PicrelayConfig) -> Result<(), PicrelayError> {
    let store = Arc::new(SqliteStore::open(config.storage.clone()).await?);
    debug!(path = %config.storage.database_path, "store opened");
    run_on_store(command, &config, store).await
}

/// Runs `command` over an opened store. The store is closed on every path.
async fn run_on_store(
    command: Commands,
    config: &PicrelayConfig,
    store: Arc<dyn KeyValueStore>,
) -> Result<(), PicrelayError> {
    if let Commands::ForgetImg { url } = &command {
        let result = forget_img(store.clone(), url).await;
        close_store(store.as_ref()).await;
        return result;
    }

    let relay = match connect(config, store.clone()).await {
        Ok(relay) => relay,
        Err(e) => {
            close_store(store.as_ref()).await;
            return Err(e);
        }
    };

    let result = execute(&relay, command).await;
    if let Err(e) = relay.shutdown().await {
        warn!(error = %e, "shutdown failed");
    }
    result
}

async fn connect(
    config: &PicrelayConfig,
    store: Arc<dyn KeyValueStore>,
) -> Result<Relay, PicrelayError> {
    let transport = TelegramTransport::new(&config.telegram)?;
    if let Some(token) = config.telegram.bot_token.as_deref() {
        info!(token = %shorten_token(token), "telegram transport ready");
    }
    let fetcher = HttpFetcher::new(&config.fetch)?;

    let adapters = Adapters {
        store,
        transport: Arc::new(transport),
        fetcher: Arc::new(fetcher),
        clock: Arc::new(SystemClock),
    };
    Relay::connect(config, adapters, install_signal_handler()).await
}

async fn execute(relay: &Relay, command: Commands) -> Result<(), PicrelayError> {
    match command {
        Commands::Fetch { url, limit } => {
            let stats = relay.fetch(&url, limit).await?;
            info!(
                total = stats.total,
                new = stats.new_items(),
                skipped = stats.skipped,
                errors = stats.errors,
                "fetch finished"
            );
            Ok(())
        }
        Commands::SendMsg { username, message } => relay.send_msg(&username, &message).await,
        Commands::SendChatMsg { message } => relay.send_chat_msg(&message).await,
        Commands::SendImg {
            username,
            path,
            caption,
        } => relay.send_img(&username, &path, &caption).await,
        Commands::SendChatImg { path, caption } => relay.send_chat_img(&path, &caption).await,
        Commands::SendAdminMsg { message } => relay.send_admin_msg(&message).await,
        Commands::Report => relay.report().await,
        Commands::ForgetImg { url } => Err(PicrelayError::Internal(format!(
            "forget-img {url} must run without a transport"
        ))),
    }
}

async fn close_store(store: &dyn KeyValueStore) {
    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "store shutdown failed");
    }
}

/// `1234...abcd` for logs; short tokens are fully masked.
pub(crate) fn shorten_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "***".into();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
