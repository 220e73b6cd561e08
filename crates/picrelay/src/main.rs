// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! picrelay - relays new images from a web page to a Telegram chat.
//!
//! This is the binary entry point. Each invocation runs one command and
//! exits; scheduling is left to cron or a systemd timer.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use picrelay_config::{ConfigError, PicrelayConfig};
use tracing::error;

const DEFAULT_MESSAGE: &str = "test message";

/// picrelay - relays new images from a web page to a Telegram chat.
#[derive(Parser, Debug)]
#[command(name = "picrelay", version, about, long_about = None)]
struct Cli {
    /// Use this config file instead of the standard hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Username of the administrator receiving reports and errors.
    #[arg(long, global = true)]
    admin: Option<String>,

    /// Broadcast chat handle, e.g. `@my_channel`.
    #[arg(long, global = true)]
    chat: Option<String>,

    /// Telegram bot token.
    #[arg(long, global = true, env = "PICRELAY_BOT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Commands {
    /// Deliver new images found on a page to the broadcast chat.
    Fetch {
        url: String,
        /// Stop after this many candidates (0 = no limit).
        #[arg(long, default_value_t = 0)]
        limit: u32,
    },
    /// Send a plain text message to a user.
    SendMsg {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = DEFAULT_MESSAGE)]
        message: String,
    },
    /// Send a plain text message to the broadcast chat.
    SendChatMsg {
        #[arg(long, default_value = DEFAULT_MESSAGE)]
        message: String,
    },
    /// Send an image file to a user.
    SendImg {
        #[arg(long)]
        username: String,
        path: PathBuf,
        #[arg(long, default_value = "")]
        caption: String,
    },
    /// Send an image file to the broadcast chat.
    SendChatImg {
        path: PathBuf,
        #[arg(long, default_value = "")]
        caption: String,
    },
    /// Send a message to the administrator.
    SendAdminMsg {
        #[arg(long, default_value = DEFAULT_MESSAGE)]
        message: String,
    },
    /// Mark an image URL as not delivered so the next fetch sends it again.
    ForgetImg { url: String },
    /// Send the current daily report to the administrator.
    Report,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(errors) => {
            picrelay_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let level = if cli.verbose {
        "debug"
    } else {
        config.agent.log_level.as_str()
    };
    init_tracing(level);

    if let Err(e) = commands::run(cli.command, config).await {
        error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

/// Loads and validates configuration, then applies command-line overrides.
fn load_config(cli: &Cli) -> Result<PicrelayConfig, Vec<ConfigError>> {
    let mut config = match &cli.config {
        Some(path) => picrelay_config::load_and_validate_path(path)?,
        None => picrelay_config::load_and_validate()?,
    };
    if let Some(admin) = &cli.admin {
        config.telegram.admin = Some(admin.clone());
    }
    if let Some(chat) = &cli.chat {
        config.telegram.chat = chat.clone();
    }
    if let Some(token) = &cli.token {
        config.telegram.bot_token = Some(token.clone());
    }
    picrelay_config::validation::validate_config(&config)?;
    Ok(config)
}

/// Initialize the tracing subscriber. `RUST_LOG` takes precedence.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("picrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
