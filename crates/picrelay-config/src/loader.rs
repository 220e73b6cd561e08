// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./picrelay.toml` > `~/.config/picrelay/picrelay.toml` >
//! `/etc/picrelay/picrelay.toml`, with `PICRELAY_` environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PicrelayConfig;

/// Config sections, used to map `PICRELAY_<SECTION>_<KEY>` onto `section.key`.
const SECTIONS: &[&str] = &["agent", "telegram", "storage", "fetch", "rate_limit", "report"];

/// Name of the config file looked up in each directory of the hierarchy.
pub const CONFIG_FILE_NAME: &str = "picrelay.toml";

/// Paths of the config file hierarchy, lowest priority first.
pub fn config_file_paths() -> Vec<std::path::PathBuf> {
    let mut paths = vec![Path::new("/etc/picrelay").join(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("picrelay").join(CONFIG_FILE_NAME));
    }
    paths.push(Path::new(CONFIG_FILE_NAME).to_path_buf());
    paths
}

/// Build the Figment for the standard hierarchy, before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(PicrelayConfig::default()));
    for path in config_file_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<PicrelayConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PicrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PicrelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PicrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PicrelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Environment provider mapping `PICRELAY_TELEGRAM_BOT_TOKEN` to
/// `telegram.bot_token`.
///
/// Splitting on `_` would turn `bot_token` into `bot.token`, so the section
/// prefix is matched explicitly instead. Variables without a known section
/// prefix (such as the CLI's `PICRELAY_BOT_TOKEN`) are left alone.
fn env_provider() -> Env {
    Env::prefixed("PICRELAY_")
        .filter(|key| section_key(key.as_str()).is_some())
        .map(|key| {
            section_key(key.as_str())
                .unwrap_or_else(|| key.as_str().to_string())
                .into()
        })
}

/// `telegram_bot_token` becomes `telegram.bot_token`.
fn section_key(key: &str) -> Option<String> {
    SECTIONS.iter().find_map(|section| {
        key.strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|field| !field.is_empty())
            .map(|field| format!("{section}.{field}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PICRELAY_TELEGRAM_BOT_TOKEN", "123:abc");
            jail.set_env("PICRELAY_RATE_LIMIT_MAX_PER_MINUTE", "10");
            jail.set_env("PICRELAY_REPORT_FLUSH_HOUR", "22");

            let config: PicrelayConfig = Figment::new()
                .merge(Serialized::defaults(PicrelayConfig::default()))
                .merge(env_provider())
                .extract()?;

            assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
            assert_eq!(config.rate_limit.max_per_minute, 10);
            assert_eq!(config.report.flush_hour, 22);
            Ok(())
        });
    }

    #[test]
    fn env_without_section_is_ignored() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PICRELAY_BOT_TOKEN", "123:abc");

            let config: PicrelayConfig = Figment::new()
                .merge(Serialized::defaults(PicrelayConfig::default()))
                .merge(env_provider())
                .extract()?;

            assert!(config.telegram.bot_token.is_none());
            Ok(())
        });
    }

    #[test]
    fn section_keys_keep_underscores_in_fields() {
        assert_eq!(
            section_key("rate_limit_max_per_second").as_deref(),
            Some("rate_limit.max_per_second")
        );
        assert_eq!(section_key("bot_token"), None);
        assert_eq!(section_key("telegram_"), None);
    }

    #[test]
    fn file_path_loading_reads_given_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
[telegram]
chat = "@elsewhere"
admin = "boss"
"#,
            )?;
            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert_eq!(config.telegram.chat, "@elsewhere");
            assert_eq!(config.telegram.admin.as_deref(), Some("boss"));
            Ok(())
        });
    }

    #[test]
    fn local_file_is_part_of_the_hierarchy() {
        let paths = config_file_paths();
        assert_eq!(paths.last().unwrap(), Path::new(CONFIG_FILE_NAME));
        assert!(paths[0].starts_with("/etc/picrelay"));
    }
}
