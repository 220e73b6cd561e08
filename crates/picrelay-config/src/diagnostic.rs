// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Every error names the dotted key it concerns (`telegram.bot_token`) and,
//! where a value is wrong or missing, the `PICRELAY_*` variable that can set
//! it instead of the TOML file.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, GraphicalReportHandler};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a key to be suggested.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key or section that picrelay does not know.
    #[error("unknown key `{key}` {}", location(.section))]
    #[diagnostic(
        code(picrelay::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Enclosing section, empty for a top-level key.
        section: String,
        suggestion: Option<String>,
        valid_keys: String,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(picrelay::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(code(picrelay::config::missing_key), help("{}", set_key_help(key)))]
    MissingKey { key: String },

    /// A value that parsed but cannot be used.
    #[error("invalid `{key}`: {detail}")]
    #[diagnostic(code(picrelay::config::validation), help("{}", set_key_help(key)))]
    Validation { key: String, detail: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(picrelay::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, detail: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            detail: detail.into(),
        }
    }

    /// Dotted key the error concerns, if any.
    pub fn key(&self) -> Option<String> {
        match self {
            Self::UnknownKey { key, section, .. } if section.is_empty() => Some(key.clone()),
            Self::UnknownKey { key, section, .. } => Some(format!("{section}.{key}")),
            Self::InvalidType { key, .. }
            | Self::MissingKey { key }
            | Self::Validation { key, .. } => Some(key.clone()),
            Self::Other(_) => None,
        }
    }
}

fn location(section: &str) -> String {
    if section.is_empty() {
        "at the top level".into()
    } else {
        format!("in [{section}]")
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

fn set_key_help(key: &str) -> String {
    format!("set `{key}` in picrelay.toml or via {}", env_var(key))
}

/// Environment variable overriding a dotted key.
pub fn env_var(key: &str) -> String {
    format!("PICRELAY_{}", key.replace('.', "_").to_uppercase())
}

/// Split a figment error (which may hold several) into diagnostics.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let section = error.path.join(".");
            match error.kind {
                Kind::UnknownField(field, expected) => ConfigError::UnknownKey {
                    suggestion: suggest_key(&field, expected),
                    valid_keys: expected.join(", "),
                    section: match error.path.split_last() {
                        Some((last, parent)) if *last == field => parent.join("."),
                        _ => section,
                    },
                    key: field,
                },
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: if section.is_empty() {
                        field.into_owned()
                    } else {
                        format!("{section}.{field}")
                    },
                },
                Kind::InvalidType(found, expected) => ConfigError::InvalidType {
                    key: section,
                    found: found.to_string(),
                    expected,
                },
                kind if section.is_empty() => ConfigError::Other(kind.to_string()),
                kind => ConfigError::Other(format!("{section}: {kind}")),
            }
        })
        .collect()
}

/// The valid key closest to `unknown`, if any is similar enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics with miette's graphical handler, one report each.
pub fn render_to_string(errors: &[ConfigError]) -> String {
    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => out.push_str(&buf),
            Err(_) => out.push_str(&format!("Error: {error}\n")),
        }
    }
    out
}

/// Print diagnostics to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    eprint!("{}", render_to_string(errors));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_flush_hour_for_typo() {
        assert_eq!(
            suggest_key("flush_hr", &["flush_hour"]),
            Some("flush_hour".to_string())
        );
    }

    #[test]
    fn picks_the_closest_of_several() {
        let valid = &["page_timeout_secs", "image_timeout_secs", "post_pattern"];
        assert_eq!(
            suggest_key("image_timout_secs", valid),
            Some("image_timeout_secs".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        assert_eq!(suggest_key("zzzzzz", &["bot_token", "chat", "admin"]), None);
    }

    #[test]
    fn env_var_follows_section_mapping() {
        assert_eq!(env_var("telegram.bot_token"), "PICRELAY_TELEGRAM_BOT_TOKEN");
        assert_eq!(
            env_var("rate_limit.max_per_minute"),
            "PICRELAY_RATE_LIMIT_MAX_PER_MINUTE"
        );
    }

    #[test]
    fn unknown_key_reports_its_section() {
        let err = ConfigError::UnknownKey {
            key: "bot_tken".into(),
            section: "telegram".into(),
            suggestion: Some("bot_token".into()),
            valid_keys: "bot_token, chat, admin".into(),
        };
        assert_eq!(err.to_string(), "unknown key `bot_tken` in [telegram]");
        assert_eq!(err.key().as_deref(), Some("telegram.bot_tken"));
    }

    #[test]
    fn rendered_validation_error_points_at_env_var() {
        let rendered = render_to_string(&[ConfigError::invalid(
            "report.flush_hour",
            "must be between 0 and 23, got 30",
        )]);
        assert!(rendered.contains("invalid `report.flush_hour`"), "{rendered}");
        assert!(rendered.contains("PICRELAY_REPORT_FLUSH_HOUR"), "{rendered}");
    }
}
