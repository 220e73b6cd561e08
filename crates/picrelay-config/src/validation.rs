// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::PicrelayConfig;

/// Validate a deserialized configuration.
///
/// Collects every problem instead of failing on the first one.
pub fn validate_config(config: &PicrelayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid =
        |key: &str, detail: String| errors.push(ConfigError::invalid(key, detail));

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path", "must not be empty".into());
    }

    let chat = config.telegram.chat.trim();
    if chat.len() < 2 || !chat.starts_with('@') {
        invalid(
            "telegram.chat",
            format!("must be a channel handle starting with `@`, got `{chat}`"),
        );
    }

    if let Some(admin) = &config.telegram.admin
        && admin.trim().is_empty()
    {
        invalid("telegram.admin", "must not be empty when set".into());
    }

    let limits = &config.rate_limit;
    if limits.max_per_minute < 2 {
        invalid(
            "rate_limit.max_per_minute",
            format!("must be at least 2, got {}", limits.max_per_minute),
        );
    }
    if !(limits.max_per_second.is_finite() && limits.max_per_second > 0.0) {
        invalid(
            "rate_limit.max_per_second",
            format!("must be positive, got {}", limits.max_per_second),
        );
    } else if f64::from(limits.max_per_minute) / limits.max_per_second > 60.0 {
        invalid(
            "rate_limit.max_per_minute",
            format!(
                "{} cannot be reached at max_per_second {} within a minute",
                limits.max_per_minute, limits.max_per_second
            ),
        );
    }

    if config.report.flush_hour > 23 {
        invalid(
            "report.flush_hour",
            format!("must be between 0 and 23, got {}", config.report.flush_hour),
        );
    }

    if config.fetch.page_timeout_secs == 0 {
        invalid("fetch.page_timeout_secs", "must be positive".into());
    }
    if config.fetch.image_timeout_secs == 0 {
        invalid("fetch.image_timeout_secs", "must be positive".into());
    }

    match regex::Regex::new(&config.fetch.post_pattern) {
        Ok(re) if re.captures_len() != 2 => invalid(
            "fetch.post_pattern",
            format!(
                "must have exactly one capture group, found {}",
                re.captures_len() - 1
            ),
        ),
        Ok(_) => {}
        Err(e) => invalid("fetch.post_pattern", format!("not a valid regex: {e}")),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &PicrelayConfig) -> Vec<String> {
        validate_config(config)
            .err()
            .unwrap_or_default()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&PicrelayConfig::default()).is_ok());
    }

    #[test]
    fn chat_must_be_a_handle() {
        let mut config = PicrelayConfig::default();
        config.telegram.chat = "posts".into();
        let errs = messages(&config);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("telegram.chat"));

        let err = &validate_config(&config).unwrap_err()[0];
        assert_eq!(err.key().as_deref(), Some("telegram.chat"));
    }

    #[test]
    fn unreachable_rate_limit_is_rejected() {
        let mut config = PicrelayConfig::default();
        config.rate_limit.max_per_minute = 120;
        config.rate_limit.max_per_second = 1.0;
        let errs = messages(&config);
        assert!(errs.iter().any(|e| e.contains("cannot be reached")));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = PicrelayConfig::default();
        config.rate_limit.max_per_minute = 1;
        config.rate_limit.max_per_second = 0.0;
        config.report.flush_hour = 24;
        config.storage.database_path = " ".into();
        config.fetch.post_pattern = "no groups here".into();
        let errs = messages(&config);
        assert_eq!(errs.len(), 5, "{errs:?}");
    }

    #[test]
    fn broken_pattern_is_reported() {
        let mut config = PicrelayConfig::default();
        config.fetch.post_pattern = "(unclosed".into();
        let errs = messages(&config);
        assert!(errs[0].contains("not a valid regex"));
    }
}
