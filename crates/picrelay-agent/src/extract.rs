// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate image extraction from page HTML.

use std::collections::HashSet;

use picrelay_config::model::FetchConfig;
use picrelay_core::PicrelayError;
use regex::Regex;
use tracing::{debug, warn};

/// Pulls image URLs out of a page with a single-capture-group pattern.
#[derive(Debug, Clone)]
pub struct CandidateExtractor {
    pattern: Regex,
    ignored: HashSet<String>,
}

impl CandidateExtractor {
    pub fn new(pattern: &str, ignored: &[String]) -> Result<Self, PicrelayError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| PicrelayError::Config(format!("invalid post pattern: {e}")))?;
        // captures_len counts the implicit whole-match group.
        if pattern.captures_len() != 2 {
            return Err(PicrelayError::Config(format!(
                "post pattern must have exactly one capture group, found {}",
                pattern.captures_len() - 1
            )));
        }
        Ok(Self {
            pattern,
            ignored: ignored.iter().cloned().collect(),
        })
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self, PicrelayError> {
        Self::new(&config.post_pattern, &config.ignored_images)
    }

    /// Candidate URLs in page order. Empty captures and ignored images are dropped.
    pub fn candidates(&self, html: &str) -> Vec<String> {
        let mut found = Vec::new();
        for caps in self.pattern.captures_iter(html) {
            let Some(src) = caps.get(1).map(|m| m.as_str().trim()) else {
                warn!("post matched without an image source");
                continue;
            };
            if src.is_empty() {
                warn!("post matched with an empty image source");
                continue;
            }
            if self.ignored.contains(src) {
                debug!(src, "ignoring placeholder image");
                continue;
            }
            debug!(src, "image found");
            found.push(src.to_string());
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(src: &str) -> String {
        format!(
            r#"<div class="singlePost x"><div class="postInner">
                <div class="paragraph">text<div class="img"><img src="{src}" alt=""></div></div></div></div>"#
        )
    }

    #[test]
    fn default_pattern_finds_posts_in_order() {
        let extractor = CandidateExtractor::from_config(&FetchConfig::default()).unwrap();
        let html = format!(
            "<html>{}{}{}</html>",
            post("https://img/1.png"),
            post("https://i.imgur.com/sMhpFyR.jpg"),
            post("https://img/2.jpg")
        );
        assert_eq!(
            extractor.candidates(&html),
            vec!["https://img/1.png".to_string(), "https://img/2.jpg".to_string()]
        );
    }

    #[test]
    fn single_quoted_sources_match() {
        let extractor = CandidateExtractor::from_config(&FetchConfig::default()).unwrap();
        let html = post("https://img/3.gif")
            .replace(r#"src="https://img/3.gif""#, "src='https://img/3.gif'");
        assert_eq!(extractor.candidates(&html), vec!["https://img/3.gif".to_string()]);
    }

    #[test]
    fn empty_captures_are_skipped() {
        let extractor = CandidateExtractor::new(r#"src="(.*?)""#, &[]).unwrap();
        assert_eq!(
            extractor.candidates(r#"src="" src="a.png""#),
            vec!["a.png".to_string()]
        );
    }

    #[test]
    fn pattern_needs_one_group() {
        assert!(CandidateExtractor::new("no groups", &[]).is_err());
        assert!(CandidateExtractor::new("(a)(b)", &[]).is_err());
        assert!(CandidateExtractor::new("(unclosed", &[]).is_err());
    }

    #[test]
    fn page_without_posts_has_no_candidates() {
        let extractor = CandidateExtractor::from_config(&FetchConfig::default()).unwrap();
        assert!(extractor.candidates("<html><body>nothing</body></html>").is_empty());
    }
}
