// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The fetch-and-deliver run.
//!
//! A run reads one page, extracts candidate image URLs and delivers every
//! URL that was not delivered before. A URL is marked only after the
//! broadcast chat accepted the image, so any failure leaves it eligible for
//! the next run.

use std::sync::Arc;

use picrelay_core::{PageFetcher, PicrelayError, RunStats};
use picrelay_telegram::markdown::fenced;
use tracing::{error, info, warn};

use crate::dedup::DedupRegistry;
use crate::dispatch::Dispatcher;
use crate::extract::CandidateExtractor;
use crate::report::DailyReportAggregator;

/// Result of handling one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The URL had been delivered by an earlier run.
    Skipped,
}

pub struct DeliveryPipeline {
    fetcher: Arc<dyn PageFetcher>,
    dedup: DedupRegistry,
    dispatcher: Arc<Dispatcher>,
    extractor: CandidateExtractor,
    report: Arc<DailyReportAggregator>,
}

impl DeliveryPipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        dedup: DedupRegistry,
        dispatcher: Arc<Dispatcher>,
        extractor: CandidateExtractor,
        report: Arc<DailyReportAggregator>,
    ) -> Self {
        Self {
            fetcher,
            dedup,
            dispatcher,
            extractor,
            report,
        }
    }

    /// Runs the pipeline over `page_url`, handling at most `limit`
    /// candidates when `limit > 0`.
    pub async fn run(&self, page_url: &str, limit: u32) -> Result<RunStats, PicrelayError> {
        let html = match self.fetcher.fetch_page(page_url).await {
            Ok(html) => html,
            Err(e) => {
                error!(url = %page_url, error = %e, "cannot get page content");
                let message = format!(
                    "Cannot get page content\n[page]({page_url})\n\n{}",
                    fenced(&e.to_string())
                );
                if let Err(notify_err) = self.dispatcher.notify_admin(&message).await {
                    warn!(error = %notify_err, "cannot notify administrator");
                }
                return Err(e);
            }
        };

        let candidates = self.extractor.candidates(&html);
        info!(url = %page_url, count = candidates.len(), "candidates extracted");

        let mut stats = RunStats::default();
        for src in &candidates {
            match self.deliver(src).await {
                Ok(DeliveryOutcome::Delivered) => {}
                Ok(DeliveryOutcome::Skipped) => stats.skipped += 1,
                Err(PicrelayError::Cancelled) => return Err(PicrelayError::Cancelled),
                Err(e) => {
                    error!(src = %src, error = %e, "cannot deliver image");
                    stats.errors += 1;
                    stats.last_error = e.to_string();
                    self.report_failure(src, &e).await?;
                }
            }

            stats.total += 1;
            if limit > 0 && stats.total >= limit {
                info!(limit, "candidate limit reached");
                break;
            }
        }

        info!(
            total = stats.total,
            new = stats.new_items(),
            skipped = stats.skipped,
            errors = stats.errors,
            "run completed"
        );

        let report_result = self.report.update(&stats).await;
        if stats.is_eventful() {
            let summary = format!(
                "Fetching images from the [page]({page_url}) completed.\nTotal: {}\nNew: {}\nSkipped: {}\nErrors: {}",
                stats.total,
                stats.new_items(),
                stats.skipped,
                stats.errors
            );
            match self.dispatcher.notify_admin(&summary).await {
                Ok(()) => {}
                Err(PicrelayError::Cancelled) => return Err(PicrelayError::Cancelled),
                Err(e) => warn!(error = %e, "cannot send run summary"),
            }
        }
        report_result?;
        Ok(stats)
    }

    /// Delivers one image to the broadcast chat unless it was delivered before.
    pub async fn deliver(&self, src: &str) -> Result<DeliveryOutcome, PicrelayError> {
        if self.dedup.is_delivered(src).await? {
            info!(src, "image has been delivered already");
            return Ok(DeliveryOutcome::Skipped);
        }

        // The temp file is removed when `image` goes out of scope.
        let image = self.fetcher.fetch_image(src).await?;
        self.dispatcher
            .send_image(self.dispatcher.chat(), image.path(), "")
            .await?;
        self.dedup.mark_delivered(src).await?;
        info!(src, media_type = %image.media_type, "image delivered");
        Ok(DeliveryOutcome::Delivered)
    }

    /// Tells the administrator about a failed image. Only cancellation
    /// propagates; other notification errors are logged.
    async fn report_failure(&self, src: &str, err: &PicrelayError) -> Result<(), PicrelayError> {
        let message = format!(
            "Error occurred while processing the image!\n[image]({src})\n\nerror:\n{}",
            fenced(&err.to_string())
        );
        match self.dispatcher.notify_admin(&message).await {
            Ok(()) => Ok(()),
            Err(PicrelayError::Cancelled) => Err(PicrelayError::Cancelled),
            Err(e) => {
                warn!(error = %e, src, "cannot notify administrator");
                Ok(())
            }
        }
    }
}
