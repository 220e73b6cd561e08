// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily report accumulated across runs.
//!
//! Every run folds its stats into a persisted [`DailyReport`]. Once the
//! local clock passes the configured flush hour following the last flush,
//! the next run sends the report to the administrator and starts a fresh
//! one.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use picrelay_core::{Clock, KeyValueStore, PicrelayError, RunStats};
use picrelay_telegram::markdown::fenced;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;

/// Store key of the persisted report.
pub const REPORT_KEY: &str = "daily_report";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReport {
    pub run_count: u32,
    /// Images delivered since the last flush.
    pub delivered: u32,
    /// Errors of the most recent run.
    pub errors: u32,
    /// Candidates of the most recent run.
    pub total: u32,
    pub last_error: String,
    pub sent_at: DateTime<Local>,
}

impl DailyReport {
    pub fn empty(now: DateTime<Local>) -> Self {
        Self {
            run_count: 0,
            delivered: 0,
            errors: 0,
            total: 0,
            last_error: String::new(),
            sent_at: now,
        }
    }

    /// A report holding a single run, flushed at `now`.
    pub fn starting_with(stats: &RunStats, now: DateTime<Local>) -> Self {
        Self {
            run_count: 1,
            delivered: stats.new_items(),
            errors: stats.errors,
            total: stats.total,
            last_error: stats.last_error.clone(),
            sent_at: now,
        }
    }

    pub fn accumulate(&mut self, stats: &RunStats) {
        self.run_count = self.run_count.saturating_add(1);
        self.delivered = self.delivered.saturating_add(stats.new_items());
        self.errors = stats.errors;
        self.total = stats.total;
        self.last_error = stats.last_error.clone();
    }

    /// Plain markup of the report, to be escaped before sending.
    pub fn render(&self) -> String {
        let mut text = format!(
            "Daily report\nRuns: {}\nDelivered: {}\nCandidates in last run: {}\nErrors in last run: {}",
            self.run_count, self.delivered, self.total, self.errors
        );
        if !self.last_error.is_empty() {
            text.push_str("\nLast error:\n");
            text.push_str(&fenced(&self.last_error));
        }
        text
    }
}

/// First flush moment after `sent_at`: `flush_hour:00` local time on the
/// day of `sent_at`, moved one day ahead if `sent_at` is already past it.
pub fn planned_flush(sent_at: DateTime<Local>, flush_hour: u32) -> DateTime<Local> {
    let planned = sent_at
        .date_naive()
        .and_hms_opt(flush_hour.min(23), 0, 0)
        .and_then(resolve_local)
        .unwrap_or(sent_at);
    if sent_at > planned {
        planned + Duration::hours(24)
    } else {
        planned
    }
}

/// Maps a local wall-clock time to an instant, stepping over DST gaps.
fn resolve_local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

pub struct DailyReportAggregator {
    store: Arc<dyn KeyValueStore>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    flush_hour: u32,
}

impl DailyReportAggregator {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        dispatcher: Arc<Dispatcher>,
        clock: Arc<dyn Clock>,
        flush_hour: u32,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            flush_hour,
        }
    }

    /// Loads the stored report, or an empty one dated `now`.
    pub async fn load(&self, now: DateTime<Local>) -> Result<DailyReport, PicrelayError> {
        match self.store.get(REPORT_KEY.as_bytes()).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(PicrelayError::storage),
            Err(e) if e.is_not_found() => {
                debug!("no daily report yet");
                Ok(DailyReport::empty(now))
            }
            Err(e) => Err(e),
        }
    }

    async fn save(&self, report: &DailyReport) -> Result<(), PicrelayError> {
        let bytes = serde_json::to_vec(report).map_err(PicrelayError::storage)?;
        self.store.set(REPORT_KEY.as_bytes(), &bytes).await
    }

    /// Folds a run into the report, flushing it first if it is due.
    ///
    /// A failed flush keeps the window open so the next run retries it; the
    /// run is still accumulated and the send error is returned.
    pub async fn update(&self, stats: &RunStats) -> Result<(), PicrelayError> {
        let now = self.clock.now();
        let mut report = self.load(now).await?;
        let planned = planned_flush(report.sent_at, self.flush_hour);

        if now > planned {
            match self.dispatcher.notify_admin(&report.render()).await {
                Ok(()) => {
                    info!(
                        runs = report.run_count,
                        delivered = report.delivered,
                        "daily report sent"
                    );
                    return self.save(&DailyReport::starting_with(stats, now)).await;
                }
                Err(e) => {
                    warn!(error = %e, "cannot send daily report, will retry next run");
                    report.accumulate(stats);
                    self.save(&report).await?;
                    return Err(e);
                }
            }
        }

        report.accumulate(stats);
        debug!(runs = report.run_count, next_flush = %planned, "daily report updated");
        self.save(&report).await
    }

    /// Sends the current report without resetting it.
    pub async fn send_current(&self) -> Result<(), PicrelayError> {
        let report = self.load(self.clock.now()).await?;
        self.dispatcher.notify_admin(&report.render()).await
    }
}
