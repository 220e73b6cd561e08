// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound rate limiting for chat destinations.
//!
//! Each destination gets a [`RateLimiter`] that spreads at most
//! `max_per_minute` calls over a one-minute window. Early calls in a window
//! are spaced close to the `1 / max_per_second` floor; the remaining slack is
//! pushed towards the end of the window along an exponential curve, so short
//! bursts go out quickly while long bursts never exceed the per-minute cap.
//! A log of the most recent call times enforces the cap over any trailing
//! minute, not only within one window.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use picrelay_core::PicrelayError;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Length of the accounting window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Validated limiter parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitPolicy {
    max_per_minute: u32,
    max_per_second: f64,
}

impl RateLimitPolicy {
    /// Build a policy, rejecting parameters that cannot fit a 60s window.
    pub fn new(max_per_minute: u32, max_per_second: f64) -> Result<Self, PicrelayError> {
        if max_per_minute < 2 {
            return Err(PicrelayError::Config(format!(
                "rate_limit.max_per_minute must be at least 2, got {max_per_minute}"
            )));
        }
        if !max_per_second.is_finite() || max_per_second <= 0.0 {
            return Err(PicrelayError::Config(format!(
                "rate_limit.max_per_second must be positive, got {max_per_second}"
            )));
        }
        if f64::from(max_per_minute) / max_per_second > WINDOW.as_secs_f64() {
            return Err(PicrelayError::Config(format!(
                "{max_per_minute} calls at {max_per_second}/s do not fit into one minute"
            )));
        }
        Ok(Self {
            max_per_minute,
            max_per_second,
        })
    }

    pub fn max_per_minute(&self) -> u32 {
        self.max_per_minute
    }

    pub fn max_per_second(&self) -> f64 {
        self.max_per_second
    }

    fn curve(&self, x: f64) -> f64 {
        let scale = f64::from(self.max_per_minute - 1) / 5.0;
        (x / scale).exp() - 1.0
    }

    /// Delay before the `n`-th call (0-based) of a window.
    ///
    /// Values of `n` beyond the last slot are evaluated at the last slot.
    /// The delays of one full window sum to exactly 60 seconds.
    pub fn delay_for_call(&self, n: u32) -> Duration {
        let last = self.max_per_minute - 1;
        let n = n.min(last);
        let floor = 1.0 / self.max_per_second;
        let slack = WINDOW.as_secs_f64() - f64::from(self.max_per_minute) / self.max_per_second;

        let cur = self.curve(f64::from(n));
        let prev = if n == 0 {
            0.0
        } else {
            self.curve(f64::from(n - 1))
        };
        let secs = floor + (cur - prev) / self.curve(f64::from(last)) * slack;
        Duration::from_secs_f64(secs.max(floor))
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_per_minute: 20,
            max_per_second: 1.0,
        }
    }
}

/// Window state for a single destination.
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    window_start: Option<Instant>,
    calls: u32,
    /// Release times of the last `max_per_minute` calls, oldest first.
    recent: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            window_start: None,
            calls: 0,
            recent: VecDeque::with_capacity(policy.max_per_minute as usize),
        }
    }

    /// Number of calls counted in the current window.
    pub fn calls_in_window(&self) -> u32 {
        self.calls
    }

    /// Account for one more call at `now` and return how long it must wait.
    ///
    /// The curve shapes the spacing; the call is further held until it is no
    /// more than the `max_per_minute`-th call in the trailing minute.
    pub fn next_delay(&mut self, now: Instant) -> Duration {
        let mut delay = self.window_delay(now);
        let cap = self.policy.max_per_minute as usize;
        if self.recent.len() >= cap {
            if let Some(&oldest) = self.recent.front() {
                delay = delay.max((oldest + WINDOW).saturating_duration_since(now));
            }
        }
        self.recent.push_back(now + delay);
        while self.recent.len() > cap {
            self.recent.pop_front();
        }
        delay
    }

    fn window_delay(&mut self, now: Instant) -> Duration {
        let expired = self
            .window_start
            .is_none_or(|start| now.saturating_duration_since(start) >= WINDOW);
        if expired {
            self.window_start = Some(now);
            self.calls = 0;
        }

        if self.calls >= self.policy.max_per_minute {
            // Budget spent early: hold the call until the window rolls over and
            // count it as the first call of the next one.
            let start = self.window_start.unwrap_or(now);
            let next_start = start + WINDOW;
            let until_reset = next_start.saturating_duration_since(now);
            self.window_start = Some(next_start);
            self.calls = 1;
            return until_reset + self.policy.delay_for_call(0);
        }

        let delay = self.policy.delay_for_call(self.calls);
        self.calls += 1;
        delay
    }

    /// Sleep until one more call is allowed, or until `cancel` fires.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> Result<(), PicrelayError> {
        let delay = self.next_delay(Instant::now());
        trace!(delay_ms = delay.as_millis() as u64, calls = self.calls, "rate limiter wait");
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancel.cancelled() => Err(PicrelayError::Cancelled),
        }
    }
}

/// Lazily created limiters, one per destination key.
#[derive(Debug)]
pub struct LimiterRegistry {
    policy: RateLimitPolicy,
    limiters: DashMap<String, Arc<Mutex<RateLimiter>>>,
}

impl LimiterRegistry {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            limiters: DashMap::new(),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Number of destinations seen so far.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    fn limiter(&self, key: &str) -> Arc<Mutex<RateLimiter>> {
        self.limiters
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(key, "creating rate limiter");
                Arc::new(Mutex::new(RateLimiter::new(self.policy)))
            })
            .clone()
    }

    /// Wait for the limiter of `key`. Callers on the same key are serialized.
    pub async fn wait(&self, key: &str, cancel: &CancellationToken) -> Result<(), PicrelayError> {
        let limiter = self.limiter(key);
        let mut guard = limiter.lock().await;
        guard.wait(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(d: Duration) -> f64 {
        d.as_secs_f64()
    }

    #[test]
    fn policy_rejects_bad_parameters() {
        assert!(RateLimitPolicy::new(1, 1.0).is_err());
        assert!(RateLimitPolicy::new(20, 0.0).is_err());
        assert!(RateLimitPolicy::new(20, f64::NAN).is_err());
        assert!(RateLimitPolicy::new(120, 1.0).is_err());
        assert!(RateLimitPolicy::new(60, 1.0).is_ok());
        assert_eq!(RateLimitPolicy::new(20, 1.0).unwrap(), RateLimitPolicy::default());
    }

    #[test]
    fn first_call_is_near_the_floor() {
        let policy = RateLimitPolicy::default();
        let d0 = secs(policy.delay_for_call(0));
        assert!(d0 >= 1.0);
        assert!(d0 < 1.5, "first delay too long: {d0}");
    }

    #[test]
    fn delays_grow_and_fill_the_window() {
        let policy = RateLimitPolicy::default();
        let delays: Vec<f64> = (0..20).map(|n| secs(policy.delay_for_call(n))).collect();
        for pair in delays.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        let total: f64 = delays.iter().sum();
        assert!((total - 60.0).abs() < 1e-6, "window total was {total}");
    }

    #[test]
    fn out_of_range_calls_use_the_last_slot() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.delay_for_call(500), policy.delay_for_call(19));
        assert_eq!(policy.delay_for_call(u32::MAX), policy.delay_for_call(19));
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_a_minute() {
        let mut limiter = RateLimiter::new(RateLimitPolicy::default());
        let start = Instant::now();
        limiter.next_delay(start);
        limiter.next_delay(start);
        assert_eq!(limiter.calls_in_window(), 2);

        let later = start + Duration::from_secs(61);
        let delay = limiter.next_delay(later);
        assert_eq!(limiter.calls_in_window(), 1);
        assert_eq!(delay, RateLimitPolicy::default().delay_for_call(0));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_waits_for_next_window() {
        let policy = RateLimitPolicy::new(2, 1.0).unwrap();
        let mut limiter = RateLimiter::new(policy);
        let start = Instant::now();
        limiter.next_delay(start);
        limiter.next_delay(start);

        let now = start + Duration::from_secs(10);
        let delay = limiter.next_delay(now);
        assert_eq!(delay, Duration::from_secs(50) + policy.delay_for_call(0));
        assert_eq!(limiter.calls_in_window(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn never_more_than_max_per_minute_in_any_window() {
        let registry = LimiterRegistry::new(RateLimitPolicy::default());
        let cancel = CancellationToken::new();
        let mut sent = Vec::new();
        for _ in 0..45 {
            registry.wait("@posts", &cancel).await.unwrap();
            sent.push(Instant::now());
        }
        for (i, at) in sent.iter().enumerate() {
            let in_window = sent[i..]
                .iter()
                .take_while(|t| t.duration_since(*at) < WINDOW - Duration::from_millis(5))
                .count();
            assert!(in_window <= 20, "{in_window} calls within 60s of call {i}");
        }
        for pair in sent.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_secs(1));
        }
    }

    fn max_in_trailing_minute(sent: &[Instant]) -> usize {
        sent.iter()
            .enumerate()
            .map(|(i, at)| {
                sent[i..]
                    .iter()
                    .take_while(|t| t.duration_since(*at) < WINDOW)
                    .count()
            })
            .max()
            .unwrap_or(0)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_after_idle_gap_respects_trailing_minute() {
        let registry = LimiterRegistry::new(RateLimitPolicy::default());
        let cancel = CancellationToken::new();
        let mut sent = Vec::new();

        registry.wait("@posts", &cancel).await.unwrap();
        sent.push(Instant::now());
        tokio::time::sleep(Duration::from_secs(50)).await;
        for _ in 0..40 {
            registry.wait("@posts", &cancel).await.unwrap();
            sent.push(Instant::now());
        }

        let busiest = max_in_trailing_minute(&sent);
        assert!(busiest <= 20, "{busiest} calls within 60s");
        for pair in sent.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn release_times_never_crowd_a_trailing_minute() {
        let policy = RateLimitPolicy::new(5, 0.5).unwrap();
        let mut limiter = RateLimiter::new(policy);
        let mut now = Instant::now();
        let mut released = Vec::new();

        for gap in [0u64, 40, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0] {
            now += Duration::from_secs(gap);
            now += limiter.next_delay(now);
            released.push(now);
        }

        let busiest = max_in_trailing_minute(&released);
        assert!(busiest <= 5, "{busiest} releases within 60s");
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_limited_independently() {
        let registry = LimiterRegistry::new(RateLimitPolicy::default());
        let cancel = CancellationToken::new();
        registry.wait("a", &cancel).await.unwrap();
        registry.wait("b", &cancel).await.unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_wait() {
        let registry = LimiterRegistry::new(RateLimitPolicy::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = registry.wait("@posts", &cancel).await.unwrap_err();
        assert!(matches!(err, PicrelayError::Cancelled));
    }

    proptest! {
        #[test]
        fn delay_never_below_floor(mpm in 2u32..=60, n in 0u32..10_000) {
            let mps = f64::from(mpm) / 60.0 + 0.5;
            let policy = RateLimitPolicy::new(mpm, mps).unwrap();
            let d = policy.delay_for_call(n).as_secs_f64();
            prop_assert!(d + 1e-9 >= 1.0 / mps);
            prop_assert!(d.is_finite());
        }
    }
}
