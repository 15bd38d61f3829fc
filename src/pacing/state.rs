//! Pacing state machine
//!
//! Pure bookkeeping for one route: admission, completion, header-driven
//! recalculation, penalties and window resets. Time is always passed in, so
//! the scheduler owns the clock and tests can drive the math directly.

use super::types::{PacingConfig, ABSOLUTE_RESET_THRESHOLD_SECS, MAX_DELAY_MS};
use crate::http::RateLimitHeaders;
use std::time::Duration;
use tokio::time::Instant;

const MAX_DELAY: Duration = Duration::from_millis(MAX_DELAY_MS as u64);

/// Outcome of a header update, for logging
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Recalculation {
    pub interval_ms: f64,
    pub concurrency: u32,
    pub window_ms: f64,
}

#[derive(Debug)]
pub(crate) struct PacingState {
    config: PacingConfig,
    pub interval_ms: f64,
    pub concurrency: u32,
    pub next_available: Instant,
    pub window_reset_at: Option<Instant>,
    pub window_ms: f64,
    pub running: u32,
}

impl PacingState {
    pub fn new(config: PacingConfig, now: Instant) -> Self {
        Self {
            interval_ms: config.default_interval_ms(),
            concurrency: 1,
            next_available: now,
            window_reset_at: None,
            window_ms: config.default_window_ms(),
            running: 0,
            config,
        }
    }

    pub fn can_admit(&self, now: Instant) -> bool {
        self.running < self.concurrency && now >= self.next_available
    }

    /// Take a slot and push the next start out by one interval
    pub fn admit(&mut self, now: Instant) {
        self.running += 1;
        self.next_available = self.next_available.max(now) + millis(self.interval_ms);
    }

    pub fn complete(&mut self) {
        self.running = self.running.saturating_sub(1);
    }

    /// Recompute spacing and concurrency from the latest quota signals
    ///
    /// Returns `None` when the headers carried nothing to act on.
    pub fn apply_headers(
        &mut self,
        signals: &RateLimitHeaders,
        now: Instant,
        unix_now_secs: f64,
    ) -> Option<Recalculation> {
        if let Some(reset) = signals.reset_seconds {
            let reset_in_ms = reset_delay_ms(reset, unix_now_secs);
            self.window_reset_at = Some(now + millis(reset_in_ms));
            self.window_ms = reset_in_ms;
        }

        let remaining = signals.remaining?;
        // +1 for the request that just completed and is not yet counted
        let tokens = remaining + 1.0;
        let time_to_reset = self
            .window_reset_at
            .map_or(self.window_ms, |at| {
                at.saturating_duration_since(now).as_secs_f64() * 1000.0
            })
            .clamp(1.0, MAX_DELAY_MS);

        self.interval_ms = (time_to_reset / tokens)
            .ceil()
            .max(self.config.min_interval_ms())
            .min(MAX_DELAY_MS);

        let speedup = (tokens / time_to_reset) / (1.0 / self.config.default_interval_ms());
        self.concurrency = (speedup.round().min(f64::from(u32::MAX)) as u32)
            .clamp(1, self.config.concurrency_ceiling());

        Some(Recalculation {
            interval_ms: self.interval_ms,
            concurrency: self.concurrency,
            window_ms: time_to_reset,
        })
    }

    /// Hold admission back for at least `wait` from now
    pub fn penalize(&mut self, wait: Duration, now: Instant) -> Duration {
        let wait = wait.min(MAX_DELAY);
        self.next_available = self.next_available.max(now + wait);
        wait
    }

    /// Return to baseline pacing once the server window has elapsed
    pub fn reset_window_if_due(&mut self, now: Instant) -> bool {
        match self.window_reset_at {
            Some(at) if now >= at => {
                self.interval_ms = self.config.default_interval_ms();
                self.concurrency = 1;
                self.window_reset_at = None;
                self.window_ms = self.config.default_window_ms();
                true
            }
            _ => false,
        }
    }

    /// Earliest instant at which the scheduler has work to do
    pub fn next_deadline(&self, has_queued: bool) -> Option<Instant> {
        let admission = (has_queued && self.running < self.concurrency).then_some(self.next_available);
        match (admission, self.window_reset_at) {
            (Some(a), Some(r)) => Some(a.min(r)),
            (a, r) => a.or(r),
        }
    }
}

/// Milliseconds until the window resets, per the magnitude heuristic
fn reset_delay_ms(reset: f64, unix_now_secs: f64) -> f64 {
    let seconds = if reset > ABSOLUTE_RESET_THRESHOLD_SECS {
        reset - unix_now_secs
    } else {
        reset
    };
    (seconds * 1000.0).clamp(1.0, MAX_DELAY_MS)
}

fn millis(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.clamp(0.0, MAX_DELAY_MS) / 1000.0)
}

#[cfg(test)]
mod state_tests {
    use super::*;

    const UNIX_NOW: f64 = 1_700_000_000.0;

    fn state(rpm: u32) -> (PacingState, Instant) {
        let now = Instant::now();
        (PacingState::new(PacingConfig::new(rpm), now), now)
    }

    fn signals(remaining: Option<f64>, reset: Option<f64>) -> RateLimitHeaders {
        RateLimitHeaders {
            remaining,
            reset_seconds: reset,
            retry_after_seconds: None,
        }
    }

    #[test]
    fn test_baseline_from_requests_per_minute() {
        let (state, _) = state(120);
        assert_eq!(state.interval_ms, 500.0);
        assert_eq!(state.concurrency, 1);
        assert_eq!(state.window_ms, 60_000.0);
    }

    #[test]
    fn test_first_response_with_59_remaining() {
        let (mut state, now) = state(60);
        let recalculated = state
            .apply_headers(&signals(Some(59.0), None), now, UNIX_NOW)
            .unwrap();

        assert_eq!(recalculated.interval_ms, 1000.0);
        assert_eq!(state.interval_ms, 1000.0);
        assert_eq!(state.concurrency, 1);
    }

    #[test]
    fn test_large_budget_raises_concurrency_to_ceiling() {
        let (mut state, now) = state(60);
        state.apply_headers(&signals(Some(599.0), Some(60.0)), now, UNIX_NOW);

        assert_eq!(state.interval_ms, 100.0);
        // ten times the baseline rate
        assert_eq!(state.concurrency, 10);

        state.apply_headers(&signals(Some(5999.0), Some(60.0)), now, UNIX_NOW);
        assert_eq!(state.concurrency, 10);
    }

    #[test]
    fn test_interval_respects_floor() {
        let now = Instant::now();
        let config = PacingConfig::new(60).min_interval(Duration::from_millis(250));
        let mut state = PacingState::new(config, now);
        state.apply_headers(&signals(Some(999.0), Some(10.0)), now, UNIX_NOW);
        assert_eq!(state.interval_ms, 250.0);
    }

    #[test]
    fn test_interval_decreases_as_remaining_grows() {
        let mut previous = f64::INFINITY;
        for remaining in [0.0, 4.0, 9.0, 29.0, 59.0] {
            let (mut state, now) = state(60);
            state.apply_headers(&signals(Some(remaining), Some(30.0)), now, UNIX_NOW);
            assert!(state.interval_ms < previous);
            previous = state.interval_ms;
        }
    }

    #[test]
    fn test_interval_increases_as_reset_grows() {
        let mut previous = 0.0;
        for reset in [1.0, 5.0, 30.0, 60.0, 600.0] {
            let (mut state, now) = state(60);
            state.apply_headers(&signals(Some(9.0), Some(reset)), now, UNIX_NOW);
            assert!(state.interval_ms > previous);
            previous = state.interval_ms;
        }
    }

    #[test]
    fn test_update_is_idempotent() {
        let (mut once, now) = state(60);
        once.apply_headers(&signals(Some(20.0), Some(15.0)), now, UNIX_NOW);

        let mut twice = PacingState::new(PacingConfig::new(60), now);
        twice.apply_headers(&signals(Some(20.0), Some(15.0)), now, UNIX_NOW);
        twice.apply_headers(&signals(Some(20.0), Some(15.0)), now, UNIX_NOW);

        assert_eq!(once.interval_ms, twice.interval_ms);
        assert_eq!(once.concurrency, twice.concurrency);
        assert_eq!(once.window_reset_at, twice.window_reset_at);
        assert_eq!(once.window_ms, twice.window_ms);
    }

    #[test]
    fn test_absolute_reset_timestamp() {
        let (mut state, now) = state(60);
        state.apply_headers(&signals(Some(9.0), Some(UNIX_NOW + 20.0)), now, UNIX_NOW);

        assert_eq!(state.window_reset_at, Some(now + Duration::from_secs(20)));
        assert_eq!(state.interval_ms, 2000.0);
    }

    #[test]
    fn test_absolute_reset_in_past_clamps_to_minimum() {
        let (mut state, now) = state(60);
        state.apply_headers(&signals(Some(0.0), Some(UNIX_NOW - 100.0)), now, UNIX_NOW);
        assert_eq!(state.window_ms, 1.0);
        assert!(state.interval_ms <= 2.0);
    }

    #[test]
    fn test_reset_without_remaining_only_moves_window() {
        let (mut state, now) = state(60);
        assert!(state
            .apply_headers(&signals(None, Some(10.0)), now, UNIX_NOW)
            .is_none());
        assert_eq!(state.interval_ms, 1000.0);
        assert_eq!(state.window_reset_at, Some(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_admission_advances_next_available() {
        let (mut state, now) = state(60);
        assert!(state.can_admit(now));
        state.admit(now);
        assert_eq!(state.running, 1);
        assert_eq!(state.next_available, now + Duration::from_secs(1));
        assert!(!state.can_admit(now));

        state.complete();
        assert!(!state.can_admit(now));
        assert!(state.can_admit(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_penalize_never_moves_backwards() {
        let (mut state, now) = state(60);
        state.penalize(Duration::from_secs(5), now);
        assert_eq!(state.next_available, now + Duration::from_secs(5));

        state.penalize(Duration::from_secs(1), now);
        assert_eq!(state.next_available, now + Duration::from_secs(5));
    }

    #[test]
    fn test_penalize_clamps_huge_waits() {
        let (mut state, now) = state(60);
        let applied = state.penalize(Duration::from_secs(u64::MAX / 2), now);
        assert_eq!(applied, Duration::from_millis(2_147_483_647));
        assert_eq!(state.next_available, now + applied);
    }

    #[test]
    fn test_window_reset_restores_baseline() {
        let (mut state, now) = state(60);
        state.apply_headers(&signals(Some(599.0), Some(10.0)), now, UNIX_NOW);
        assert!(state.concurrency > 1);

        assert!(!state.reset_window_if_due(now + Duration::from_secs(9)));
        assert!(state.reset_window_if_due(now + Duration::from_secs(10)));
        assert_eq!(state.concurrency, 1);
        assert_eq!(state.interval_ms, 1000.0);
        assert_eq!(state.window_reset_at, None);
    }

    #[test]
    fn test_next_deadline() {
        let (mut state, now) = state(60);
        assert_eq!(state.next_deadline(true), Some(now));
        assert_eq!(state.next_deadline(false), None);

        state.admit(now);
        // slot held, nothing to wake for
        assert_eq!(state.next_deadline(true), None);

        state.complete();
        assert_eq!(state.next_deadline(true), Some(now + Duration::from_secs(1)));

        state.apply_headers(&signals(None, Some(0.5)), now, UNIX_NOW);
        assert_eq!(state.next_deadline(false), Some(now + Duration::from_millis(500)));
        assert_eq!(state.next_deadline(true), Some(now + Duration::from_millis(500)));
    }
}
