//! Pacing configuration and snapshot types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest delay the engine will ever wait for, in milliseconds
pub const MAX_DELAY_MS: f64 = 2_147_483_647.0;

/// Reset values above this many seconds are absolute Unix timestamps
///
/// The remote API sends `x-ratelimit-reset` either as seconds until the
/// window resets or as the Unix time of the reset. A relative window of more
/// than ~31 years is implausible, so the magnitude decides.
pub const ABSOLUTE_RESET_THRESHOLD_SECS: f64 = 1_000_000_000.0;

/// Configuration shared by all engines of a registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Baseline request rate used until the server reports its quota
    pub requests_per_minute: u32,
    /// Ceiling for simultaneous in-flight requests per route
    pub max_concurrency: u32,
    /// Floor for the spacing between request starts
    pub min_interval: Duration,
    /// Window length assumed when the server does not report a reset
    pub default_window: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            max_concurrency: 10,
            min_interval: Duration::ZERO,
            default_window: Duration::from_secs(60),
        }
    }
}

impl PacingConfig {
    /// Create a config with the given baseline rate and defaults elsewhere
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            ..Self::default()
        }
    }

    /// Set the concurrency ceiling
    #[must_use]
    pub fn max_concurrency(mut self, max: u32) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Set the interval floor
    #[must_use]
    pub fn min_interval(mut self, floor: Duration) -> Self {
        self.min_interval = floor;
        self
    }

    /// Set the assumed window length
    #[must_use]
    pub fn default_window(mut self, window: Duration) -> Self {
        self.default_window = window;
        self
    }

    /// Spacing implied by the baseline rate, in milliseconds
    pub fn default_interval_ms(&self) -> f64 {
        60_000.0 / f64::from(self.requests_per_minute.max(1))
    }

    pub(crate) fn min_interval_ms(&self) -> f64 {
        self.min_interval.as_secs_f64() * 1000.0
    }

    pub(crate) fn default_window_ms(&self) -> f64 {
        (self.default_window.as_secs_f64() * 1000.0).clamp(1.0, MAX_DELAY_MS)
    }

    pub(crate) fn concurrency_ceiling(&self) -> u32 {
        self.max_concurrency.max(1)
    }
}

/// Point-in-time view of one engine's pacing state
#[derive(Debug, Clone, PartialEq)]
pub struct PacingSnapshot {
    /// Normalized route the engine governs
    pub route: String,
    /// Minimum spacing between request starts
    pub interval_ms: f64,
    /// Requests allowed in flight at once
    pub concurrency: u32,
    /// Requests currently executing
    pub running: u32,
    /// Tasks waiting for admission
    pub queued: usize,
    /// Time until the next request may start
    pub next_available_in: Duration,
    /// Time until the known server window resets
    pub window_reset_in: Option<Duration>,
    /// Length of the current window
    pub window_ms: f64,
}
