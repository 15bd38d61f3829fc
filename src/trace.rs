//! Debug trace events
//!
//! When the debug toggle is on, the pacing engines and the client report
//! what they are doing as [`TraceEvent`]s. Events are logged under the
//! `pacekeeper::trace` target and forwarded to an optional sink supplied by
//! the embedding application.

use std::sync::Arc;
use std::time::Duration;

/// Callback receiving trace events
pub type TraceSink = Arc<dyn Fn(&TraceEvent) + Send + Sync>;

/// Structured observability event
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// A task was queued on a route
    Enqueued { route: String, queued: usize },
    /// A queued task was admitted
    Admitted {
        route: String,
        running: u32,
        interval_ms: f64,
    },
    /// Pacing was recomputed from response headers
    Recalculated {
        route: String,
        interval_ms: f64,
        concurrency: u32,
        remaining: Option<f64>,
        window_ms: f64,
    },
    /// Admission was pushed back by an explicit wait
    Penalized { route: String, wait: Duration },
    /// The server window elapsed and pacing returned to baseline
    WindowReset { route: String },
    /// A failed attempt will be retried
    Retry {
        url: String,
        attempt: u32,
        status: Option<u16>,
        delay: Duration,
    },
    /// A cached payload was served
    CacheHit { url: String },
    /// The request failed for good
    TerminalError { url: String, error: String },
}

/// Emits trace events when enabled
#[derive(Clone, Default)]
pub struct Tracer {
    enabled: bool,
    sink: Option<TraceSink>,
}

impl Tracer {
    /// Tracer that logs events when `enabled`
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            sink: None,
        }
    }

    /// Disabled tracer
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Enabled tracer that also hands every event to `sink`
    pub fn with_sink(sink: impl Fn(&TraceEvent) + Send + Sync + 'static) -> Self {
        Self {
            enabled: true,
            sink: Some(Arc::new(sink)),
        }
    }

    /// Whether events are emitted
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Emit an event. The closure only runs when tracing is enabled.
    pub fn emit(&self, event: impl FnOnce() -> TraceEvent) {
        if !self.enabled {
            return;
        }
        let event = event();
        tracing::debug!(target: "pacekeeper::trace", ?event);
        if let Some(sink) = &self.sink {
            sink(&event);
        }
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.enabled)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
