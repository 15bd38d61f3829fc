//! Adaptive per-route pacing
//!
//! Every logical route of the remote API gets its own [`PacingEngine`], which
//! admits requests at a pace derived from the quota the server advertises in
//! its rate-limit headers. Engines live in a [`PacingRegistry`], created on
//! first use and kept for the registry's lifetime.
//!
//! # Features
//!
//! - **FIFO admission**: queued tasks start strictly in enqueue order
//! - **Adaptive spacing**: the interval between request starts spreads the
//!   remaining budget over the remaining window
//! - **Adaptive concurrency**: parallelism scales with the budget, bounded by
//!   the configured ceiling
//! - **Penalties**: explicit retry hints push admission back
//! - **Window reset**: pacing returns to a conservative baseline when the
//!   server window elapses

mod engine;
mod registry;
mod route;
mod state;
mod types;

pub use engine::PacingEngine;
pub use registry::PacingRegistry;
pub use route::RouteKey;
pub use types::{PacingConfig, PacingSnapshot, ABSOLUTE_RESET_THRESHOLD_SECS, MAX_DELAY_MS};
