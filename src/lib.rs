// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]

//! # pacekeeper
//!
//! A rate-governed HTTP client core for APIs that publish their quota in
//! response headers.
//!
//! ## Features
//!
//! - **Adaptive Pacing**: per-route admission spacing and concurrency derived
//!   from `x-ratelimit-remaining` / `x-ratelimit-reset`
//! - **Retry Hints**: `retry-after` holds back the whole route, not just the
//!   failed request
//! - **Validation-Token Cache**: `ETag` / `If-None-Match` with a fallback for
//!   servers that answer 200 with an unchanged token
//! - **Classified Errors**: one error type that tells transient failures from
//!   permanent ones
//! - **Retries**: bounded, with exponential backoff and jitter
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pacekeeper::{ApiRequest, HttpClient, HttpClientConfig, PacingConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = HttpClientConfig::builder()
//!         .base_url("https://api.example.com/v1")
//!         .pacing(PacingConfig::new(120).max_concurrency(4))
//!         .build();
//!     let client = HttpClient::new(config)?;
//!
//!     let orders = client
//!         .execute(ApiRequest::get("/orders").query("status", "open"), None)
//!         .await?;
//!     println!("{orders}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   HttpClient (orchestrator)                     │
//! │  resolve → cache lookup → paced transport call → classify/retry │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌────────────┬─────────────────┴──┬──────────────┬────────────────┐
//! │  Pacing    │   Response Cache   │  Classifier  │   Transport    │
//! ├────────────┼────────────────────┼──────────────┼────────────────┤
//! │ Registry   │ method + URL → tag │ status/code  │ reqwest        │
//! │ Engine     │ + validated body   │ retry hint   │ or injected    │
//! │ Headers    │                    │              │                │
//! └────────────┴────────────────────┴──────────────┴────────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types and failure taxonomy
pub mod error;

/// Common types and type aliases
pub mod types;

/// Debug trace events
pub mod trace;

/// Credentials applied to outgoing requests
pub mod auth;

/// Validation-token response cache
pub mod cache;

/// Per-route adaptive pacing
pub mod pacing;

/// HTTP client, transport and error classification
pub mod http;

/// YAML client settings
pub mod config;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{ClassifiedError, Error, ErrorKind, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::Credential;
pub use cache::ResponseCache;
pub use config::ClientSettings;
pub use http::{ApiRequest, HttpClient, HttpClientConfig, Transport, Validator};
pub use pacing::{PacingConfig, PacingEngine, PacingRegistry};
pub use trace::{TraceEvent, Tracer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
