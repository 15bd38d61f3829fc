//! HTTP client module
//!
//! The request orchestrator and its collaborators.
//!
//! # Features
//!
//! - **Header Parsing**: rate-limit and validation-token signals
//! - **Error Classification**: structured errors from failed responses
//! - **Transport Seam**: reqwest by default, injectable for tests
//! - **Orchestration**: pacing, caching, validation and the retry loop

mod classify;
mod client;
mod headers;
mod request;
mod transport;
mod validate;

pub use classify::{classify, retry_hint};
pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use headers::{
    etag, RateLimitHeaders, ETAG_HEADER, REMAINING_HEADER, RESET_HEADER, RETRY_AFTER_HEADER,
};
pub use request::ApiRequest;
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
pub use validate::{FnValidator, TypedValidator, Validator};
