//! HTTP client with adaptive pacing, validation-token caching and retries
//!
//! Every request goes through the same steps:
//! - URL resolution against the base URL, then credential application
//! - Admission through the pacing engine of the request's route
//! - Rate-limit headers fed back to that engine before the slot is released
//! - Cached payload returned for "not modified" or an unchanged token
//! - Failure classification, decoding, validation, cache update
//!
//! The retry loop wraps all of this and only retries classified failures
//! whose status is in the retryable set.

use super::classify::{classify, retry_hint};
use super::headers::etag;
use super::request::ApiRequest;
use super::transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
use super::validate::Validator;
use crate::auth::{header_name_of, header_value_of, Credential};
use crate::cache::{CacheKey, ResponseCache};
use crate::error::{Error, Result};
use crate::pacing::{PacingConfig, PacingRegistry};
use crate::trace::{TraceEvent, TraceSink, Tracer};
use crate::types::{BackoffType, JsonValue, Method, StringMap};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, IF_NONE_MATCH};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Configuration for the HTTP client
#[derive(Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative request paths
    pub base_url: Option<String>,
    /// Transport timeout
    pub timeout: Duration,
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Per-route pacing baseline
    pub pacing: PacingConfig,
    /// Default headers for all requests
    pub default_headers: StringMap,
    /// User agent string
    pub user_agent: String,
    /// Credential attached to every request
    pub credential: Credential,
    /// Emit trace events
    pub debug: bool,
    /// Receives trace events; installing one turns tracing on
    pub trace_sink: Option<TraceSink>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_type: BackoffType::Exponential,
            pacing: PacingConfig::default(),
            default_headers: StringMap::new(),
            user_agent: format!("pacekeeper/{}", env!("CARGO_PKG_VERSION")),
            credential: Credential::None,
            debug: false,
            trace_sink: None,
        }
    }
}

impl std::fmt::Debug for HttpClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("initial_backoff", &self.initial_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("backoff_type", &self.backoff_type)
            .field("pacing", &self.pacing)
            .field("default_headers", &self.default_headers)
            .field("user_agent", &self.user_agent)
            .field("has_credential", &!self.credential.is_none())
            .field("debug", &self.debug)
            .field("has_trace_sink", &self.trace_sink.is_some())
            .finish()
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    fn tracer(&self) -> Tracer {
        match &self.trace_sink {
            Some(sink) => {
                let sink = Arc::clone(sink);
                Tracer::with_sink(move |event| sink(event))
            }
            None => Tracer::new(self.debug),
        }
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the transport timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set the pacing baseline
    pub fn pacing(mut self, pacing: PacingConfig) -> Self {
        self.config.pacing = pacing;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Set the credential
    pub fn credential(mut self, credential: Credential) -> Self {
        self.config.credential = credential;
        self
    }

    /// Toggle trace events
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Forward trace events to `sink`
    pub fn trace_sink(mut self, sink: impl Fn(&TraceEvent) + Send + Sync + 'static) -> Self {
        self.config.trace_sink = Some(Arc::new(sink));
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Request after URL resolution and header preparation
struct Prepared {
    method: Method,
    /// Resolved URL without credential parameters; route and cache identity
    url: String,
    wire_url: String,
    headers: HeaderMap,
    body: Option<String>,
    cache_key: Option<CacheKey>,
}

/// Rate-governed API client
///
/// Cheap to share behind an `Arc`; all state lives in the pacing registry
/// and the response cache.
pub struct HttpClient {
    config: HttpClientConfig,
    transport: Arc<dyn Transport>,
    registry: Arc<PacingRegistry>,
    cache: Arc<ResponseCache>,
    tracer: Tracer,
    default_headers: HeaderMap,
}

impl HttpClient {
    /// Create a client backed by reqwest
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout, &config.user_agent)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client over an injected transport, with its own pacing
    /// registry and cache
    pub fn with_transport(config: HttpClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let registry = Arc::new(PacingRegistry::with_tracer(
            config.pacing.clone(),
            config.tracer(),
        ));
        Self::with_parts(config, transport, registry, Arc::new(ResponseCache::new()))
    }

    /// Create a client sharing an existing registry and cache
    ///
    /// The registry's own pacing configuration applies; `config.pacing` is
    /// ignored.
    pub fn with_parts(
        config: HttpClientConfig,
        transport: Arc<dyn Transport>,
        registry: Arc<PacingRegistry>,
        cache: Arc<ResponseCache>,
    ) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (key, value) in &config.default_headers {
            default_headers.insert(header_name_of(key)?, header_value_of(value)?);
        }

        Ok(Self {
            tracer: config.tracer(),
            config,
            transport,
            registry,
            cache,
            default_headers,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Pacing registry used by this client
    pub fn registry(&self) -> &Arc<PacingRegistry> {
        &self.registry
    }

    /// Response cache used by this client
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<JsonValue> {
        self.execute(ApiRequest::get(path), None).await
    }

    /// Make a GET request and deserialize the response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute_as(ApiRequest::get(path)).await
    }

    /// Make a POST request
    pub async fn post(&self, path: &str, body: JsonValue) -> Result<JsonValue> {
        self.execute(ApiRequest::post(path, body), None).await
    }

    /// Execute a request and deserialize the payload into `T`
    ///
    /// A payload that does not deserialize is a validation failure.
    pub async fn execute_as<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let payload = self.execute(request, None).await?;
        serde_json::from_value(payload).map_err(|e| Error::validation(e.to_string()))
    }

    /// Execute a request with pacing, caching and retries
    ///
    /// Returns the validated payload, or the error of the last attempt.
    pub async fn execute(
        &self,
        request: ApiRequest,
        validator: Option<&dyn Validator>,
    ) -> Result<JsonValue> {
        let prepared = self.prepare(&request)?;
        let max_retries = request.max_retries.unwrap_or(self.config.max_retries);
        let mut attempt = 0;

        loop {
            match self.attempt(&prepared, validator).await {
                Ok(payload) => return Ok(payload),
                Err(err) if attempt < max_retries && err.is_retryable() => {
                    let delay = err
                        .retry_after()
                        .unwrap_or_else(|| self.retry_delay(attempt));
                    warn!(
                        "Request failed with {}, attempt {}/{}, retrying in {:?}",
                        err,
                        attempt + 1,
                        max_retries + 1,
                        delay
                    );
                    self.tracer.emit(|| TraceEvent::Retry {
                        url: prepared.url.clone(),
                        attempt: attempt + 1,
                        status: err.status(),
                        delay,
                    });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    self.tracer.emit(|| TraceEvent::TerminalError {
                        url: prepared.url.clone(),
                        error: err.to_string(),
                    });
                    return Err(err);
                }
            }
        }
    }

    /// One paced transport call and its interpretation
    async fn attempt(
        &self,
        prepared: &Prepared,
        validator: Option<&dyn Validator>,
    ) -> Result<JsonValue> {
        let mut headers = prepared.headers.clone();
        if let Some(key) = &prepared.cache_key {
            if let Some(tag) = self.cache.etag(key) {
                headers.insert(IF_NONE_MATCH, header_value_of(&tag)?);
            }
        }

        let wire = TransportRequest {
            method: prepared.method,
            url: prepared.wire_url.clone(),
            headers,
            body: prepared.body.clone(),
        };

        debug!(method = %prepared.method, url = %prepared.url, "sending request");
        let engine = self.registry.for_route(&prepared.url);
        let signals = engine.clone();
        let transport = Arc::clone(&self.transport);
        let response = engine
            .schedule(async move {
                let response = transport.send(wire).await?;
                signals.update_from_headers(&response.headers);
                if !response.is_success() && !response.is_not_modified() {
                    if let Some(wait) = retry_hint(&response.headers) {
                        signals.penalize(wait);
                    }
                }
                Ok::<_, Error>(response)
            })
            .await?;

        self.interpret(prepared, response, validator)
    }

    fn interpret(
        &self,
        prepared: &Prepared,
        response: TransportResponse,
        validator: Option<&dyn Validator>,
    ) -> Result<JsonValue> {
        let cached = prepared
            .cache_key
            .as_ref()
            .and_then(|key| self.cache.get(key));

        if response.is_not_modified() {
            if let Some(entry) = cached {
                debug!(url = %prepared.url, "not modified, serving cached payload");
                self.tracer.emit(|| TraceEvent::CacheHit {
                    url: prepared.url.clone(),
                });
                return Ok(entry.payload);
            }
            return Err(classify(response.status, &response.headers, &response.body).into());
        }

        let token = etag(&response.headers);
        if response.is_success() {
            if let (Some(entry), Some(token)) = (&cached, &token) {
                if entry.etag == *token {
                    debug!(url = %prepared.url, etag = %token, "unchanged token, serving cached payload");
                    self.tracer.emit(|| TraceEvent::CacheHit {
                        url: prepared.url.clone(),
                    });
                    return Ok(entry.payload.clone());
                }
            }
        } else {
            return Err(classify(response.status, &response.headers, &response.body).into());
        }

        let payload = decode_body(&response)?;
        let payload = match validator {
            Some(validator) => validator.validate(payload).map_err(Error::validation)?,
            None => payload,
        };

        if let (Some(key), Some(token)) = (&prepared.cache_key, token) {
            self.cache.insert(key.clone(), token, payload.clone());
        }

        debug!(
            method = %prepared.method,
            url = %prepared.url,
            status = response.status,
            "request succeeded"
        );
        Ok(payload)
    }

    fn prepare(&self, request: &ApiRequest) -> Result<Prepared> {
        let resolved = self.build_url(&request.path, &request.query)?;

        let mut headers = self.default_headers.clone();
        for (key, value) in &request.headers {
            headers.insert(header_name_of(key)?, header_value_of(value)?);
        }

        let body = match &request.body {
            Some(body) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Some(serde_json::to_string(body)?)
            }
            None => None,
        };

        let mut wire_url = resolved.clone();
        self.config.credential.apply(&mut wire_url, &mut headers)?;

        let cache_key = request
            .is_cacheable()
            .then(|| CacheKey::new(request.method, resolved.as_str()));

        Ok(Prepared {
            method: request.method,
            url: resolved.into(),
            wire_url: wire_url.into(),
            headers,
            body,
            cache_key,
        })
    }

    /// Resolve `path` against the base URL and append `query`
    pub fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let full = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            match &self.config.base_url {
                Some(base) => {
                    let base = base.trim_end_matches('/');
                    let path = path.trim_start_matches('/');
                    format!("{base}/{path}")
                }
                None => path.to_string(),
            }
        };

        let mut url = Url::parse(&full)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Backoff delay before retry number `attempt + 1`, without jitter
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_backoff;
        let delay = match self.config.backoff_type {
            BackoffType::Constant => Some(initial),
            BackoffType::Linear => initial.checked_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => initial.checked_mul(2u32.saturating_pow(attempt)),
        };

        delay.map_or(self.config.max_backoff, |d| d.min(self.config.max_backoff))
    }

    /// Backoff plus uniform jitter of up to half the delay, capped at the
    /// ceiling
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let delay = self.calculate_backoff(attempt);
        let spread = u64::try_from(delay.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = Duration::from_millis(rand::rng().random_range(0..=spread));
        delay.saturating_add(jitter).min(self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("routes", &self.registry.len())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// Parse a successful body; no content decodes to `Null`
fn decode_body(response: &TransportResponse) -> Result<JsonValue> {
    if matches!(response.status, 204 | 205) || response.body.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_json::from_str(&response.body).map_err(|e| Error::decode(e.to_string()))
}
