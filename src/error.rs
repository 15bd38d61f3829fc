//! Error types for pacekeeper
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Failed HTTP responses are turned into a [`ClassifiedError`] by the error
//! classifier and surfaced as [`Error::Api`]. Every error maps onto the
//! [`ErrorKind`] taxonomy so callers can tell "ask me again later" apart from
//! "this will never succeed".

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// HTTP statuses the retry loop treats as transient
pub const RETRYABLE_STATUSES: [u16; 3] = [429, 500, 503];

/// The main error type for pacekeeper
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Response Errors
    // ============================================================================
    #[error(transparent)]
    Api(ClassifiedError),

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Response validation failed: {message}")]
    Validation { message: String },

    // ============================================================================
    // Internal Errors
    // ============================================================================
    #[error("Pacing engine for route '{route}' is no longer running")]
    PacingStopped { route: String },

    #[error("{0}")]
    Other(String),
}

/// Caller-facing failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The call to the remote endpoint could not complete
    Transport,
    /// Explicit "too many requests" status
    RateLimited,
    /// Server-side status in the retryable set
    TransientServer,
    /// Any other unsuccessful status
    NonRetryableHttp,
    /// Body was not valid structured data
    Decode,
    /// Parsed payload had an unexpected shape
    Validation,
    /// Configuration or crate-internal failure
    Internal,
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a pacing-stopped error
    pub fn pacing_stopped(route: impl Into<String>) -> Self {
        Self::PacingStopped {
            route: route.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::Transport { .. } => ErrorKind::Transport,
            Error::Api(api) => api.kind(),
            Error::Decode { .. } => ErrorKind::Decode,
            Error::Validation { .. } => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        }
    }

    /// Check if the retry loop may try this request again
    ///
    /// Only classified HTTP failures with a retryable status qualify;
    /// transport failures are left to the transport's own policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Api(api) if api.is_retryable())
    }

    /// Server-provided retry hint, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Api(api) => api.retry_after,
            _ => None,
        }
    }

    /// HTTP status of a classified failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(api) => Some(api.status),
            _ => None,
        }
    }
}

/// Check if an HTTP status code is retryable
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Structured description of a failed HTTP response
///
/// Built once per failed transport call by the classifier and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    /// HTTP status code
    pub status: u16,
    /// Service-specific error code from the body, if present
    pub code: Option<i64>,
    /// Human-readable message (raw body when it is not structured)
    pub message: String,
    /// Server retry hint
    pub retry_after: Option<Duration>,
    /// Identifier of the failed command, if the service reported one
    pub command_id: Option<String>,
    /// Body text as received
    pub raw_body: String,
}

impl ClassifiedError {
    /// Check if the status is in the retryable set
    pub fn is_retryable(&self) -> bool {
        is_retryable_status(self.status)
    }

    /// Map the status onto the failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self.status {
            429 => ErrorKind::RateLimited,
            s if is_retryable_status(s) => ErrorKind::TransientServer,
            _ => ErrorKind::NonRetryableHttp,
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(code) = self.code {
            write!(f, " (code {code})")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(wait) = self.retry_after {
            write!(f, ", retry after {}ms", wait.as_millis())?;
        }
        Ok(())
    }
}

impl std::error::Error for ClassifiedError {}

impl From<ClassifiedError> for Error {
    fn from(err: ClassifiedError) -> Self {
        Error::Api(err)
    }
}

/// Result type alias for pacekeeper
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
