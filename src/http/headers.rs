//! Rate-limit header parsing
//!
//! Reads the quota signals the remote API attaches to every response.
//! Missing or non-numeric values come back as `None`, never as an error.

use reqwest::header::HeaderMap;

/// Requests left in the current window
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Window reset, relative seconds or absolute Unix seconds
pub const RESET_HEADER: &str = "x-ratelimit-reset";
/// Explicit wait before retrying, in seconds
pub const RETRY_AFTER_HEADER: &str = "retry-after";
/// Validation token of the returned representation
pub const ETAG_HEADER: &str = "etag";

/// Numeric rate-limit signals extracted from a response
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub remaining: Option<f64>,
    pub reset_seconds: Option<f64>,
    pub retry_after_seconds: Option<f64>,
}

impl RateLimitHeaders {
    /// Parse the rate-limit headers of a response
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: numeric_header(headers, REMAINING_HEADER),
            reset_seconds: numeric_header(headers, RESET_HEADER),
            retry_after_seconds: numeric_header(headers, RETRY_AFTER_HEADER),
        }
    }

    /// True when no signal was present
    pub fn is_empty(&self) -> bool {
        self.remaining.is_none() && self.reset_seconds.is_none() && self.retry_after_seconds.is_none()
    }
}

/// Validation token of a response, if any
pub fn etag(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ETAG_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn numeric_header(headers: &HeaderMap, name: &str) -> Option<f64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite() && *n >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        map
    }

    #[test]
    fn test_parses_all_signals() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("x-ratelimit-remaining", "59"),
            ("x-ratelimit-reset", "30"),
            ("retry-after", "5"),
        ]));

        assert_eq!(parsed.remaining, Some(59.0));
        assert_eq!(parsed.reset_seconds, Some(30.0));
        assert_eq!(parsed.retry_after_seconds, Some(5.0));
        assert!(!parsed.is_empty());
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::from_bytes(b"X-RateLimit-Remaining").unwrap(),
            HeaderValue::from_static("7"),
        );
        assert_eq!(RateLimitHeaders::from_headers(&map).remaining, Some(7.0));
    }

    #[test]
    fn test_missing_and_garbage_values_are_absent() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("x-ratelimit-remaining", "lots"),
            ("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT"),
        ]));

        assert_eq!(parsed, RateLimitHeaders::default());
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_negative_values_are_absent() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[("x-ratelimit-remaining", "-1")]));
        assert_eq!(parsed.remaining, None);
    }

    #[test]
    fn test_etag() {
        assert_eq!(
            etag(&headers(&[("etag", "\"abc\"")])),
            Some("\"abc\"".to_string())
        );
        assert_eq!(etag(&headers(&[("etag", "  ")])), None);
        assert_eq!(etag(&HeaderMap::new()), None);
    }
}
