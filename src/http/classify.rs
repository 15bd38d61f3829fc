//! Error classification
//!
//! Turns an unsuccessful response into a [`ClassifiedError`]. Structured
//! bodies contribute a service error code, message and command identifier;
//! anything else becomes the message verbatim. Classification never fails.

use super::headers::RateLimitHeaders;
use crate::error::ClassifiedError;
use crate::pacing::MAX_DELAY_MS;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Classify a failed response
pub fn classify(status: u16, headers: &HeaderMap, body: &str) -> ClassifiedError {
    let retry_after = retry_hint(headers);

    let (code, message, command_id) = match serde_json::from_str::<Value>(body) {
        Ok(value) if value.is_object() => (
            error_code(&value),
            error_message(&value).unwrap_or_else(|| status_message(status)),
            command_id(&value),
        ),
        _ if body.trim().is_empty() => (None, status_message(status), None),
        _ => (None, body.to_string(), None),
    };

    ClassifiedError {
        status,
        code,
        message,
        retry_after,
        command_id,
        raw_body: body.to_string(),
    }
}

/// Server retry hint, clamped to the longest supported delay
pub fn retry_hint(headers: &HeaderMap) -> Option<Duration> {
    RateLimitHeaders::from_headers(headers)
        .retry_after_seconds
        .map(|secs| Duration::from_secs_f64((secs * 1000.0).min(MAX_DELAY_MS) / 1000.0))
}

fn status_message(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map_or_else(|| format!("HTTP status {status}"), ToString::to_string)
}

/// First field present at the top level or under `error`
fn lookup<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let nested = value.get("error").filter(|v| v.is_object());
    keys.iter()
        .find_map(|key| value.get(*key))
        .or_else(|| nested.and_then(|err| keys.iter().find_map(|key| err.get(*key))))
}

fn error_code(value: &Value) -> Option<i64> {
    match lookup(value, &["code", "errorCode", "error_code"])? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn error_message(value: &Value) -> Option<String> {
    let found = lookup(value, &["message", "error_description", "detail"])
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| {
            value
                .get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
        })?;
    Some(found.to_string())
}

fn command_id(value: &Value) -> Option<String> {
    match lookup(value, &["commandId", "command_id"])? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod classify_tests {
    use super::*;
    use crate::error::ErrorKind;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_structured_body() {
        let body = r#"{"code": 1042, "message": "quota exceeded", "commandId": "cmd-7"}"#;
        let err = classify(429, &HeaderMap::new(), body);

        assert_eq!(err.status, 429);
        assert_eq!(err.code, Some(1042));
        assert_eq!(err.message, "quota exceeded");
        assert_eq!(err.command_id, Some("cmd-7".to_string()));
        assert_eq!(err.raw_body, body);
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[test]
    fn test_nested_error_object() {
        let body = r#"{"error": {"code": "17", "message": "bad field", "command_id": 99}}"#;
        let err = classify(400, &HeaderMap::new(), body);

        assert_eq!(err.code, Some(17));
        assert_eq!(err.message, "bad field");
        assert_eq!(err.command_id, Some("99".to_string()));
        assert_eq!(err.kind(), ErrorKind::NonRetryableHttp);
    }

    #[test]
    fn test_plain_error_string() {
        let err = classify(401, &HeaderMap::new(), r#"{"error": "invalid token"}"#);
        assert_eq!(err.message, "invalid token");
        assert_eq!(err.code, None);
    }

    #[test]
    fn test_unstructured_body_becomes_message() {
        let err = classify(503, &HeaderMap::new(), "<html>upstream down</html>");
        assert_eq!(err.message, "<html>upstream down</html>");
        assert_eq!(err.code, None);
        assert_eq!(err.kind(), ErrorKind::TransientServer);
    }

    #[test]
    fn test_empty_body_uses_status_reason() {
        let err = classify(404, &HeaderMap::new(), "");
        assert_eq!(err.message, "Not Found");

        let err = classify(599, &HeaderMap::new(), "  ");
        assert_eq!(err.message, "HTTP status 599");
    }

    #[test]
    fn test_object_without_message_uses_status_reason() {
        let err = classify(500, &HeaderMap::new(), r#"{"code": 3}"#);
        assert_eq!(err.message, "Internal Server Error");
        assert_eq!(err.code, Some(3));
    }

    #[test]
    fn test_retry_after_converted_to_millis() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("2"));

        let err = classify(429, &headers, "");
        assert_eq!(err.retry_after, Some(Duration::from_millis(2000)));
    }

    #[test]
    fn test_huge_retry_after_is_clamped() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("1e300"));

        assert_eq!(
            retry_hint(&headers),
            Some(Duration::from_secs_f64(MAX_DELAY_MS / 1000.0))
        );
    }

    #[test]
    fn test_unparseable_retry_after_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("soon"));

        let err = classify(429, &headers, "");
        assert_eq!(err.retry_after, None);
    }
}
