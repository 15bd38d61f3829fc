//! Route normalization

use std::fmt;
use url::Url;

/// Normalized request path identifying one rate-limited resource
///
/// Scheme, host, query and fragment are dropped, so `https://h/items?page=2`
/// and `items` map to the same key `/items`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey(String);

impl RouteKey {
    /// Normalize an absolute URL or a relative path
    pub fn new(path: &str) -> Self {
        let raw = match Url::parse(path) {
            Ok(url) if !url.cannot_be_a_base() => url.path().to_string(),
            _ => path
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
        };

        if raw.starts_with('/') {
            Self(raw)
        } else {
            Self(format!("/{raw}"))
        }
    }

    /// The normalized path
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouteKey {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
