//! File-level client settings
//!
//! [`ClientSettings`] is the YAML form of a client. Durations are plain
//! integers (seconds or milliseconds, as the field name says) and every
//! section is optional. [`ClientSettings::into_config`] validates the values
//! and produces the runtime [`HttpClientConfig`].
//!
//! ```yaml
//! base_url: https://api.example.com/v2
//! auth:
//!   type: bearer
//!   token: secret
//! http:
//!   timeout_seconds: 10
//!   max_retries: 5
//!   retry_backoff:
//!     type: exponential
//!     initial_ms: 250
//!     max_ms: 20000
//! pacing:
//!   requests_per_minute: 120
//!   max_concurrency: 4
//! debug: true
//! ```

use crate::auth::Credential;
use crate::error::{Error, Result};
use crate::http::HttpClientConfig;
use crate::pacing::PacingConfig;
use crate::types::{BackoffType, StringMap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Client settings as written in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Base URL for relative request paths
    #[serde(default)]
    pub base_url: Option<String>,

    /// Credential attached to every request
    #[serde(default)]
    pub auth: Credential,

    /// Transport and retry settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Per-route pacing baseline
    #[serde(default)]
    pub pacing: PacingSettings,

    /// Headers sent with every request
    #[serde(default)]
    pub headers: StringMap,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Emit trace events
    #[serde(default)]
    pub debug: bool,
}

// ============================================================================
// HTTP Settings
// ============================================================================

/// Transport and retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Transport timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry backoff configuration
    #[serde(default)]
    pub retry_backoff: BackoffSettings,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff: BackoffSettings::default(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffSettings {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    500
}

fn default_max_ms() -> u64 {
    30_000
}

// ============================================================================
// Pacing Settings
// ============================================================================

/// Pacing baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingSettings {
    /// Requests per minute before the server reports a quota
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,

    /// Simultaneous in-flight requests allowed per route
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Minimum spacing between request starts in milliseconds
    #[serde(default)]
    pub min_interval_ms: u64,

    /// Assumed window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: default_rpm(),
            max_concurrency: default_max_concurrency(),
            min_interval_ms: 0,
            window_ms: default_window_ms(),
        }
    }
}

fn default_rpm() -> u32 {
    60
}

fn default_max_concurrency() -> u32 {
    10
}

fn default_window_ms() -> u64 {
    60_000
}

impl PacingSettings {
    /// Validate and convert to the runtime pacing config
    pub fn into_config(self) -> Result<PacingConfig> {
        if self.requests_per_minute == 0 {
            return Err(Error::invalid_value(
                "pacing.requests_per_minute",
                "must be at least 1",
            ));
        }
        if self.max_concurrency == 0 {
            return Err(Error::invalid_value(
                "pacing.max_concurrency",
                "must be at least 1",
            ));
        }

        Ok(PacingConfig::new(self.requests_per_minute)
            .max_concurrency(self.max_concurrency)
            .min_interval(Duration::from_millis(self.min_interval_ms))
            .default_window(Duration::from_millis(self.window_ms.max(1))))
    }
}

// ============================================================================
// Loading
// ============================================================================

impl ClientSettings {
    /// Parse settings from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load settings from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read settings file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Validate and convert to the runtime client config
    ///
    /// A backoff ceiling below the initial delay is raised to it.
    pub fn into_config(self) -> Result<HttpClientConfig> {
        let pacing = self.pacing.into_config()?;
        let backoff = self.http.retry_backoff;
        let initial = Duration::from_millis(backoff.initial_ms);
        let ceiling = Duration::from_millis(backoff.max_ms.max(backoff.initial_ms));

        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(self.http.timeout_seconds.max(1)))
            .max_retries(self.http.max_retries)
            .backoff(backoff.backoff_type, initial, ceiling)
            .pacing(pacing)
            .credential(self.auth)
            .debug(self.debug);

        if let Some(base_url) = self.base_url {
            url::Url::parse(&base_url)?;
            builder = builder.base_url(base_url);
        }
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        for (key, value) in self.headers {
            builder = builder.header(key, value);
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = ClientSettings::from_yaml_str("{}").unwrap();
        let config = settings.into_config().unwrap();
        let defaults = HttpClientConfig::default();

        assert_eq!(config.base_url, None);
        assert_eq!(config.timeout, defaults.timeout);
        assert_eq!(config.max_retries, defaults.max_retries);
        assert_eq!(config.initial_backoff, defaults.initial_backoff);
        assert_eq!(config.max_backoff, defaults.max_backoff);
        assert_eq!(config.backoff_type, BackoffType::Exponential);
        assert_eq!(config.pacing, PacingConfig::default());
        assert!(config.credential.is_none());
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_full_settings() {
        let yaml = r#"
base_url: "https://api.example.com/v2"
auth:
  type: bearer
  token: secret
http:
  timeout_seconds: 10
  max_retries: 5
  retry_backoff:
    type: linear
    initial_ms: 250
    max_ms: 20000
pacing:
  requests_per_minute: 120
  max_concurrency: 4
  min_interval_ms: 50
  window_ms: 30000
headers:
  X-Client: reports
user_agent: "reports/2.1"
debug: true
"#;

        let config = ClientSettings::from_yaml_str(yaml)
            .unwrap()
            .into_config()
            .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com/v2"));
        assert_eq!(config.credential, Credential::bearer("secret"));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.backoff_type, BackoffType::Linear);
        assert_eq!(config.initial_backoff, Duration::from_millis(250));
        assert_eq!(config.max_backoff, Duration::from_secs(20));
        assert_eq!(
            config.pacing,
            PacingConfig::new(120)
                .max_concurrency(4)
                .min_interval(Duration::from_millis(50))
                .default_window(Duration::from_secs(30))
        );
        assert_eq!(
            config.default_headers.get("X-Client"),
            Some(&"reports".to_string())
        );
        assert_eq!(config.user_agent, "reports/2.1");
        assert!(config.debug);
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let settings = ClientSettings::from_yaml_str("pacing:\n  requests_per_minute: 0\n").unwrap();
        let err = settings.into_config().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfigValue { ref field, .. } if field == "pacing.requests_per_minute"
        ));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let settings = ClientSettings::from_yaml_str("pacing:\n  max_concurrency: 0\n").unwrap();
        let err = settings.into_config().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfigValue { ref field, .. } if field == "pacing.max_concurrency"
        ));
    }

    #[test]
    fn test_backoff_ceiling_raised_to_initial() {
        let yaml = "http:\n  retry_backoff:\n    initial_ms: 5000\n    max_ms: 100\n";
        let config = ClientSettings::from_yaml_str(yaml)
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.initial_backoff, Duration::from_secs(5));
        assert_eq!(config.max_backoff, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_base_url() {
        let settings = ClientSettings::from_yaml_str("base_url: \"not a url\"\n").unwrap();
        assert!(matches!(
            settings.into_config().unwrap_err(),
            Error::InvalidUrl(_)
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = ClientSettings::from_yaml_str("pacing: [unclosed").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url: \"https://api.example.com\"").unwrap();
        writeln!(file, "http:\n  max_retries: 1").unwrap();

        let settings = ClientSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(settings.http.max_retries, 1);
    }

    #[test]
    fn test_missing_file() {
        let err = ClientSettings::from_file("/nonexistent/pacekeeper.yaml").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
