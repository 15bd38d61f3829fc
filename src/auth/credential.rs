//! Credential types and header application

use crate::error::{Error, Result};
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Location for API key placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Place in HTTP header
    #[default]
    Header,
    /// Place in query parameter
    Query,
}

/// Credential attached to every request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// No authentication required
    #[default]
    None,

    /// API Key authentication (header or query)
    ApiKey {
        /// Where to place the API key
        #[serde(default)]
        location: Location,
        /// Header name (for header location)
        #[serde(default)]
        header_name: Option<String>,
        /// Query parameter name (for query location)
        #[serde(default)]
        query_param: Option<String>,
        /// Prefix to add before the value (e.g., "Bearer ")
        #[serde(default)]
        prefix: Option<String>,
        /// The API key value
        value: String,
    },

    /// HTTP Basic authentication
    Basic { username: String, password: String },

    /// Bearer token authentication
    Bearer { token: String },

    /// Fixed headers added to each request
    CustomHeaders { headers: HashMap<String, String> },
}

impl Credential {
    /// Bearer token credential
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// API key sent in `header_name`
    pub fn api_key_header(header_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ApiKey {
            location: Location::Header,
            header_name: Some(header_name.into()),
            query_param: None,
            prefix: None,
            value: value.into(),
        }
    }

    /// Whether any credential is configured
    pub fn is_none(&self) -> bool {
        matches!(self, Credential::None)
    }

    /// Add this credential to an outgoing request
    pub fn apply(&self, url: &mut Url, headers: &mut HeaderMap) -> Result<()> {
        match self {
            Credential::None => {}

            Credential::ApiKey {
                location,
                header_name,
                query_param,
                prefix,
                value,
            } => {
                let val = format!("{}{}", prefix.as_deref().unwrap_or(""), value);
                match location {
                    Location::Header => {
                        let name = header_name.as_deref().unwrap_or("Authorization");
                        headers.insert(header_name_of(name)?, header_value_of(&val)?);
                    }
                    Location::Query => {
                        let param = query_param.as_deref().unwrap_or("api_key");
                        url.query_pairs_mut().append_pair(param, &val);
                    }
                }
            }

            Credential::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                headers.insert(AUTHORIZATION, header_value_of(&format!("Basic {encoded}"))?);
            }

            Credential::Bearer { token } => {
                headers.insert(AUTHORIZATION, header_value_of(&format!("Bearer {token}"))?);
            }

            Credential::CustomHeaders { headers: custom } => {
                for (key, value) in custom {
                    headers.insert(header_name_of(key)?, header_value_of(value)?);
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn header_name_of(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::invalid_value("header", format!("'{name}': {e}")))
}

pub(crate) fn header_value_of(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::invalid_value("header", format!("invalid value: {e}")))
}
