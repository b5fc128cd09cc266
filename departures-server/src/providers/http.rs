//! HTTP plumbing shared by the provider adapters.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::domain::ProviderKind;

use super::error::ProviderError;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default user agent sent to providers that do not require a specific one.
const DEFAULT_USER_AGENT: &str = concat!("departures-server/", env!("CARGO_PKG_VERSION"));

/// Maximum number of body characters kept in error messages.
const MAX_BODY_IN_ERROR: usize = 500;

/// Maximum number of characters kept from a decoder error, which may quote
/// an arbitrarily long value from the body.
const MAX_DECODE_ERROR: usize = 150;

/// Connection settings for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Base URL (scheme and host, no trailing slash)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent header value
    pub user_agent: String,
}

impl ProviderConfig {
    /// Create a config for the given base URL with default timeout and user agent.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Build the HTTP client for a provider.
pub(crate) fn build_client(
    provider: ProviderKind,
    config: &ProviderConfig,
) -> Result<reqwest::Client, ProviderError> {
    let mut headers = HeaderMap::new();
    let user_agent = HeaderValue::from_str(&config.user_agent).map_err(|_| {
        ProviderError::Unavailable {
            provider,
            status: None,
            message: "invalid user agent".to_string(),
        }
    })?;
    headers.insert(USER_AGENT, user_agent);

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.timeout())
        .build()
        .map_err(|e| ProviderError::http(provider, e))
}

/// Check the response status and decode the JSON body.
///
/// Non-success statuses become [`ProviderError::Unavailable`] carrying the
/// status code; undecodable bodies become [`ProviderError::Data`] with the
/// start of the body attached.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: ProviderKind,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Unavailable {
            provider,
            status: Some(status.as_u16()),
            message: truncate_body(&body),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::http(provider, e))?;

    parse_json(provider, &body)
}

/// Decode a JSON body, keeping the start of the body in the error.
///
/// The error message stays below `MAX_DECODE_ERROR + MAX_BODY_IN_ERROR`
/// characters plus a short separator.
pub(crate) fn parse_json<T: DeserializeOwned>(
    provider: ProviderKind,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::Data {
        provider,
        message: format!(
            "{} (body: {})",
            truncate(&e.to_string(), MAX_DECODE_ERROR),
            truncate_body(body)
        ),
    })
}

fn truncate_body(body: &str) -> String {
    truncate(body, MAX_BODY_IN_ERROR)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Payload {
        value: u32,
    }

    #[test]
    fn base_url_trailing_slash_removed() {
        let config = ProviderConfig::new("https://example.org/");
        assert_eq!(config.base_url, "https://example.org");
        assert_eq!(config.timeout(), Duration::from_secs(10));

        let config = config.with_base_url("http://localhost:8080//").with_timeout(3);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout_secs, 3);
    }

    #[test]
    fn parse_error_keeps_truncated_body() {
        let body = format!("{{\"value\": \"{}\"}}", "x".repeat(1000));
        let err = parse_json::<Payload>(ProviderKind::Mvg, &body).unwrap_err();

        match err {
            ProviderError::Data { provider, message } => {
                assert_eq!(provider, ProviderKind::Mvg);
                assert!(message.contains("body: {\"value\""));
                assert!(message.len() < 700);
            }
            other => panic!("expected data error, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_bounded_for_multibyte_values() {
        let body = format!("{{\"value\": \"{}\"}}", "ü".repeat(2000));
        let err = parse_json::<Payload>(ProviderKind::Vbb, &body).unwrap_err();

        let ProviderError::Data { message, .. } = err else {
            panic!("expected data error");
        };
        assert!(message.chars().count() <= MAX_DECODE_ERROR + MAX_BODY_IN_ERROR + 10);
    }

    #[test]
    fn parse_ok() {
        let payload: Payload = parse_json(ProviderKind::Db, r#"{"value": 7}"#).unwrap();
        assert_eq!(payload.value, 7);
    }

    #[test]
    fn client_builds() {
        let config = ProviderConfig::new("https://example.org").with_user_agent("test/1.0");
        assert!(build_client(ProviderKind::Vbb, &config).is_ok());
    }
}
