//! Provider adapter error types.

use std::time::Duration;

use crate::domain::ProviderKind;

/// Errors from an upstream departure provider.
///
/// Adapters and the composite repository propagate these unchanged. Only the
/// poller catches them, per station.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Network failure or non-success HTTP status. Retryable.
    #[error("{provider} unavailable: {}", describe_unavailable(.status, .message))]
    Unavailable {
        provider: ProviderKind,
        status: Option<u16>,
        message: String,
    },

    /// Upstream answered, but the payload was malformed or had an
    /// unexpected shape. Not retried within the same cycle.
    #[error("{provider} returned invalid data: {message}")]
    Data {
        provider: ProviderKind,
        message: String,
    },

    /// The call did not complete within the configured bound.
    #[error("{provider} did not respond within {}ms", .after.as_millis())]
    Timeout {
        provider: ProviderKind,
        after: Duration,
    },
}

fn describe_unavailable(status: &Option<u16>, message: &str) -> String {
    match *status {
        Some(code) if message.is_empty() => format!("HTTP {code}"),
        Some(code) => format!("HTTP {code}: {message}"),
        None => message.to_string(),
    }
}

impl ProviderError {
    /// Wrap a transport-level failure from `reqwest`.
    pub fn http(provider: ProviderKind, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ProviderError::Unavailable {
                provider,
                status: None,
                message: format!("request timed out: {err}"),
            };
        }
        if err.is_decode() {
            return ProviderError::Data {
                provider,
                message: err.to_string(),
            };
        }
        ProviderError::Unavailable {
            provider,
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    /// Shorthand for a malformed-payload error.
    pub fn data(provider: ProviderKind, message: impl Into<String>) -> Self {
        ProviderError::Data {
            provider,
            message: message.into(),
        }
    }

    /// Provider the error came from.
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderError::Unavailable { provider, .. }
            | ProviderError::Data { provider, .. }
            | ProviderError::Timeout { provider, .. } => *provider,
        }
    }

    /// HTTP status code, if the upstream sent one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Unavailable { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Data { .. })
    }

    /// Whether the upstream rejected the call for exceeding its quota.
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Short human-readable reason suitable for a status display.
    pub fn reason(&self) -> String {
        match self {
            ProviderError::Unavailable { status, .. } => match status {
                Some(429) => "Rate limit exceeded".to_string(),
                Some(502) => "Bad gateway (server error)".to_string(),
                Some(503) => "Service unavailable".to_string(),
                Some(504) => "Gateway timeout".to_string(),
                Some(code) => format!("HTTP {code}"),
                None => "Unknown error".to_string(),
            },
            ProviderError::Data { .. } => "Invalid response data".to_string(),
            ProviderError::Timeout { .. } => "Timed out".to_string(),
        }
    }
}
