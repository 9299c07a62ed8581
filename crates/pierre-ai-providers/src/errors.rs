// ABOUTME: Provider error taxonomy with retryability classification
// ABOUTME: Maps vendor HTTP statuses to typed errors without carrying credential material
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use thiserror::Error;

/// Longest vendor diagnostic kept on an error
const MAX_DIAGNOSTIC_CHARS: usize = 200;

/// Failure of a single provider call
///
/// Authentication failures never carry the vendor body: vendors echo key
/// prefixes in those messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The attempt exceeded its deadline
    #[error("{provider} request timed out after {timeout_ms}ms")]
    Timeout {
        /// Vendor name
        provider: String,
        /// Deadline that expired
        timeout_ms: u64,
    },

    /// Connection could not be established or was reset
    #[error("{provider} network error: {message}")]
    Network {
        /// Vendor name
        provider: String,
        /// Transport diagnostic
        message: String,
    },

    /// Vendor returned a 5xx (or overload) status
    #[error("{provider} server error (HTTP {status_code})")]
    ServerError {
        /// Vendor name
        provider: String,
        /// HTTP status
        status_code: u16,
    },

    /// Vendor throttled the caller
    #[error("{provider} rate limit exceeded")]
    RateLimited {
        /// Vendor name
        provider: String,
        /// Seconds the vendor asked us to wait, when it said
        retry_after_secs: Option<u64>,
    },

    /// Vendor refused the credential
    #[error("{provider} rejected the configured credentials")]
    AuthenticationFailed {
        /// Vendor name
        provider: String,
    },

    /// Vendor refused the request shape (unknown model, bad parameter)
    #[error("{provider} rejected the request (HTTP {status_code}): {message}")]
    InvalidRequest {
        /// Vendor name
        provider: String,
        /// HTTP status
        status_code: u16,
        /// Truncated vendor diagnostic
        message: String,
    },

    /// Vendor answered but the envelope was unusable (no text, bad JSON)
    #[error("{provider} returned an unusable response: {message}")]
    InvalidResponse {
        /// Vendor name
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// Breaker for this vendor is open
    #[error("{provider} circuit breaker is open, retry in {retry_after_secs}s")]
    CircuitBreakerOpen {
        /// Vendor name
        provider: String,
        /// Seconds until a recovery probe is allowed
        retry_after_secs: u64,
    },
}

impl ProviderError {
    /// Whether repeating the identical call may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Network { .. }
                | Self::ServerError { .. }
                | Self::RateLimited { .. }
        )
    }

    /// Vendor name attached to the error
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::Timeout { provider, .. }
            | Self::Network { provider, .. }
            | Self::ServerError { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::AuthenticationFailed { provider }
            | Self::InvalidRequest { provider, .. }
            | Self::InvalidResponse { provider, .. }
            | Self::CircuitBreakerOpen { provider, .. } => provider,
        }
    }

    /// Map a transport failure from reqwest
    #[must_use]
    pub fn from_transport(provider: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                provider: provider.to_owned(),
                timeout_ms: 0,
            }
        } else {
            Self::Network {
                provider: provider.to_owned(),
                message: error.without_url().to_string(),
            }
        }
    }

    /// Map a non-success HTTP status to an error
    ///
    /// `diagnostic` is the vendor's error message when one could be
    /// extracted from the body; it is truncated and dropped entirely for
    /// authentication failures.
    #[must_use]
    pub fn from_status(
        provider: &str,
        status: StatusCode,
        retry_after_secs: Option<u64>,
        diagnostic: &str,
    ) -> Self {
        let provider = provider.to_owned();
        match status.as_u16() {
            401 | 403 => Self::AuthenticationFailed { provider },
            408 => Self::Timeout {
                provider,
                timeout_ms: 0,
            },
            429 => Self::RateLimited {
                provider,
                retry_after_secs,
            },
            // 529 is Anthropic's "overloaded"
            code @ (500..=599) => Self::ServerError {
                provider,
                status_code: code,
            },
            code => Self::InvalidRequest {
                provider,
                status_code: code,
                message: truncate_diagnostic(diagnostic),
            },
        }
    }
}

/// Parse a delta-seconds `Retry-After` header
#[must_use]
pub fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.ceil() as u64)
}

fn truncate_diagnostic(message: &str) -> String {
    message.chars().take(MAX_DIAGNOSTIC_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_status_classification() {
        let auth = ProviderError::from_status("openai", StatusCode::UNAUTHORIZED, None, "sk-abc");
        assert!(!auth.is_retryable());
        assert!(!auth.to_string().contains("sk-abc"));

        let overloaded =
            ProviderError::from_status("anthropic", StatusCode::from_u16(529).unwrap_or_default(), None, "");
        assert!(overloaded.is_retryable());

        let bad_model = ProviderError::from_status("groq", StatusCode::NOT_FOUND, None, "no such model");
        assert!(!bad_model.is_retryable());
        assert!(bad_model.to_string().contains("no such model"));
    }

    #[tokio::test]
    async fn test_transport_error_drops_request_url() {
        let result = reqwest::Client::new()
            .get("http://127.0.0.1:1/v1/models?key=sk-url-secret")
            .send()
            .await;
        assert!(result.is_err(), "nothing listens on port 1");

        if let Err(error) = result {
            let mapped = ProviderError::from_transport("gemini", error);
            assert!(mapped.is_retryable());
            assert_eq!(mapped.provider(), "gemini");
            assert!(!mapped.to_string().contains("sk-url-secret"));
        }
    }

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("2.5"));
        assert_eq!(retry_after_secs(&headers), Some(3));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after_secs(&headers), None);
    }
}
