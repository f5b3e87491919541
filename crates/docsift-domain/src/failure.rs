//! Classified failures from provider calls

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure classes for one provider call
///
/// The class decides retry behavior: rate limits, timeouts, and transient
/// provider errors may be retried; auth failures and responses that cannot
/// be parsed into the expected shape are terminal for the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Provider rejected the call due to rate limiting
    RateLimited,
    /// The call did not complete within the configured deadline
    Timeout,
    /// Transient provider-side error (5xx, transport failure)
    Provider,
    /// Authentication or authorization failure
    Auth,
    /// Response content could not be parsed into the expected schema
    MalformedResponse,
}

impl FailureKind {
    /// Whether a failure of this class may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::RateLimited | FailureKind::Timeout | FailureKind::Provider
        )
    }

    /// Stable string form used in logs and stored results
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Timeout => "timeout",
            FailureKind::Provider => "provider_error",
            FailureKind::Auth => "auth_error",
            FailureKind::MalformedResponse => "malformed_response",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified provider-call failure with context
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ProviderFailure {
    /// Failure class
    pub kind: FailureKind,
    /// Human-readable context for logs and stored results
    pub message: String,
}

impl ProviderFailure {
    /// Create a failure with an explicit class
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Rate-limited by the provider
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimited, message)
    }

    /// Call deadline exceeded
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    /// Transient provider error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Provider, message)
    }

    /// Authentication failure
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Auth, message)
    }

    /// Unparseable response content
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedResponse, message)
    }

    /// Whether this failure may be retried
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(FailureKind::RateLimited.is_retryable());
        assert!(FailureKind::Timeout.is_retryable());
        assert!(FailureKind::Provider.is_retryable());
        assert!(!FailureKind::Auth.is_retryable());
        assert!(!FailureKind::MalformedResponse.is_retryable());
    }

    #[test]
    fn test_display_includes_kind_and_message() {
        let failure = ProviderFailure::rate_limited("429 from provider");
        assert_eq!(failure.to_string(), "rate_limited: 429 from provider");
    }

    #[test]
    fn test_serde_round_trip() {
        let failure = ProviderFailure::auth("bad key");
        let json = serde_json::to_string(&failure).unwrap();
        let parsed: ProviderFailure = serde_json::from_str(&json).unwrap();
        assert_eq!(failure, parsed);
    }
}
