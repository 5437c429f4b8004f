//! Error types used throughout the application
//!
//! Failures from the Graph API are classified into a closed taxonomy. The
//! taxonomy drives retry eligibility and is surfaced unchanged to callers:
//! the conversational layer needs the distinction (reauthenticate vs wait vs
//! fix parameters) and the retry-after hint, so classifications are never
//! collapsed into a generic error.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Taxonomy kind of a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    TransientNetwork,
    AuthInvalid,
    PermissionDenied,
    Validation,
    NotFound,
    Unknown,
    Config,
    Internal,
}

impl ErrorKind {
    /// Whether failures of this kind may be retried locally.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::TransientNetwork)
    }
}

/// Main error type for the Meta Ads MCP server.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum MetaAdsError {
    /// The platform rate budget is exhausted; retry after the given delay.
    #[error("Rate limit: {message} (retry after {retry_after_secs}s)")]
    RateLimited { message: String, retry_after_secs: u64 },

    /// No usable HTTP response: connection failures, timeouts, 5xx.
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// The credential was rejected; the caller must reacquire a token.
    #[error("Authentication error: {0}")]
    AuthInvalid(String),

    /// The credential is valid but lacks permission for the operation.
    #[error("Permission error ({code}): {message}")]
    PermissionDenied { message: String, code: i64 },

    /// The platform rejected the request parameters.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The addressed object does not exist (or is not visible).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A platform error outside the known code sets; the code is preserved.
    #[error("Meta API error ({code:?}): {message}")]
    Unknown { code: Option<i64>, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MetaAdsError {
    /// Construct a rate-limited classification from a retry-after hint.
    pub fn rate_limited(message: impl Into<String>, retry_after: Duration) -> Self {
        MetaAdsError::RateLimited {
            message: message.into(),
            retry_after_secs: retry_after.as_secs(),
        }
    }

    /// The taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetaAdsError::RateLimited { .. } => ErrorKind::RateLimited,
            MetaAdsError::TransientNetwork(_) => ErrorKind::TransientNetwork,
            MetaAdsError::AuthInvalid(_) => ErrorKind::AuthInvalid,
            MetaAdsError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            MetaAdsError::Validation(_) => ErrorKind::Validation,
            MetaAdsError::NotFound(_) => ErrorKind::NotFound,
            MetaAdsError::Unknown { .. } => ErrorKind::Unknown,
            MetaAdsError::Config(_) => ErrorKind::Config,
            MetaAdsError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this failure may be retried locally.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Server-provided retry delay, when the platform reported one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MetaAdsError::RateLimited { retry_after_secs, .. } => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        }
    }
}

/// Result type alias for Meta Ads operations.
pub type Result<T> = std::result::Result<T, MetaAdsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_kind() {
        let rate = MetaAdsError::rate_limited("too many calls", Duration::from_secs(60));
        assert_eq!(rate.kind(), ErrorKind::RateLimited);
        assert!(rate.is_retryable());
        assert_eq!(rate.retry_after(), Some(Duration::from_secs(60)));

        let net = MetaAdsError::TransientNetwork("connection reset".into());
        assert!(net.is_retryable());
        assert_eq!(net.retry_after(), None);

        let auth = MetaAdsError::AuthInvalid("token expired".into());
        assert!(!auth.is_retryable());

        let unknown = MetaAdsError::Unknown { code: Some(999), message: "?".into() };
        assert!(!unknown.is_retryable());
    }

    #[test]
    fn display_keeps_the_upstream_message() {
        let err = MetaAdsError::PermissionDenied { message: "missing ads_read".into(), code: 200 };
        let text = err.to_string();
        assert!(text.contains("missing ads_read"));
        assert!(text.contains("200"));
    }

    #[test]
    fn serializes_with_tagged_type() {
        let err = MetaAdsError::Validation("bad objective".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "Validation");
        assert_eq!(json["details"], "bad objective");
    }
}
