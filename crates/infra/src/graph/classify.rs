//! Failure classification
//!
//! Maps a raw failure signal (HTTP status, platform error code/subcode,
//! transport failure) onto the closed `MetaAdsError` taxonomy. The rules run
//! as an ordered list evaluated top-down; order is load-bearing: Meta wraps
//! rate-limit conditions inside the same `OAuthException` family it uses for
//! authentication failures, so the code-based rate-limit rule must win over
//! any type- or status-based matching or throttling gets misreported as a
//! permanent auth failure.
//!
//! The code sets are injectable configuration: the platform's documented
//! sets are defaults, not assumed exhaustive.

use std::collections::HashSet;
use std::time::Duration;

use metaads_domain::MetaAdsError;
use serde_json::Value;
use tracing::trace;

/// Raw failure signal extracted from a response or transport error.
#[derive(Debug, Clone, Default)]
pub struct FailureSignal {
    pub http_status: Option<u16>,
    /// Platform-reported numeric error code.
    pub code: Option<i64>,
    pub subcode: Option<i64>,
    /// Platform-reported error type, e.g. `OAuthException`.
    pub error_type: Option<String>,
    pub message: Option<String>,
    /// `Retry-After` hint parsed from response headers.
    pub retry_after: Option<Duration>,
    /// Set when no HTTP response was received at all.
    pub transport_error: Option<String>,
}

impl FailureSignal {
    /// Signal from a Graph API error body (`{"error": {...}}`).
    pub fn from_error_body(
        http_status: Option<u16>,
        error: &Value,
        retry_after: Option<Duration>,
    ) -> Self {
        Self {
            http_status,
            code: error.get("code").and_then(Value::as_i64),
            subcode: error.get("error_subcode").and_then(Value::as_i64),
            error_type: error.get("type").and_then(Value::as_str).map(str::to_string),
            message: error.get("message").and_then(Value::as_str).map(str::to_string),
            retry_after,
            transport_error: None,
        }
    }

    /// Signal from a non-success status without a parseable error body.
    pub fn from_status(http_status: u16, body_excerpt: impl Into<String>) -> Self {
        Self {
            http_status: Some(http_status),
            message: Some(body_excerpt.into()),
            ..Self::default()
        }
    }

    /// Signal from a transport failure that produced no HTTP response.
    pub fn from_transport(description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            message: Some(description.clone()),
            transport_error: Some(description),
            ..Self::default()
        }
    }

    fn message(&self) -> String {
        self.message.clone().unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// Code sets driving classification. Injectable; defaults follow Meta's
/// documented values.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Codes reporting an exhausted rate budget (4, 17, 32).
    pub rate_limit_codes: HashSet<i64>,
    /// Codes reporting an invalid credential (190).
    pub auth_codes: HashSet<i64>,
    /// Codes reporting missing permissions (200, 10).
    pub permission_codes: HashSet<i64>,
    /// Codes reporting invalid parameters (100).
    pub validation_codes: HashSet<i64>,
    /// Codes reporting a missing object (803).
    pub not_found_codes: HashSet<i64>,
    /// Subcodes reporting a missing object (33).
    pub not_found_subcodes: HashSet<i64>,
    /// Retry-after assumed when the platform rate-limits without a hint.
    pub default_retry_after: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rate_limit_codes: HashSet::from([4, 17, 32]),
            auth_codes: HashSet::from([190]),
            permission_codes: HashSet::from([200, 10]),
            validation_codes: HashSet::from([100]),
            not_found_codes: HashSet::from([803]),
            not_found_subcodes: HashSet::from([33]),
            default_retry_after: Duration::from_secs(60),
        }
    }
}

/// Ordered-rule failure classifier. Pure: no side effects, no state beyond
/// the configured code sets.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

type Rule = fn(&Classifier, &FailureSignal) -> Option<MetaAdsError>;

/// The priority order. Top-down, first match wins.
const RULES: &[(&str, Rule)] = &[
    ("rate-limit-code", Classifier::match_rate_limit),
    ("auth-invalid", Classifier::match_auth),
    ("permission", Classifier::match_permission),
    ("validation", Classifier::match_validation),
    ("not-found", Classifier::match_not_found),
    ("transient", Classifier::match_transient),
];

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify a failure signal into exactly one domain error.
    pub fn classify(&self, signal: &FailureSignal) -> MetaAdsError {
        for (name, rule) in RULES {
            if let Some(error) = rule(self, signal) {
                trace!(rule = name, ?signal, "classified failure");
                return error;
            }
        }
        MetaAdsError::Unknown { code: signal.code, message: signal.message() }
    }

    /// Rate-limit codes win over everything, including the exception type and
    /// HTTP status the condition arrives wrapped in.
    fn match_rate_limit(&self, signal: &FailureSignal) -> Option<MetaAdsError> {
        let code = signal.code?;
        if !self.config.rate_limit_codes.contains(&code) {
            return None;
        }
        let retry_after = signal.retry_after.unwrap_or(self.config.default_retry_after);
        Some(MetaAdsError::rate_limited(signal.message(), retry_after))
    }

    fn match_auth(&self, signal: &FailureSignal) -> Option<MetaAdsError> {
        let by_status = matches!(signal.http_status, Some(401) | Some(403));
        let by_code = signal.code.is_some_and(|c| self.config.auth_codes.contains(&c));
        let by_type =
            signal.error_type.as_deref().is_some_and(|t| t.contains("OAuthException"));
        (by_status || by_code || by_type).then(|| MetaAdsError::AuthInvalid(signal.message()))
    }

    fn match_permission(&self, signal: &FailureSignal) -> Option<MetaAdsError> {
        let code = signal.code?;
        self.config
            .permission_codes
            .contains(&code)
            .then(|| MetaAdsError::PermissionDenied { message: signal.message(), code })
    }

    fn match_validation(&self, signal: &FailureSignal) -> Option<MetaAdsError> {
        let by_status = signal.http_status == Some(400);
        let by_code = signal.code.is_some_and(|c| self.config.validation_codes.contains(&c));
        (by_status || by_code).then(|| MetaAdsError::Validation(signal.message()))
    }

    fn match_not_found(&self, signal: &FailureSignal) -> Option<MetaAdsError> {
        let by_status = signal.http_status == Some(404);
        let by_code = signal.code.is_some_and(|c| self.config.not_found_codes.contains(&c));
        let by_subcode =
            signal.subcode.is_some_and(|s| self.config.not_found_subcodes.contains(&s));
        (by_status || by_code || by_subcode).then(|| MetaAdsError::NotFound(signal.message()))
    }

    /// No response at all, or a server-side failure: worth retrying.
    fn match_transient(&self, signal: &FailureSignal) -> Option<MetaAdsError> {
        let no_response = signal.transport_error.is_some();
        let server_error = signal.http_status.is_some_and(|s| (500..600).contains(&s));
        (no_response || server_error).then(|| MetaAdsError::TransientNetwork(signal.message()))
    }
}
