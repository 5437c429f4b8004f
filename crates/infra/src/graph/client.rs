//! The Graph API request pipeline
//!
//! Every tool handler funnels through [`GraphClient::execute`]: admission
//! against the per-account rate budget, the network call, classification of
//! any failure, and policy-driven retries. Listing endpoints additionally go
//! through [`GraphClient::pages`] / [`GraphClient::list_all`], which reuse
//! `execute` for every page so pagination never bypasses resilience
//! handling.

use std::sync::Arc;
use std::time::Duration;

use metaads_common::resilience::{
    AdmitError, BackoffStrategy, Jitter, RetryConfig, RetryDecision, RetryExecutor, RetryPolicy,
    ScoreLimiter, ScoreLimiterConfig, ThrottleLevel,
};
use metaads_domain::{Config, GraphApiConfig, MetaAdsError, PaginationConfig, RateLimitConfig, Result};
use reqwest::header::HeaderMap;
use reqwest::Response;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::auth::AuthManager;
use super::classify::{Classifier, FailureSignal};
use super::descriptor::{RequestDescriptor, RequestMethod, READ_COST};
use super::pagination::PageStream;
use crate::errors::InfraError;
use crate::http::HttpClient;

/// Where in an attempt a failure happened.
///
/// Admission failures are already bounded waits; retrying them would stack
/// more delay on top of a budget the limiter has measured precisely, so they
/// stop the retry sequence and surface directly.
#[derive(Debug)]
enum AttemptError {
    Admission(MetaAdsError),
    Api(MetaAdsError),
}

impl AttemptError {
    fn into_domain(self) -> MetaAdsError {
        match self {
            AttemptError::Admission(e) | AttemptError::Api(e) => e,
        }
    }
}

/// Retry policy over classified failures: retryable kinds are re-issued with
/// `max(server hint, backoff with jitter)` capped at the configured ceiling.
struct GraphRetryPolicy {
    backoff: BackoffStrategy,
    jitter: Jitter,
    max_delay: Duration,
}

impl GraphRetryPolicy {
    fn new(config: &RetryConfig) -> Self {
        let max_delay = match config.backoff {
            BackoffStrategy::Exponential { max_delay, .. } => max_delay,
            BackoffStrategy::Fixed(delay) => delay,
        };
        Self { backoff: config.backoff.clone(), jitter: config.jitter, max_delay }
    }
}

impl RetryPolicy<AttemptError> for GraphRetryPolicy {
    fn should_retry(&self, error: &AttemptError, attempt: u32) -> RetryDecision {
        match error {
            AttemptError::Admission(_) => RetryDecision::Stop,
            AttemptError::Api(e) => {
                if !e.is_retryable() {
                    return RetryDecision::Stop;
                }
                match e.retry_after() {
                    Some(hint) => {
                        let backoff = self.jitter.apply(self.backoff.calculate_delay(attempt));
                        RetryDecision::RetryAfter(hint.max(backoff).min(self.max_delay))
                    }
                    None => RetryDecision::Retry,
                }
            }
        }
    }
}

/// Resilient Meta Graph API client.
pub struct GraphClient {
    api: GraphApiConfig,
    rate: RateLimitConfig,
    pagination: PaginationConfig,
    http: HttpClient,
    auth: Arc<AuthManager>,
    limiter: ScoreLimiter,
    retry: RetryConfig,
    classifier: Classifier,
}

impl GraphClient {
    /// Build a client from configuration and an auth manager.
    pub fn new(config: &Config, auth: Arc<AuthManager>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .user_agent(concat!("meta-ads-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let limiter_config = ScoreLimiterConfig::builder()
            .max_score(config.rate_limit.max_score)
            .warn_ratio(config.rate_limit.warn_ratio)
            .decay_half_life(Duration::from_secs(config.rate_limit.decay_half_life_secs))
            .max_wait(Duration::from_secs(config.rate_limit.max_wait_secs))
            .build()
            .map_err(MetaAdsError::Config)?;
        let limiter = ScoreLimiter::new(limiter_config).map_err(MetaAdsError::Config)?;

        let retry = RetryConfig::builder()
            .max_retries(config.retry.max_retries)
            .exponential_backoff(
                Duration::from_millis(config.retry.base_backoff_ms),
                2.0,
                Duration::from_millis(config.retry.max_backoff_ms),
            )
            .equal_jitter()
            .build()
            .map_err(MetaAdsError::Config)?;

        Ok(Self {
            api: config.api.clone(),
            rate: config.rate_limit.clone(),
            pagination: config.pagination.clone(),
            http,
            auth,
            limiter,
            retry,
            classifier: Classifier::default(),
        })
    }

    /// Replace the failure classifier (custom code sets).
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Execute a request through the full pipeline.
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<Value> {
        let url = self.endpoint_url(&descriptor.endpoint);
        self.dispatch(
            descriptor.method,
            &url,
            &descriptor.params,
            &descriptor.form,
            descriptor.account_id.as_deref(),
            true,
            descriptor.cost(),
        )
        .await
    }

    /// Execute with a caller-imposed deadline.
    ///
    /// Expiry aborts the in-flight attempt (including any admission wait) and
    /// surfaces a transient cancellation classification without retrying.
    pub async fn execute_with_deadline(
        &self,
        descriptor: &RequestDescriptor,
        deadline: Duration,
    ) -> Result<Value> {
        match tokio::time::timeout(deadline, self.execute(descriptor)).await {
            Ok(result) => result,
            Err(_) => Err(MetaAdsError::TransientNetwork(format!(
                "request to {} cancelled: {deadline:?} deadline expired",
                descriptor.endpoint
            ))),
        }
    }

    /// Follow an absolute next-page URL from a `paging` object.
    ///
    /// The URL usually embeds the auth parameters already; they are only
    /// attached when missing.
    pub(crate) async fn follow_url(&self, url: &str, account: Option<&str>) -> Result<Value> {
        let attach_auth = !url.contains("access_token=");
        self.dispatch(RequestMethod::Get, url, &[], &[], account, attach_auth, READ_COST).await
    }

    /// Lazy page-at-a-time view of a listing endpoint.
    pub fn pages(&self, descriptor: RequestDescriptor) -> PageStream<'_> {
        PageStream::new(self, descriptor, &self.pagination)
    }

    /// Aggregate all pages of a listing, up to the configured page cap.
    pub async fn list_all(&self, descriptor: &RequestDescriptor) -> Result<Vec<Value>> {
        let mut stream = self.pages(descriptor.clone());
        let mut items = Vec::new();

        while stream.pages_fetched() < self.pagination.max_pages {
            match stream.next_page().await? {
                Some(page) => items.extend(page.items),
                None => return Ok(items),
            }
        }
        debug!(
            endpoint = %descriptor.endpoint,
            max_pages = self.pagination.max_pages,
            "stopped aggregation at the page cap"
        );
        Ok(items)
    }

    /// Current throttle level for an account (consumed by health checks).
    pub fn throttle_level(&self, account: &str) -> ThrottleLevel {
        self.limiter.throttle_level(account)
    }

    /// Current rate usage for an account as percent of the ceiling.
    pub fn usage(&self, account: &str) -> f64 {
        self.limiter.usage(account)
    }

    /// Accounts the rate limiter is currently tracking.
    pub fn tracked_accounts(&self) -> Vec<String> {
        self.limiter.tracked_keys()
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api.base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'))
    }

    /// Run one request through admission, execution, classification and the
    /// retry policy.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        method: RequestMethod,
        url: &str,
        params: &[(String, String)],
        form: &[(String, String)],
        account: Option<&str>,
        attach_auth: bool,
        cost: f64,
    ) -> Result<Value> {
        let executor = RetryExecutor::new(self.retry.clone(), GraphRetryPolicy::new(&self.retry));

        executor
            .execute(|| self.attempt_once(method, url, params, form, account, attach_auth, cost))
            .await
            .map_err(|err| {
                if let Some(attempts) = err.attempts() {
                    warn!(%url, attempts, "request failed after exhausting retries");
                }
                err.into_source().into_domain()
            })
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt_once(
        &self,
        method: RequestMethod,
        url: &str,
        params: &[(String, String)],
        form: &[(String, String)],
        account: Option<&str>,
        attach_auth: bool,
        cost: f64,
    ) -> std::result::Result<Value, AttemptError> {
        if let Some(account) = account {
            self.limiter
                .admit(account, cost)
                .await
                .map_err(|e| AttemptError::Admission(admission_failure(e)))?;
        }

        let mut query: Vec<(String, String)> = Vec::new();
        if attach_auth {
            query.extend(self.auth.auth_params().await.map_err(AttemptError::Api)?);
        }
        // Explicit request parameters override the attached auth parameters
        // (the token-debug tools pass their own access_token).
        query.retain(|(key, _)| !params.iter().any(|(pk, _)| pk == key));
        query.extend_from_slice(params);

        let mut builder = self.http.request(method.as_http(), url);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if method.is_write() && !form.is_empty() {
            builder = builder.form(&form);
        }

        let response = self.http.send(builder).await.map_err(AttemptError::Api)?;
        self.handle_response(account, response).await.map_err(AttemptError::Api)
    }

    /// Turn a response into a JSON value or a classified failure, and sync
    /// platform-reported usage into the limiter.
    async fn handle_response(&self, account: Option<&str>, response: Response) -> Result<Value> {
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let reported_pct = parse_usage_pct(response.headers());

        let text = response.text().await.map_err(|e| MetaAdsError::from(InfraError::from(e)))?;
        let body: Option<Value> = serde_json::from_str(&text).ok();

        if let Some(error) = body.as_ref().and_then(|b| b.get("error")) {
            let signal = FailureSignal::from_error_body(Some(status.as_u16()), error, retry_after);
            return Err(self.classifier.classify(&signal));
        }

        if !status.is_success() {
            let excerpt: String = text.chars().take(500).collect();
            let signal = FailureSignal::from_status(status.as_u16(), excerpt);
            return Err(self.classifier.classify(&signal));
        }

        if let (Some(account), Some(pct)) = (account, reported_pct) {
            self.sync_reported_usage(account, pct);
        }

        match body {
            Some(value) => Ok(value),
            // Some endpoints answer success with a non-JSON body.
            None => Ok(json!({ "raw": text })),
        }
    }

    /// When the platform reports higher utilization than the local estimate,
    /// trust the platform and record the difference.
    fn sync_reported_usage(&self, account: &str, reported_pct: f64) {
        let local_pct = self.limiter.usage(account);
        if reported_pct > local_pct {
            let delta = (reported_pct - local_pct) / 100.0 * self.rate.max_score;
            self.limiter.record(account, delta);
            debug!(account, reported_pct, local_pct, "synced platform-reported usage");
        }
    }
}

/// Map an admission failure onto the taxonomy.
fn admission_failure(error: AdmitError) -> MetaAdsError {
    match error {
        AdmitError::WaitExceedsCeiling { required, .. } => MetaAdsError::rate_limited(
            "local rate budget exhausted for account".to_string(),
            required,
        ),
        AdmitError::CostExceedsCeiling { cost, ceiling } => MetaAdsError::Config(format!(
            "call cost {cost} exceeds the configured rate ceiling {ceiling}"
        )),
    }
}

/// Parse a `Retry-After` header given in seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Highest utilization percentage reported by the usage headers.
fn parse_usage_pct(headers: &HeaderMap) -> Option<f64> {
    let mut max_pct: Option<f64> = None;
    for name in ["x-app-usage", "x-ad-account-usage"] {
        let Some(raw) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let Ok(parsed) = serde_json::from_str::<Value>(raw) else {
            continue;
        };
        for metric in ["call_count", "total_time", "total_cputime"] {
            if let Some(pct) = parsed.get(metric).and_then(Value::as_f64) {
                max_pct = Some(max_pct.map_or(pct, |m: f64| m.max(pct)));
            }
        }
    }
    max_pct
}
