//! Generic retry execution with pluggable policies
//!
//! The executor re-runs a fallible async operation until it succeeds, the
//! policy refuses, or the attempt budget is exhausted. Whatever error ended
//! the sequence is returned to the caller unchanged; downstream code relies
//! on the concrete error, so it is never replaced with a summary.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a retry sequence stopped, carrying the error that ended it.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The attempt budget ran out; `source` is the last failure observed.
    #[error("retry attempts exhausted after {attempts} tries")]
    Exhausted { attempts: u32, source: E },

    /// The policy declined to retry; `source` is the failure it saw.
    #[error("operation failed with non-retryable error")]
    NonRetryable { source: E },
}

impl<E> RetryError<E> {
    /// Unwrap the underlying operation error, discarding retry bookkeeping.
    pub fn into_source(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } => source,
            RetryError::NonRetryable { source } => source,
        }
    }

    /// Number of attempts made before giving up, when known.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RetryError::Exhausted { attempts, .. } => Some(*attempts),
            RetryError::NonRetryable { .. } => None,
        }
    }
}

/// Trait for determining whether an error should be retried.
pub trait RetryPolicy<E> {
    /// Decide what to do about `error`, observed on 0-based attempt `attempt`.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry with the configured backoff delay.
    Retry,
    /// Retry after a specific delay (e.g. a server-provided hint).
    RetryAfter(Duration),
    /// Don't retry the operation.
    Stop,
}

/// Backoff strategy for calculating retry delays.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff: `initial_delay * base^attempt`, capped at
    /// `max_delay`.
    Exponential { initial_delay: Duration, base: f64, max_delay: Duration },
}

impl BackoffStrategy {
    /// Calculate the delay for the given 0-based attempt.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed(delay) => *delay,
            BackoffStrategy::Exponential { initial_delay, base, max_delay } => {
                let delay = initial_delay.as_millis() as f64 * base.powi(attempt as i32);
                let delay_ms = delay.min(max_delay.as_millis() as f64) as u64;
                Duration::from_millis(delay_ms)
            }
        }
    }
}

/// Jitter added to retry delays to avoid synchronized retry storms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// No jitter.
    None,
    /// Full jitter: uniform in `[0, delay]`.
    Full,
    /// Equal jitter: uniform in `[delay/2, delay]`.
    Equal,
}

impl Jitter {
    /// Apply jitter to a calculated delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = delay.as_millis() as u64;
        if millis == 0 {
            return delay;
        }
        let mut rng = rand::thread_rng();
        match self {
            Jitter::None => delay,
            Jitter::Full => Duration::from_millis(rng.gen_range(0..=millis)),
            Jitter::Equal => {
                let half = millis / 2;
                Duration::from_millis(half + rng.gen_range(0..=millis - half))
            }
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts allowed after the first one.
    pub max_retries: u32,
    /// Backoff strategy for calculating delays.
    pub backoff: BackoffStrategy,
    /// Jitter applied to backoff delays (not to `RetryAfter` hints).
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_secs(1),
                base: 2.0,
                max_delay: Duration::from_secs(60),
            },
            jitter: Jitter::Equal,
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if let BackoffStrategy::Exponential { base, .. } = &self.backoff {
            if *base <= 0.0 {
                return Err("exponential base must be greater than 0".to_string());
            }
        }
        Ok(())
    }
}

/// Builder for [`RetryConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, base, max_delay };
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.config.jitter = Jitter::None;
        self
    }

    pub fn full_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Full;
        self
    }

    pub fn equal_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Equal;
        self
    }

    pub fn build(self) -> Result<RetryConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The retry executor: runs an operation under a config and policy.
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy.
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Execute an operation with retry logic.
    ///
    /// The policy is consulted on every failure. A `Stop` decision or an
    /// exhausted attempt budget ends the sequence; in both cases the last
    /// error is returned inside the [`RetryError`] unchanged.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let decision = self.policy.should_retry(&error, attempt);

                    if decision == RetryDecision::Stop {
                        debug!(?error, "policy declined to retry");
                        return Err(RetryError::NonRetryable { source: error });
                    }

                    if attempt >= self.config.max_retries {
                        warn!(
                            attempts = attempt + 1,
                            ?error,
                            "retry attempts exhausted, surfacing last error"
                        );
                        return Err(RetryError::Exhausted { attempts: attempt + 1, source: error });
                    }

                    let delay = match decision {
                        RetryDecision::RetryAfter(custom) => custom,
                        _ => self.config.jitter.apply(self.config.backoff.calculate_delay(attempt)),
                    };
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        ?error,
                        "operation failed, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Retries on everything, using the configured backoff.
    struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retries.
    struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_retries(max_retries)
            .fixed_backoff(Duration::from_millis(1))
            .no_jitter()
            .build()
            .unwrap()
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let strategy = BackoffStrategy::Fixed(Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(7), Duration::from_millis(100));
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let strategy = BackoffStrategy::Exponential {
            initial_delay: Duration::from_millis(100),
            base: 2.0,
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(strategy.calculate_delay(3), Duration::from_millis(800));
        assert_eq!(strategy.calculate_delay(20), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let delay = Duration::from_millis(100);
        assert_eq!(Jitter::None.apply(delay), delay);

        for _ in 0..50 {
            let full = Jitter::Full.apply(delay);
            assert!(full <= delay);

            let equal = Jitter::Equal.apply(delay);
            assert!(equal >= Duration::from_millis(50));
            assert!(equal <= delay);
        }
    }

    #[test]
    fn config_validation_rejects_bad_base() {
        let result = RetryConfig::builder()
            .exponential_backoff(Duration::from_millis(1), 0.0, Duration::from_secs(1))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let executor = RetryExecutor::new(fast_config(3), AlwaysRetry);
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);

        let result = executor
            .execute(|| {
                let c = Arc::clone(&c);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_last_error_verbatim() {
        let executor = RetryExecutor::new(fast_config(3), AlwaysRetry);
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);

        let result: Result<(), _> = executor
            .execute(|| {
                let c = Arc::clone(&c);
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    Err(format!("failure #{n}"))
                }
            })
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, source }) => {
                assert_eq!(attempts, 4); // initial attempt + 3 retries
                assert_eq!(source, "failure #3"); // the LAST error, not a summary
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn stop_decision_returns_immediately() {
        let executor = RetryExecutor::new(fast_config(5), NeverRetry);
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);

        let result: Result<(), _> = executor
            .execute(|| {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("fatal")
                }
            })
            .await;

        match result {
            Err(RetryError::NonRetryable { source }) => assert_eq!(source, "fatal"),
            other => panic!("expected NonRetryable, got {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_after_overrides_backoff_delay() {
        struct HintedPolicy;
        impl RetryPolicy<&'static str> for HintedPolicy {
            fn should_retry(&self, _error: &&'static str, _attempt: u32) -> RetryDecision {
                RetryDecision::RetryAfter(Duration::from_millis(20))
            }
        }

        // Backoff says 1ms, the hint says 20ms; the hint must win.
        let executor = RetryExecutor::new(fast_config(1), HintedPolicy);
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);

        let start = std::time::Instant::now();
        let result = executor
            .execute(|| {
                let c = Arc::clone(&c);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("throttled")
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn into_source_recovers_the_error() {
        let err: RetryError<&str> = RetryError::Exhausted { attempts: 2, source: "boom" };
        assert_eq!(err.into_source(), "boom");

        let err: RetryError<&str> = RetryError::NonRetryable { source: "nope" };
        assert_eq!(err.into_source(), "nope");
    }
}
