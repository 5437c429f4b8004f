//! Resilience patterns for calling unreliable remote services
//!
//! This module provides **generic, reusable** building blocks:
//! - **Retry Logic**: configurable retry strategies with exponential backoff
//!   and jitter, driven by a pluggable [`RetryPolicy`]
//! - **Score Limiter**: a keyed, decaying-score rate limiter modelled on
//!   point-budget APIs (each call costs points, points decay over time)
//!
//! The implementations are generic over error types and use a clock
//! abstraction ([`Clock`] / [`MockClock`]) so time-based behavior is
//! deterministic in tests.

pub mod clock;
pub mod retry;
pub mod score_limiter;

pub use clock::{Clock, MockClock, SystemClock};
pub use retry::{
    BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy,
};
pub use score_limiter::{
    AdmitError, ScoreLimiter, ScoreLimiterConfig, ScoreLimiterConfigBuilder, ThrottleLevel,
};
