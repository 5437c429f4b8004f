//! Keyed decaying-score rate limiter
//!
//! Models point-budget rate limiting as used by ad platform APIs: every call
//! charges a number of points against a per-key score, the score decays
//! exponentially over time (halving every configured window), and admission
//! is granted only while the projected score stays below a ceiling.
//!
//! One limiter owns one score table. Entries are created lazily on first use
//! and kept for the life of the process; all reads and updates go through a
//! single lock so concurrent admissions can never jointly overshoot the
//! ceiling or lose a recorded cost.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};

/// Scores below this are treated as fully decayed.
const SCORE_FLOOR: f64 = 1e-6;

/// Minimum sleep between admission re-checks.
const MIN_REWAIT: Duration = Duration::from_millis(10);

/// Configuration for the decaying-score limiter.
#[derive(Debug, Clone)]
pub struct ScoreLimiterConfig {
    /// Score ceiling; admission requires the projected score to stay below it.
    pub max_score: f64,
    /// Fraction of the ceiling at which a key is reported as `Warned`.
    pub warn_ratio: f64,
    /// Time for an idle score to halve.
    pub decay_half_life: Duration,
    /// Longest a single admission is allowed to wait before failing fast.
    pub max_wait: Duration,
}

impl Default for ScoreLimiterConfig {
    fn default() -> Self {
        Self {
            max_score: 9000.0,
            warn_ratio: 0.8,
            decay_half_life: Duration::from_secs(300),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl ScoreLimiterConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ScoreLimiterConfigBuilder {
        ScoreLimiterConfigBuilder::new()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_score <= 0.0 {
            return Err("max_score must be greater than 0".to_string());
        }
        if self.warn_ratio <= 0.0 || self.warn_ratio > 1.0 {
            return Err("warn_ratio must be in (0, 1]".to_string());
        }
        if self.decay_half_life.is_zero() {
            return Err("decay_half_life must be greater than zero".to_string());
        }
        if self.max_wait.is_zero() {
            return Err("max_wait must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Builder for [`ScoreLimiterConfig`].
#[derive(Debug, Default)]
pub struct ScoreLimiterConfigBuilder {
    config: ScoreLimiterConfig,
}

impl ScoreLimiterConfigBuilder {
    pub fn new() -> Self {
        Self { config: ScoreLimiterConfig::default() }
    }

    pub fn max_score(mut self, max_score: f64) -> Self {
        self.config.max_score = max_score;
        self
    }

    pub fn warn_ratio(mut self, ratio: f64) -> Self {
        self.config.warn_ratio = ratio;
        self
    }

    pub fn decay_half_life(mut self, half_life: Duration) -> Self {
        self.config.decay_half_life = half_life;
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.config.max_wait = max_wait;
        self
    }

    pub fn build(self) -> Result<ScoreLimiterConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// How close a key is to its rate ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleLevel {
    /// Below the warning ratio.
    Normal,
    /// At or above the warning ratio, still admissible.
    Warned,
    /// At or above the ceiling.
    Blocked,
}

impl fmt::Display for ThrottleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleLevel::Normal => write!(f, "normal"),
            ThrottleLevel::Warned => write!(f, "warned"),
            ThrottleLevel::Blocked => write!(f, "blocked"),
        }
    }
}

/// Errors returned by [`ScoreLimiter::admit`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdmitError {
    /// The requested cost can never fit under the ceiling.
    #[error("cost {cost} can never be admitted under ceiling {ceiling}")]
    CostExceedsCeiling { cost: f64, ceiling: f64 },

    /// Admission would require waiting longer than the configured maximum.
    #[error("admission requires waiting {required:?}, over the {max_wait:?} ceiling")]
    WaitExceedsCeiling { required: Duration, max_wait: Duration },
}

impl AdmitError {
    /// How long the caller would need to wait before retrying, when known.
    pub fn required_wait(&self) -> Option<Duration> {
        match self {
            AdmitError::WaitExceedsCeiling { required, .. } => Some(*required),
            AdmitError::CostExceedsCeiling { .. } => None,
        }
    }
}

/// Per-key score state. `last_decay` anchors the decay window.
#[derive(Debug)]
struct KeyState {
    score: f64,
    last_decay: Instant,
}

/// Keyed decaying-score rate limiter.
///
/// # Examples
///
/// ```rust
/// use metaads_common::resilience::{ScoreLimiter, ScoreLimiterConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = ScoreLimiter::new(ScoreLimiterConfig::default())?;
/// limiter.admit("acct_1", 1.0).await?;
/// // ... perform the call, then reconcile platform-reported usage:
/// limiter.record("acct_1", 2.0);
/// # Ok(())
/// # }
/// ```
pub struct ScoreLimiter<C: Clock = SystemClock> {
    config: ScoreLimiterConfig,
    keys: Mutex<HashMap<String, KeyState>>,
    clock: Arc<C>,
}

impl ScoreLimiter<SystemClock> {
    /// Create a new limiter on the system clock.
    pub fn new(config: ScoreLimiterConfig) -> Result<Self, String> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> ScoreLimiter<C> {
    /// Create a new limiter with a custom clock.
    pub fn with_clock(config: ScoreLimiterConfig, clock: C) -> Result<Self, String> {
        config.validate()?;
        Ok(Self { config, keys: Mutex::new(HashMap::new()), clock: Arc::new(clock) })
    }

    /// Suspend until `cost` fits under the ceiling for `key`, then charge it.
    ///
    /// The wait is derived from the decay curve (the minimum time until the
    /// projected score drops below the ceiling) and re-checked after each
    /// sleep, since concurrent callers may have charged in between. A wait
    /// that would exceed `max_wait` fails immediately instead of stalling.
    pub async fn admit(&self, key: &str, cost: f64) -> Result<(), AdmitError> {
        if cost >= self.config.max_score {
            return Err(AdmitError::CostExceedsCeiling {
                cost,
                ceiling: self.config.max_score,
            });
        }

        let mut waited = Duration::ZERO;
        loop {
            let required = {
                let mut keys = self.keys.lock();
                let state = self.state_mut(&mut keys, key);
                if state.score + cost < self.config.max_score {
                    state.score += cost;
                    debug!(key, cost, score = state.score, "admission granted");
                    return Ok(());
                }
                self.wait_until_fits(state.score, cost)
            };

            if waited + required > self.config.max_wait {
                warn!(key, ?required, "admission wait would exceed ceiling, failing fast");
                return Err(AdmitError::WaitExceedsCeiling {
                    required,
                    max_wait: self.config.max_wait,
                });
            }

            let sleep_for = required.max(MIN_REWAIT);
            debug!(key, wait_ms = sleep_for.as_millis() as u64, "admission delayed");
            tokio::time::sleep(sleep_for).await;
            waited += sleep_for;
        }
    }

    /// Add `cost` to a key's score without waiting.
    ///
    /// Used to reconcile usage the platform reports beyond what was charged
    /// at admission time.
    pub fn record(&self, key: &str, cost: f64) {
        let mut keys = self.keys.lock();
        let state = self.state_mut(&mut keys, key);
        state.score += cost;
        debug!(key, cost, score = state.score, "recorded usage");
    }

    /// Current usage for a key as a percentage of the ceiling.
    pub fn usage(&self, key: &str) -> f64 {
        let mut keys = self.keys.lock();
        let state = self.state_mut(&mut keys, key);
        (state.score / self.config.max_score) * 100.0
    }

    /// Current throttle level for a key.
    pub fn throttle_level(&self, key: &str) -> ThrottleLevel {
        let mut keys = self.keys.lock();
        let state = self.state_mut(&mut keys, key);
        let ratio = state.score / self.config.max_score;
        if ratio >= 1.0 {
            ThrottleLevel::Blocked
        } else if ratio >= self.config.warn_ratio {
            ThrottleLevel::Warned
        } else {
            ThrottleLevel::Normal
        }
    }

    /// Time an admission of `cost` would have to wait right now.
    ///
    /// Returns `Duration::ZERO` when the key is immediately admissible.
    pub fn required_wait(&self, key: &str, cost: f64) -> Duration {
        let mut keys = self.keys.lock();
        let state = self.state_mut(&mut keys, key);
        if state.score + cost < self.config.max_score {
            Duration::ZERO
        } else {
            self.wait_until_fits(state.score, cost)
        }
    }

    /// Keys currently tracked by the limiter.
    pub fn tracked_keys(&self) -> Vec<String> {
        self.keys.lock().keys().cloned().collect()
    }

    /// Fetch-or-create state for a key, applying decay for elapsed time.
    fn state_mut<'a>(
        &self,
        keys: &'a mut HashMap<String, KeyState>,
        key: &str,
    ) -> &'a mut KeyState {
        let now = self.clock.now();
        let state = keys
            .entry(key.to_string())
            .or_insert_with(|| KeyState { score: 0.0, last_decay: now });

        let elapsed = now.saturating_duration_since(state.last_decay);
        if !elapsed.is_zero() {
            let periods = elapsed.as_secs_f64() / self.config.decay_half_life.as_secs_f64();
            state.score *= 0.5_f64.powf(periods);
            if state.score < SCORE_FLOOR {
                state.score = 0.0;
            }
            state.last_decay = now;
        }
        state
    }

    /// Minimum time until `score` decays enough for `cost` to fit.
    ///
    /// Solves `score * 0.5^(t / half_life) + cost < ceiling` for `t`.
    fn wait_until_fits(&self, score: f64, cost: f64) -> Duration {
        let headroom = self.config.max_score - cost;
        debug_assert!(headroom > 0.0);
        let ratio = score / headroom;
        if ratio <= 1.0 {
            return MIN_REWAIT;
        }
        let secs = self.config.decay_half_life.as_secs_f64() * ratio.log2();
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::super::clock::MockClock;
    use super::*;

    fn config(max_score: f64, half_life: Duration) -> ScoreLimiterConfig {
        ScoreLimiterConfig::builder()
            .max_score(max_score)
            .decay_half_life(half_life)
            .max_wait(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn admits_and_charges_below_ceiling() {
        let limiter = ScoreLimiter::new(config(100.0, Duration::from_secs(300))).unwrap();

        limiter.admit("acct_1", 10.0).await.unwrap();
        limiter.admit("acct_1", 10.0).await.unwrap();

        let usage = limiter.usage("acct_1");
        assert!((usage - 20.0).abs() < 0.5, "usage was {usage}");
    }

    #[tokio::test]
    async fn keys_are_tracked_independently() {
        let limiter = ScoreLimiter::new(config(100.0, Duration::from_secs(300))).unwrap();

        limiter.admit("acct_1", 50.0).await.unwrap();
        assert!(limiter.usage("acct_1") > 45.0);
        assert_eq!(limiter.usage("acct_2"), 0.0);

        let mut keys = limiter.tracked_keys();
        keys.sort();
        assert_eq!(keys, vec!["acct_1", "acct_2"]);
    }

    #[test]
    fn score_decays_to_admissible_within_one_half_life() {
        let clock = MockClock::new();
        let limiter =
            ScoreLimiter::with_clock(config(150.0, Duration::from_secs(300)), clock.clone())
                .unwrap();

        limiter.record("acct_1", 120.0);
        // 120 + 40 >= 150: blocked right now.
        assert!(limiter.required_wait("acct_1", 40.0) > Duration::ZERO);

        // One half-life later the score is 60; 60 + 40 < 150.
        clock.advance_secs(300);
        assert_eq!(limiter.required_wait("acct_1", 40.0), Duration::ZERO);
    }

    #[test]
    fn idle_score_decays_to_zero() {
        let clock = MockClock::new();
        let limiter =
            ScoreLimiter::with_clock(config(100.0, Duration::from_secs(60)), clock.clone())
                .unwrap();

        limiter.record("acct_1", 50.0);
        clock.advance_secs(60 * 40);
        assert_eq!(limiter.usage("acct_1"), 0.0);
    }

    #[test]
    fn throttle_levels_follow_usage() {
        let clock = MockClock::new();
        let limiter =
            ScoreLimiter::with_clock(config(100.0, Duration::from_secs(300)), clock.clone())
                .unwrap();

        assert_eq!(limiter.throttle_level("acct_1"), ThrottleLevel::Normal);

        limiter.record("acct_1", 85.0);
        assert_eq!(limiter.throttle_level("acct_1"), ThrottleLevel::Warned);

        limiter.record("acct_1", 20.0);
        assert_eq!(limiter.throttle_level("acct_1"), ThrottleLevel::Blocked);
    }

    #[tokio::test]
    async fn cost_larger_than_ceiling_is_rejected_immediately() {
        let limiter = ScoreLimiter::new(config(100.0, Duration::from_secs(300))).unwrap();

        let err = limiter.admit("acct_1", 100.0).await.unwrap_err();
        assert!(matches!(err, AdmitError::CostExceedsCeiling { .. }));
    }

    #[tokio::test]
    async fn excessive_wait_fails_fast_instead_of_stalling() {
        let cfg = ScoreLimiterConfig::builder()
            .max_score(100.0)
            .decay_half_life(Duration::from_secs(600))
            .max_wait(Duration::from_millis(50))
            .build()
            .unwrap();
        let limiter = ScoreLimiter::new(cfg).unwrap();

        limiter.record("acct_1", 200.0);

        let start = Instant::now();
        let err = limiter.admit("acct_1", 50.0).await.unwrap_err();
        // Decaying 200 down far enough takes minutes; the limiter must give up
        // without sleeping through them.
        assert!(matches!(err, AdmitError::WaitExceedsCeiling { .. }));
        assert!(err.required_wait().unwrap() > Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn concurrent_admissions_are_serialized_under_the_ceiling() {
        // Ceiling 500, cost 100 per call: of 5 rapid concurrent calls only 4
        // fit; the 5th must be delayed until some score decays.
        let cfg = ScoreLimiterConfig::builder()
            .max_score(500.0)
            .decay_half_life(Duration::from_millis(200))
            .max_wait(Duration::from_secs(5))
            .build()
            .unwrap();
        let limiter = Arc::new(ScoreLimiter::new(cfg).unwrap());

        let mut handles = Vec::new();
        for _ in 0..5 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                let start = Instant::now();
                limiter.admit("acct_1", 100.0).await.unwrap();
                start.elapsed()
            }));
        }

        let mut delays = Vec::new();
        for handle in handles {
            delays.push(handle.await.unwrap());
        }

        let delayed = delays.iter().filter(|d| **d >= Duration::from_millis(5)).count();
        assert!(delayed >= 1, "expected at least one delayed admission, delays: {delays:?}");
    }

    #[test]
    fn recorded_usage_is_never_lost_under_contention() {
        let limiter =
            Arc::new(ScoreLimiter::new(config(1_000_000.0, Duration::from_secs(3600))).unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    limiter.record("acct_1", 1.0);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // 800 points on a 1M ceiling with an hour half-life: decay during the
        // test is negligible.
        let usage = limiter.usage("acct_1");
        assert!((usage - 0.08).abs() < 0.005, "usage was {usage}");
    }

    #[test]
    fn config_validation() {
        assert!(ScoreLimiterConfig::builder().max_score(0.0).build().is_err());
        assert!(ScoreLimiterConfig::builder().warn_ratio(1.5).build().is_err());
        assert!(ScoreLimiterConfig::builder().decay_half_life(Duration::ZERO).build().is_err());
        assert!(ScoreLimiterConfig::builder().max_wait(Duration::ZERO).build().is_err());
    }
}
