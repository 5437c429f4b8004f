//! Typed application configuration
//!
//! Loaded by the infra layer from environment variables or a config file;
//! every section other than auth has sensible defaults so a bare
//! `META_ACCESS_TOKEN` is enough to run.

use serde::{Deserialize, Serialize};

use crate::constants::default_graph_url;

/// Top-level configuration for the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub api: GraphApiConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

/// Meta API credential configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token attached to every outbound call.
    pub access_token: String,
    /// App id, required only for OAuth URL generation.
    #[serde(default)]
    pub app_id: Option<String>,
    /// App secret; when present an `appsecret_proof` is attached to calls.
    #[serde(default)]
    pub app_secret: Option<String>,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

fn default_redirect_uri() -> String {
    "https://localhost:3000/callback".to_string()
}

/// Graph API endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphApiConfig {
    /// Base URL including the API version. Overridden in tests to point at a
    /// mock server.
    #[serde(default = "default_graph_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GraphApiConfig {
    fn default() -> Self {
        Self { base_url: default_graph_url(), timeout_secs: default_timeout_secs() }
    }
}

/// Per-account rate budget configuration.
///
/// Defaults follow Meta's standard access tier: 9000 points, reads cost 1,
/// writes cost 3, scores halve every 5 minutes. Development-tier apps should
/// set `max_score` to 60.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_score")]
    pub max_score: f64,
    #[serde(default = "default_warn_ratio")]
    pub warn_ratio: f64,
    #[serde(default = "default_decay_half_life_secs")]
    pub decay_half_life_secs: u64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

fn default_max_score() -> f64 {
    9000.0
}

fn default_warn_ratio() -> f64 {
    0.8
}

fn default_decay_half_life_secs() -> u64 {
    300
}

fn default_max_wait_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_score: default_max_score(),
            warn_ratio: default_warn_ratio(),
            decay_half_life_secs: default_decay_half_life_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

/// Retry behavior for transient Graph API failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Additional attempts after the first one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Pagination safety limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Cap on pages fetched when aggregating a full listing.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// How many recent continuation values the cycle guard remembers.
    #[serde(default = "default_loop_guard_window")]
    pub loop_guard_window: usize,
}

fn default_max_pages() -> usize {
    10
}

fn default_loop_guard_window() -> usize {
    5
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { max_pages: default_max_pages(), loop_guard_window: default_loop_guard_window() }
    }
}

impl Config {
    /// Minimal configuration from a bare access token; everything else at
    /// defaults.
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self {
            auth: AuthConfig {
                access_token: token.into(),
                app_id: None,
                app_secret: None,
                redirect_uri: default_redirect_uri(),
            },
            api: GraphApiConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetrySettings::default(),
            pagination: PaginationConfig::default(),
        }
    }
}
