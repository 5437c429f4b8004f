//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required variables are missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `META_ACCESS_TOKEN`: Graph API access token (required)
//! - `META_APP_ID`: App id, needed only for OAuth URL generation
//! - `META_APP_SECRET`: App secret; enables `appsecret_proof`
//! - `META_REDIRECT_URI`: OAuth redirect URI
//! - `METAADS_GRAPH_BASE_URL`: Override the Graph API base URL
//! - `METAADS_TIMEOUT_SECS`: HTTP timeout
//! - `METAADS_MAX_SCORE`: Rate ceiling (60 for development-tier apps)
//! - `METAADS_MAX_RETRIES`: Additional attempts after the first
//!
//! ## File Locations
//! The loader probes `./config.{json,toml}` and `./metaads.{json,toml}` in
//! the working directory and up to two parent directories.

use std::path::{Path, PathBuf};

use metaads_domain::{Config, MetaAdsError, Result};

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns `MetaAdsError::Config` if configuration cannot be loaded from
/// either source.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables.
///
/// `META_ACCESS_TOKEN` is required; every other variable overrides a
/// default.
///
/// # Errors
/// Returns `MetaAdsError::Config` if the token is missing or a numeric
/// override does not parse.
pub fn load_from_env() -> Result<Config> {
    let token = env_var("META_ACCESS_TOKEN")?;
    let mut config = Config::from_access_token(token);

    config.auth.app_id = std::env::var("META_APP_ID").ok().filter(|s| !s.is_empty());
    config.auth.app_secret = std::env::var("META_APP_SECRET").ok().filter(|s| !s.is_empty());
    if let Ok(uri) = std::env::var("META_REDIRECT_URI") {
        if !uri.is_empty() {
            config.auth.redirect_uri = uri;
        }
    }

    if let Ok(base_url) = std::env::var("METAADS_GRAPH_BASE_URL") {
        if !base_url.is_empty() {
            config.api.base_url = base_url;
        }
    }
    if let Some(timeout) = env_parse::<u64>("METAADS_TIMEOUT_SECS")? {
        config.api.timeout_secs = timeout;
    }
    if let Some(max_score) = env_parse::<f64>("METAADS_MAX_SCORE")? {
        config.rate_limit.max_score = max_score;
    }
    if let Some(max_retries) = env_parse::<u32>("METAADS_MAX_RETRIES")? {
        config.retry.max_retries = max_retries;
    }

    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `MetaAdsError::Config` if no file is found or parsing fails.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MetaAdsError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            MetaAdsError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| MetaAdsError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content; format detected by extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| MetaAdsError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| MetaAdsError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(MetaAdsError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe standard locations for configuration files.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        for dir in [cwd.clone(), cwd.join(".."), cwd.join("../..")] {
            for name in ["config.json", "config.toml", "metaads.json", "metaads.toml"] {
                candidates.push(dir.join(name));
            }
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MetaAdsError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable into a number.
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| MetaAdsError::Config(format!("Invalid value for {key}: {raw}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn clear_env() {
        for key in [
            "META_ACCESS_TOKEN",
            "META_APP_ID",
            "META_APP_SECRET",
            "META_REDIRECT_URI",
            "METAADS_GRAPH_BASE_URL",
            "METAADS_TIMEOUT_SECS",
            "METAADS_MAX_SCORE",
            "METAADS_MAX_RETRIES",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn loads_from_env_with_overrides() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("META_ACCESS_TOKEN", "tok-123");
        std::env::set_var("META_APP_ID", "app-1");
        std::env::set_var("META_APP_SECRET", "s3cret");
        std::env::set_var("METAADS_MAX_SCORE", "60");
        std::env::set_var("METAADS_MAX_RETRIES", "5");

        let config = load_from_env().expect("config");
        assert_eq!(config.auth.access_token, "tok-123");
        assert_eq!(config.auth.app_id.as_deref(), Some("app-1"));
        assert_eq!(config.rate_limit.max_score, 60.0);
        assert_eq!(config.retry.max_retries, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.api.timeout_secs, 30);

        clear_env();
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, MetaAdsError::Config(_)));
        assert!(err.to_string().contains("META_ACCESS_TOKEN"));
    }

    #[test]
    fn invalid_numeric_override_is_rejected() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("META_ACCESS_TOKEN", "tok");
        std::env::set_var("METAADS_MAX_RETRIES", "not-a-number");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, MetaAdsError::Config(_)));

        clear_env();
    }

    #[test]
    fn loads_from_json_file() {
        let json_content = r#"{
            "auth": { "access_token": "file-token", "app_id": "app-9" },
            "rate_limit": { "max_score": 60 }
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("config");
        assert_eq!(config.auth.access_token, "file-token");
        assert_eq!(config.rate_limit.max_score, 60.0);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn loads_from_toml_file() {
        let toml_content = r#"
[auth]
access_token = "toml-token"

[retry]
max_retries = 2
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("config");
        assert_eq!(config.auth.access_token, "toml-token");
        assert_eq!(config.retry.max_retries, 2);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/config.json")));
        assert!(matches!(result, Err(MetaAdsError::Config(_))));
    }

    #[test]
    fn unsupported_format_is_rejected() {
        let result = parse_config("access_token: nope", &PathBuf::from("config.yaml"));
        assert!(matches!(result, Err(MetaAdsError::Config(_))));
    }
}
