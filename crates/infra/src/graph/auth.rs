//! Credential handling for Graph API calls
//!
//! Token acquisition and refresh are a collaborator's concern; this module
//! only attaches credentials to outbound calls and builds the OAuth URLs
//! and parameter sets the oauth tools expose. `AuthInvalid` classifications
//! pass through the pipeline untouched so the collaborator can trigger
//! reacquisition.

use std::sync::Arc;

use async_trait::async_trait;
use metaads_domain::constants::{DEFAULT_OAUTH_SCOPES, FACEBOOK_OAUTH_HOST, META_API_VERSION};
use metaads_domain::{AuthConfig, MetaAdsError, Result};
use ring::hmac;
use url::Url;

/// Provides bearer tokens for Graph API calls.
///
/// Implementations may refresh tokens behind the scenes; the pipeline treats
/// the provider as opaque.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Retrieve a token to authorize the next API call.
    async fn access_token(&self) -> Result<String>;
}

/// Provider that always returns the configured token.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(MetaAdsError::Config(
                "META_ACCESS_TOKEN is required but not set".to_string(),
            ));
        }
        Ok(self.token.clone())
    }
}

/// Attaches credentials to calls and builds OAuth flows.
pub struct AuthManager {
    config: AuthConfig,
    provider: Arc<dyn AccessTokenProvider>,
}

impl AuthManager {
    /// Auth manager over the statically configured token.
    pub fn new(config: AuthConfig) -> Self {
        let provider = Arc::new(StaticTokenProvider::new(config.access_token.clone()));
        Self { config, provider }
    }

    /// Auth manager with a custom token provider (e.g. an auto-refreshing
    /// one).
    pub fn with_provider(config: AuthConfig, provider: Arc<dyn AccessTokenProvider>) -> Self {
        Self { config, provider }
    }

    pub fn app_id(&self) -> Option<&str> {
        self.config.app_id.as_deref()
    }

    /// Query parameters for an authenticated API call.
    pub async fn auth_params(&self) -> Result<Vec<(String, String)>> {
        let token = self.provider.access_token().await?;
        let mut params = vec![("access_token".to_string(), token.clone())];
        if let Some(proof) = self.appsecret_proof(&token) {
            params.push(("appsecret_proof".to_string(), proof));
        }
        Ok(params)
    }

    /// HMAC-SHA256 of the access token under the app secret.
    ///
    /// Meta rejects calls from server apps with "require app secret" enabled
    /// unless this proof accompanies the token.
    fn appsecret_proof(&self, token: &str) -> Option<String> {
        let secret = self.config.app_secret.as_deref()?;
        if secret.is_empty() || token.is_empty() {
            return None;
        }
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let signature = hmac::sign(&key, token.as_bytes());
        Some(hex::encode(signature.as_ref()))
    }

    /// Facebook OAuth dialog URL for interactive authorization.
    pub fn oauth_dialog_url(&self, scopes: &[&str], state: Option<&str>) -> Result<String> {
        let app_id = self
            .config
            .app_id
            .as_deref()
            .ok_or_else(|| MetaAdsError::Config("META_APP_ID required for OAuth flow".into()))?;

        let scopes = if scopes.is_empty() { DEFAULT_OAUTH_SCOPES } else { scopes };
        let mut params = vec![
            ("client_id", app_id.to_string()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("scope", scopes.join(",")),
            ("response_type", "code".to_string()),
        ];
        if let Some(state) = state {
            params.push(("state", state.to_string()));
        }

        let url = Url::parse_with_params(
            &format!("{FACEBOOK_OAUTH_HOST}/{META_API_VERSION}/dialog/oauth"),
            params,
        )
        .map_err(|e| MetaAdsError::Internal(format!("failed to build OAuth URL: {e}")))?;
        Ok(url.to_string())
    }

    /// Parameters for exchanging an authorization code for an access token.
    pub fn token_exchange_params(&self, code: &str) -> Result<Vec<(String, String)>> {
        let (app_id, app_secret) = self.app_credentials()?;
        Ok(vec![
            ("client_id".to_string(), app_id),
            ("client_secret".to_string(), app_secret),
            ("redirect_uri".to_string(), self.config.redirect_uri.clone()),
            ("code".to_string(), code.to_string()),
        ])
    }

    /// Parameters for exchanging a short-lived token for a long-lived
    /// (60-day) one.
    pub fn long_lived_token_params(&self, short_token: Option<&str>) -> Result<Vec<(String, String)>> {
        let (app_id, app_secret) = self.app_credentials()?;
        let token = short_token.unwrap_or(&self.config.access_token);
        Ok(vec![
            ("grant_type".to_string(), "fb_exchange_token".to_string()),
            ("client_id".to_string(), app_id),
            ("client_secret".to_string(), app_secret),
            ("fb_exchange_token".to_string(), token.to_string()),
        ])
    }

    fn app_credentials(&self) -> Result<(String, String)> {
        match (&self.config.app_id, &self.config.app_secret) {
            (Some(id), Some(secret)) => Ok((id.clone(), secret.clone())),
            _ => Err(MetaAdsError::Config(
                "META_APP_ID and META_APP_SECRET required for token exchange".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use metaads_domain::ErrorKind;

    use super::*;

    fn config(app_id: Option<&str>, app_secret: Option<&str>) -> AuthConfig {
        AuthConfig {
            access_token: "test-token".to_string(),
            app_id: app_id.map(str::to_string),
            app_secret: app_secret.map(str::to_string),
            redirect_uri: "https://localhost:3000/callback".to_string(),
        }
    }

    #[tokio::test]
    async fn auth_params_carry_the_token() {
        let auth = AuthManager::new(config(None, None));
        let params = auth.auth_params().await.unwrap();
        assert_eq!(params, vec![("access_token".to_string(), "test-token".to_string())]);
    }

    #[tokio::test]
    async fn appsecret_proof_is_attached_when_secret_is_configured() {
        let auth = AuthManager::new(config(Some("app1"), Some("s3cret")));
        let params = auth.auth_params().await.unwrap();

        let proof = params
            .iter()
            .find(|(k, _)| k == "appsecret_proof")
            .map(|(_, v)| v.clone())
            .expect("proof present");
        // HMAC-SHA256 hex digest: 64 lowercase hex chars, stable per input.
        assert_eq!(proof.len(), 64);
        assert!(proof.chars().all(|c| c.is_ascii_hexdigit()));

        let again = auth.auth_params().await.unwrap();
        assert!(again.contains(&("appsecret_proof".to_string(), proof)));
    }

    #[tokio::test]
    async fn empty_token_fails_with_config_error() {
        let auth = AuthManager::new(AuthConfig {
            access_token: String::new(),
            app_id: None,
            app_secret: None,
            redirect_uri: String::new(),
        });
        let err = auth.auth_params().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn oauth_url_includes_defaults_and_state() {
        let auth = AuthManager::new(config(Some("app1"), None));
        let url = auth.oauth_dialog_url(&[], Some("nonce")).unwrap();

        assert!(url.starts_with("https://www.facebook.com/v23.0/dialog/oauth?"));
        assert!(url.contains("client_id=app1"));
        assert!(url.contains("ads_management"));
        assert!(url.contains("state=nonce"));
    }

    #[test]
    fn oauth_url_requires_app_id() {
        let auth = AuthManager::new(config(None, None));
        assert!(auth.oauth_dialog_url(&[], None).is_err());
    }

    #[test]
    fn token_exchange_requires_both_credentials() {
        let auth = AuthManager::new(config(Some("app1"), None));
        assert!(auth.token_exchange_params("code123").is_err());

        let auth = AuthManager::new(config(Some("app1"), Some("s3cret")));
        let params = auth.token_exchange_params("code123").unwrap();
        assert!(params.contains(&("code".to_string(), "code123".to_string())));
    }

    #[test]
    fn long_lived_exchange_defaults_to_configured_token() {
        let auth = AuthManager::new(config(Some("app1"), Some("s3cret")));
        let params = auth.long_lived_token_params(None).unwrap();
        assert!(params.contains(&("fb_exchange_token".to_string(), "test-token".to_string())));
    }
}
