//! OAuth and token management tools

use std::sync::Arc;

use metaads_domain::Result;
use metaads_infra::RequestDescriptor;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use super::{mask_token, parse_args, tool, ToolRegistry};
use crate::context::ServerContext;

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(tool(
        "generate_auth_url",
        "Generate a Facebook OAuth authorization URL",
        json!({
            "scopes": {"type": "string", "description": "Comma-separated OAuth scopes (defaults to ads scopes)"},
            "state": {"type": "string", "description": "Optional CSRF state parameter"}
        }),
        &[],
        generate_auth_url,
    ));
    registry.register(tool(
        "exchange_code_for_token",
        "Exchange an OAuth authorization code for an access token",
        json!({"code": {"type": "string", "description": "Authorization code from the OAuth redirect"}}),
        &["code"],
        exchange_code_for_token,
    ));
    registry.register(tool(
        "refresh_to_long_lived_token",
        "Convert a short-lived token to a long-lived (60-day) token",
        json!({
            "short_lived_token": {"type": "string", "description": "Token to exchange; defaults to the configured one"}
        }),
        &[],
        refresh_to_long_lived_token,
    ));
    registry.register(tool(
        "get_token_info",
        "Inspect the current access token (validity, scopes, expiry)",
        json!({}),
        &[],
        get_token_info,
    ));
    registry.register(tool(
        "validate_token",
        "Quick check that the current token works",
        json!({}),
        &[],
        validate_token,
    ));
}

#[derive(Deserialize)]
struct GenerateAuthUrlArgs {
    #[serde(default)]
    scopes: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

async fn generate_auth_url(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: GenerateAuthUrlArgs = parse_args(args)?;
    let scopes: Vec<&str> = args
        .scopes
        .as_deref()
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let url = ctx.auth.oauth_dialog_url(&scopes, args.state.as_deref())?;
    Ok(format!(
        "## OAuth Authorization\n\nOpen this URL in your browser to authorize:\n\n```\n{url}\n```\n\nAfter authorization, you'll be redirected with a `code` parameter. Use `exchange_code_for_token` with that code."
    ))
}

#[derive(Deserialize)]
struct ExchangeCodeArgs {
    code: String,
}

async fn exchange_code_for_token(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: ExchangeCodeArgs = parse_args(args)?;

    let mut descriptor = RequestDescriptor::get("oauth/access_token");
    for (key, value) in ctx.auth.token_exchange_params(&args.code)? {
        descriptor = descriptor.param(key, value);
    }
    let result = ctx.client.execute(&descriptor).await?;

    Ok(render_token_result(
        &result,
        "Token obtained successfully.",
        "Set this as your `META_ACCESS_TOKEN` environment variable.\nUse `refresh_to_long_lived_token` to extend to 60 days.",
    ))
}

#[derive(Deserialize)]
struct RefreshTokenArgs {
    #[serde(default)]
    short_lived_token: Option<String>,
}

async fn refresh_to_long_lived_token(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: RefreshTokenArgs = parse_args(args)?;

    let mut descriptor = RequestDescriptor::get("oauth/access_token");
    for (key, value) in ctx.auth.long_lived_token_params(args.short_lived_token.as_deref())? {
        descriptor = descriptor.param(key, value);
    }
    let result = ctx.client.execute(&descriptor).await?;

    Ok(render_token_result(
        &result,
        "Long-lived token obtained.",
        "Update your `META_ACCESS_TOKEN` with this new token.",
    ))
}

fn render_token_result(result: &Value, title: &str, footer: &str) -> String {
    let token = result.get("access_token").and_then(Value::as_str).unwrap_or("");
    let token_type = result.get("token_type").and_then(Value::as_str).unwrap_or("bearer");
    let expires_in = result
        .get("expires_in")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "{title}\n\n- **Token**: `{}`\n- **Type**: {token_type}\n- **Expires in**: {expires_in} seconds\n\n{footer}",
        mask_token(token)
    )
}

async fn get_token_info(ctx: Arc<ServerContext>, _args: Value) -> Result<String> {
    let (Some(app_id), Some(app_secret)) =
        (ctx.config.auth.app_id.as_deref(), ctx.config.auth.app_secret.as_deref())
    else {
        // Without app credentials, fall back to a plain /me validation.
        let me = ctx.client.execute(&RequestDescriptor::get("me")).await?;
        let name = me.get("name").and_then(Value::as_str).unwrap_or("Unknown");
        let user_id = me.get("id").and_then(Value::as_str).unwrap_or("Unknown");
        return Ok(format!(
            "## Token Info (basic)\n\n- **User**: {name} ({user_id})\n- **Status**: Valid\n\n_Set META_APP_ID and META_APP_SECRET for full token debug info._"
        ));
    };

    let descriptor = RequestDescriptor::get("debug_token")
        .param("input_token", &ctx.config.auth.access_token)
        .param("access_token", format!("{app_id}|{app_secret}"));
    let result = ctx.client.execute(&descriptor).await?;
    let data = result.get("data").cloned().unwrap_or_else(|| json!({}));

    let is_valid = data.get("is_valid").and_then(Value::as_bool).unwrap_or(false);
    let token_app_id = data.get("app_id").and_then(Value::as_str).unwrap_or("N/A");
    let user_id = data.get("user_id").and_then(Value::as_str).unwrap_or("N/A");
    let scopes = data
        .get("scopes")
        .and_then(Value::as_array)
        .map(|s| s.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(", "))
        .unwrap_or_default();
    let expires_at = data.get("expires_at").and_then(Value::as_i64).unwrap_or(0);
    let expiry = if expires_at > 0 {
        format!("unix {expires_at}")
    } else {
        "Never (system token)".to_string()
    };

    Ok(format!(
        "## Token Debug Info\n\n- **Valid**: {}\n- **App ID**: {token_app_id}\n- **User ID**: {user_id}\n- **Scopes**: {scopes}\n- **Expires**: {expiry}",
        if is_valid { "Yes" } else { "No" }
    ))
}

async fn validate_token(ctx: Arc<ServerContext>, _args: Value) -> Result<String> {
    let me = ctx.client.execute(&RequestDescriptor::get("me")).await?;
    let name = me.get("name").and_then(Value::as_str).unwrap_or("Unknown");
    let user_id = me.get("id").and_then(Value::as_str).unwrap_or("Unknown");
    Ok(format!("Token is valid.\n\n- **User**: {name} ({user_id})"))
}

#[cfg(test)]
mod tests {
    use metaads_domain::Config;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::ToolRegistry;
    use super::*;

    async fn context_with(base_url: String, app: bool) -> Arc<ServerContext> {
        let mut config = Config::from_access_token("test-token");
        config.api.base_url = base_url;
        config.retry.base_backoff_ms = 1;
        if app {
            config.auth.app_id = Some("app1".to_string());
            config.auth.app_secret = Some("s3cret".to_string());
        }
        Arc::new(ServerContext::new(config).expect("context"))
    }

    #[tokio::test]
    async fn auth_url_lists_follow_up_instructions() {
        let registry = ToolRegistry::with_defaults();
        let output = registry
            .call(
                "generate_auth_url",
                context_with("http://127.0.0.1:1".to_string(), true).await,
                json!({"state": "xyz"}),
            )
            .await
            .expect("output");

        assert!(output.contains("dialog/oauth"));
        assert!(output.contains("state=xyz"));
        assert!(output.contains("exchange_code_for_token"));
    }

    #[tokio::test]
    async fn token_exchange_masks_the_returned_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/access_token"))
            .and(query_param("code", "authcode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "EAALongLivedTokenValue123456",
                "token_type": "bearer",
                "expires_in": 5183944
            })))
            .mount(&server)
            .await;

        let registry = ToolRegistry::with_defaults();
        let output = registry
            .call(
                "exchange_code_for_token",
                context_with(server.uri(), true).await,
                json!({"code": "authcode"}),
            )
            .await
            .expect("output");

        assert!(output.contains("EAALongL...3456"));
        assert!(!output.contains("EAALongLivedTokenValue123456"));
    }

    #[tokio::test]
    async fn debug_token_uses_the_app_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/debug_token"))
            .and(query_param("access_token", "app1|s3cret"))
            .and(query_param("input_token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"is_valid": true, "app_id": "app1", "user_id": "u1",
                         "scopes": ["ads_read"], "expires_at": 0}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let registry = ToolRegistry::with_defaults();
        let output = registry
            .call("get_token_info", context_with(server.uri(), true).await, json!({}))
            .await
            .expect("output");

        assert!(output.contains("**Valid**: Yes"));
        assert!(output.contains("ads_read"));
        assert!(output.contains("Never (system token)"));
    }
}
