//! Account and health tools

use std::sync::Arc;

use metaads_domain::constants::{DEFAULT_ACCOUNT_FIELDS, META_API_VERSION};
use metaads_domain::Result;
use metaads_infra::RequestDescriptor;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{field_list, parse_args, pick, render_json, tool, ResponseFormat, ToolRegistry};
use crate::context::ServerContext;
use crate::format::markdown_table;

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(tool(
        "list_ad_accounts",
        "List all accessible ad accounts",
        json!({
            "response_format": {"type": "string", "description": "markdown or json"}
        }),
        &[],
        list_ad_accounts,
    ));
    registry.register(tool(
        "health_check",
        "Check server health, API connectivity and per-account rate throttling",
        json!({}),
        &[],
        health_check,
    ));
}

#[derive(Deserialize)]
struct ListAccountsArgs {
    #[serde(default)]
    response_format: ResponseFormat,
}

async fn list_ad_accounts(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: ListAccountsArgs = parse_args(args)?;

    let descriptor = RequestDescriptor::get("me/adaccounts")
        .param("fields", field_list(DEFAULT_ACCOUNT_FIELDS));
    let accounts = ctx.client.list_all(&descriptor).await?;

    let rows: Vec<Value> = accounts
        .iter()
        .map(|a| {
            json!({
                "id": pick(a, "id"),
                "name": pick(a, "name"),
                "status": pick(a, "account_status"),
                "currency": pick(a, "currency"),
                "timezone": pick(a, "timezone_name"),
            })
        })
        .collect();

    if args.response_format == ResponseFormat::Json {
        return render_json(&json!({"accounts": rows}));
    }

    let table = markdown_table(
        &rows,
        &[
            ("id", "ID"),
            ("name", "Name"),
            ("status", "Status"),
            ("currency", "Currency"),
            ("timezone", "Timezone"),
        ],
    );
    Ok(format!("## Ad Accounts ({})\n\n{table}", rows.len()))
}

async fn health_check(ctx: Arc<ServerContext>, _args: Value) -> Result<String> {
    match ctx.client.execute(&RequestDescriptor::get("me")).await {
        Ok(me) => {
            let name = me.get("name").and_then(Value::as_str).unwrap_or("Unknown");
            let user_id = me.get("id").and_then(Value::as_str).unwrap_or("Unknown");

            let account_count = ctx
                .client
                .list_all(&RequestDescriptor::get("me/adaccounts").param("fields", "id"))
                .await
                .map(|accounts| accounts.len())
                .unwrap_or(0);

            let mut report = format!(
                "## Server Health\n\n- **Status**: Healthy\n- **API**: Connected\n- **User**: {name} ({user_id})\n- **Accounts**: {account_count} accessible\n- **API Version**: {META_API_VERSION}"
            );

            let mut tracked = ctx.client.tracked_accounts();
            tracked.sort();
            if !tracked.is_empty() {
                report.push_str("\n\n### Rate Budget\n");
                for account in tracked {
                    let usage = ctx.client.usage(&account);
                    let level = ctx.client.throttle_level(&account);
                    report.push_str(&format!("\n- **{account}**: {usage:.1}% used ({level})"));
                }
            }
            Ok(report)
        }
        Err(error) => {
            let mut report = format!(
                "## Server Health\n\n- **Status**: Unhealthy\n- **Error kind**: {:?}\n- **Error**: {error}",
                error.kind()
            );
            if let Some(retry_after) = error.retry_after() {
                report
                    .push_str(&format!("\n- **Retry after**: {} seconds", retry_after.as_secs()));
            }
            Ok(report)
        }
    }
}

#[cfg(test)]
mod tests {
    use metaads_domain::Config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::ToolRegistry;
    use super::*;

    async fn context(base_url: String) -> Arc<ServerContext> {
        let mut config = Config::from_access_token("test-token");
        config.api.base_url = base_url;
        config.retry.base_backoff_ms = 1;
        config.retry.max_retries = 0;
        Arc::new(ServerContext::new(config).expect("context"))
    }

    #[tokio::test]
    async fn healthy_server_reports_user_accounts_and_throttle_levels() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200)
                .set_body_json(json!({"id": "u1", "name": "Ads Admin"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me/adaccounts"))
            .respond_with(ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"id": "act_1"}, {"id": "act_2"}], "paging": {}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/act_1/campaigns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [], "paging": {}})))
            .mount(&server)
            .await;

        let ctx = context(server.uri()).await;
        // Seed rate state so the health report has something to show.
        ctx.client
            .execute(&RequestDescriptor::get("act_1/campaigns").account("act_1"))
            .await
            .expect("seed call");

        let registry = ToolRegistry::with_defaults();
        let output = registry.call("health_check", ctx, json!({})).await.expect("output");

        assert!(output.contains("**Status**: Healthy"));
        assert!(output.contains("Ads Admin"));
        assert!(output.contains("2 accessible"));
        assert!(output.contains("act_1"));
        assert!(output.contains("normal"));
    }

    #[tokio::test]
    async fn unhealthy_server_reports_the_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid token", "type": "OAuthException", "code": 190}
            })))
            .mount(&server)
            .await;

        let registry = ToolRegistry::with_defaults();
        let output = registry
            .call("health_check", context(server.uri()).await, json!({}))
            .await
            .expect("output");

        assert!(output.contains("**Status**: Unhealthy"));
        assert!(output.contains("AuthInvalid"));
    }
}
