//! Ad set management tools

use std::sync::Arc;

use metaads_domain::constants::DEFAULT_ADSET_FIELDS;
use metaads_domain::{BillingEvent, CampaignStatus, OptimizationGoal, Result};
use metaads_infra::RequestDescriptor;
use metaads_domain::MetaAdsError;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    default_limit, field_list, normalize_account_id, parse_args, parse_enum, pick, render_json,
    tool, ResponseFormat, ToolRegistry,
};
use crate::context::ServerContext;
use crate::format::{format_currency, markdown_table, paginate_local};

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(tool(
        "list_ad_sets",
        "List ad sets for an account or a campaign",
        json!({
            "account_id": {"type": "string", "description": "Ad account ID"},
            "campaign_id": {"type": "string", "description": "Restrict to one campaign"},
            "limit": {"type": "integer", "description": "Max results (default 50)"},
            "offset": {"type": "integer", "description": "Starting offset"},
            "response_format": {"type": "string", "description": "markdown or json"}
        }),
        &["account_id"],
        list_ad_sets,
    ));
    registry.register(tool(
        "create_ad_set",
        "Create a new ad set (created as PAUSED)",
        json!({
            "account_id": {"type": "string", "description": "Ad account ID"},
            "name": {"type": "string", "description": "Ad set name"},
            "campaign_id": {"type": "string", "description": "Parent campaign ID"},
            "optimization_goal": {"type": "string", "description": "e.g. LINK_CLICKS, REACH, OFFSITE_CONVERSIONS"},
            "billing_event": {"type": "string", "description": "e.g. IMPRESSIONS, LINK_CLICKS"},
            "daily_budget": {"type": "integer", "description": "Daily budget in cents"},
            "lifetime_budget": {"type": "integer", "description": "Lifetime budget in cents"},
            "bid_amount": {"type": "integer", "description": "Bid cap in cents"},
            "targeting": {"type": "string", "description": "JSON targeting spec"},
            "start_time": {"type": "string", "description": "ISO 8601 start time"},
            "end_time": {"type": "string", "description": "ISO 8601 end time"}
        }),
        &["account_id", "name", "campaign_id"],
        create_ad_set,
    ));
    registry.register(tool(
        "update_ad_set",
        "Update an existing ad set",
        json!({
            "ad_set_id": {"type": "string", "description": "Ad set ID"},
            "name": {"type": "string", "description": "New name"},
            "status": {"type": "string", "description": "ACTIVE, PAUSED, DELETED, ARCHIVED"},
            "daily_budget": {"type": "integer", "description": "New daily budget in cents"},
            "bid_amount": {"type": "integer", "description": "New bid cap in cents"},
            "end_time": {"type": "string", "description": "New end time"}
        }),
        &["ad_set_id"],
        update_ad_set,
    ));
    registry.register(tool(
        "pause_ad_set",
        "Pause an ad set",
        json!({"ad_set_id": {"type": "string", "description": "Ad set ID"}}),
        &["ad_set_id"],
        pause_ad_set,
    ));
    registry.register(tool(
        "delete_ad_set",
        "Delete an ad set",
        json!({"ad_set_id": {"type": "string", "description": "Ad set ID"}}),
        &["ad_set_id"],
        delete_ad_set,
    ));
}

#[derive(Deserialize)]
struct ListAdSetsArgs {
    account_id: String,
    #[serde(default)]
    campaign_id: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    response_format: ResponseFormat,
}

async fn list_ad_sets(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: ListAdSetsArgs = parse_args(args)?;
    let act_id = normalize_account_id(&args.account_id);

    let endpoint = match &args.campaign_id {
        Some(campaign_id) => format!("{campaign_id}/adsets"),
        None => format!("{act_id}/adsets"),
    };
    let descriptor = RequestDescriptor::get(endpoint)
        .account(&act_id)
        .param("fields", field_list(DEFAULT_ADSET_FIELDS))
        .param("limit", args.limit.to_string());

    let ad_sets = ctx.client.list_all(&descriptor).await?;
    let rows: Vec<Value> = ad_sets
        .iter()
        .map(|s| {
            json!({
                "id": pick(s, "id"),
                "name": pick(s, "name"),
                "campaign_id": pick(s, "campaign_id"),
                "status": pick(s, "effective_status"),
                "goal": pick(s, "optimization_goal"),
                "daily_budget": format_currency(&pick(s, "daily_budget")),
            })
        })
        .collect();

    let (page, info) = paginate_local(rows, args.limit, args.offset);

    if args.response_format == ResponseFormat::Json {
        return render_json(&json!({"ad_sets": page, "pagination": info.to_json()}));
    }

    let table = markdown_table(
        &page,
        &[
            ("id", "ID"),
            ("name", "Name"),
            ("campaign_id", "Campaign"),
            ("status", "Status"),
            ("goal", "Goal"),
            ("daily_budget", "Daily Budget"),
        ],
    );
    Ok(format!("## Ad Sets ({}/{})\n\n{table}", info.count, info.total))
}

fn default_optimization_goal() -> String {
    "LINK_CLICKS".to_string()
}

fn default_billing_event() -> String {
    "IMPRESSIONS".to_string()
}

fn default_targeting() -> String {
    r#"{"geo_locations":{"countries":["US"]}}"#.to_string()
}

#[derive(Deserialize)]
struct CreateAdSetArgs {
    account_id: String,
    name: String,
    campaign_id: String,
    #[serde(default = "default_optimization_goal")]
    optimization_goal: String,
    #[serde(default = "default_billing_event")]
    billing_event: String,
    #[serde(default)]
    daily_budget: Option<u64>,
    #[serde(default)]
    lifetime_budget: Option<u64>,
    #[serde(default)]
    bid_amount: Option<u64>,
    #[serde(default = "default_targeting")]
    targeting: String,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
}

async fn create_ad_set(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: CreateAdSetArgs = parse_args(args)?;
    let act_id = normalize_account_id(&args.account_id);

    parse_enum::<OptimizationGoal>(&args.optimization_goal, "optimization_goal")?;
    parse_enum::<BillingEvent>(&args.billing_event, "billing_event")?;
    let targeting: Value = serde_json::from_str(&args.targeting)
        .map_err(|e| MetaAdsError::Validation(format!("targeting is not valid JSON: {e}")))?;

    let mut descriptor = RequestDescriptor::post(format!("{act_id}/adsets"))
        .account(&act_id)
        .field("name", &args.name)
        .field("campaign_id", &args.campaign_id)
        .field("status", "PAUSED")
        .field("optimization_goal", &args.optimization_goal)
        .field("billing_event", &args.billing_event)
        .field("targeting", targeting.to_string());
    if let Some(budget) = args.daily_budget {
        descriptor = descriptor.field("daily_budget", budget.to_string());
    }
    if let Some(budget) = args.lifetime_budget {
        descriptor = descriptor.field("lifetime_budget", budget.to_string());
    }
    if let Some(bid) = args.bid_amount {
        descriptor = descriptor.field("bid_amount", bid.to_string());
    }
    if let Some(start_time) = &args.start_time {
        descriptor = descriptor.field("start_time", start_time);
    }
    if let Some(end_time) = &args.end_time {
        descriptor = descriptor.field("end_time", end_time);
    }

    let result = ctx.client.execute(&descriptor).await?;
    let ad_set_id = result.get("id").and_then(Value::as_str).unwrap_or("unknown");

    Ok(format!(
        "Ad set created successfully.\n\n- **ID**: {ad_set_id}\n- **Name**: {}\n- **Campaign**: {}\n- **Goal**: {}\n- **Status**: PAUSED",
        args.name, args.campaign_id, args.optimization_goal
    ))
}

#[derive(Deserialize)]
struct UpdateAdSetArgs {
    ad_set_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    daily_budget: Option<u64>,
    #[serde(default)]
    bid_amount: Option<u64>,
    #[serde(default)]
    end_time: Option<String>,
}

async fn update_ad_set(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: UpdateAdSetArgs = parse_args(args)?;

    let mut updates: Vec<(String, String)> = Vec::new();
    if let Some(name) = &args.name {
        updates.push(("name".into(), name.clone()));
    }
    if let Some(status) = &args.status {
        parse_enum::<CampaignStatus>(status, "status")?;
        updates.push(("status".into(), status.clone()));
    }
    if let Some(budget) = args.daily_budget {
        updates.push(("daily_budget".into(), budget.to_string()));
    }
    if let Some(bid) = args.bid_amount {
        updates.push(("bid_amount".into(), bid.to_string()));
    }
    if let Some(end_time) = &args.end_time {
        updates.push(("end_time".into(), end_time.clone()));
    }

    if updates.is_empty() {
        return Ok("No updates specified.".to_string());
    }

    let mut descriptor = RequestDescriptor::post(&args.ad_set_id);
    for (key, value) in &updates {
        descriptor = descriptor.field(key.clone(), value.clone());
    }
    ctx.client.execute(&descriptor).await?;

    let summary: Vec<String> = updates.iter().map(|(k, v)| format!("**{k}**: {v}")).collect();
    Ok(format!("Ad set `{}` updated: {}", args.ad_set_id, summary.join(", ")))
}

#[derive(Deserialize)]
struct AdSetIdArgs {
    ad_set_id: String,
}

async fn pause_ad_set(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: AdSetIdArgs = parse_args(args)?;
    let descriptor = RequestDescriptor::post(&args.ad_set_id).field("status", "PAUSED");
    ctx.client.execute(&descriptor).await?;
    Ok(format!("Ad set `{}` paused.", args.ad_set_id))
}

async fn delete_ad_set(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: AdSetIdArgs = parse_args(args)?;
    ctx.client.execute(&RequestDescriptor::delete(&args.ad_set_id)).await?;
    Ok(format!("Ad set `{}` deleted.", args.ad_set_id))
}

#[cfg(test)]
mod tests {
    use metaads_domain::{Config, ErrorKind};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::ToolRegistry;
    use super::*;

    async fn context(base_url: String) -> Arc<ServerContext> {
        let mut config = Config::from_access_token("test-token");
        config.api.base_url = base_url;
        config.retry.base_backoff_ms = 1;
        Arc::new(ServerContext::new(config).expect("context"))
    }

    #[tokio::test]
    async fn campaign_filter_switches_the_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/camp_7/adsets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "as_1", "name": "Set A", "campaign_id": "camp_7",
                          "effective_status": "PAUSED", "optimization_goal": "REACH"}],
                "paging": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let registry = ToolRegistry::with_defaults();
        let output = registry
            .call(
                "list_ad_sets",
                context(server.uri()).await,
                json!({"account_id": "123", "campaign_id": "camp_7"}),
            )
            .await
            .expect("output");

        assert!(output.contains("Set A"));
    }

    #[tokio::test]
    async fn invalid_targeting_json_is_rejected_before_the_call() {
        let registry = ToolRegistry::with_defaults();
        let err = registry
            .call(
                "create_ad_set",
                context("http://127.0.0.1:1".to_string()).await,
                json!({
                    "account_id": "123",
                    "name": "X",
                    "campaign_id": "c1",
                    "targeting": "{not json"
                }),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("targeting"));
    }
}
