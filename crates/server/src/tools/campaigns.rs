//! Campaign management tools

use std::sync::Arc;

use metaads_domain::constants::DEFAULT_CAMPAIGN_FIELDS;
use metaads_domain::{BidStrategy, CampaignObjective, CampaignStatus, Result};
use metaads_infra::RequestDescriptor;
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
        "list_campaigns",
        "List ad campaigns with optional status filter",
        json!({
            "account_id": {"type": "string", "description": "Ad account ID, with or without the act_ prefix"},
            "status": {"type": "string", "description": "Filter: all, ACTIVE, PAUSED, DELETED, ARCHIVED"},
            "limit": {"type": "integer", "description": "Max results (default 50)"},
            "offset": {"type": "integer", "description": "Starting offset for pagination"},
            "response_format": {"type": "string", "description": "markdown or json"}
        }),
        &["account_id"],
        list_campaigns,
    ));
    registry.register(tool(
        "create_campaign",
        "Create a new ad campaign (created as PAUSED)",
        json!({
            "account_id": {"type": "string", "description": "Ad account ID"},
            "name": {"type": "string", "description": "Campaign name"},
            "objective": {"type": "string", "description": "OUTCOME_AWARENESS, OUTCOME_ENGAGEMENT, OUTCOME_LEADS, OUTCOME_SALES, OUTCOME_TRAFFIC, OUTCOME_APP_PROMOTION"},
            "daily_budget": {"type": "integer", "description": "Daily budget in cents (e.g. 5000 = $50.00)"},
            "lifetime_budget": {"type": "integer", "description": "Lifetime budget in cents"},
            "bid_strategy": {"type": "string", "description": "Bid strategy (default LOWEST_COST_WITHOUT_CAP)"},
            "special_ad_categories": {"type": "string", "description": "Comma-separated special categories, or NONE"},
            "start_time": {"type": "string", "description": "ISO 8601 start time"},
            "stop_time": {"type": "string", "description": "ISO 8601 stop time (required for lifetime budget)"}
        }),
        &["account_id", "name", "objective"],
        create_campaign,
    ));
    registry.register(tool(
        "update_campaign",
        "Update an existing ad campaign",
        json!({
            "campaign_id": {"type": "string", "description": "Campaign ID"},
            "name": {"type": "string", "description": "New name"},
            "status": {"type": "string", "description": "ACTIVE, PAUSED, DELETED, ARCHIVED"},
            "daily_budget": {"type": "integer", "description": "New daily budget in cents"},
            "lifetime_budget": {"type": "integer", "description": "New lifetime budget in cents"},
            "start_time": {"type": "string", "description": "New start time"},
            "stop_time": {"type": "string", "description": "New stop time"}
        }),
        &["campaign_id"],
        update_campaign,
    ));
    registry.register(tool(
        "pause_campaign",
        "Pause an ad campaign",
        json!({"campaign_id": {"type": "string", "description": "Campaign ID"}}),
        &["campaign_id"],
        pause_campaign,
    ));
    registry.register(tool(
        "resume_campaign",
        "Resume (activate) a paused ad campaign",
        json!({"campaign_id": {"type": "string", "description": "Campaign ID"}}),
        &["campaign_id"],
        resume_campaign,
    ));
    registry.register(tool(
        "delete_campaign",
        "Delete an ad campaign",
        json!({"campaign_id": {"type": "string", "description": "Campaign ID"}}),
        &["campaign_id"],
        delete_campaign,
    ));
}

fn default_status_filter() -> String {
    "all".to_string()
}

#[derive(Deserialize)]
struct ListCampaignsArgs {
    account_id: String,
    #[serde(default = "default_status_filter")]
    status: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    response_format: ResponseFormat,
}

async fn list_campaigns(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: ListCampaignsArgs = parse_args(args)?;
    let act_id = normalize_account_id(&args.account_id);

    let mut descriptor = RequestDescriptor::get(format!("{act_id}/campaigns"))
        .account(&act_id)
        .param("fields", field_list(DEFAULT_CAMPAIGN_FIELDS))
        .param("limit", args.limit.to_string());
    if args.status != "all" {
        let status = args.status.to_uppercase();
        parse_enum::<CampaignStatus>(&status, "status")?;
        descriptor = descriptor.param("effective_status", json!([status]).to_string());
    }

    let campaigns = ctx.client.list_all(&descriptor).await?;
    let rows: Vec<Value> = campaigns
        .iter()
        .map(|c| {
            json!({
                "id": pick(c, "id"),
                "name": pick(c, "name"),
                "objective": pick(c, "objective"),
                "status": pick(c, "effective_status"),
                "daily_budget": format_currency(&pick(c, "daily_budget")),
                "lifetime_budget": format_currency(&pick(c, "lifetime_budget")),
            })
        })
        .collect();

    let (page, info) = paginate_local(rows, args.limit, args.offset);

    if args.response_format == ResponseFormat::Json {
        return render_json(&json!({"campaigns": page, "pagination": info.to_json()}));
    }

    let table = markdown_table(
        &page,
        &[
            ("id", "ID"),
            ("name", "Name"),
            ("objective", "Objective"),
            ("status", "Status"),
            ("daily_budget", "Daily Budget"),
        ],
    );
    let more = if info.has_more { " (more available)" } else { "" };
    Ok(format!(
        "## Campaigns ({}/{})\n\n{table}\n\n_Showing {} of {}{more}_",
        info.count, info.total, info.count, info.total
    ))
}

fn default_bid_strategy() -> String {
    "LOWEST_COST_WITHOUT_CAP".to_string()
}

fn default_special_ad_categories() -> String {
    "NONE".to_string()
}

#[derive(Deserialize)]
struct CreateCampaignArgs {
    account_id: String,
    name: String,
    objective: String,
    #[serde(default)]
    daily_budget: Option<u64>,
    #[serde(default)]
    lifetime_budget: Option<u64>,
    #[serde(default = "default_bid_strategy")]
    bid_strategy: String,
    #[serde(default = "default_special_ad_categories")]
    special_ad_categories: String,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    stop_time: Option<String>,
}

async fn create_campaign(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: CreateCampaignArgs = parse_args(args)?;
    let act_id = normalize_account_id(&args.account_id);

    parse_enum::<CampaignObjective>(&args.objective, "objective")?;
    parse_enum::<BidStrategy>(&args.bid_strategy, "bid_strategy")?;

    let categories: Vec<String> = args
        .special_ad_categories
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != "NONE")
        .map(str::to_string)
        .collect();

    let mut descriptor = RequestDescriptor::post(format!("{act_id}/campaigns"))
        .account(&act_id)
        .field("name", &args.name)
        .field("objective", &args.objective)
        .field("status", "PAUSED")
        .field("bid_strategy", &args.bid_strategy)
        .field("special_ad_categories", json!(categories).to_string());
    if let Some(budget) = args.daily_budget {
        descriptor = descriptor.field("daily_budget", budget.to_string());
    }
    if let Some(budget) = args.lifetime_budget {
        descriptor = descriptor.field("lifetime_budget", budget.to_string());
    }
    if let Some(start_time) = &args.start_time {
        descriptor = descriptor.field("start_time", start_time);
    }
    if let Some(stop_time) = &args.stop_time {
        descriptor = descriptor.field("stop_time", stop_time);
    }

    let result = ctx.client.execute(&descriptor).await?;
    let campaign_id = result.get("id").and_then(Value::as_str).unwrap_or("unknown");
    let budget = args.daily_budget.or(args.lifetime_budget).unwrap_or(0);

    Ok(format!(
        "Campaign created successfully.\n\n- **ID**: {campaign_id}\n- **Name**: {}\n- **Objective**: {}\n- **Status**: PAUSED\n- **Budget**: {}",
        args.name,
        args.objective,
        format_currency(&json!(budget)),
    ))
}

#[derive(Deserialize)]
struct UpdateCampaignArgs {
    campaign_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    daily_budget: Option<u64>,
    #[serde(default)]
    lifetime_budget: Option<u64>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    stop_time: Option<String>,
}

async fn update_campaign(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: UpdateCampaignArgs = parse_args(args)?;

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
    if let Some(budget) = args.lifetime_budget {
        updates.push(("lifetime_budget".into(), budget.to_string()));
    }
    if let Some(start_time) = &args.start_time {
        updates.push(("start_time".into(), start_time.clone()));
    }
    if let Some(stop_time) = &args.stop_time {
        updates.push(("stop_time".into(), stop_time.clone()));
    }

    if updates.is_empty() {
        return Ok("No updates specified.".to_string());
    }

    let mut descriptor = RequestDescriptor::post(&args.campaign_id);
    for (key, value) in &updates {
        descriptor = descriptor.field(key.clone(), value.clone());
    }
    ctx.client.execute(&descriptor).await?;

    let summary: Vec<String> =
        updates.iter().map(|(k, v)| format!("**{k}**: {v}")).collect();
    Ok(format!("Campaign `{}` updated: {}", args.campaign_id, summary.join(", ")))
}

#[derive(Deserialize)]
struct CampaignIdArgs {
    campaign_id: String,
}

async fn pause_campaign(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: CampaignIdArgs = parse_args(args)?;
    let descriptor = RequestDescriptor::post(&args.campaign_id).field("status", "PAUSED");
    ctx.client.execute(&descriptor).await?;
    Ok(format!("Campaign `{}` paused.", args.campaign_id))
}

async fn resume_campaign(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: CampaignIdArgs = parse_args(args)?;
    let descriptor = RequestDescriptor::post(&args.campaign_id).field("status", "ACTIVE");
    ctx.client.execute(&descriptor).await?;
    Ok(format!("Campaign `{}` resumed (ACTIVE).", args.campaign_id))
}

async fn delete_campaign(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: CampaignIdArgs = parse_args(args)?;
    ctx.client.execute(&RequestDescriptor::delete(&args.campaign_id)).await?;
    Ok(format!("Campaign `{}` deleted.", args.campaign_id))
}
