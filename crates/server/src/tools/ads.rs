//! Ad management tools

use std::sync::Arc;

use metaads_domain::constants::DEFAULT_AD_FIELDS;
use metaads_domain::{CampaignStatus, Result};
use metaads_infra::RequestDescriptor;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    default_limit, field_list, normalize_account_id, parse_args, parse_enum, pick, render_json,
    tool, ResponseFormat, ToolRegistry,
};
use crate::context::ServerContext;
use crate::format::{markdown_table, paginate_local};

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(tool(
        "list_ads",
        "List ads for an account or an ad set",
        json!({
            "account_id": {"type": "string", "description": "Ad account ID"},
            "adset_id": {"type": "string", "description": "Restrict to one ad set"},
            "limit": {"type": "integer", "description": "Max results (default 50)"},
            "offset": {"type": "integer", "description": "Starting offset"},
            "response_format": {"type": "string", "description": "markdown or json"}
        }),
        &["account_id"],
        list_ads,
    ));
    registry.register(tool(
        "create_ad",
        "Create an ad from an existing creative (created as PAUSED)",
        json!({
            "account_id": {"type": "string", "description": "Ad account ID"},
            "name": {"type": "string", "description": "Ad name"},
            "adset_id": {"type": "string", "description": "Parent ad set ID"},
            "creative_id": {"type": "string", "description": "Creative ID to attach"}
        }),
        &["account_id", "name", "adset_id", "creative_id"],
        create_ad,
    ));
    registry.register(tool(
        "update_ad",
        "Update an ad's name or status",
        json!({
            "ad_id": {"type": "string", "description": "Ad ID"},
            "name": {"type": "string", "description": "New name"},
            "status": {"type": "string", "description": "ACTIVE, PAUSED, DELETED, ARCHIVED"}
        }),
        &["ad_id"],
        update_ad,
    ));
    registry.register(tool(
        "delete_ad",
        "Delete an ad",
        json!({"ad_id": {"type": "string", "description": "Ad ID"}}),
        &["ad_id"],
        delete_ad,
    ));
}

#[derive(Deserialize)]
struct ListAdsArgs {
    account_id: String,
    #[serde(default)]
    adset_id: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    response_format: ResponseFormat,
}

async fn list_ads(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: ListAdsArgs = parse_args(args)?;
    let act_id = normalize_account_id(&args.account_id);

    let endpoint = match &args.adset_id {
        Some(adset_id) => format!("{adset_id}/ads"),
        None => format!("{act_id}/ads"),
    };
    let descriptor = RequestDescriptor::get(endpoint)
        .account(&act_id)
        .param("fields", field_list(DEFAULT_AD_FIELDS))
        .param("limit", args.limit.to_string());

    let ads = ctx.client.list_all(&descriptor).await?;
    let rows: Vec<Value> = ads
        .iter()
        .map(|a| {
            json!({
                "id": pick(a, "id"),
                "name": pick(a, "name"),
                "adset_id": pick(a, "adset_id"),
                "campaign_id": pick(a, "campaign_id"),
                "status": pick(a, "effective_status"),
            })
        })
        .collect();

    let (page, info) = paginate_local(rows, args.limit, args.offset);

    if args.response_format == ResponseFormat::Json {
        return render_json(&json!({"ads": page, "pagination": info.to_json()}));
    }

    let table = markdown_table(
        &page,
        &[
            ("id", "ID"),
            ("name", "Name"),
            ("adset_id", "Ad Set"),
            ("campaign_id", "Campaign"),
            ("status", "Status"),
        ],
    );
    Ok(format!("## Ads ({}/{})\n\n{table}", info.count, info.total))
}

#[derive(Deserialize)]
struct CreateAdArgs {
    account_id: String,
    name: String,
    adset_id: String,
    creative_id: String,
}

async fn create_ad(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: CreateAdArgs = parse_args(args)?;
    let act_id = normalize_account_id(&args.account_id);

    let descriptor = RequestDescriptor::post(format!("{act_id}/ads"))
        .account(&act_id)
        .field("name", &args.name)
        .field("adset_id", &args.adset_id)
        .field("creative", json!({"creative_id": args.creative_id}).to_string())
        .field("status", "PAUSED");

    let result = ctx.client.execute(&descriptor).await?;
    let ad_id = result.get("id").and_then(Value::as_str).unwrap_or("unknown");

    Ok(format!(
        "Ad created successfully.\n\n- **ID**: {ad_id}\n- **Name**: {}\n- **Ad Set**: {}\n- **Creative**: {}\n- **Status**: PAUSED",
        args.name, args.adset_id, args.creative_id
    ))
}

#[derive(Deserialize)]
struct UpdateAdArgs {
    ad_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

async fn update_ad(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: UpdateAdArgs = parse_args(args)?;

    let mut updates: Vec<(String, String)> = Vec::new();
    if let Some(name) = &args.name {
        updates.push(("name".into(), name.clone()));
    }
    if let Some(status) = &args.status {
        parse_enum::<CampaignStatus>(status, "status")?;
        updates.push(("status".into(), status.clone()));
    }

    if updates.is_empty() {
        return Ok("No updates specified.".to_string());
    }

    let mut descriptor = RequestDescriptor::post(&args.ad_id);
    for (key, value) in &updates {
        descriptor = descriptor.field(key.clone(), value.clone());
    }
    ctx.client.execute(&descriptor).await?;

    let summary: Vec<String> = updates.iter().map(|(k, v)| format!("**{k}**: {v}")).collect();
    Ok(format!("Ad `{}` updated: {}", args.ad_id, summary.join(", ")))
}

#[derive(Deserialize)]
struct AdIdArgs {
    ad_id: String,
}

async fn delete_ad(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: AdIdArgs = parse_args(args)?;
    ctx.client.execute(&RequestDescriptor::delete(&args.ad_id)).await?;
    Ok(format!("Ad `{}` deleted.", args.ad_id))
}
