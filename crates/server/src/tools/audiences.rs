//! Custom audience tools

use std::sync::Arc;

use metaads_domain::constants::DEFAULT_AUDIENCE_FIELDS;
use metaads_domain::{AudienceSubtype, MetaAdsError, Result};
use metaads_infra::RequestDescriptor;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    default_limit, field_list, normalize_account_id, parse_args, parse_enum, pick, render_json,
    tool, ResponseFormat, ToolRegistry,
};
use crate::context::ServerContext;
use crate::format::{format_number, markdown_table, paginate_local};

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(tool(
        "list_audiences",
        "List custom audiences for an account",
        json!({
            "account_id": {"type": "string", "description": "Ad account ID"},
            "limit": {"type": "integer", "description": "Max results (default 50)"},
            "offset": {"type": "integer", "description": "Starting offset"},
            "response_format": {"type": "string", "description": "markdown or json"}
        }),
        &["account_id"],
        list_audiences,
    ));
    registry.register(tool(
        "create_custom_audience",
        "Create a custom audience",
        json!({
            "account_id": {"type": "string", "description": "Ad account ID"},
            "name": {"type": "string", "description": "Audience name"},
            "subtype": {"type": "string", "description": "CUSTOM, WEBSITE, APP, OFFLINE, VIDEO, ENGAGEMENT"},
            "description": {"type": "string", "description": "Optional description"},
            "customer_file_source": {"type": "string", "description": "USER_PROVIDED_ONLY, PARTNER_PROVIDED_ONLY, BOTH_USER_AND_PARTNER_PROVIDED"},
            "retention_days": {"type": "integer", "description": "Member retention (WEBSITE/APP subtypes)"},
            "rule": {"type": "string", "description": "JSON rule for website/app audiences"}
        }),
        &["account_id", "name", "subtype"],
        create_custom_audience,
    ));
    registry.register(tool(
        "create_lookalike",
        "Create a lookalike audience from a source audience",
        json!({
            "account_id": {"type": "string", "description": "Ad account ID"},
            "name": {"type": "string", "description": "Lookalike audience name"},
            "origin_audience_id": {"type": "string", "description": "Source custom audience ID"},
            "country": {"type": "string", "description": "Target country code (e.g. US)"},
            "ratio": {"type": "number", "description": "Lookalike ratio 0.01-0.20"},
            "description": {"type": "string", "description": "Optional description"}
        }),
        &["account_id", "name", "origin_audience_id", "country"],
        create_lookalike,
    ));
    registry.register(tool(
        "delete_audience",
        "Delete a custom or lookalike audience",
        json!({"audience_id": {"type": "string", "description": "Audience ID"}}),
        &["audience_id"],
        delete_audience,
    ));
}

#[derive(Deserialize)]
struct ListAudiencesArgs {
    account_id: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    response_format: ResponseFormat,
}

async fn list_audiences(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: ListAudiencesArgs = parse_args(args)?;
    let act_id = normalize_account_id(&args.account_id);

    let descriptor = RequestDescriptor::get(format!("{act_id}/customaudiences"))
        .account(&act_id)
        .param("fields", field_list(DEFAULT_AUDIENCE_FIELDS))
        .param("limit", args.limit.to_string());

    let audiences = ctx.client.list_all(&descriptor).await?;
    let rows: Vec<Value> = audiences
        .iter()
        .map(|a| {
            json!({
                "id": pick(a, "id"),
                "name": pick(a, "name"),
                "subtype": pick(a, "subtype"),
                "size": format_number(&pick(a, "approximate_count")),
                "status": pick(a, "operation_status").get("description").cloned()
                    .unwrap_or_else(|| pick(a, "operation_status")),
            })
        })
        .collect();

    let (page, info) = paginate_local(rows, args.limit, args.offset);

    if args.response_format == ResponseFormat::Json {
        return render_json(&json!({"audiences": page, "pagination": info.to_json()}));
    }

    let table = markdown_table(
        &page,
        &[
            ("id", "ID"),
            ("name", "Name"),
            ("subtype", "Type"),
            ("size", "Approx. Size"),
            ("status", "Status"),
        ],
    );
    Ok(format!("## Custom Audiences ({}/{})\n\n{table}", info.count, info.total))
}

#[derive(Deserialize)]
struct CreateCustomAudienceArgs {
    account_id: String,
    name: String,
    subtype: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    customer_file_source: Option<String>,
    #[serde(default)]
    retention_days: Option<u32>,
    #[serde(default)]
    rule: Option<String>,
}

async fn create_custom_audience(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: CreateCustomAudienceArgs = parse_args(args)?;
    let act_id = normalize_account_id(&args.account_id);

    parse_enum::<AudienceSubtype>(&args.subtype, "subtype")?;

    let mut descriptor = RequestDescriptor::post(format!("{act_id}/customaudiences"))
        .account(&act_id)
        .field("name", &args.name)
        .field("subtype", &args.subtype)
        .field("description", &args.description);
    if let Some(source) = &args.customer_file_source {
        descriptor = descriptor.field("customer_file_source", source);
    }
    if let Some(days) = args.retention_days {
        descriptor = descriptor.field("retention_days", days.to_string());
    }
    if let Some(rule) = &args.rule {
        descriptor = descriptor.field("rule", rule);
    }

    let result = ctx.client.execute(&descriptor).await?;
    let audience_id = result.get("id").and_then(Value::as_str).unwrap_or("unknown");

    Ok(format!(
        "Custom audience created.\n\n- **ID**: {audience_id}\n- **Name**: {}\n- **Type**: {}",
        args.name, args.subtype
    ))
}

fn default_ratio() -> f64 {
    0.01
}

#[derive(Deserialize)]
struct CreateLookalikeArgs {
    account_id: String,
    name: String,
    origin_audience_id: String,
    country: String,
    #[serde(default = "default_ratio")]
    ratio: f64,
    #[serde(default)]
    description: String,
}

async fn create_lookalike(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: CreateLookalikeArgs = parse_args(args)?;
    let act_id = normalize_account_id(&args.account_id);

    if !(0.01..=0.20).contains(&args.ratio) {
        return Err(MetaAdsError::Validation(
            "ratio must be between 0.01 (1%) and 0.20 (20%)".to_string(),
        ));
    }
    let country = args.country.to_uppercase();

    let lookalike_spec = json!({
        "type": "similarity",
        "country": country,
        "ratio": args.ratio,
    });
    let descriptor = RequestDescriptor::post(format!("{act_id}/customaudiences"))
        .account(&act_id)
        .field("name", &args.name)
        .field("subtype", "LOOKALIKE")
        .field("description", &args.description)
        .field("origin_audience_id", &args.origin_audience_id)
        .field("lookalike_spec", lookalike_spec.to_string());

    let result = ctx.client.execute(&descriptor).await?;
    let audience_id = result.get("id").and_then(Value::as_str).unwrap_or("unknown");

    Ok(format!(
        "Lookalike audience created.\n\n- **ID**: {audience_id}\n- **Name**: {}\n- **Source**: {}\n- **Country**: {country}\n- **Ratio**: {:.0}%",
        args.name,
        args.origin_audience_id,
        args.ratio * 100.0
    ))
}

#[derive(Deserialize)]
struct AudienceIdArgs {
    audience_id: String,
}

async fn delete_audience(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: AudienceIdArgs = parse_args(args)?;
    ctx.client.execute(&RequestDescriptor::delete(&args.audience_id)).await?;
    Ok(format!("Audience `{}` deleted.", args.audience_id))
}
