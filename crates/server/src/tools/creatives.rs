//! Ad creative tools

use std::sync::Arc;

use metaads_domain::constants::DEFAULT_CREATIVE_FIELDS;
use metaads_domain::Result;
use metaads_infra::RequestDescriptor;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{
    default_limit, field_list, normalize_account_id, parse_args, pick, render_json, tool,
    ResponseFormat, ToolRegistry,
};
use crate::context::ServerContext;
use crate::format::{markdown_table, paginate_local};

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(tool(
        "list_creatives",
        "List ad creatives for an account",
        json!({
            "account_id": {"type": "string", "description": "Ad account ID"},
            "limit": {"type": "integer", "description": "Max results (default 50)"},
            "offset": {"type": "integer", "description": "Starting offset"},
            "response_format": {"type": "string", "description": "markdown or json"}
        }),
        &["account_id"],
        list_creatives,
    ));
    registry.register(tool(
        "create_creative",
        "Create an ad creative with an object story spec",
        json!({
            "account_id": {"type": "string", "description": "Ad account ID"},
            "name": {"type": "string", "description": "Creative name"},
            "page_id": {"type": "string", "description": "Facebook Page ID"},
            "message": {"type": "string", "description": "Primary text"},
            "link": {"type": "string", "description": "Destination URL"},
            "image_hash": {"type": "string", "description": "Hash of an uploaded image"},
            "video_id": {"type": "string", "description": "Video ID for video ads"},
            "headline": {"type": "string", "description": "Ad headline"},
            "description": {"type": "string", "description": "Link description"},
            "call_to_action_type": {"type": "string", "description": "CTA type (default LEARN_MORE)"}
        }),
        &["account_id", "name", "page_id"],
        create_creative,
    ));
}

#[derive(Deserialize)]
struct ListCreativesArgs {
    account_id: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    response_format: ResponseFormat,
}

async fn list_creatives(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: ListCreativesArgs = parse_args(args)?;
    let act_id = normalize_account_id(&args.account_id);

    let descriptor = RequestDescriptor::get(format!("{act_id}/adcreatives"))
        .account(&act_id)
        .param("fields", field_list(DEFAULT_CREATIVE_FIELDS))
        .param("limit", args.limit.to_string());

    let creatives = ctx.client.list_all(&descriptor).await?;
    let rows: Vec<Value> = creatives
        .iter()
        .map(|c| {
            let has_image = c.get("image_url").and_then(Value::as_str).is_some();
            json!({
                "id": pick(c, "id"),
                "name": pick(c, "name"),
                "title": pick(c, "title"),
                "status": pick(c, "status"),
                "image": if has_image { "Yes" } else { "No" },
            })
        })
        .collect();

    let (page, info) = paginate_local(rows, args.limit, args.offset);

    if args.response_format == ResponseFormat::Json {
        return render_json(&json!({"creatives": page, "pagination": info.to_json()}));
    }

    let table = markdown_table(
        &page,
        &[
            ("id", "ID"),
            ("name", "Name"),
            ("title", "Title"),
            ("status", "Status"),
            ("image", "Image"),
        ],
    );
    Ok(format!("## Ad Creatives ({}/{})\n\n{table}", info.count, info.total))
}

fn default_cta() -> String {
    "LEARN_MORE".to_string()
}

#[derive(Deserialize)]
struct CreateCreativeArgs {
    account_id: String,
    name: String,
    page_id: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    image_hash: Option<String>,
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_cta")]
    call_to_action_type: String,
}

async fn create_creative(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: CreateCreativeArgs = parse_args(args)?;
    let act_id = normalize_account_id(&args.account_id);

    let story_spec = build_story_spec(&args);
    let descriptor = RequestDescriptor::post(format!("{act_id}/adcreatives"))
        .account(&act_id)
        .field("name", &args.name)
        .field("object_story_spec", Value::Object(story_spec).to_string());

    let result = ctx.client.execute(&descriptor).await?;
    let creative_id = result.get("id").and_then(Value::as_str).unwrap_or("unknown");

    Ok(format!(
        "Creative created successfully.\n\n- **ID**: {creative_id}\n- **Name**: {}\n- **Page**: {}\n- **CTA**: {}",
        args.name, args.page_id, args.call_to_action_type
    ))
}

/// Assemble the `object_story_spec` for the requested media combination:
/// image link ad, video ad, or a text-only post.
fn build_story_spec(args: &CreateCreativeArgs) -> Map<String, Value> {
    let mut spec = Map::new();
    spec.insert("page_id".to_string(), json!(args.page_id));

    let cta = |link: &str| {
        json!({"type": args.call_to_action_type, "value": {"link": link}})
    };

    match (&args.link, &args.image_hash, &args.video_id) {
        (Some(link), Some(image_hash), _) => {
            let mut link_data = Map::new();
            link_data.insert("link".to_string(), json!(link));
            link_data.insert("image_hash".to_string(), json!(image_hash));
            link_data.insert("call_to_action".to_string(), cta(link));
            if let Some(message) = &args.message {
                link_data.insert("message".to_string(), json!(message));
            }
            if let Some(headline) = &args.headline {
                link_data.insert("name".to_string(), json!(headline));
            }
            if let Some(description) = &args.description {
                link_data.insert("description".to_string(), json!(description));
            }
            spec.insert("link_data".to_string(), Value::Object(link_data));
        }
        (Some(link), None, Some(video_id)) => {
            let mut video_data = Map::new();
            video_data.insert("video_id".to_string(), json!(video_id));
            video_data.insert("call_to_action".to_string(), cta(link));
            if let Some(message) = &args.message {
                video_data.insert("message".to_string(), json!(message));
            }
            if let Some(headline) = &args.headline {
                video_data.insert("title".to_string(), json!(headline));
            }
            if let Some(description) = &args.description {
                video_data.insert("description".to_string(), json!(description));
            }
            spec.insert("video_data".to_string(), Value::Object(video_data));
        }
        _ => {
            if let Some(message) = &args.message {
                let mut link_data = Map::new();
                link_data.insert("message".to_string(), json!(message));
                if let Some(link) = &args.link {
                    link_data.insert("link".to_string(), json!(link));
                }
                spec.insert("link_data".to_string(), Value::Object(link_data));
            }
        }
    }
    spec
}
