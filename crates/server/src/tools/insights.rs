//! Performance insights tools

use std::sync::Arc;

use futures::future::join_all;
use metaads_domain::constants::DEFAULT_INSIGHTS_FIELDS;
use metaads_domain::{DatePreset, InsightsBreakdown, InsightsLevel, Result};
use metaads_infra::RequestDescriptor;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{field_list, parse_args, parse_enum, pick, render_json, tool, ResponseFormat, ToolRegistry};
use crate::context::ServerContext;
use crate::format::{format_number, markdown_table};

pub(crate) fn register(registry: &mut ToolRegistry) {
    registry.register(tool(
        "get_insights",
        "Get performance insights for an account, campaign, ad set or ad",
        json!({
            "object_id": {"type": "string", "description": "Account (act_...), campaign, ad set or ad ID"},
            "level": {"type": "string", "description": "account, campaign, adset, ad (default campaign)"},
            "date_preset": {"type": "string", "description": "e.g. today, last_7d, last_30d, lifetime"},
            "breakdown": {"type": "string", "description": "Optional: age, gender, country, region, publisher_platform, device_platform"},
            "response_format": {"type": "string", "description": "markdown or json"}
        }),
        &["object_id"],
        get_insights,
    ));
    registry.register(tool(
        "compare_performance",
        "Compare performance metrics across several objects, fetched concurrently",
        json!({
            "object_ids": {"type": "array", "items": {"type": "string"}, "description": "IDs to compare"},
            "level": {"type": "string", "description": "account, campaign, adset, ad (default campaign)"},
            "date_preset": {"type": "string", "description": "Date preset (default last_30d)"}
        }),
        &["object_ids"],
        compare_performance,
    ));
    registry.register(tool(
        "get_daily_trends",
        "Get day-by-day performance for an object",
        json!({
            "object_id": {"type": "string", "description": "Account, campaign, ad set or ad ID"},
            "level": {"type": "string", "description": "account, campaign, adset, ad (default campaign)"},
            "date_preset": {"type": "string", "description": "Date preset (default last_30d)"}
        }),
        &["object_id"],
        get_daily_trends,
    ));
}

fn default_level() -> String {
    "campaign".to_string()
}

fn default_date_preset() -> String {
    "last_30d".to_string()
}

fn insights_descriptor(
    object_id: &str,
    level: &str,
    date_preset: &str,
    breakdown: Option<&str>,
) -> Result<RequestDescriptor> {
    parse_enum::<InsightsLevel>(level, "level")?;
    parse_enum::<DatePreset>(date_preset, "date_preset")?;

    let mut descriptor = RequestDescriptor::get(format!("{object_id}/insights"))
        .param("fields", field_list(DEFAULT_INSIGHTS_FIELDS))
        .param("level", level)
        .param("date_preset", date_preset);
    if object_id.starts_with("act_") {
        descriptor = descriptor.account(object_id);
    }
    if let Some(breakdown) = breakdown {
        parse_enum::<InsightsBreakdown>(breakdown, "breakdown")?;
        descriptor = descriptor.param("breakdowns", breakdown);
    }
    Ok(descriptor)
}

fn metric_row(record: &Value) -> Value {
    json!({
        "impressions": format_number(&pick(record, "impressions")),
        "clicks": format_number(&pick(record, "clicks")),
        "spend": pick(record, "spend"),
        "ctr": pick(record, "ctr"),
        "cpc": pick(record, "cpc"),
        "reach": format_number(&pick(record, "reach")),
    })
}

#[derive(Deserialize)]
struct GetInsightsArgs {
    object_id: String,
    #[serde(default = "default_level")]
    level: String,
    #[serde(default = "default_date_preset")]
    date_preset: String,
    #[serde(default)]
    breakdown: Option<String>,
    #[serde(default)]
    response_format: ResponseFormat,
}

async fn get_insights(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: GetInsightsArgs = parse_args(args)?;
    let descriptor = insights_descriptor(
        &args.object_id,
        &args.level,
        &args.date_preset,
        args.breakdown.as_deref(),
    )?;

    let records = ctx.client.list_all(&descriptor).await?;
    let rows: Vec<Value> = records
        .iter()
        .map(|r| {
            let mut row = metric_row(r);
            if let Some(breakdown) = &args.breakdown {
                row["segment"] = pick(r, breakdown);
            }
            row
        })
        .collect();

    if args.response_format == ResponseFormat::Json {
        return render_json(&json!({"insights": rows}));
    }

    let mut columns: Vec<(&str, &str)> = Vec::new();
    if args.breakdown.is_some() {
        columns.push(("segment", "Segment"));
    }
    columns.extend([
        ("impressions", "Impressions"),
        ("clicks", "Clicks"),
        ("spend", "Spend"),
        ("ctr", "CTR"),
        ("cpc", "CPC"),
        ("reach", "Reach"),
    ]);

    let table = markdown_table(&rows, &columns);
    Ok(format!(
        "## Insights for {} ({}, {})\n\n{table}",
        args.object_id, args.level, args.date_preset
    ))
}

#[derive(Deserialize)]
struct CompareArgs {
    object_ids: Vec<String>,
    #[serde(default = "default_level")]
    level: String,
    #[serde(default = "default_date_preset")]
    date_preset: String,
}

async fn compare_performance(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: CompareArgs = parse_args(args)?;

    // One pipeline operation per object, all in flight together; the rate
    // limiter serializes admissions per account underneath.
    let fetches = args.object_ids.iter().map(|object_id| {
        let ctx = Arc::clone(&ctx);
        let level = args.level.clone();
        let date_preset = args.date_preset.clone();
        let object_id = object_id.clone();
        async move {
            let descriptor = insights_descriptor(&object_id, &level, &date_preset, None)?;
            let records = ctx.client.list_all(&descriptor).await?;
            Ok::<(String, Vec<Value>), metaads_domain::MetaAdsError>((object_id, records))
        }
    });

    let mut rows = Vec::new();
    for outcome in join_all(fetches).await {
        match outcome {
            Ok((object_id, records)) => {
                let mut row = match records.first() {
                    Some(record) => metric_row(record),
                    None => json!({"impressions": "-", "clicks": "-", "spend": "-"}),
                };
                row["object"] = json!(object_id);
                rows.push(row);
            }
            Err(error) => {
                rows.push(json!({
                    "object": "error",
                    "impressions": format!("{:?}: {error}", error.kind()),
                }));
            }
        }
    }

    let table = markdown_table(
        &rows,
        &[
            ("object", "Object"),
            ("impressions", "Impressions"),
            ("clicks", "Clicks"),
            ("spend", "Spend"),
            ("ctr", "CTR"),
            ("reach", "Reach"),
        ],
    );
    Ok(format!("## Performance Comparison ({})\n\n{table}", args.date_preset))
}

#[derive(Deserialize)]
struct TrendsArgs {
    object_id: String,
    #[serde(default = "default_level")]
    level: String,
    #[serde(default = "default_date_preset")]
    date_preset: String,
}

async fn get_daily_trends(ctx: Arc<ServerContext>, args: Value) -> Result<String> {
    let args: TrendsArgs = parse_args(args)?;
    let descriptor = insights_descriptor(&args.object_id, &args.level, &args.date_preset, None)?
        .param("time_increment", "1");

    let records = ctx.client.list_all(&descriptor).await?;
    let rows: Vec<Value> = records
        .iter()
        .map(|r| {
            let mut row = metric_row(r);
            row["date"] = pick(r, "date_start");
            row
        })
        .collect();

    let table = markdown_table(
        &rows,
        &[
            ("date", "Date"),
            ("impressions", "Impressions"),
            ("clicks", "Clicks"),
            ("spend", "Spend"),
            ("ctr", "CTR"),
        ],
    );
    Ok(format!("## Daily Trends for {} ({})\n\n{table}", args.object_id, args.date_preset))
}

#[cfg(test)]
mod tests {
    use metaads_domain::{Config, ErrorKind};
    use wiremock::matchers::{method, path, query_param};
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
    async fn insights_render_metric_columns() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/c1/insights"))
            .and(query_param("date_preset", "last_7d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"impressions": "12345", "clicks": "678", "spend": "90.12",
                          "ctr": "1.23", "cpc": "0.13", "reach": "9000"}],
                "paging": {}
            })))
            .mount(&server)
            .await;

        let registry = ToolRegistry::with_defaults();
        let output = registry
            .call(
                "get_insights",
                context(server.uri()).await,
                json!({"object_id": "c1", "date_preset": "last_7d"}),
            )
            .await
            .expect("output");

        assert!(output.contains("12,345"));
        assert!(output.contains("90.12"));
    }

    #[tokio::test]
    async fn invalid_date_preset_is_rejected() {
        let registry = ToolRegistry::with_defaults();
        let err = registry
            .call(
                "get_insights",
                context("http://127.0.0.1:1".to_string()).await,
                json!({"object_id": "c1", "date_preset": "last_fortnight"}),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn comparison_fetches_each_object() {
        let server = MockServer::start().await;
        for (id, impressions) in [("c1", "100"), ("c2", "200")] {
            Mock::given(method("GET"))
                .and(path(format!("/{id}/insights")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "data": [{"impressions": impressions, "clicks": "1", "spend": "1.00"}],
                    "paging": {}
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let registry = ToolRegistry::with_defaults();
        let output = registry
            .call(
                "compare_performance",
                context(server.uri()).await,
                json!({"object_ids": ["c1", "c2"]}),
            )
            .await
            .expect("output");

        assert!(output.contains("c1"));
        assert!(output.contains("c2"));
        assert!(output.contains("100"));
        assert!(output.contains("200"));
    }
}
