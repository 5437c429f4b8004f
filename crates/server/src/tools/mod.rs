//! Tool registry and handlers
//!
//! Each handler is thin glue: deserialize arguments, build a request
//! descriptor, hand it to the pipeline, format the result. Classified
//! failures bubble up untouched; the MCP layer renders them.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use metaads_domain::{MetaAdsError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::context::ServerContext;
use crate::mcp::protocol::{McpTool, McpToolInputSchema};

mod account;
mod ad_sets;
mod ads;
mod audiences;
mod campaigns;
mod creatives;
mod insights;
mod oauth;

type Handler = Arc<dyn Fn(Arc<ServerContext>, Value) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// A registered tool: metadata for `tools/list` plus the handler.
pub struct ToolDef {
    name: &'static str,
    description: &'static str,
    /// JSON Schema `properties` object for the input.
    properties: Value,
    required: Vec<String>,
    handler: Handler,
}

/// Build a tool definition from an async handler function.
pub(crate) fn tool<F, Fut>(
    name: &'static str,
    description: &'static str,
    properties: Value,
    required: &[&str],
    handler: F,
) -> ToolDef
where
    F: Fn(Arc<ServerContext>, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    ToolDef {
        name,
        description,
        properties,
        required: required.iter().map(|s| s.to_string()).collect(),
        handler: Arc::new(move |ctx, args| Box::pin(handler(ctx, args))),
    }
}

/// Name-indexed collection of every tool the server exposes.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with the full tool set.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        account::register(&mut registry);
        campaigns::register(&mut registry);
        ad_sets::register(&mut registry);
        ads::register(&mut registry);
        audiences::register(&mut registry);
        creatives::register(&mut registry);
        insights::register(&mut registry);
        oauth::register(&mut registry);
        registry
    }

    pub(crate) fn register(&mut self, tool: ToolDef) {
        debug_assert!(
            !self.tools.iter().any(|t| t.name == tool.name),
            "duplicate tool name: {}",
            tool.name
        );
        self.tools.push(tool);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    /// Tool definitions for `tools/list`.
    pub fn definitions(&self) -> Vec<McpTool> {
        self.tools
            .iter()
            .map(|t| McpTool {
                name: t.name.to_string(),
                description: Some(t.description.to_string()),
                input_schema: McpToolInputSchema {
                    schema_type: "object".to_string(),
                    properties: Some(t.properties.clone()),
                    required: if t.required.is_empty() { None } else { Some(t.required.clone()) },
                },
            })
            .collect()
    }

    /// Invoke a tool by name.
    pub async fn call(
        &self,
        name: &str,
        context: Arc<ServerContext>,
        arguments: Value,
    ) -> Result<String> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| MetaAdsError::NotFound(format!("unknown tool: {name}")))?;
        (tool.handler)(context, arguments).await
    }
}

/* -------------------------------------------------------------------------- */
/* Shared handler helpers */
/* -------------------------------------------------------------------------- */

/// Output format shared by listing tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ResponseFormat {
    #[default]
    Markdown,
    Json,
}

/// Deserialize tool arguments, reporting mismatches as validation failures.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| MetaAdsError::Validation(format!("invalid tool arguments: {e}")))
}

/// Validate a string against one of the Graph API enums.
pub(crate) fn parse_enum<T: DeserializeOwned>(value: &str, what: &str) -> Result<T> {
    serde_json::from_value(Value::String(value.to_string()))
        .map_err(|_| MetaAdsError::Validation(format!("invalid {what}: {value}")))
}

/// Ensure an account id carries the `act_` prefix.
pub(crate) fn normalize_account_id(account_id: &str) -> String {
    let account_id = account_id.trim();
    if account_id.starts_with("act_") {
        account_id.to_string()
    } else {
        format!("act_{account_id}")
    }
}

/// Join a default field list for a `fields` parameter.
pub(crate) fn field_list(fields: &[&str]) -> String {
    fields.join(",")
}

/// Pull a field out of a raw record, `Null` when absent.
pub(crate) fn pick(record: &Value, key: &str) -> Value {
    record.get(key).cloned().unwrap_or(Value::Null)
}

/// Pretty-print a JSON payload for `response_format: json` output.
pub(crate) fn render_json(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| MetaAdsError::Internal(format!("failed to render JSON: {e}")))
}

/// Mask a token for display: first 8 and last 4 characters.
pub(crate) fn mask_token(token: &str) -> String {
    if token.len() > 12 {
        format!("{}...{}", &token[..8], &token[token.len() - 4..])
    } else {
        "***".to_string()
    }
}

pub(crate) fn default_limit() -> usize {
    50
}
