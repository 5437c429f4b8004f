//! MCP stdio server
//!
//! Reads JSON-RPC requests line-by-line from stdin and writes responses to
//! stdout. All logging goes to stderr so the protocol stream stays clean.
//! Tool failures are reported as tool results with `is_error` set, carrying
//! the full classification (kind, message, retry-after); the conversational
//! layer decides what to tell the user.

use std::sync::Arc;

use metaads_domain::MetaAdsError;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use super::protocol::{
    CallToolParams, CallToolResult, JsonRpcRequest, JsonRpcResponse, RequestId, INTERNAL_ERROR,
    INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::context::ServerContext;
use crate::tools::ToolRegistry;

/// The MCP server: a tool registry bound to a server context.
pub struct McpServer {
    context: Arc<ServerContext>,
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(context: Arc<ServerContext>, registry: Arc<ToolRegistry>) -> Self {
        Self { context, registry }
    }

    /// Serve requests from stdin until it closes.
    pub async fn run(&self) -> std::io::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        info!(tools = self.registry.len(), "MCP server listening on stdio");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let serialized = serde_json::to_string(&response)
                    .unwrap_or_else(|e| fallback_internal_error(&e.to_string()));
                stdout.write_all(serialized.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        info!("stdin closed, MCP server shutting down");
        Ok(())
    }

    /// Handle one raw request line. Returns `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "unparseable request line");
                return Some(JsonRpcResponse::failure(
                    RequestId::Number(0),
                    PARSE_ERROR,
                    format!("parse error: {e}"),
                ));
            }
        };

        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "notification acknowledged");
            return None;
        };

        Some(self.handle_request(id, &request.method, request.params).await)
    }

    async fn handle_request(
        &self,
        id: RequestId,
        method: &str,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        debug!(%method, "handling request");
        match method {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": "meta-ads-mcp",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => match serde_json::to_value(self.registry.definitions()) {
                Ok(tools) => JsonRpcResponse::success(id, json!({ "tools": tools })),
                Err(e) => JsonRpcResponse::failure(id, INTERNAL_ERROR, e.to_string()),
            },
            "tools/call" => self.handle_tool_call(id, params).await,
            other => JsonRpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            ),
        }
    }

    async fn handle_tool_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return JsonRpcResponse::failure(id, INVALID_PARAMS, "missing call parameters")
            }
            Err(e) => {
                return JsonRpcResponse::failure(
                    id,
                    INVALID_PARAMS,
                    format!("invalid call parameters: {e}"),
                )
            }
        };

        if !self.registry.contains(&params.name) {
            return JsonRpcResponse::failure(
                id,
                INVALID_PARAMS,
                format!("unknown tool: {}", params.name),
            );
        }

        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        let outcome = self.registry.call(&params.name, Arc::clone(&self.context), arguments).await;

        let result = match outcome {
            Ok(text) => CallToolResult::text(text),
            Err(error) => {
                warn!(tool = %params.name, %error, "tool call failed");
                CallToolResult::error(render_error(&error))
            }
        };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::failure(id, INTERNAL_ERROR, e.to_string()),
        }
    }
}

/// Render a classified failure with everything the caller needs to react:
/// the taxonomy kind and, for rate limits, how long to wait.
fn render_error(error: &MetaAdsError) -> String {
    let mut rendered = format!("[{:?}] {error}", error.kind());
    if let Some(retry_after) = error.retry_after() {
        rendered.push_str(&format!("\nRetry after: {} seconds", retry_after.as_secs()));
    }
    rendered
}

fn fallback_internal_error(detail: &str) -> String {
    format!(
        r#"{{"jsonrpc":"2.0","id":0,"error":{{"code":{INTERNAL_ERROR},"message":"{detail}"}}}}"#
    )
}

#[cfg(test)]
mod tests {
    use metaads_domain::Config;

    use super::*;

    fn server() -> McpServer {
        let context =
            Arc::new(ServerContext::new(Config::from_access_token("tok")).expect("context"));
        McpServer::new(context, Arc::new(ToolRegistry::with_defaults()))
    }

    #[tokio::test]
    async fn initialize_reports_protocol_and_server_info() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .expect("response");

        let result = response.result.expect("result");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "meta-ads-mcp");
    }

    #[tokio::test]
    async fn tools_list_advertises_the_registry() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .expect("response");

        let tools = response.result.expect("result")["tools"].as_array().cloned().unwrap();
        assert!(!tools.is_empty());
        let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
        assert!(names.contains(&"list_campaigns"));
        assert!(names.contains(&"health_check"));
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn unknown_method_is_reported() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#)
            .await
            .expect("response");
        assert_eq!(response.error.expect("error").code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn unparseable_lines_are_parse_errors() {
        let response = server().handle_line("{nope").await.expect("response");
        assert_eq!(response.error.expect("error").code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let response = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"no_such_tool"}}"#,
            )
            .await
            .expect("response");
        let error = response.error.expect("error");
        assert_eq!(error.code, INVALID_PARAMS);
        assert!(error.message.contains("no_such_tool"));
    }

    #[tokio::test]
    async fn failing_tool_returns_error_result_with_classification() {
        // generate_auth_url needs META_APP_ID; without it the tool fails with
        // a Config classification, reported inside the tool result.
        let response = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"generate_auth_url","arguments":{}}}"#,
            )
            .await
            .expect("response");

        let result = response.result.expect("result");
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("[Config]"));
        assert!(text.contains("META_APP_ID"));
    }
}
