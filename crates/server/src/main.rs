//! Meta Ads MCP server entry point
//!
//! Stdio transport: stdout carries the protocol, so logging is pinned to
//! stderr.

use std::sync::Arc;

use metaads_server::mcp::McpServer;
use metaads_server::{ServerContext, ToolRegistry};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::info!(path = %path.display(), "loaded .env"),
        Err(_) => tracing::debug!("no .env file found"),
    }

    let config = metaads_infra::config::load()?;
    let context = Arc::new(ServerContext::new(config)?);
    let registry = Arc::new(ToolRegistry::with_defaults());

    tracing::info!("Meta Ads MCP server starting");
    McpServer::new(context, registry).run().await?;
    Ok(())
}
