//! # Meta Ads MCP Server
//!
//! Application layer: the MCP stdio protocol surface, the tool registry and
//! handlers, and the dependency container that wires configuration, auth and
//! the Graph API client together.
//!
//! Handlers are deliberately thin: validate parameters, build a request
//! descriptor, hand it to the pipeline, format the outcome. Everything
//! interesting (rate limiting, classification, retries, pagination) lives in
//! `metaads-infra`.

pub mod context;
pub mod format;
pub mod mcp;
pub mod tools;

pub use context::ServerContext;
pub use tools::ToolRegistry;
