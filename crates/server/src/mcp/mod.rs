//! Model Context Protocol surface
//!
//! JSON-RPC 2.0 message types and the stdio server loop that exposes the
//! tool registry to a conversational client.

pub mod protocol;
pub mod server;

pub use protocol::{
    CallToolParams, CallToolResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpTool,
    McpToolInputSchema, RequestId, ToolContent,
};
pub use server::McpServer;
