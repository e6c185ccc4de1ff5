//! MCP surface: stdio JSON-RPC framing, the tool registry, and tool results.

pub mod response;
pub mod server;
pub mod tools;

pub use server::McpServer;
pub use tools::ToolRegistry;
