//! MCP tool server: JSON-RPC message handling, the tool registry and the
//! stdio transport.

mod handlers;
mod jsonrpc;
pub mod tools;
mod transport;

pub use tools::ToolRegistry;
pub use transport::serve_stdio;
