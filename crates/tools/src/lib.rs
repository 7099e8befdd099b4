//! Tool bridge trait and the stdio MCP client behind it.
//!
//! The conversation loop only sees [`ToolBridge`]. [`McpBridge`] implements it
//! by launching the analytics tool server as a child process and running an
//! `rmcp` client session over its standard streams.

pub mod bridge;
pub mod normalize;

pub use bridge::{ANALYTICS_ENV_KEYS, McpBridge, McpBridgeConfig};
pub use normalize::{normalize_call_result, normalize_tool_result};

use async_trait::async_trait;
use proto::{ConnectionError, ToolDescriptor, ToolOutput};

/// Access to externally hosted tools
#[async_trait]
pub trait ToolBridge: Send + Sync {
    /// Whether a tool server connection is currently live.
    fn is_connected(&self) -> bool;
    /// Tools advertised by the server for the current connection.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ConnectionError>;
    /// Runs one tool. Never retried.
    async fn call_tool(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<ToolOutput, ConnectionError>;
}
