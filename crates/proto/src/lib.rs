//! Shared conversation types for the model gateway, tool bridge, and HTTP layer.
//!
//! This crate defines the content-block message model, tool descriptors,
//! normalized model replies, and strongly-typed error enums shared across
//! the workspace.

pub mod error;
pub mod message;
pub mod reply;
pub mod tool;

/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of conversation message types.
pub use message::{ContentBlock, Message, MessageContent, Role};
/// Re-export of normalized model reply types.
pub use reply::{ModelReply, StopReason, TokenUsage};
/// Re-export of tool descriptor and output types.
pub use tool::{ToolDescriptor, ToolOutput};

/// Returns `true` when the key looks like an Anthropic OAuth access token
/// (`sk-ant-oat*`) rather than a permanent API key (`sk-ant-api*`).
///
/// When this returns `true`, callers should use `Authorization: Bearer`
/// instead of `x-api-key` for Anthropic API requests.
pub fn is_anthropic_oauth_token(key: &str) -> bool {
    key.starts_with("sk-ant-oat")
}
