use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::ContentBlock;

/// A tool the model may ask to run, as advertised by the tool process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name within a bridge connection.
    pub name: String,
    /// Human-readable description for tool selection.
    #[serde(default)]
    pub description: String,
    /// JSON schema for accepted tool arguments.
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Creates a new descriptor.
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Normalized output of one tool execution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolOutput {
    /// Result payload as content blocks.
    pub content: Vec<ContentBlock>,
    /// Whether the tool reported the call as failed.
    pub is_error: bool,
}

impl ToolOutput {
    /// Wraps the output into a `tool_result` block answering `tool_use_id`.
    pub fn into_result_block(self, tool_use_id: impl Into<String>) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: self.content,
            is_error: self.is_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_serializes_provider_tool_shape() {
        let def = ToolDescriptor::new(
            "list-datasources",
            "Lists datasources",
            serde_json::json!({"type": "object"}),
        );
        let value = serde_json::to_value(&def).expect("serialize");
        assert_eq!(value["name"], "list-datasources");
        assert_eq!(value["input_schema"]["type"], "object");
    }

    #[test]
    fn output_into_result_block_keeps_error_flag() {
        let output = ToolOutput {
            content: vec![ContentBlock::text("denied")],
            is_error: true,
        };
        let block = output.into_result_block("tu_9");
        assert_eq!(block, ContentBlock::tool_error("tu_9", "denied"));
    }
}
