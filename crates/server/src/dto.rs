//! Request and response bodies.

use proto::{ContentBlock, Message, Role, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub timestamp: String,
}

impl ChatRequest {
    /// Rejects histories the loop cannot act on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let last = self.messages.last().ok_or(ValidationError::EmptyHistory)?;
        if let Some(index) = self.messages.iter().position(|m| m.content.is_empty()) {
            return Err(ValidationError::EmptyContent { index });
        }
        if last.role != Role::User {
            return Err(ValidationError::LastMessageNotUser);
        }
        check_tool_pairing(&self.messages)
    }
}

/// Every tool result must answer a tool use of the assistant turn right
/// before it.
fn check_tool_pairing(messages: &[Message]) -> Result<(), ValidationError> {
    for (index, message) in messages.iter().enumerate() {
        let blocks = message.blocks();
        let results = blocks.iter().filter_map(|b| match b {
            ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id),
            _ => None,
        });
        for tool_use_id in results {
            let answered = index
                .checked_sub(1)
                .map(|prev| &messages[prev])
                .filter(|prev| prev.role == Role::Assistant && message.role == Role::User)
                .is_some_and(|prev| {
                    prev.blocks().iter().any(
                        |b| matches!(b, ContentBlock::ToolUse { id, .. } if id == tool_use_id),
                    )
                });
            if !answered {
                return Err(ValidationError::UnpairedToolResult {
                    index,
                    tool_use_id: tool_use_id.clone(),
                });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    pub timestamp: String,
    pub success: bool,
}

/// Body of `/api/create_report` and `/api/create_chart`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportRequest {
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
}

impl CreateReportRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyField("content".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReportResponse {
    pub code: String,
    pub timestamp: String,
    pub success: bool,
}

/// Connection settings to try out before saving them.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateModelRequest {
    #[serde(alias = "aws_region")]
    pub region: String,
    #[serde(default, alias = "aws_bearer_token")]
    pub bearer_token: String,
    #[serde(alias = "bedrock_model_id")]
    pub model_id: String,
    #[serde(default = "default_validate_max_tokens")]
    pub max_tokens: u32,
}

fn default_validate_max_tokens() -> u32 {
    10_000
}

impl ValidateModelRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.region.trim().is_empty() {
            return Err(ValidationError::EmptyField("region".into()));
        }
        if self.model_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("model_id".into()));
        }
        if self.max_tokens == 0 {
            return Err(ValidationError::InvalidValue {
                field: "max_tokens".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub message: String,
}

/// Body returned with HTTP 422.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionBody {
    pub message: String,
    pub success: bool,
}
