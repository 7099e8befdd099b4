use serde::{Deserialize, Serialize};

use crate::message::ContentBlock;

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of the assistant turn.
    #[default]
    EndTurn,
    /// The model wants one or more tools executed.
    ToolUse,
    /// Generation hit the `max_tokens` budget.
    MaxTokens,
    /// A configured stop sequence was produced.
    StopSequence,
}

impl StopReason {
    /// Maps a provider stop reason onto the canonical set.
    ///
    /// Unknown or missing values (`refusal`, `guardrail_intervened`, `null`, ...)
    /// count as an ordinary end of turn.
    pub fn from_provider(raw: Option<&str>) -> Self {
        match raw {
            Some("tool_use") => Self::ToolUse,
            Some("max_tokens") => Self::MaxTokens,
            Some("stop_sequence") => Self::StopSequence,
            _ => Self::EndTurn,
        }
    }
}

/// Token usage reported by the model for a single call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub input_tokens: u32,
    /// Tokens generated.
    #[serde(default)]
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Accumulates another usage record into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    /// Input plus output tokens.
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Normalized reply from the model gateway.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelReply {
    /// Content blocks in the order the model produced them.
    pub content: Vec<ContentBlock>,
    /// Canonical stop reason.
    pub stop_reason: StopReason,
    /// Token usage for this call.
    pub usage: TokenUsage,
}

impl ModelReply {
    /// Text of every `Text` block, in order.
    pub fn text_segments(&self) -> Vec<&str> {
        self.content.iter().filter_map(ContentBlock::as_text).collect()
    }

    /// All text blocks joined by newlines.
    pub fn joined_text(&self) -> String {
        self.text_segments().join("\n")
    }

    /// `(id, name, input)` of every `ToolUse` block, in order.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }
}
