use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message authored by the end user (tool results travel under this role too).
    User,
    /// Message authored by the model.
    Assistant,
}

impl Role {
    /// Returns the wire name of this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(crate::error::ProtoError::InvalidRole(other.to_string())),
        }
    }
}

/// One block of message content.
///
/// The JSON form is the Anthropic Messages shape (`{"type": "text", ...}`).
/// Blocks with a `type` tag this crate does not model are kept verbatim in
/// [`ContentBlock::Other`] so they survive a round trip to the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },
    /// The model asks for a tool to be executed.
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// Result of a tool execution, answering the `ToolUse` with the same id.
    ToolResult {
        tool_use_id: String,
        content: Vec<ContentBlock>,
        is_error: bool,
    },
    /// Any other typed block, passed through untouched.
    Other(Value),
}

impl ContentBlock {
    /// Creates a text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates a successful tool result holding the given blocks.
    pub fn tool_result(tool_use_id: impl Into<String>, content: Vec<ContentBlock>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content,
            is_error: false,
        }
    }

    /// Creates a failed tool result carrying a single text message.
    pub fn tool_error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: vec![Self::text(message)],
            is_error: true,
        }
    }

    /// Returns the block's `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::Other(value) => value.get("type").and_then(Value::as_str).unwrap_or(""),
        }
    }

    /// Returns the text of a `Text` block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Converts the block into its JSON wire form.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            Self::Text { text } => {
                map.insert("type".into(), Value::from("text"));
                map.insert("text".into(), Value::from(text.as_str()));
            }
            Self::ToolUse { id, name, input } => {
                map.insert("type".into(), Value::from("tool_use"));
                map.insert("id".into(), Value::from(id.as_str()));
                map.insert("name".into(), Value::from(name.as_str()));
                map.insert("input".into(), input.clone());
            }
            Self::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                map.insert("type".into(), Value::from("tool_result"));
                map.insert("tool_use_id".into(), Value::from(tool_use_id.as_str()));
                map.insert(
                    "content".into(),
                    Value::Array(content.iter().map(ContentBlock::to_value).collect()),
                );
                if *is_error {
                    map.insert("is_error".into(), Value::Bool(true));
                }
            }
            Self::Other(value) => return value.clone(),
        }
        Value::Object(map)
    }

    /// Parses a block from its JSON wire form.
    ///
    /// Fails only when the value is not an object with a string `type`, or
    /// when a known tag is missing one of its required fields.
    pub fn from_value(value: Value) -> Result<Self, crate::error::ProtoError> {
        use crate::error::ProtoError;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtoError::Serialization("content block without type".into()))?
            .to_string();

        let field = |name: &str| -> Result<String, ProtoError> {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ProtoError::Serialization(format!("{kind} block missing '{name}'")))
        };

        match kind.as_str() {
            "text" => Ok(Self::Text {
                text: field("text")?,
            }),
            "tool_use" => Ok(Self::ToolUse {
                id: field("id")?,
                name: field("name")?,
                input: value
                    .get("input")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new())),
            }),
            "tool_result" => {
                let tool_use_id = field("tool_use_id")?;
                let content = match value.get("content") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::String(text)) => vec![Self::text(text.as_str())],
                    Some(Value::Array(items)) => items
                        .iter()
                        .cloned()
                        .map(Self::from_value)
                        .collect::<Result<_, _>>()?,
                    Some(other) => {
                        return Err(ProtoError::Serialization(format!(
                            "tool_result content must be a string or a list, got {other}"
                        )));
                    }
                };
                let is_error = value
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Ok(Self::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                })
            }
            _ => Ok(Self::Other(value)),
        }
    }
}

impl Serialize for ContentBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ContentBlock::from_value(value).map_err(D::Error::custom)
    }
}

/// Message payload: either plain text or a list of content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text shorthand.
    Text(String),
    /// Structured content blocks.
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Returns `true` when there is nothing to send.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<ContentBlock>> for MessageContent {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self::Blocks(blocks)
    }
}

/// A message in a conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub role: Role,
    /// Message payload.
    pub content: MessageContent,
}

impl Message {
    /// Creates a user message with plain text content.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Creates an assistant message with plain text content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Creates an assistant message holding the model's full block list.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Creates the user message that carries a batch of tool results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(results),
        }
    }

    /// Returns the content as blocks, expanding the plain text shorthand.
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match &self.content {
            MessageContent::Text(text) => vec![ContentBlock::text(text.as_str())],
            MessageContent::Blocks(blocks) => blocks.clone(),
        }
    }
}
