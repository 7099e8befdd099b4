//! Model gateway abstraction.

use async_trait::async_trait;
use proto::{Message, ModelError, ModelReply, ToolDescriptor};

/// Request to the model gateway
#[derive(Debug, Clone, Default)]
pub struct MessageRequest {
    /// Full conversation history, oldest first.
    pub messages: Vec<Message>,
    /// Tools offered to the model. Empty means no tool use is possible.
    pub tools: Vec<ToolDescriptor>,
    /// Optional system prompt.
    pub system: Option<String>,
}

impl MessageRequest {
    /// Creates a request with no tools and no system prompt.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            system: None,
        }
    }

    /// Sets the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the offered tools.
    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }
}

/// A hosted LLM that accepts a history and returns one assistant turn.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Sends one request. Failures are never retried here.
    async fn create_message(&self, req: MessageRequest) -> Result<ModelReply, ModelError>;

    /// Model identifier, for logging.
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_system_and_tools() {
        let req = MessageRequest::new(vec![Message::user("hi")])
            .with_system("be brief")
            .with_tools(vec![ToolDescriptor::new(
                "list-datasources",
                "",
                serde_json::json!({"type": "object"}),
            )]);
        assert_eq!(req.system.as_deref(), Some("be brief"));
        assert_eq!(req.tools.len(), 1);
        assert_eq!(req.messages.len(), 1);
    }

    #[test]
    fn new_request_has_no_tools() {
        let req = MessageRequest::new(Vec::new());
        assert!(req.tools.is_empty());
        assert!(req.system.is_none());
    }
}
