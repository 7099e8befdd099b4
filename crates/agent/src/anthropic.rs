//! Anthropic Messages API provider implementation.

use std::time::Instant;

use async_trait::async_trait;
use proto::{ModelError, ModelReply};
use tracing::debug;

use crate::llm::{MessageRequest, ModelGateway};
use crate::wire::{self, WireRequest};

const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic Messages API model gateway.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Creates a provider targeting the default Anthropic API endpoint.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self::with_base_url(api_key, model, max_tokens, DEFAULT_BASE_URL)
    }

    /// Creates a provider targeting a custom base URL (useful for proxies/tests).
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_tokens,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait]
impl ModelGateway for AnthropicProvider {
    async fn create_message(&self, req: MessageRequest) -> Result<ModelReply, ModelError> {
        let mut body = WireRequest::from_request(&req, self.max_tokens);
        body.model = Some(self.model.as_str());

        debug!(
            model = %self.model,
            messages = %req.messages.len(),
            tools = %req.tools.len(),
            "Sending request to Anthropic"
        );
        let t0 = Instant::now();

        let mut req_builder = self
            .client
            .post(self.endpoint())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("content-type", "application/json");

        if proto::is_anthropic_oauth_token(&self.api_key) {
            req_builder = req_builder.bearer_auth(&self.api_key);
        } else {
            req_builder = req_builder.header("x-api-key", &self.api_key);
        }

        let response = req_builder
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        debug!(
            status = %response.status().as_u16(),
            elapsed_ms = %t0.elapsed().as_millis(),
            "Anthropic response received"
        );
        let reply = wire::read_reply(response).await?;
        debug!(
            input_tokens = reply.usage.input_tokens,
            output_tokens = reply.usage.output_tokens,
            stop_reason = ?reply.stop_reason,
            "Anthropic reply decoded"
        );
        Ok(reply)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
