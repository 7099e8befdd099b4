//! AWS Bedrock `InvokeModel` provider for Anthropic models.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use proto::{ModelError, ModelReply};
use tracing::debug;

use crate::llm::{MessageRequest, ModelGateway};
use crate::sigv4::{self, AwsCredentials, SigningParams};
use crate::wire::{self, WireRequest};

/// `anthropic_version` value Bedrock expects in the request body.
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const SERVICE: &str = "bedrock";
const CONTENT_TYPE: &str = "application/json";

/// How requests to Bedrock are authenticated.
#[derive(Debug, Clone)]
pub enum BedrockAuth {
    /// Bedrock API key sent as `Authorization: Bearer`.
    Bearer(String),
    /// SigV4 with static credentials.
    SigV4(AwsCredentials),
}

/// Bedrock runtime model gateway.
pub struct BedrockProvider {
    client: reqwest::Client,
    auth: BedrockAuth,
    region: String,
    model_id: String,
    max_tokens: u32,
    endpoint: String,
}

impl BedrockProvider {
    /// Creates a provider for the regional Bedrock runtime endpoint.
    pub fn new(
        auth: BedrockAuth,
        region: impl Into<String>,
        model_id: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        let region = region.into();
        let endpoint = format!("https://bedrock-runtime.{region}.amazonaws.com");
        Self {
            client: reqwest::Client::new(),
            auth,
            region,
            model_id: model_id.into(),
            max_tokens,
            endpoint,
        }
    }

    /// Overrides the runtime endpoint (proxies, VPC endpoints, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn invoke_path(&self) -> String {
        format!("/model/{}/invoke", sigv4::uri_encode(&self.model_id))
    }

    fn invoke_url(&self) -> String {
        format!("{}{}", self.endpoint, self.invoke_path())
    }

    fn encode_body(&self, req: &MessageRequest) -> Result<Vec<u8>, ModelError> {
        let mut body = WireRequest::from_request(req, self.max_tokens);
        body.anthropic_version = Some(BEDROCK_ANTHROPIC_VERSION);
        serde_json::to_vec(&body).map_err(|e| ModelError::Serialization(e.to_string()))
    }

    fn host(&self) -> Result<String, ModelError> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| ModelError::Transport(format!("invalid endpoint: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| ModelError::Transport("endpoint has no host".to_string()))?;
        Ok(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

#[async_trait]
impl ModelGateway for BedrockProvider {
    async fn create_message(&self, req: MessageRequest) -> Result<ModelReply, ModelError> {
        let body = self.encode_body(&req)?;

        debug!(
            model = %self.model_id,
            region = %self.region,
            messages = %req.messages.len(),
            tools = %req.tools.len(),
            "Invoking Bedrock model"
        );
        let t0 = Instant::now();

        let mut req_builder = self
            .client
            .post(self.invoke_url())
            .header("content-type", CONTENT_TYPE)
            .header("accept", CONTENT_TYPE);

        match &self.auth {
            BedrockAuth::Bearer(token) => {
                req_builder = req_builder.bearer_auth(token);
            }
            BedrockAuth::SigV4(creds) => {
                let host = self.host()?;
                let path = self.invoke_path();
                let signed = sigv4::sign(
                    creds,
                    &SigningParams {
                        method: "POST",
                        host: &host,
                        path: &path,
                        region: &self.region,
                        service: SERVICE,
                        content_type: CONTENT_TYPE,
                        body: &body,
                        now: Utc::now(),
                    },
                )?;
                req_builder = req_builder
                    .header("x-amz-date", signed.amz_date)
                    .header("authorization", signed.authorization);
                if let Some(token) = signed.security_token {
                    req_builder = req_builder.header("x-amz-security-token", token);
                }
            }
        }

        let response = req_builder
            .body(body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        debug!(
            status = %response.status().as_u16(),
            elapsed_ms = %t0.elapsed().as_millis(),
            "Bedrock response received"
        );
        let reply = wire::read_reply(response).await?;
        debug!(
            input_tokens = reply.usage.input_tokens,
            output_tokens = reply.usage.output_tokens,
            stop_reason = ?reply.stop_reason,
            "Bedrock reply decoded"
        );
        Ok(reply)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
