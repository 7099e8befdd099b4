//! Anthropic Messages wire codec shared by the Bedrock and direct providers.

use proto::{ContentBlock, Message, ModelError, ModelReply, StopReason, TokenUsage, ToolDescriptor};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::MessageRequest;

/// Characters of an error body kept in `ModelError::Api`.
const ERROR_PREVIEW_CHARS: usize = 500;

// ── Request types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct WireRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_version: Option<&'static str>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub messages: &'a [Message],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

impl<'a> WireRequest<'a> {
    /// Builds the common body. Providers set `model` or `anthropic_version`.
    pub fn from_request(req: &'a MessageRequest, max_tokens: u32) -> Self {
        Self {
            model: None,
            anthropic_version: None,
            max_tokens,
            system: req.system.as_deref(),
            messages: &req.messages,
            tools: req.tools.iter().map(convert_tool).collect(),
        }
    }
}

fn convert_tool(t: &ToolDescriptor) -> WireTool<'_> {
    WireTool {
        name: &t.name,
        description: &t.description,
        input_schema: &t.input_schema,
    }
}

// ── Response types ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Vec<Value>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: TokenUsage,
}

/// Maps an HTTP status and body onto a normalized reply or a `ModelError`.
pub(crate) fn decode_reply(status: StatusCode, body: &str) -> Result<ModelReply, ModelError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ModelError::RateLimit);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ModelError::Auth(format!("HTTP {status}: {}", preview(body))));
    }
    if !status.is_success() {
        return Err(ModelError::Api(format!("HTTP {status}: {}", preview(body))));
    }

    let resp: WireResponse = serde_json::from_str(body).map_err(|e| {
        ModelError::InvalidResponse(format!(
            "Deserialization error: {e}; body: {}",
            body.chars().take(200).collect::<String>()
        ))
    })?;

    let content = resp
        .content
        .into_iter()
        .map(ContentBlock::from_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

    Ok(ModelReply {
        content,
        stop_reason: StopReason::from_provider(resp.stop_reason.as_deref()),
        usage: resp.usage,
    })
}

/// Reads a provider response and decodes it.
pub(crate) async fn read_reply(response: reqwest::Response) -> Result<ModelReply, ModelError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ModelError::Transport(e.to_string()))?;
    decode_reply(status, &body)
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_PREVIEW_CHARS).collect()
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_absent_optional_fields() {
        let req = MessageRequest::new(vec![Message::user("hi")]);
        let body = serde_json::to_value(WireRequest::from_request(&req, 1024)).expect("serialize");
        assert_eq!(
            body,
            json!({
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": "hi"}]
            })
        );
    }

    #[test]
    fn request_carries_system_and_tools() {
        let req = MessageRequest::new(vec![Message::user("hi")])
            .with_system("sys")
            .with_tools(vec![ToolDescriptor::new(
                "query-datasource",
                "Runs a query",
                json!({"type": "object"}),
            )]);
        let mut wire = WireRequest::from_request(&req, 10);
        wire.model = Some("claude-x");
        let body = serde_json::to_value(wire).expect("serialize");
        assert_eq!(body["model"], "claude-x");
        assert_eq!(body["system"], "sys");
        assert_eq!(body["tools"][0]["name"], "query-datasource");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn request_serializes_tool_round_messages() {
        let req = MessageRequest::new(vec![
            Message::user("go"),
            Message::assistant_blocks(vec![ContentBlock::ToolUse {
                id: "tu1".into(),
                name: "list-datasources".into(),
                input: json!({}),
            }]),
            Message::tool_results(vec![ContentBlock::tool_error("tu1", "boom")]),
        ]);
        let body = serde_json::to_value(WireRequest::from_request(&req, 10)).expect("serialize");
        assert_eq!(body["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(body["messages"][2]["role"], "user");
        assert_eq!(body["messages"][2]["content"][0]["is_error"], true);
    }

    #[test]
    fn decodes_text_reply_with_usage() {
        let body = r#"{"content":[{"type":"text","text":"Hello!"}],"stop_reason":"end_turn","usage":{"input_tokens":12,"output_tokens":3}}"#;
        let reply = decode_reply(StatusCode::OK, body).expect("decode");
        assert_eq!(reply.text_segments(), vec!["Hello!"]);
        assert_eq!(reply.stop_reason, StopReason::EndTurn);
        assert_eq!(reply.usage.total(), 15);
    }

    #[test]
    fn missing_usage_decodes_as_zero() {
        let body = r#"{"content":[],"stop_reason":null}"#;
        let reply = decode_reply(StatusCode::OK, body).expect("decode");
        assert_eq!(reply.usage, TokenUsage::default());
        assert_eq!(reply.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn decodes_mixed_text_tool_use_and_unknown_blocks() {
        let body = r#"{
            "content": [
                {"type":"thinking","thinking":"hmm"},
                {"type":"text","text":"Let me check."},
                {"type":"tool_use","id":"tu1","name":"list-datasources","input":{}}
            ],
            "stop_reason": "tool_use"
        }"#;
        let reply = decode_reply(StatusCode::OK, body).expect("decode");
        assert_eq!(reply.content.len(), 3);
        assert_eq!(reply.content[0].kind(), "thinking");
        assert_eq!(reply.tool_uses()[0].1, "list-datasources");
        assert_eq!(reply.stop_reason, StopReason::ToolUse);
    }

    #[test]
    fn rate_limit_status_maps_to_rate_limit() {
        let err = decode_reply(StatusCode::TOO_MANY_REQUESTS, "slow down").expect_err("must fail");
        assert!(matches!(err, ModelError::RateLimit));
    }

    #[test]
    fn auth_statuses_map_to_auth() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = decode_reply(status, "denied").expect_err("must fail");
            assert!(matches!(err, ModelError::Auth(_)));
        }
    }

    #[test]
    fn server_error_body_is_truncated() {
        let body = "x".repeat(2_000);
        let err = decode_reply(StatusCode::INTERNAL_SERVER_ERROR, &body).expect_err("must fail");
        let ModelError::Api(msg) = err else {
            panic!("expected Api error");
        };
        assert!(msg.starts_with("HTTP 500"));
        assert!(msg.len() < 600);
    }

    #[test]
    fn garbage_body_is_invalid_response() {
        let err = decode_reply(StatusCode::OK, "<html>").expect_err("must fail");
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[test]
    fn block_missing_fields_is_invalid_response() {
        let body = r#"{"content":[{"type":"tool_use","id":"x"}],"stop_reason":"tool_use"}"#;
        let err = decode_reply(StatusCode::OK, body).expect_err("must fail");
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }
}
