use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agent::{ConversationRuntime, DashboardService, MessageRequest, ModelGateway};
use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use markup::SizeLimits;
use proto::{ContentBlock, ModelError, ModelReply};
use serde_json::{Value, json};
use server::dto::ValidateModelRequest;
use server::{AppState, GatewayFactory, router};
use tower::ServiceExt;

struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
}

impl ScriptedGateway {
    fn new(replies: Vec<Result<String, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from(replies)),
        })
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn create_message(&self, _req: MessageRequest) -> Result<ModelReply, ModelError> {
        let next = self
            .replies
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::InvalidResponse("exhausted".into())));
        next.map(|text| ModelReply {
            content: vec![ContentBlock::text(text)],
            ..ModelReply::default()
        })
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

fn app(replies: Vec<Result<String, ModelError>>) -> axum::Router {
    let gateway = ScriptedGateway::new(replies);
    let runtime = ConversationRuntime::new(gateway.clone(), None, 20);
    let dashboard = DashboardService::new(gateway.clone(), SizeLimits::default());
    let factory: GatewayFactory = Arc::new(move |_req: &ValidateModelRequest| {
        gateway.clone() as Arc<dyn ModelGateway>
    });
    let state = AppState::new(runtime, dashboard).with_gateway_factory(factory);
    router(Arc::new(state), "*")
}

async fn post(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_and_root_respond() {
    let response = app(Vec::new())
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), 1024).await.expect("body");
    assert_eq!(&bytes[..], b"ok");

    let response = app(Vec::new())
        .oneshot(Request::get("/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let bytes = to_bytes(response.into_body(), 1024).await.expect("body");
    let value: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(value["message"], "lumen API is running");
}

#[tokio::test]
async fn chat_returns_model_text_and_echoes_timestamp() {
    let (status, body) = post(
        app(vec![Ok("こんにちは".into())]),
        "/api/chat",
        json!({"messages": [{"role": "user", "content": "hi"}], "timestamp": "t-1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "こんにちは");
    assert_eq!(body["timestamp"], "t-1");
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn chat_model_failure_returns_generic_message() {
    let (status, body) = post(
        app(vec![Err(ModelError::Api("HTTP 500: secret detail".into()))]),
        "/api/chat",
        json!({"messages": [{"role": "user", "content": "hi"}], "timestamp": "t-2"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    let message = body["message"].as_str().expect("message");
    assert!(message.contains("チャット処理中にエラーが発生しています"));
    assert!(!message.contains("secret detail"));
}

#[tokio::test]
async fn chat_validation_failures_are_422() {
    for payload in [
        json!({"messages": [], "timestamp": "t"}),
        json!({"messages": [{"role": "user", "content": ""}], "timestamp": "t"}),
        json!({"messages": [{"role": "user", "content": "a"}, {"role": "assistant", "content": "b"}]}),
    ] {
        let (status, body) = post(app(Vec::new()), "/api/chat", payload).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }
}

#[tokio::test]
async fn unknown_role_is_rejected_by_extractor() {
    let (status, _) = post(
        app(Vec::new()),
        "/api/chat",
        json!({"messages": [{"role": "system", "content": "x"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn create_report_returns_sanitized_html() {
    let html = r#"<!DOCTYPE html><html><body><canvas width="1200" height="900"></canvas></body></html>"#;
    let (status, body) = post(
        app(vec![Ok(html.into())]),
        "/api/create_report",
        json!({"content": "売上分析", "timestamp": "t-3"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let code = body["code"].as_str().expect("code");
    assert!(code.contains(r#"width="600""#));
    assert!(code.contains(r#"height="400""#));
}

#[tokio::test]
async fn create_chart_failure_uses_failure_code() {
    let (status, body) = post(
        app(vec![Err(ModelError::RateLimit)]),
        "/api/create_chart",
        json!({"content": "売上分析", "timestamp": "t-4"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "// エラーが発生しました");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn create_report_rejects_blank_content() {
    let (status, _) = post(
        app(Vec::new()),
        "/api/create_report",
        json!({"content": "   ", "timestamp": "t"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn validate_model_reports_success_and_failure() {
    let request = json!({
        "region": "ap-northeast-1",
        "bearer_token": "tok",
        "model_id": "apac.anthropic.claude-sonnet-4-20250514-v1:0",
        "max_tokens": 100
    });

    let (_, ok) = post(app(vec![Ok("Hi".into())]), "/api/settings/model/validate", request.clone()).await;
    assert_eq!(ok["valid"], true);

    let (_, failed) = post(
        app(vec![Err(ModelError::Auth("HTTP 403: raw provider body".into()))]),
        "/api/settings/model/validate",
        request,
    )
    .await;
    assert_eq!(failed["valid"], false);
    let message = failed["message"].as_str().expect("message");
    assert!(message.starts_with("接続に失敗しました"));
    assert!(!message.contains("raw provider body"));
}

#[tokio::test]
async fn validate_model_rejects_zero_max_tokens() {
    let (status, _) = post(
        app(Vec::new()),
        "/api/settings/model/validate",
        json!({"region": "us-east-1", "model_id": "m", "max_tokens": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[test]
fn cors_accepts_wildcard_and_lists() {
    let _ = server::build_cors("*");
    let _ = server::build_cors("http://localhost:3000, https://app.example.com");
}
