use std::sync::Arc;

use agent::{MessageRequest, prompts};
use axum::Json;
use axum::extract::State;
use proto::{Message, ModelError};
use serde_json::{Value, json};
use tracing::{Instrument, error, info, info_span, warn};

use crate::dto::{
    ChatRequest, ChatResponse, CreateReportRequest, CreateReportResponse, ValidateModelRequest,
    ValidationResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

/// Returned in `code` when HTML generation fails.
pub const REPORT_FAILURE_CODE: &str = "// エラーが発生しました";

pub async fn root() -> Json<Value> {
    Json(json!({"message": "lumen API is running"}))
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    req.validate()?;

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("chat", %request_id, history = req.messages.len());
    async move {
        if let Some(bridge) = &state.reconnect
            && let Err(e) = bridge.ensure_connected().await
        {
            warn!(error = %e, "Tool bridge reconnect failed, continuing without tools");
        }

        let (message, success) = match state.runtime.process(req.messages).await {
            Ok(result) => {
                info!(
                    mode = ?result.mode,
                    iterations = result.iterations,
                    model_calls = result.model_calls,
                    tool_calls = result.tool_calls,
                    "Chat completed"
                );
                (result.text, true)
            }
            Err(e) => {
                error!(error = %e, "Chat failed");
                (prompts::create_error_message("チャット処理"), false)
            }
        };

        Ok(Json(ChatResponse {
            message,
            timestamp: req.timestamp,
            success,
        }))
    }
    .instrument(span)
    .await
}

pub async fn create_report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReportRequest>,
) -> Result<Json<CreateReportResponse>, ApiError> {
    req.validate()?;
    let result = state.dashboard.generate_dashboard(&req.content).await;
    Ok(Json(report_response("dashboard", result, req.timestamp)))
}

pub async fn create_chart(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReportRequest>,
) -> Result<Json<CreateReportResponse>, ApiError> {
    req.validate()?;
    let result = state.dashboard.generate_chart(&req.content).await;
    Ok(Json(report_response("chart", result, req.timestamp)))
}

fn report_response(
    kind: &'static str,
    result: Result<String, ModelError>,
    timestamp: String,
) -> CreateReportResponse {
    match result {
        Ok(code) => CreateReportResponse {
            code,
            timestamp,
            success: true,
        },
        Err(e) => {
            error!(kind, error = %e, "HTML generation failed");
            CreateReportResponse {
                code: REPORT_FAILURE_CODE.to_string(),
                timestamp,
                success: false,
            }
        }
    }
}

pub async fn validate_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateModelRequest>,
) -> Result<Json<ValidationResponse>, ApiError> {
    req.validate()?;
    info!(region = %req.region, model_id = %req.model_id, "Validating model settings");

    let gateway = (state.gateway_factory)(&req);
    let hello = MessageRequest::new(vec![Message::user("Hello")]);
    let response = match gateway.create_message(hello).await {
        Ok(_) => {
            info!("Model settings validation succeeded");
            ValidationResponse {
                valid: true,
                message: "接続に成功しました".to_string(),
            }
        }
        Err(e) => {
            warn!(error = %e, "Model settings validation failed");
            ValidationResponse {
                valid: false,
                message: format!("接続に失敗しました: {}", failure_reason(&e)),
            }
        }
    };
    Ok(Json(response))
}

/// Short reason shown to the user; provider bodies are only logged.
fn failure_reason(e: &ModelError) -> &'static str {
    match e {
        ModelError::Auth(_) => "認証情報が無効です",
        ModelError::RateLimit => "リクエストが制限されています",
        ModelError::Transport(_) => "エンドポイントに接続できません",
        ModelError::Api(_) => "モデルがリクエストを拒否しました",
        ModelError::InvalidResponse(_) | ModelError::Serialization(_) => {
            "応答を解釈できませんでした"
        }
    }
}
