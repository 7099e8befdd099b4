use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use proto::ValidationError;
use tracing::debug;

use crate::dto::RejectionBody;

/// Errors a handler returns before doing any work.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(e) => {
                debug!(error = %e, "Rejecting request");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(RejectionBody {
                        message: e.to_string(),
                        success: false,
                    }),
                )
                    .into_response()
            }
        }
    }
}
