//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use parley_types::error::ChatError;

use crate::http::response::{ApiErrorDetail, ApiResponse};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Orchestrator errors.
    Chat(ChatError),
    /// Malformed request (path, query or body).
    Validation(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl AppError {
    /// Status code and error detail for the envelope.
    fn parts(&self) -> (StatusCode, ApiErrorDetail) {
        let detail = |code: &str, message: String| ApiErrorDetail {
            code: code.to_string(),
            message,
            details: None,
        };

        match self {
            AppError::Chat(ChatError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                detail("CHAT_NOT_FOUND", format!("Chat {id} not found")),
            ),
            AppError::Chat(ChatError::Validation(msg)) | AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, detail("VALIDATION_ERROR", msg.clone()))
            }
            AppError::Chat(e @ ChatError::CompletionUnavailable { .. }) => (
                StatusCode::BAD_GATEWAY,
                detail("COMPLETION_UNAVAILABLE", e.to_string()),
            ),
            AppError::Chat(e @ ChatError::EmptyCompletion { .. }) => (
                StatusCode::BAD_GATEWAY,
                detail("EMPTY_COMPLETION", e.to_string()),
            ),
            AppError::Chat(e @ ChatError::Store { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail("STORE_FAILURE", e.to_string()),
            ),
            AppError::Chat(e @ ChatError::Unanswered { user_message, .. }) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorDetail {
                    code: "UNANSWERED".to_string(),
                    message: e.to_string(),
                    details: Some(serde_json::json!({
                        "user_message": user_message,
                        "step": e.step(),
                        "retry": format!("/api/v1/chats/{}/retry", user_message.chat_id),
                    })),
                },
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = self.parts();

        if status.is_server_error() {
            tracing::error!(code = %detail.code, error = %detail.message, "Request failed");
        } else {
            tracing::debug!(code = %detail.code, error = %detail.message, "Request rejected");
        }

        let body = ApiResponse::error(detail, Uuid::now_v7().to_string());
        (status, Json(body)).into_response()
    }
}
