//! Chat HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/chats                - Start a chat from a first message
//! - GET  /api/v1/chats                - List chats, newest first
//! - GET  /api/v1/chats/{id}           - Get a chat and its transcript
//! - POST /api/v1/chats/{id}/messages  - Send a message and get the reply
//! - POST /api/v1/chats/{id}/retry     - Answer the last unanswered message

use std::time::Instant;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parley_types::chat::{Chat, ChatMessage};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Body of `POST /chats` and `POST /chats/{id}/messages`.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
}

/// Query parameters for chat listing.
#[derive(Debug, Deserialize)]
pub struct ChatListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Chat metadata as returned by the list endpoint.
#[derive(Debug, Serialize)]
pub struct ChatSummary {
    pub id: Uuid,
    pub title: Option<String>,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl From<Chat> for ChatSummary {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            title: chat.title,
            model: chat.model,
            created_at: chat.created_at,
        }
    }
}

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid chat id: {s}")))
}

fn message_body(body: Result<Json<MessageRequest>, JsonRejection>) -> Result<String, AppError> {
    body.map(|Json(req)| req.content)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// POST /api/v1/chats - Start a new chat.
pub async fn create_chat(
    State(state): State<AppState>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Chat>>), AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let content = message_body(body)?;

    let chat = state.orchestrator.start_new_chat(&content).await?;

    let self_link = format!("/api/v1/chats/{}", chat.id);
    let messages_link = format!("{self_link}/messages");
    let resp = ApiResponse::success(chat, request_id, elapsed_ms(start))
        .with_link("self", &self_link)
        .with_link("messages", &messages_link);

    Ok((StatusCode::CREATED, Json(resp)))
}

/// GET /api/v1/chats - List chats, newest first.
pub async fn list_chats(
    State(state): State<AppState>,
    query: Result<Query<ChatListQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ChatSummary>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let Query(query) = query.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let chats = state
        .orchestrator
        .list_chats(query.limit, query.offset)
        .await?;
    let page_full = chats.len() as i64 == query.limit;
    let summaries: Vec<ChatSummary> = chats.into_iter().map(ChatSummary::from).collect();

    let mut resp = ApiResponse::success(summaries, request_id, elapsed_ms(start)).with_link(
        "self",
        &format!("/api/v1/chats?limit={}&offset={}", query.limit, query.offset),
    );
    if page_full {
        resp = resp.with_link(
            "next",
            &format!(
                "/api/v1/chats?limit={}&offset={}",
                query.limit,
                query.offset + query.limit
            ),
        );
    }

    Ok(Json(resp))
}

/// GET /api/v1/chats/{id} - Get a chat with its ordered transcript.
pub async fn get_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<ApiResponse<Chat>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_uuid(&chat_id)?;

    let chat = state.orchestrator.load_chat(id).await?;

    let resp = ApiResponse::success(chat, request_id, elapsed_ms(start))
        .with_link("self", &format!("/api/v1/chats/{id}"))
        .with_link("messages", &format!("/api/v1/chats/{id}/messages"));

    Ok(Json(resp))
}

/// POST /api/v1/chats/{id}/messages - Send a message, returns the reply.
pub async fn send_message(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<ChatMessage>>), AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_uuid(&chat_id)?;
    let content = message_body(body)?;

    let reply = state.orchestrator.continue_chat(id, &content).await?;

    let resp = ApiResponse::success(reply, request_id, elapsed_ms(start))
        .with_link("chat", &format!("/api/v1/chats/{id}"));

    Ok((StatusCode::CREATED, Json(resp)))
}

/// POST /api/v1/chats/{id}/retry - Answer the last unanswered user message.
pub async fn retry_reply(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<ChatMessage>>), AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_uuid(&chat_id)?;

    let reply = state.orchestrator.retry_reply(id).await?;

    let resp = ApiResponse::success(reply, request_id, elapsed_ms(start))
        .with_link("chat", &format!("/api/v1/chats/{id}"));

    Ok((StatusCode::CREATED, Json(resp)))
}
