use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use hearth_types::api::{OpenChatRequest, SendChatMessageRequest};
use hearth_types::models::{Chat, ChatMessage, Session};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;
use crate::extract::ApiJson;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub limit: Option<u32>,
    /// `created_at` of the oldest message on the previous page.
    pub before: Option<DateTime<Utc>>,
}

/// POST /chats: the chat with `user_id`, opened on first use.
pub async fn open_chat(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<OpenChatRequest>,
) -> ApiResult<Json<Chat>> {
    let chat = blocking(&state, move |wf| wf.open_chat(&session, req.user_id)).await?;
    Ok(Json(chat))
}

pub async fn list_chats(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<Chat>>> {
    let chats = blocking(&state, move |wf| wf.list_chats(&session)).await?;
    Ok(Json(chats))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<SendChatMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = blocking(&state, move |wf| {
        wf.send_chat_message(&session, chat_id, &req.body)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(session): Extension<Session>,
    Query(query): Query<MessageQuery>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let messages = blocking(&state, move |wf| {
        wf.list_chat_messages(&session, chat_id, query.limit, query.before)
    })
    .await?;
    Ok(Json(messages))
}
