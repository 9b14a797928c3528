use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, patch, post},
};
use shared::models::{
    AppendMessageRequest, AppendMessageResponse, Chat, ChatListQuery, CreateChatRequest,
    ErrorResponse, Message, UsageCorrectionRequest, WelcomeMessageRequest,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    http::error::AppResult,
    services::{chat_service::ChatService, message_service::MessageService, store::AppendOutcome},
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route("/conversations/{chat_id}", get(get_conversation))
        .route(
            "/conversations/{chat_id}/messages",
            get(list_messages).post(append_message),
        )
        .route("/conversations/{chat_id}/welcome", post(append_welcome))
        .route(
            "/conversations/{chat_id}/messages/{message_id}/usage",
            patch(correct_usage),
        )
}

fn append_response(outcome: AppendOutcome) -> (StatusCode, Json<AppendMessageResponse>) {
    let status = if outcome.is_duplicate() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let duplicate = outcome.is_duplicate();
    (
        status,
        Json(AppendMessageResponse {
            success: true,
            duplicate,
            message: outcome.into_message(),
        }),
    )
}

#[utoipa::path(
    post,
    path = "/api/conversations",
    request_body = CreateChatRequest,
    responses(
        (status = 201, description = "Chat created", body = Chat),
        (status = 400, description = "Missing user fingerprint", body = ErrorResponse),
        (status = 404, description = "Unknown assistant", body = ErrorResponse)
    ),
    tag = "Conversations"
)]
#[instrument(skip_all)]
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateChatRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Chat>)> {
    let Json(request) = payload?;
    let chat = ChatService::new(state.store.clone())
        .create_chat(request)
        .await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

#[utoipa::path(
    get,
    path = "/api/conversations",
    params(ChatListQuery),
    responses(
        (status = 200, description = "Chats of one user, most recently updated first", body = [Chat]),
        (status = 400, description = "Missing user fingerprint", body = ErrorResponse)
    ),
    tag = "Conversations"
)]
#[instrument(skip_all)]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ChatListQuery>, QueryRejection>,
) -> AppResult<Json<Vec<Chat>>> {
    let Query(query) = query?;
    let chats = ChatService::new(state.store.clone())
        .list_chats_for_user(query.user_fingerprint)
        .await?;
    Ok(Json(chats))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{chat_id}",
    params(("chat_id" = Uuid, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Chat", body = Chat),
        (status = 404, description = "Unknown chat", body = ErrorResponse)
    ),
    tag = "Conversations"
)]
#[instrument(skip(state))]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    chat_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<Chat>> {
    let Path(chat_id) = chat_id?;
    let chat = ChatService::new(state.store.clone())
        .get_chat(chat_id)
        .await?;
    Ok(Json(chat))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{chat_id}/messages",
    params(("chat_id" = Uuid, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Messages, oldest first", body = [Message]),
        (status = 404, description = "Unknown chat", body = ErrorResponse)
    ),
    tag = "Conversations"
)]
#[instrument(skip(state))]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    chat_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<Vec<Message>>> {
    let Path(chat_id) = chat_id?;
    let messages = MessageService::new(state.store.clone())
        .list(chat_id)
        .await?;
    Ok(Json(messages))
}

/// Appends a message. Re-sending an identical message returns the stored one
/// with `duplicate: true` and status 200.
#[utoipa::path(
    post,
    path = "/api/conversations/{chat_id}/messages",
    params(("chat_id" = Uuid, Path, description = "Chat id")),
    request_body = AppendMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = AppendMessageResponse),
        (status = 200, description = "Identical message already stored", body = AppendMessageResponse),
        (status = 400, description = "Invalid message", body = ErrorResponse),
        (status = 404, description = "Unknown chat", body = ErrorResponse)
    ),
    tag = "Conversations"
)]
#[instrument(skip(state, payload))]
pub async fn append_message(
    State(state): State<Arc<AppState>>,
    chat_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AppendMessageRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AppendMessageResponse>)> {
    let Path(chat_id) = chat_id?;
    let Json(request) = payload?;
    let outcome = MessageService::new(state.store.clone())
        .append(chat_id, request)
        .await?;
    Ok(append_response(outcome))
}

#[utoipa::path(
    post,
    path = "/api/conversations/{chat_id}/welcome",
    params(("chat_id" = Uuid, Path, description = "Chat id")),
    request_body = WelcomeMessageRequest,
    responses(
        (status = 201, description = "Welcome message stored", body = AppendMessageResponse),
        (status = 200, description = "Welcome message already present", body = AppendMessageResponse),
        (status = 400, description = "Empty welcome message", body = ErrorResponse),
        (status = 404, description = "Unknown chat", body = ErrorResponse)
    ),
    tag = "Conversations"
)]
#[instrument(skip(state, payload))]
pub async fn append_welcome(
    State(state): State<Arc<AppState>>,
    chat_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<WelcomeMessageRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AppendMessageResponse>)> {
    let Path(chat_id) = chat_id?;
    let Json(request) = payload?;
    let outcome = MessageService::new(state.store.clone())
        .append_welcome(chat_id, request)
        .await?;
    Ok(append_response(outcome))
}

#[utoipa::path(
    patch,
    path = "/api/conversations/{chat_id}/messages/{message_id}/usage",
    params(
        ("chat_id" = Uuid, Path, description = "Chat id"),
        ("message_id" = Uuid, Path, description = "Message id")
    ),
    request_body = UsageCorrectionRequest,
    responses(
        (status = 200, description = "Updated message", body = Message),
        (status = 400, description = "Invalid token figures", body = ErrorResponse),
        (status = 404, description = "Unknown message", body = ErrorResponse)
    ),
    tag = "Conversations"
)]
#[instrument(skip(state, payload))]
pub async fn correct_usage(
    State(state): State<Arc<AppState>>,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
    payload: Result<Json<UsageCorrectionRequest>, JsonRejection>,
) -> AppResult<Json<Message>> {
    let Path((chat_id, message_id)) = ids?;
    let Json(request) = payload?;
    let message = MessageService::new(state.store.clone())
        .correct_usage(chat_id, message_id, request)
        .await?;
    Ok(Json(message))
}
