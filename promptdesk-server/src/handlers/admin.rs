//! Admin analytics endpoints. Read-only apart from bulk message deletion.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    routing::{delete, get},
};
use chrono::Utc;
use shared::{
    config::Config,
    models::{
        AssistantDetailResponse, AssistantListResponse, ChatDetailResponse, ChatListResponse,
        ChatPageQuery, DeleteMessagesResponse, ErrorResponse, PageQuery, StatsResponse,
        UserDetailResponse, UserListResponse,
    },
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    http::error::{ApiError, AppResult},
    services::{
        analytics::{self, UsageSnapshot},
        chat_service::ChatService,
        message_service::MessageService,
    },
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/assistants", get(list_assistants))
        .route("/admin/assistants/{name}", get(assistant_detail))
        .route("/admin/users", get(list_users))
        .route("/admin/users/{fingerprint}", get(user_detail))
        .route("/admin/chats", get(list_chats))
        .route("/admin/chats/{chat_id}", get(chat_detail))
        .route("/admin/chats/{chat_id}/messages", delete(delete_chat_messages))
}

async fn snapshot(state: &AppState) -> AppResult<UsageSnapshot> {
    Ok(UsageSnapshot::load(state.store.as_ref()).await?)
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Usage overview", body = StatsResponse),
        (status = 401, description = "Missing or wrong admin token", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Admin"
)]
#[instrument(skip_all)]
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
) -> AppResult<Json<StatsResponse>> {
    let snapshot = snapshot(&state).await?;
    Ok(Json(snapshot.stats(
        &state.prices,
        Utc::now(),
        config.admin.top_conversations,
    )))
}

#[utoipa::path(
    get,
    path = "/api/admin/assistants",
    params(PageQuery),
    responses(
        (status = 200, description = "Usage grouped by assistant", body = AssistantListResponse),
        (status = 401, description = "Missing or wrong admin token", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Admin"
)]
#[instrument(skip_all)]
pub async fn list_assistants(
    State(state): State<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> AppResult<Json<AssistantListResponse>> {
    let Query(query) = query?;
    let snapshot = snapshot(&state).await?;
    Ok(Json(snapshot.assistant_list(
        &state.prices,
        &query,
        &config.admin,
    )))
}

#[utoipa::path(
    get,
    path = "/api/admin/assistants/{name}",
    params(("name" = String, Path, description = "Assistant name, matched ignoring case")),
    responses(
        (status = 200, description = "Assistant usage with per-user transcripts", body = AssistantDetailResponse),
        (status = 404, description = "No assistant with that name", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Admin"
)]
#[instrument(skip(state))]
pub async fn assistant_detail(
    State(state): State<Arc<AppState>>,
    name: Result<Path<String>, PathRejection>,
) -> AppResult<Json<AssistantDetailResponse>> {
    let Path(name) = name?;
    let snapshot = snapshot(&state).await?;
    snapshot
        .assistant_detail(&name, &state.prices)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Assistant not found"))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(PageQuery),
    responses(
        (status = 200, description = "Usage grouped by user fingerprint", body = UserListResponse),
        (status = 401, description = "Missing or wrong admin token", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Admin"
)]
#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> AppResult<Json<UserListResponse>> {
    let Query(query) = query?;
    let snapshot = snapshot(&state).await?;
    Ok(Json(snapshot.user_list(&state.prices, &query, &config.admin)))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{fingerprint}",
    params(("fingerprint" = String, Path, description = "User fingerprint")),
    responses(
        (status = 200, description = "User usage with per-assistant transcripts", body = UserDetailResponse),
        (status = 404, description = "User has no messages", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Admin"
)]
#[instrument(skip(state))]
pub async fn user_detail(
    State(state): State<Arc<AppState>>,
    fingerprint: Result<Path<String>, PathRejection>,
) -> AppResult<Json<UserDetailResponse>> {
    let Path(fingerprint) = fingerprint?;
    let snapshot = snapshot(&state).await?;
    snapshot
        .user_detail(&fingerprint, &state.prices)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

#[utoipa::path(
    get,
    path = "/api/admin/chats",
    params(ChatPageQuery),
    responses(
        (status = 200, description = "Chats with message counts", body = ChatListResponse),
        (status = 400, description = "Invalid sort parameters", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Admin"
)]
#[instrument(skip_all)]
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    query: Result<Query<ChatPageQuery>, QueryRejection>,
) -> AppResult<Json<ChatListResponse>> {
    let Query(query) = query?;
    let snapshot = snapshot(&state).await?;
    Ok(Json(snapshot.chat_list(&query, &config.admin)))
}

#[utoipa::path(
    get,
    path = "/api/admin/chats/{chat_id}",
    params(("chat_id" = Uuid, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Chat transcript and statistics", body = ChatDetailResponse),
        (status = 404, description = "Unknown chat", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Admin"
)]
#[instrument(skip(state))]
pub async fn chat_detail(
    State(state): State<Arc<AppState>>,
    chat_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ChatDetailResponse>> {
    let Path(chat_id) = chat_id?;
    let chat = ChatService::new(state.store.clone())
        .get_chat(chat_id)
        .await?;
    let assistant = match chat.assistant_id {
        Some(id) => state.store.get_assistant(id).await?,
        None => None,
    };
    let messages = state.store.list_messages(chat_id).await?;
    Ok(Json(analytics::chat_detail(
        chat,
        assistant,
        messages,
        &state.prices,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/admin/chats/{chat_id}/messages",
    params(("chat_id" = Uuid, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Messages deleted", body = DeleteMessagesResponse),
        (status = 404, description = "Unknown chat", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "Admin"
)]
#[instrument(skip(state))]
pub async fn delete_chat_messages(
    State(state): State<Arc<AppState>>,
    chat_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<DeleteMessagesResponse>> {
    let Path(chat_id) = chat_id?;
    let deleted = MessageService::new(state.store.clone())
        .delete_all(chat_id)
        .await?;
    info!(%chat_id, deleted, "chat messages deleted");
    Ok(Json(DeleteMessagesResponse {
        success: true,
        deleted,
    }))
}
