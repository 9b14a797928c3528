use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    routing::get,
};
use shared::{
    config::Config,
    models::{Assistant, CreateAssistantRequest, CreateAssistantResponse, ErrorResponse},
};
use tracing::instrument;
use uuid::Uuid;

use crate::{app_state::AppState, http::error::AppResult, services::chat_service::ChatService};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assistants", get(list_assistants).post(create_assistant))
        .route("/assistants/{assistant_id}", get(get_assistant))
}

#[utoipa::path(
    post,
    path = "/api/assistants",
    request_body = CreateAssistantRequest,
    responses(
        (status = 201, description = "Assistant created", body = CreateAssistantResponse),
        (status = 400, description = "Invalid assistant definition", body = ErrorResponse)
    ),
    tag = "Assistants"
)]
#[instrument(skip_all)]
pub async fn create_assistant(
    State(state): State<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    payload: Result<Json<CreateAssistantRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<CreateAssistantResponse>)> {
    let Json(request) = payload?;
    let service = ChatService::new(state.store.clone());
    let assistant = service
        .create_assistant(request, &config.llm.default_model)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateAssistantResponse { id: assistant.id }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/assistants",
    responses((status = 200, description = "All assistants ordered by name", body = [Assistant])),
    tag = "Assistants"
)]
pub async fn list_assistants(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Assistant>>> {
    let service = ChatService::new(state.store.clone());
    Ok(Json(service.list_assistants().await?))
}

#[utoipa::path(
    get,
    path = "/api/assistants/{assistant_id}",
    params(("assistant_id" = Uuid, Path, description = "Assistant id")),
    responses(
        (status = 200, description = "Assistant", body = Assistant),
        (status = 404, description = "Unknown assistant", body = ErrorResponse)
    ),
    tag = "Assistants"
)]
#[instrument(skip(state))]
pub async fn get_assistant(
    State(state): State<Arc<AppState>>,
    assistant_id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<Assistant>> {
    let Path(assistant_id) = assistant_id?;
    let service = ChatService::new(state.store.clone());
    Ok(Json(service.get_assistant(assistant_id).await?))
}
