use std::{sync::Arc, time::Duration};

use axum::{
    BoxError, Json, Router,
    extract::{Extension, State, rejection::JsonRejection},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::post,
};
use futures::StreamExt;
use shared::{
    config::Config,
    models::{ChatRequest, ErrorResponse, STREAM_DONE, StreamFrame},
};
use tracing::{debug, instrument};

use crate::{
    app_state::AppState,
    http::error::{ApiError, AppResult},
    services::chat_stream::{self, StreamSettings},
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(stream_chat))
}

fn frame_to_event(frame: StreamFrame) -> Result<Event, BoxError> {
    match frame {
        StreamFrame::Event(event) => Ok(Event::default().json_data(event)?),
        StreamFrame::Done => Ok(Event::default().data(STREAM_DONE)),
    }
}

fn keep_alive(config: &Config) -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(config.sse.keep_alive_seconds.max(1)))
        .text("keep-alive")
}

/// Streams a completion as server-sent events.
///
/// Emits `{"content": ...}` frames while the reply arrives, then one
/// `{"tokens": ...}` frame and a final `[DONE]`.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Completion stream", content_type = "text/event-stream", body = String),
        (status = 400, description = "Invalid chat request", body = ErrorResponse),
        (status = 500, description = "Provider missing or unreachable", body = ErrorResponse)
    ),
    tag = "Chat"
)]
#[instrument(name = "chat.stream", skip_all)]
pub async fn stream_chat(
    State(state): State<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload?;
    let settings = StreamSettings::from_config(&config);
    let prepared = chat_stream::prepare(request, &settings)
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    let provider = state.provider.clone().ok_or_else(|| {
        ApiError::internal_server_error("Language model provider is not configured")
    })?;

    debug!(
        provider = provider.provider_name(),
        model = %prepared.request.model,
        turns = prepared.request.messages.len(),
        "starting completion stream"
    );
    let upstream = provider.stream_chat(prepared.request).await?;

    let frames = chat_stream::spawn_relay(upstream, prepared.estimate, settings.channel_capacity);
    let events = frames.map(|item| item.map_err(BoxError::from).and_then(frame_to_event));

    Ok(Sse::new(events).keep_alive(keep_alive(&config)).into_response())
}
