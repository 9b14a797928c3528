//! End-to-end tests for the `PromptDesk` HTTP API over the in-memory store.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::http::{StatusCode, header};
use axum_test::TestServer;
use futures::stream;
use serde_json::{Value, json};
use server::{
    app_state::AppState,
    server::{create_app_router, metrics_handle},
};
use shared::{
    config::{Config, Profile},
    llms::{
        CompletionChunk, CompletionRequest, CompletionStream, LLMError, LLMProvider, LLMResult,
        TokenUsage,
    },
};

/// Replays a fixed reply and counts how often it was asked.
#[derive(Default)]
struct ScriptedProvider {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn stream_chat(&self, _request: CompletionRequest) -> LLMResult<CompletionStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LLMError::Api {
                status: 503,
                message: "overloaded".to_string(),
            });
        }
        let chunks = vec![
            Ok(CompletionChunk::text("Hel")),
            Ok(CompletionChunk::text("lo")),
            Ok(CompletionChunk::usage(TokenUsage {
                prompt_tokens: 5,
                completion_tokens: 2,
                total_tokens: 7,
            })),
        ];
        Ok(Box::pin(stream::iter(chunks)))
    }
}

fn test_config() -> Config {
    Config::default_for_profile(Profile::Test)
}

fn server_with(config: Config, provider: Option<Arc<ScriptedProvider>>) -> TestServer {
    let mut state = AppState::default();
    if let Some(provider) = provider {
        state = state.with_provider(provider);
    }
    let app = create_app_router(Arc::new(state), Arc::new(config), metrics_handle());
    TestServer::new(app).unwrap()
}

async fn create_assistant(server: &TestServer, name: &str) -> String {
    let response = server
        .post("/api/assistants")
        .json(&json!({ "name": name, "systemPrompt": "Be brief." }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

async fn create_chat(server: &TestServer, fingerprint: &str, assistant_id: &str) -> String {
    let response = server
        .post("/api/conversations")
        .json(&json!({ "userFingerprint": fingerprint, "assistantId": assistant_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

async fn append(server: &TestServer, chat_id: &str, role: &str, content: &str, tokens: i64) {
    let response = server
        .post(&format!("/api/conversations/{chat_id}/messages"))
        .json(&json!({ "role": role, "content": content, "tokenCount": tokens }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
}

#[tokio::test]
async fn chat_streams_content_then_tokens_then_done() {
    let provider = Arc::new(ScriptedProvider::default());
    let server = server_with(test_config(), Some(provider.clone()));

    let response = server
        .post("/api/chat")
        .json(&json!({ "messages": [{ "role": "user", "content": "Hi" }] }))
        .await;

    response.assert_status_ok();
    assert!(
        response
            .header(header::CONTENT_TYPE)
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let body = response.text();
    let frames: Vec<&str> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect();
    assert_eq!(frames.len(), 4, "unexpected frames: {body}");
    assert_eq!(
        serde_json::from_str::<Value>(frames[0]).unwrap(),
        json!({ "content": "Hel" })
    );
    assert_eq!(
        serde_json::from_str::<Value>(frames[1]).unwrap(),
        json!({ "content": "lo" })
    );
    let tokens = serde_json::from_str::<Value>(frames[2]).unwrap();
    assert_eq!(tokens["tokens"]["assistant"], 2);
    assert_eq!(tokens["tokens"]["input"], 5);
    assert_eq!(tokens["tokens"]["total"], 7);
    assert_eq!(frames[3], "[DONE]");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn chat_rejects_requests_before_contacting_the_provider() {
    let provider = Arc::new(ScriptedProvider::default());
    let server = server_with(test_config(), Some(provider.clone()));

    let response = server.post("/api/chat").json(&json!({ "messages": [] })).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "No messages to process");

    let response = server
        .post("/api/chat")
        .json(&json!({ "messages": [{ "role": "assistant", "content": "Welcome!" }] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "At least one user message is required"
    );

    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chat_reports_provider_failure_as_server_error() {
    let provider = Arc::new(ScriptedProvider {
        fail: true,
        ..ScriptedProvider::default()
    });
    let server = server_with(test_config(), Some(provider));

    let response = server
        .post("/api/chat")
        .json(&json!({ "messages": [{ "role": "user", "content": "Hi" }] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>()["success"], false);
}

#[tokio::test]
async fn chat_without_provider_is_a_server_error() {
    let server = server_with(test_config(), None);

    let response = server
        .post("/api/chat")
        .json(&json!({ "messages": [{ "role": "user", "content": "Hi" }] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn identical_message_is_stored_once() {
    let server = server_with(test_config(), None);
    let assistant_id = create_assistant(&server, "Helper").await;
    let chat_id = create_chat(&server, "fp-1", &assistant_id).await;
    let path = format!("/api/conversations/{chat_id}/messages");
    let body = json!({ "role": "user", "content": "Hello", "tokenCount": 2 });

    let first = server.post(&path).json(&body).await;
    assert_eq!(first.status_code(), StatusCode::CREATED);
    let first = first.json::<Value>();
    assert_eq!(first["duplicate"], false);

    let second = server.post(&path).json(&body).await;
    assert_eq!(second.status_code(), StatusCode::OK);
    let second = second.json::<Value>();
    assert_eq!(second["duplicate"], true);
    assert_eq!(second["message"]["id"], first["message"]["id"]);

    let messages = server.get(&path).await.json::<Vec<Value>>();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn append_validates_role_and_chat() {
    let server = server_with(test_config(), None);
    let assistant_id = create_assistant(&server, "Helper").await;
    let chat_id = create_chat(&server, "fp-1", &assistant_id).await;

    let response = server
        .post(&format!("/api/conversations/{chat_id}/messages"))
        .json(&json!({ "role": "system", "content": "x" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "Role must be 'user' or 'assistant'"
    );

    let response = server
        .post("/api/conversations/00000000-0000-0000-0000-000000000000/messages")
        .json(&json!({ "role": "user", "content": "x" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_groups_usage_by_assistant_and_user() {
    let server = server_with(test_config(), None);
    let alpha = create_assistant(&server, "Alpha").await;
    let beta = create_assistant(&server, "Beta").await;

    let first = create_chat(&server, "fp-1", &alpha).await;
    append(&server, &first, "user", "Hi", 5).await;
    append(&server, &first, "assistant", "Hello there", 10).await;
    let second = create_chat(&server, "fp-2", &beta).await;
    append(&server, &second, "user", "Yo", 1).await;

    let response = server.get("/api/admin/assistants?search=alpha").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    let assistants = body["assistants"].as_array().unwrap();
    assert_eq!(assistants.len(), 1);
    assert_eq!(assistants[0]["assistantName"], "Alpha");
    assert_eq!(assistants[0]["totals"]["totalMessages"], 2);
    assert_eq!(assistants[0]["totals"]["totalTokens"], 15);
    assert_eq!(assistants[0]["userCount"], 1);

    let body = server
        .get("/api/admin/assistants?limit=1&page=2")
        .await
        .json::<Value>();
    assert_eq!(body["assistants"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["pagination"]["page"], 2);

    let body = server.get("/api/admin/users").await.json::<Value>();
    assert_eq!(body["users"].as_array().unwrap().len(), 2);

    let response = server.get("/api/admin/users/fp-unknown").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let stats = server.get("/api/admin/stats").await.json::<Value>();
    assert_eq!(stats["overview"]["totals"]["totalMessages"], 3);
    assert_eq!(stats["dailyStats"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn admin_can_clear_a_chat() {
    let server = server_with(test_config(), None);
    let assistant_id = create_assistant(&server, "Helper").await;
    let chat_id = create_chat(&server, "fp-1", &assistant_id).await;
    append(&server, &chat_id, "user", "one", 1).await;
    append(&server, &chat_id, "assistant", "two", 1).await;

    let response = server
        .delete(&format!("/api/admin/chats/{chat_id}/messages"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["deleted"], 2);

    let detail = server
        .get(&format!("/api/admin/chats/{chat_id}"))
        .await
        .json::<Value>();
    assert_eq!(detail["messages"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn admin_token_guards_admin_routes_only() {
    let mut config = test_config();
    config.admin.api_token = Some("s3cret".to_string());
    let server = server_with(config, None);

    let response = server.get("/api/admin/stats").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"], "Admin token required");

    let response = server
        .get("/api/admin/stats")
        .add_header(header::AUTHORIZATION, "Bearer wrong")
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/admin/stats")
        .add_header(header::AUTHORIZATION, "Bearer s3cret")
        .await;
    response.assert_status_ok();

    server.get("/api/assistants").await.assert_status_ok();
}

#[tokio::test]
async fn health_endpoints_report_memory_backend() {
    let server = server_with(test_config(), None);
    server.get("/healthz").await.assert_status_ok();
    server.get("/readyz").await.assert_status_ok();
}
