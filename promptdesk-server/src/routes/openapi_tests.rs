//! Tests for `OpenAPI` routes.

use crate::{
    app_state::AppState,
    routes::openapi::{OPENAPI_JSON_PATH, OPENAPI_YAML_PATH, openapi_routes},
};
use axum::http::StatusCode;
use axum_test::TestServer;
use futures_util::future;
use std::sync::Arc;

fn server() -> TestServer {
    let app = openapi_routes().with_state(Arc::new(AppState::default()));
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn yaml_document_is_served() {
    let server = server();
    let response = server.get(OPENAPI_YAML_PATH).await;
    response.assert_status_ok();

    let text = response.text();
    assert!(text.contains("openapi:"));
    assert!(text.contains("info:"));
    assert!(text.contains("paths:"));
    assert!(text.contains("PromptDesk API"));
}

#[tokio::test]
async fn json_document_lists_every_public_route() {
    let server = server();
    let response = server.get(OPENAPI_JSON_PATH).await;
    response.assert_status_ok();
    assert!(
        response
            .header("content-type")
            .to_str()
            .unwrap()
            .contains("application/json")
    );

    let json: serde_json::Value = serde_json::from_str(&response.text()).unwrap();
    let paths = json["paths"].as_object().unwrap();
    for path in [
        "/api/chat",
        "/api/assistants",
        "/api/assistants/{assistant_id}",
        "/api/conversations",
        "/api/conversations/{chat_id}/messages",
        "/api/conversations/{chat_id}/welcome",
        "/api/conversations/{chat_id}/messages/{message_id}/usage",
        "/api/admin/stats",
        "/api/admin/assistants",
        "/api/admin/assistants/{name}",
        "/api/admin/users",
        "/api/admin/users/{fingerprint}",
        "/api/admin/chats",
        "/api/admin/chats/{chat_id}",
        "/api/admin/chats/{chat_id}/messages",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }

    assert!(json["components"]["securitySchemes"]["admin_token"].is_object());
}

#[tokio::test]
async fn swagger_ui_is_served() {
    let server = server();
    let response = server.get("/swagger-ui/").await;
    response.assert_status_ok();
    assert!(
        response
            .header("content-type")
            .to_str()
            .unwrap()
            .contains("text/html")
    );
}

#[tokio::test]
async fn unknown_documents_and_methods_are_rejected() {
    let server = server();
    server
        .get("/openapi/nonexistent.yaml")
        .await
        .assert_status_not_found();
    server
        .post(OPENAPI_YAML_PATH)
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn concurrent_requests_are_served() {
    let server = Arc::new(server());
    let requests = (0..5).map(|_| async {
        let response = server.get(OPENAPI_YAML_PATH).await;
        response.assert_status_ok();
    });
    future::join_all(requests).await;
}
