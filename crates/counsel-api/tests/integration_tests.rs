//! Integration tests for the Counsel API.
//!
//! Drives the full axum router with an in-memory database, an in-process
//! cache, and a scripted AI backend double. Covers happy paths, error
//! paths, authentication, ownership isolation, caching, and sharing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use counsel_api::{create_router, AppState};
use counsel_backend::{AiBackend, BackendError};
use counsel_cache::MemoryCache;
use counsel_core::config::CounselConfig;
use counsel_storage::Database;

// =============================================================================
// Scripted backend double
// =============================================================================

/// Backend double with one fixed reply per operation and a call counter.
struct ScriptedBackend {
    chat_reply: Value,
    agent_reply: Value,
    upload_reply: Value,
    translate_reply: Value,
    detect_reply: Value,
    docgen_reply: Value,
    timeout: bool,
    calls: AtomicUsize,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            chat_reply: json!({ "response": "A contract requires offer and acceptance." }),
            agent_reply: json!({ "response": "Agent reply.", "session_id": "sess-1" }),
            upload_reply: json!({
                "document_id": "doc-1",
                "agent_response": "Document received.",
                "session_id": "sess-1",
            }),
            translate_reply: json!({ "translated_text": "anuvaad" }),
            detect_reply: json!({ "language": "en", "confidence": 0.99 }),
            docgen_reply: json!({ "document_content": "DRAFT AGREEMENT" }),
            timeout: false,
            calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedBackend {
    fn reply(&self, value: &Value) -> Result<Value, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.timeout {
            return Err(BackendError::Timeout);
        }
        Ok(value.clone())
    }
}

#[async_trait]
impl AiBackend for ScriptedBackend {
    async fn chat(&self, _prompt: &str) -> Result<Value, BackendError> {
        self.reply(&self.chat_reply)
    }
    async fn agent_chat(
        &self,
        _message: &str,
        _session_id: Option<&str>,
        _document_id: Option<&str>,
    ) -> Result<Value, BackendError> {
        self.reply(&self.agent_reply)
    }
    async fn upload_and_chat(
        &self,
        _file: Vec<u8>,
        _file_name: &str,
        _message: &str,
        _session_id: Option<&str>,
        _input_language: Option<&str>,
        _output_language: Option<&str>,
    ) -> Result<Value, BackendError> {
        self.reply(&self.upload_reply)
    }
    async fn translate(
        &self,
        _text: &str,
        _source_lang: &str,
        _target_lang: &str,
    ) -> Result<Value, BackendError> {
        self.reply(&self.translate_reply)
    }
    async fn detect_language(&self, _text: &str) -> Result<Value, BackendError> {
        self.reply(&self.detect_reply)
    }
    async fn generate_document(
        &self,
        _template_name: &str,
        _data: Value,
    ) -> Result<Value, BackendError> {
        self.reply(&self.docgen_reply)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn make_state(backend: Arc<ScriptedBackend>) -> AppState {
    let mut config = CounselConfig::default();
    config.auth.bcrypt_cost = 4; // minimum cost, keeps tests fast
    AppState::new(
        config,
        Database::in_memory().unwrap(),
        backend,
        Arc::new(MemoryCache::new()),
    )
}

fn make_app() -> (axum::Router, Arc<ScriptedBackend>) {
    let backend = Arc::new(ScriptedBackend::default());
    (create_router(make_state(Arc::clone(&backend))), backend)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(req: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
    req.header("authorization", format!("Bearer {}", token))
}

fn authed_get(uri: &str, token: &str) -> Request<Body> {
    authed(Request::get(uri), token).body(Body::empty()).unwrap()
}

fn authed_post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    authed(Request::post(uri), token)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_put_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    authed(Request::builder().method("PUT").uri(uri), token)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_delete(uri: &str, token: &str) -> Request<Body> {
    authed(Request::builder().method("DELETE").uri(uri), token)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register a user through the API and return their access token.
async fn register(app: &axum::Router, email: &str) -> String {
    let resp = app
        .clone()
        .oneshot(post_json(
            "/auth/register",
            json!({ "email": email, "password": "pw-123456", "name": "Test" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    body["accessToken"].as_str().unwrap().to_string()
}

/// Create a conversation and return its id.
async fn create_conversation(app: &axum::Router, token: &str, mode: &str) -> String {
    let resp = app
        .clone()
        .oneshot(authed_post_json(
            "/conversations",
            token,
            json!({ "mode": mode }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    body["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (app, _) = make_app();
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_protected_routes_require_bearer() {
    let (app, _) = make_app();
    for uri in ["/conversations", "/translations", "/documents", "/users/me"] {
        let resp = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "for {}", uri);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_invalid_bearer_rejected() {
    let (app, _) = make_app();
    let resp = app
        .oneshot(authed_get("/conversations", "not-a-real-token"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Auth flows
// =============================================================================

#[tokio::test]
async fn test_register_login_and_me() {
    let (app, _) = make_app();
    register(&app, "ada@example.com").await;

    let resp = app
        .clone()
        .oneshot(post_json(
            "/auth/login",
            json!({ "email": "ada@example.com", "password": "pw-123456" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let token = body["accessToken"].as_str().unwrap();
    assert!(body.get("user").is_some());
    // Password material never leaves the server.
    assert!(body["user"].get("passwordHash").is_none());

    let resp = app.oneshot(authed_get("/users/me", token)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let me = body_json(resp).await;
    assert_eq!(me["email"], "ada@example.com");
}

#[tokio::test]
async fn test_duplicate_registration_is_bad_request() {
    let (app, _) = make_app();
    register(&app, "dup@example.com").await;
    let resp = app
        .oneshot(post_json(
            "/auth/register",
            json!({ "email": "dup@example.com", "password": "pw-123456", "name": "B" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let (app, _) = make_app();
    register(&app, "l@example.com").await;
    let resp = app
        .oneshot(post_json(
            "/auth/login",
            json!({ "email": "l@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rotation() {
    let (app, _) = make_app();
    let resp = app
        .clone()
        .oneshot(post_json(
            "/auth/register",
            json!({ "email": "r@example.com", "password": "pw-123456", "name": "R" }),
        ))
        .await
        .unwrap();
    let session = body_json(resp).await;
    let refresh_token = session["refreshToken"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(post_json("/auth/refresh", json!({ "refreshToken": refresh_token })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let rotated = body_json(resp).await;
    assert!(rotated["accessToken"].is_string());

    // The old refresh token was rotated out.
    let resp = app
        .oneshot(post_json("/auth/refresh", json!({ "refreshToken": refresh_token })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Conversations
// =============================================================================

#[tokio::test]
async fn test_create_list_info_round_trip() {
    let (app, _) = make_app();
    let token = register(&app, "c@example.com").await;

    let resp = app
        .clone()
        .oneshot(authed_post_json(
            "/conversations",
            &token,
            json!({
                "mode": "AGENTIC",
                "title": "Lease review",
                "documentId": "doc-9",
                "documentName": "lease.pdf",
                "sessionId": "sess-9",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    let id = created["id"].as_str().unwrap();

    let resp = app
        .clone()
        .oneshot(authed_get(&format!("/conversations/{}/info", id), &token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let info = body_json(resp).await;
    assert_eq!(info["title"], "Lease review");
    assert_eq!(info["mode"], "AGENTIC");
    assert_eq!(info["documentId"], "doc-9");
    assert_eq!(info["sessionId"], "sess-9");

    let resp = app
        .oneshot(authed_get("/conversations", &token))
        .await
        .unwrap();
    let listed = body_json(resp).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_conversation_requires_valid_mode() {
    let (app, _) = make_app();
    let token = register(&app, "m@example.com").await;

    for body in [json!({}), json!({ "mode": "TURBO" })] {
        let resp = app
            .clone()
            .oneshot(authed_post_json("/conversations", &token, body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err = body_json(resp).await;
        assert_eq!(err["error"], "bad_request");
    }
}

#[tokio::test]
async fn test_send_message_normal_mode() {
    let (app, backend) = make_app();
    let token = register(&app, "s@example.com").await;
    let id = create_conversation(&app, &token, "NORMAL").await;

    let resp = app
        .clone()
        .oneshot(authed_post_json(
            &format!("/conversations/{}/messages", id),
            &token,
            json!({ "message": "What makes a contract?", "mode": "NORMAL" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let outcome = body_json(resp).await;
    assert_eq!(
        outcome["message"]["content"],
        "A contract requires offer and acceptance."
    );
    assert_eq!(outcome["message"]["role"], "ASSISTANT");
    assert!(outcome["conversation"]["sessionId"].is_null());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    // History holds the user and assistant messages in order.
    let resp = app
        .oneshot(authed_get(&format!("/conversations/{}", id), &token))
        .await
        .unwrap();
    let history = body_json(resp).await;
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "USER");
    assert_eq!(messages[0]["content"], "What makes a contract?");
    assert_eq!(messages[1]["role"], "ASSISTANT");
}

#[tokio::test]
async fn test_repeated_message_served_from_cache() {
    let (app, backend) = make_app();
    let token = register(&app, "cache@example.com").await;
    let id = create_conversation(&app, &token, "NORMAL").await;

    for _ in 0..2 {
        let resp = app
            .clone()
            .oneshot(authed_post_json(
                &format!("/conversations/{}/messages", id),
                &token,
                json!({ "message": "Same question", "mode": "NORMAL" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    // One live call; the repeat was served from the cache and marked so.
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    let resp = app
        .oneshot(authed_get(&format!("/conversations/{}", id), &token))
        .await
        .unwrap();
    let history = body_json(resp).await;
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[3]["metadata"]["cached"], true);
}

#[tokio::test]
async fn test_send_message_missing_fields() {
    let (app, _) = make_app();
    let token = register(&app, "v@example.com").await;
    let id = create_conversation(&app, &token, "NORMAL").await;

    for body in [
        json!({ "mode": "NORMAL" }),
        json!({ "message": "hi" }),
        json!({ "message": "hi", "mode": "NEITHER" }),
    ] {
        let resp = app
            .clone()
            .oneshot(authed_post_json(
                &format!("/conversations/{}/messages", id),
                &token,
                body,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_upstream_timeout_surfaces_as_504() {
    let backend = Arc::new(ScriptedBackend {
        timeout: true,
        ..ScriptedBackend::default()
    });
    let app = create_router(make_state(Arc::clone(&backend)));

    let token = register(&app, "t@example.com").await;
    let id = create_conversation(&app, &token, "NORMAL").await;

    let resp = app
        .oneshot(authed_post_json(
            &format!("/conversations/{}/messages", id),
            &token,
            json!({ "message": "hello?", "mode": "NORMAL" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "upstream_timeout");
    assert!(body["message"].as_str().unwrap().contains("waking up"));
}

#[tokio::test]
async fn test_cross_user_isolation() {
    let (app, _) = make_app();
    let owner = register(&app, "owner@example.com").await;
    let other = register(&app, "other@example.com").await;
    let id = create_conversation(&app, &owner, "NORMAL").await;

    for req in [
        authed_get(&format!("/conversations/{}", id), &other),
        authed_get(&format!("/conversations/{}/info", id), &other),
        authed_delete(&format!("/conversations/{}", id), &other),
    ] {
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "not_found");
    }

    // The owner still sees it.
    let resp = app
        .oneshot(authed_get(&format!("/conversations/{}", id), &owner))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_delete_all_conversations() {
    let (app, _) = make_app();
    let token = register(&app, "da@example.com").await;
    create_conversation(&app, &token, "NORMAL").await;
    create_conversation(&app, &token, "AGENTIC").await;

    let resp = app
        .clone()
        .oneshot(authed_delete("/conversations", &token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["deletedCount"], 2);

    let resp = app
        .oneshot(authed_get("/conversations", &token))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 0);
}

// =============================================================================
// Sharing
// =============================================================================

#[tokio::test]
async fn test_share_enable_resolve_disable() {
    let (app, _) = make_app();
    let token = register(&app, "sh@example.com").await;
    let id = create_conversation(&app, &token, "NORMAL").await;

    // Put a turn into the conversation so the public view has content.
    app.clone()
        .oneshot(authed_post_json(
            &format!("/conversations/{}/messages", id),
            &token,
            json!({ "message": "shared question", "mode": "NORMAL" }),
        ))
        .await
        .unwrap();

    // Enable sharing twice: same token both times.
    let mut tokens = Vec::new();
    for _ in 0..2 {
        let resp = app
            .clone()
            .oneshot(authed_post_json(
                &format!("/conversations/{}/share", id),
                &token,
                json!({ "share": true }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["shared"], true);
        tokens.push(body["token"].as_str().unwrap().to_string());
    }
    assert_eq!(tokens[0], tokens[1]);

    // Public resolution without auth; views count up.
    let resp = app
        .clone()
        .oneshot(
            Request::get(format!("/shared/{}", tokens[0]))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let view = body_json(resp).await;
    assert_eq!(view["viewCount"], 1);
    assert_eq!(view["messages"].as_array().unwrap().len(), 2);
    assert_eq!(view["messages"][0]["content"], "shared question");

    let resp = app
        .clone()
        .oneshot(
            Request::get(format!("/shared/{}", tokens[0]))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["viewCount"], 2);

    // Disable: the old URL is permanently dead.
    let resp = app
        .clone()
        .oneshot(authed_post_json(
            &format!("/conversations/{}/share", id),
            &token,
            json!({ "share": false }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(
            Request::get(format!("/shared/{}", tokens[0]))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_share_token_is_not_found() {
    let (app, _) = make_app();
    let resp = app
        .oneshot(
            Request::get("/shared/deadbeefdeadbeefdeadbeefdeadbeef")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Translation and documents
// =============================================================================

#[tokio::test]
async fn test_translate_and_history() {
    let (app, backend) = make_app();
    let token = register(&app, "tr@example.com").await;

    let resp = app
        .clone()
        .oneshot(authed_post_json(
            "/translate",
            &token,
            json!({ "text": "hello", "source_lang": "en", "target_lang": "hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["translatedText"], "anuvaad");
    assert_eq!(body["cached"], false);

    // Repeat is served from the cache.
    let resp = app
        .clone()
        .oneshot(authed_post_json(
            "/translate",
            &token,
            json!({ "text": "hello", "source_lang": "en", "target_lang": "hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["cached"], true);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    let resp = app
        .oneshot(authed_get("/translations", &token))
        .await
        .unwrap();
    let history = body_json(resp).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_detect_language() {
    let (app, _) = make_app();
    let token = register(&app, "dl@example.com").await;
    let resp = app
        .oneshot(authed_post_json(
            "/translate/detect",
            &token,
            json!({ "text": "hello world" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["language"], "en");
}

#[tokio::test]
async fn test_document_lifecycle() {
    let (app, _) = make_app();
    let token = register(&app, "doc@example.com").await;

    let resp = app
        .clone()
        .oneshot(authed_post_json(
            "/documents/generate",
            &token,
            json!({ "prompt": "draft an NDA" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let document = body_json(resp).await;
    let id = document["id"].as_str().unwrap().to_string();
    assert_eq!(document["content"], "DRAFT AGREEMENT");

    let resp = app
        .clone()
        .oneshot(authed_get("/documents", &token))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(authed_get(&format!("/documents/{}", id), &token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(authed_delete(&format!("/documents/{}", id), &token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(authed_get(&format!("/documents/{}", id), &token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn test_update_profile() {
    let (app, _) = make_app();
    let token = register(&app, "p@example.com").await;

    let resp = app
        .clone()
        .oneshot(authed_put_json(
            "/users/me",
            &token,
            json!({ "name": "New Name" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["name"], "New Name");

    let resp = app.oneshot(authed_get("/users/me", &token)).await.unwrap();
    assert_eq!(body_json(resp).await["name"], "New Name");
}
