use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use centi_sage::agent::CompletionCapability;
use centi_sage::build_router;
use centi_sage::errors::AppError;
use centi_sage::routes::SESSION_HEADER;
use centi_sage::service::chat_service::{ChatService, ChatSettings, DEMO_REPLY};
use centi_sage::session::{SessionStore, GREETING};
use http_body_util::BodyExt;
use tower::ServiceExt;

// ============================================================================
// Helper Functions
// ============================================================================

struct UnreachableCapability;

#[async_trait]
impl CompletionCapability for UnreachableCapability {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, AppError> {
        Err(AppError::CompletionUnavailable { host: "localhost:9".to_string() })
    }
}

fn demo_app() -> Router {
    build_router(ChatService::new(SessionStore::new(), None, ChatSettings::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let session = response
        .headers()
        .get(SESSION_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, session, String::from_utf8(bytes.to_vec()).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: String) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn chat(session_id: &str, message: &str) -> Request<Body> {
    let encoded: String = message
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect();
    post_form("/api/chat", format!("session_id={session_id}&message={encoded}"))
}

fn upload(session_id: &str, filename: &str, content_type: &str) -> Request<Body> {
    upload_payload(session_id, filename, content_type, "PAYLOAD")
}

fn upload_payload(session_id: &str, filename: &str, content_type: &str, payload: &str) -> Request<Body> {
    let boundary = "centisageboundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"session_id\"\r\n\r\n\
         {session_id}\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: {content_type}\r\n\r\n\
         {payload}\r\n\
         --{boundary}--\r\n"
    );
    Request::post("/api/upload")
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

async fn start_session(app: &Router) -> String {
    let (status, session, body) = send(app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    // the apostrophe in the greeting is escaped
    assert!(body.contains(&GREETING.replace('\'', "&#x27;")));
    session.expect("index sets the session header")
}

async fn export(app: &Router, session_id: &str) -> Vec<serde_json::Value> {
    let (status, _, body) = send(app, get(&format!("/api/sessions/{session_id}/export"))).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_str::<serde_json::Value>(&body)
        .unwrap()
        .as_array()
        .unwrap()
        .clone()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_demo_chat_scenario() {
    let app = demo_app();
    let id = start_session(&app).await;

    let (status, session, body) = send(&app, chat(&id, "hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session.as_deref(), Some(id.as_str()));
    assert!(body.contains("hello"));
    assert!(body.contains("(Demo) Gemini API key not set"));
    assert!(body.contains("scrollToBottom"));

    let entries = export(&app, &id).await;
    assert_eq!(entries.len(), 3);
    for entry in &entries {
        let obj = entry.as_object().unwrap();
        assert!(obj.contains_key("role") && obj.contains_key("content") && obj.contains_key("ts"));
    }
    assert_eq!(entries[1]["content"], "hello");
    assert_eq!(entries[2]["content"], DEMO_REPLY);
}

#[tokio::test]
async fn test_resuming_session_keeps_conversation() {
    let app = demo_app();
    let id = start_session(&app).await;
    send(&app, chat(&id, "remember me")).await;

    let (status, session, body) = send(&app, get(&format!("/?session={id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session.as_deref(), Some(id.as_str()));
    assert!(body.contains("remember me"));

    let (_, other, _) = send(&app, get("/?session=does-not-exist")).await;
    assert_ne!(other.as_deref(), Some("does-not-exist"));
}

#[tokio::test]
async fn test_markup_is_escaped_in_panel() {
    let app = demo_app();
    let id = start_session(&app).await;

    let (_, _, body) = send(&app, chat(&id, "<script>alert(1)</script>")).await;
    assert!(!body.contains("<script>alert(1)</script>"));
    assert!(body.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
}

#[tokio::test]
async fn test_blank_message_appends_nothing() {
    let app = demo_app();
    let id = start_session(&app).await;

    let (status, _, _) = send(&app, chat(&id, "   ")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export(&app, &id).await.len(), 1);
}

#[tokio::test]
async fn test_clear_empties_conversation() {
    let app = demo_app();
    let id = start_session(&app).await;
    send(&app, chat(&id, "hello")).await;

    let (status, _, body) = send(&app, post_form("/api/clear", format!("session_id={id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No messages yet."));
    assert!(export(&app, &id).await.is_empty());
}

#[tokio::test]
async fn test_upload_is_referenced_once() {
    let app = demo_app();
    let id = start_session(&app).await;

    let (status, _, body) = send(&app, upload(&id, "cat.png", "image/png")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("cat.png"));

    send(&app, chat(&id, "first")).await;
    send(&app, chat(&id, "second")).await;

    let entries = export(&app, &id).await;
    assert_eq!(entries[1]["content"], "first\n\n[Attached file: cat.png]");
    assert_eq!(entries[3]["content"], "second");
}

#[tokio::test]
async fn test_unsupported_upload_is_rejected() {
    let app = demo_app();
    let id = start_session(&app).await;

    let (status, _, body) = send(&app, upload(&id, "run.sh", "text/x-sh")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Unsupported attachment"));
}

#[tokio::test]
async fn test_upload_over_body_limit_is_too_large() {
    let settings = ChatSettings { max_upload_bytes: 1024, ..ChatSettings::default() };
    let app = build_router(ChatService::new(SessionStore::new(), None, settings));
    let id = start_session(&app).await;

    let payload = "x".repeat(200 * 1024);
    let (status, _, body) = send(&app, upload_payload(&id, "huge.png", "image/png", &payload)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body.contains("Upload exceeds maximum of 1024 bytes"));

    // nothing was attached
    send(&app, chat(&id, "after")).await;
    assert_eq!(export(&app, &id).await[1]["content"], "after");
}

#[tokio::test]
async fn test_capability_failure_keeps_session_usable() {
    let svc = ChatService::new(
        SessionStore::new(),
        Some(Arc::new(UnreachableCapability)),
        ChatSettings::default(),
    );
    let app = build_router(svc);
    let id = start_session(&app).await;

    let (status, _, body) = send(&app, chat(&id, "x")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Error from API"));

    let entries = export(&app, &id).await;
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2]["role"], "assistant");
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = demo_app();

    let (status, _, body) = send(&app, chat("missing", "hello")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("not found"));

    let (status, _, _) = send(&app, get("/api/sessions/missing/export")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_end_session() {
    let app = demo_app();
    let id = start_session(&app).await;

    let request = Request::delete(format!("/api/sessions/{id}")).body(Body::empty()).unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = send(&app, get(&format!("/api/sessions/{id}/export"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_lists_newest_first() {
    let app = demo_app();
    let id = start_session(&app).await;
    send(&app, chat(&id, "oldest question")).await;

    let (status, _, body) = send(&app, get(&format!("/history?session={id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let demo = body.find("(Demo)").unwrap();
    let question = body.find("oldest question").unwrap();
    assert!(demo < question);
}
