use askama::Template;
use axum::extract::{Query, State};
use axum::response::Response;

use super::render;
use crate::render::{self as view, MessageView};
use crate::service::chat_service::ChatService;

#[derive(Debug, Default, serde::Deserialize)]
pub struct SessionQuery {
    pub session: Option<String>,
}

// ── Template structs ──────────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    session_id: String,
    /// Empty when running in demo mode
    model_name: String,
    pending_attachment: String,
    messages: Vec<MessageView>,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    session_id: String,
}

#[derive(Template)]
#[template(path = "about.html")]
struct AboutTemplate {
    session_id: String,
    model_name: String,
}

#[derive(Template)]
#[template(path = "history.html")]
struct HistoryTemplate {
    session_id: String,
    messages: Vec<MessageView>,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET `/`: chat page; resumes `?session=` if it is live, otherwise starts
/// a fresh greeted session.
pub async fn index_handler(
    Query(query): Query<SessionQuery>,
    State(svc): State<ChatService>,
) -> Response {
    let resumable = match query.session {
        Some(id) => svc.has_session(&id).await.then_some(id),
        None => None,
    };
    let session_id = match resumable {
        Some(id) => id,
        None => svc.start_session().await,
    };

    let messages = match svc.snapshot(&session_id).await {
        Ok(conversation) => view::render(&conversation).collect(),
        Err(_) => vec![],
    };
    let pending_attachment = svc
        .pending_attachment_name(&session_id)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();

    let tmpl = IndexTemplate {
        model_name: svc.model_status().unwrap_or_default().to_string(),
        session_id: session_id.clone(),
        pending_attachment,
        messages,
    };
    render(tmpl, &session_id)
}

/// GET `/home`
pub async fn home_handler(Query(query): Query<SessionQuery>) -> Response {
    let session_id = query.session.unwrap_or_default();
    render(HomeTemplate { session_id: session_id.clone() }, &session_id)
}

/// GET `/about`
pub async fn about_handler(
    Query(query): Query<SessionQuery>,
    State(svc): State<ChatService>,
) -> Response {
    let session_id = query.session.unwrap_or_default();
    let tmpl = AboutTemplate {
        session_id: session_id.clone(),
        model_name: svc.model_status().unwrap_or_default().to_string(),
    };
    render(tmpl, &session_id)
}

/// GET `/history`: all messages newest first, with export and clear.
pub async fn history_handler(
    Query(query): Query<SessionQuery>,
    State(svc): State<ChatService>,
) -> Response {
    let session_id = query.session.unwrap_or_default();
    let messages = match svc.snapshot(&session_id).await {
        Ok(conversation) => view::render_history(&conversation).collect(),
        Err(_) => vec![],
    };
    render(HistoryTemplate { session_id: session_id.clone(), messages }, &session_id)
}
