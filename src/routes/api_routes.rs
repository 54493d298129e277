use askama::Template;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use tracing::{debug, warn};

use super::{render, with_session_header};
use crate::errors::AppError;
use crate::models::SendOutcome;
use crate::render::{self as view, MessageView};
use crate::service::chat_service::ChatService;

const EXPORT_FILENAME: &str = "chat_history.json";

// ── Form input ────────────────────────────────────────────────────────────────

#[derive(serde::Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(serde::Deserialize)]
pub struct SessionForm {
    #[serde(default)]
    pub session_id: String,
}

// ── Template structs ──────────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "chat_panel.html")]
struct ChatPanelTemplate {
    session_id: String,
    messages: Vec<MessageView>,
}

#[derive(Template)]
#[template(path = "upload_status.html")]
struct UploadStatusTemplate {
    filename: String,
}

#[derive(Template)]
#[template(path = "error_fragment.html")]
struct ErrorFragmentTemplate {
    error_message: String,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST `/api/chat`: runs one turn, returns the re-rendered chat panel for HTMX
pub async fn chat_handler(
    State(svc): State<ChatService>,
    Form(form): Form<ChatForm>,
) -> Response {
    match svc.handle_send(&form.session_id, &form.message).await {
        Err(err) => error_response(&err),
        Ok(outcome) => {
            if let SendOutcome::Replied(reply) = &outcome {
                debug!("Session {} got {} char reply", form.session_id, reply.content().len());
            }
            chat_panel(&svc, &form.session_id).await
        }
    }
}

/// POST `/api/clear`: empties the conversation
pub async fn clear_handler(
    State(svc): State<ChatService>,
    Form(form): Form<SessionForm>,
) -> Response {
    match svc.clear(&form.session_id).await {
        Err(err) => error_response(&err),
        Ok(()) => chat_panel(&svc, &form.session_id).await,
    }
}

/// POST `/api/upload`: multipart `session_id` + `file`; becomes the
/// pending attachment of the next message
pub async fn upload_handler(
    State(svc): State<ChatService>,
    mut multipart: Multipart,
) -> Response {
    let mut session_id = String::new();
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(&multipart_error(e, svc.max_upload_bytes())),
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "session_id" => match field.text().await {
                Ok(text) => session_id = text.trim().to_string(),
                Err(e) => return error_response(&multipart_error(e, svc.max_upload_bytes())),
            },
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, content_type, bytes.to_vec())),
                    Err(e) => return error_response(&multipart_error(e, svc.max_upload_bytes())),
                }
            }
            other => debug!("Ignoring multipart field '{other}'"),
        }
    }

    let Some((filename, content_type, bytes)) = upload else {
        return error_response(&AppError::EmptyField { field_name: "file".to_string() });
    };

    match svc.upload(&session_id, &filename, &content_type, bytes).await {
        Err(err) => error_response(&err),
        Ok(()) => render(UploadStatusTemplate { filename }, &session_id),
    }
}

/// GET `/api/sessions/{id}/export`: JSON download of the conversation
pub async fn export_handler(
    Path(id): Path<String>,
    State(svc): State<ChatService>,
) -> Response {
    match svc.export(&id).await {
        Err(err) => error_response(&err),
        Ok(json) => {
            let disposition = format!("attachment; filename=\"{EXPORT_FILENAME}\"");
            let mut resp = json.into_response();
            let headers = resp.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                headers.insert(CONTENT_DISPOSITION, value);
            }
            with_session_header(resp, &id)
        }
    }
}

/// DELETE `/api/sessions/{id}`: ends the session
pub async fn end_session_handler(
    Path(id): Path<String>,
    State(svc): State<ChatService>,
) -> Response {
    match svc.end_session(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn chat_panel(svc: &ChatService, session_id: &str) -> Response {
    match svc.snapshot(session_id).await {
        Err(err) => error_response(&err),
        Ok(conversation) => {
            let tmpl = ChatPanelTemplate {
                session_id: session_id.to_string(),
                messages: view::render(&conversation).collect(),
            };
            render(tmpl, session_id)
        }
    }
}

/// A body cut off by the request size limit is an oversized upload, not a
/// malformed one.
fn multipart_error(err: MultipartError, max_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::UploadTooLarge { max_bytes }
    } else {
        AppError::MalformedUpload { message: err.body_text() }
    }
}

/// Error fragments are retargeted at the flash area so the chat panel stays
/// in place.
fn error_response(err: &AppError) -> Response {
    let status = status_for(err);
    warn!("Request failed with {status}: {err}");

    let tmpl = ErrorFragmentTemplate { error_message: err.to_string() };
    let mut resp = match tmpl.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(_) => (status, err.to_string()).into_response(),
    };
    let headers = resp.headers_mut();
    headers.insert(HeaderName::from_static("hx-retarget"), HeaderValue::from_static("#flash"));
    headers.insert(HeaderName::from_static("hx-reswap"), HeaderValue::from_static("innerHTML"));
    resp
}

fn status_for(err: &AppError) -> StatusCode {
    if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else if err.is_too_large() {
        StatusCode::PAYLOAD_TOO_LARGE
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_busy() {
        StatusCode::CONFLICT
    } else if err.is_capability_failure() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
