pub mod agent;
pub mod config;
pub mod errors;
pub mod models;
pub mod render;
pub mod routes;
pub mod service;
pub mod session;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::routes::api_routes::{
    chat_handler, clear_handler, end_session_handler, export_handler, upload_handler,
};
use crate::routes::chat_routes::{about_handler, history_handler, home_handler, index_handler};
use crate::service::chat_service::ChatService;

// Room for multipart framing and the session_id field on top of the file.
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

pub fn build_router(chat_service: ChatService) -> Router {
    let body_limit = chat_service.max_upload_bytes() + UPLOAD_BODY_SLACK;

    Router::new()
        // Page routes
        .route("/", get(index_handler))
        .route("/home", get(home_handler))
        .route("/about", get(about_handler))
        .route("/history", get(history_handler))
        // API / HTMX routes
        .route("/api/chat", post(chat_handler))
        .route("/api/clear", post(clear_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/sessions/{id}/export", get(export_handler))
        .route("/api/sessions/{id}", delete(end_session_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(chat_service)
}
