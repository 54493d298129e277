pub mod api_routes;
pub mod chat_routes;

use askama::Template;
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};

pub const SESSION_HEADER: HeaderName = HeaderName::from_static("x-session-id");

/// Renders `tmpl` into an HTML response, tagged with the session id.
fn render(tmpl: impl Template, session_id: &str) -> Response {
    match tmpl.render() {
        Ok(html) => with_session_header(Html(html).into_response(), session_id),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Template error: {e}"),
        )
            .into_response(),
    }
}

fn with_session_header(mut resp: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        resp.headers_mut().insert(SESSION_HEADER, value);
    }
    resp
}
