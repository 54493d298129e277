use tracing::info;

use centi_sage::build_router;
use centi_sage::config::AppConfig;
use centi_sage::service::chat_service::{ChatService, ChatSettings};
use centi_sage::session::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "centi_sage=debug,tower_http=debug".into()),
        )
        .init();

    let config = AppConfig::from_env();

    // ── Completion capability (absent key = demo mode) ────────────────────────
    let agent = centi_sage::agent::from_config(&config);
    if agent.is_none() {
        info!("GEMINI_API_KEY not set or unusable, replies run in demo mode");
    }

    // ── Sessions (idle ones are swept in the background) ─────────────────────
    let sessions = SessionStore::new();
    sessions.spawn_reaper(config.session_idle_ttl);
    info!("Idle sessions expire after {}s", config.session_idle_ttl.as_secs());

    let chat_service = ChatService::new(sessions, agent, ChatSettings::from(&config));
    let app = build_router(chat_service);

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}
