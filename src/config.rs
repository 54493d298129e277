use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_MESSAGE_LENGTH: usize = 8000;
const DEFAULT_MAX_UPLOAD_SIZE_MB: usize = 10;
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_IDLE_MINS: u64 = 60;

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Absent or blank means demo mode.
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
    pub model: String,
    pub completion_timeout: Duration,
    pub max_message_length: usize,
    pub max_upload_bytes: usize,
    pub port: u16,
    /// Sessions untouched for this long are dropped.
    pub session_idle_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_base_url: None,
            model: DEFAULT_MODEL.to_string(),
            completion_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            port: DEFAULT_PORT,
            session_idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_MINS * 60),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unparseable numbers
    /// fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout_secs = non_blank("COMPLETION_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let upload_mb: usize = non_blank("MAX_UPLOAD_SIZE_MB")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE_MB);
        let idle_mins: u64 = non_blank("SESSION_IDLE_MINS")
            .and_then(|v| v.parse().ok())
            .filter(|mins| *mins > 0)
            .unwrap_or(DEFAULT_SESSION_IDLE_MINS);

        Self {
            gemini_api_key: non_blank("GEMINI_API_KEY"),
            gemini_base_url: non_blank("GEMINI_API_BASE_URL"),
            model: non_blank("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            completion_timeout: Duration::from_secs(timeout_secs),
            max_message_length: non_blank("MAX_MESSAGE_LENGTH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_MESSAGE_LENGTH),
            max_upload_bytes: upload_mb * 1024 * 1024,
            port: non_blank("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            session_idle_ttl: Duration::from_secs(idle_mins * 60),
        }
    }
}
