use std::sync::Arc;

use async_trait::async_trait;
use rig::completion::Prompt;
use rig::prelude::CompletionClient;
use rig::providers::gemini;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::errors::AppError;

const PREAMBLE: &str = "You are Centi Sage, a helpful AI assistant. \
                        Be concise, accurate, and friendly. \
                        If you don't know something, say so.";
const DEFAULT_HOST: &str = "generativelanguage.googleapis.com";

/// A text-generation backend: prompt in, text out.
///
/// `Ok` with blank text is a valid answer; the caller decides how to show it.
#[async_trait]
pub trait CompletionCapability: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, AppError>;
}

/// Completion capability backed by the rig [`gemini::Client`].
/// A fresh agent is built per request; no history is replayed.
#[derive(Clone)]
pub struct GeminiAgentService {
    client: gemini::Client,
    host: String,
    model: String,
}

impl GeminiAgentService {
    pub fn new(api_key: &str, base_url: Option<&str>, model: &str) -> Result<Self, AppError> {
        let mut builder = gemini::Client::builder().api_key(api_key);
        if let Some(url) = base_url {
            builder = builder.base_url(url);
        }
        let client = builder.build().map_err(|e| AppError::ClientBuild {
            message: e.to_string(),
        })?;

        Ok(Self {
            client,
            host: base_url.unwrap_or(DEFAULT_HOST).to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl CompletionCapability for GeminiAgentService {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(PREAMBLE)
            .build();

        debug!("Sending {} chars to {}", prompt.len(), self.model);

        agent.prompt(prompt).await.map_err(|e| {
            error!("Gemini completion failed: {e}");
            classify_failure(&e.to_string(), &self.host, &self.model)
        })
    }
}

/// Builds the configured capability. `None` (demo mode) when no API key is
/// set or the client can't be built.
pub fn from_config(config: &AppConfig) -> Option<Arc<dyn CompletionCapability>> {
    let api_key = config.gemini_api_key.as_deref()?;
    match GeminiAgentService::new(api_key, config.gemini_base_url.as_deref(), &config.model) {
        Ok(service) => {
            info!("Gemini initialized with model {}", config.model);
            Some(Arc::new(service))
        }
        Err(e) => {
            warn!("Gemini init failed, running in demo mode: {e}");
            None
        }
    }
}

/// Maps a provider error message onto the matching [`AppError`] variant.
fn classify_failure(message: &str, host: &str, model: &str) -> AppError {
    let lower = message.to_lowercase();
    if lower.contains("connection refused") || lower.contains("connect") || lower.contains("dns") {
        AppError::CompletionUnavailable { host: host.to_string() }
    } else if lower.contains("model") && lower.contains("not found") {
        AppError::ModelNotFound { model_name: model.to_string() }
    } else {
        AppError::InferenceError { message: message.to_string() }
    }
}
