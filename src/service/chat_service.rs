use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::agent::CompletionCapability;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::{MessageRole, PendingAttachment, SendOutcome};
use crate::session::{Conversation, SessionHandle, SessionStore};

pub const DEMO_REPLY: &str = "(Demo) Gemini API key not set. This is a mock reply to show chat flow.";
pub const EMPTY_REPLY: &str = "(No response) The model returned an empty reply.";
const ERROR_REPLY_PREFIX: &str = "⚠️ Error from API";

const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "mp3", "wav"];
const ALLOWED_MIME_TYPES: [&str; 8] = [
    "image/png",
    "image/jpeg",
    "image/jpg",
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/wave",
    "audio/x-wav",
];

/// Limits applied by [`ChatService`].
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub completion_timeout: Duration,
    pub max_message_length: usize,
    pub max_upload_bytes: usize,
}

impl From<&AppConfig> for ChatSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            completion_timeout: config.completion_timeout,
            max_message_length: config.max_message_length,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

#[derive(Clone)]
pub struct ChatService {
    sessions: SessionStore,
    agent: Option<Arc<dyn CompletionCapability>>,
    settings: ChatSettings,
}

impl ChatService {
    /// `agent` is `None` when no credential is configured (demo mode).
    pub fn new(
        sessions: SessionStore,
        agent: Option<Arc<dyn CompletionCapability>>,
        settings: ChatSettings,
    ) -> Self {
        Self { sessions, agent, settings }
    }

    pub fn model_status(&self) -> Option<&str> {
        self.agent.as_deref().map(|a| a.name())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.settings.max_upload_bytes
    }

    pub async fn start_session(&self) -> String {
        self.sessions.create().await
    }

    pub async fn has_session(&self, session_id: &str) -> bool {
        self.sessions.get(session_id).await.is_some()
    }

    pub async fn end_session(&self, session_id: &str) -> Result<(), AppError> {
        if self.sessions.remove(session_id).await {
            Ok(())
        } else {
            Err(AppError::session_not_found(session_id))
        }
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<Conversation, AppError> {
        let handle = self.session(session_id).await?;
        let session = handle.lock().await;
        Ok(session.conversation())
    }

    /// JSON array of `{role, content, ts}` for the whole conversation.
    pub async fn export(&self, session_id: &str) -> Result<String, AppError> {
        self.snapshot(session_id)
            .await?
            .to_json()
            .map_err(|e| AppError::Unexpected(format!("Failed to serialize conversation: {e}")))
    }

    /// Waits for any in-flight turn to finish, then empties the conversation.
    pub async fn clear(&self, session_id: &str) -> Result<(), AppError> {
        let handle = self.session(session_id).await?;
        handle.lock().await.clear();
        info!("Cleared conversation for session {session_id}");
        Ok(())
    }

    pub async fn pending_attachment_name(&self, session_id: &str) -> Result<Option<String>, AppError> {
        let handle = self.session(session_id).await?;
        let session = handle.lock().await;
        Ok(session.pending_attachment().map(|a| a.filename.clone()))
    }

    /// Stores `bytes` as the session's pending attachment, replacing any
    /// previous upload.
    pub async fn upload(
        &self,
        session_id: &str,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), AppError> {
        if filename.trim().is_empty() {
            return Err(AppError::EmptyField { field_name: "file".to_string() });
        }
        if !is_allowed_attachment(filename, content_type) {
            return Err(AppError::UnsupportedAttachment {
                filename: filename.to_string(),
                content_type: content_type.to_string(),
            });
        }
        if bytes.len() > self.settings.max_upload_bytes {
            return Err(AppError::AttachmentTooLarge {
                max_bytes: self.settings.max_upload_bytes,
                actual_bytes: bytes.len(),
            });
        }

        let handle = self.session(session_id).await?;
        let mut session = handle.lock().await;
        debug!("Session {session_id} attached {filename} ({} bytes)", bytes.len());
        session.set_pending_attachment(PendingAttachment::new(filename, content_type, bytes));
        Ok(())
    }

    /// Runs one chat turn: appends the user message, asks the completion
    /// capability, appends the reply (real or fallback).
    ///
    /// Only one turn runs per session; a second send meanwhile fails with
    /// [`AppError::SessionBusy`]. The turn runs on its own task, so a caller
    /// that goes away mid-completion never leaves a user message without
    /// its reply.
    pub async fn handle_send(&self, session_id: &str, raw_input: &str) -> Result<SendOutcome, AppError> {
        let handle = self.session(session_id).await?;
        let turn = handle
            .try_begin_turn()
            .ok_or_else(|| AppError::SessionBusy { id: session_id.to_string() })?;

        let trimmed = raw_input.trim();
        if trimmed.is_empty() {
            debug!("Ignoring blank input for session {session_id}");
            return Ok(SendOutcome::Ignored);
        }
        let length = trimmed.chars().count();
        if length > self.settings.max_message_length {
            return Err(AppError::FieldTooLong {
                field_name: "message".to_string(),
                max_length: self.settings.max_message_length,
                actual_length: length,
            });
        }

        let input = trimmed.to_string();
        let agent = self.agent.clone();
        let limit = self.settings.completion_timeout;
        let task = tokio::spawn(async move {
            let _turn = turn;
            run_turn(handle, input, agent, limit).await
        });

        task.await
            .map_err(|e| AppError::Unexpected(format!("Chat turn for session {session_id} failed: {e}")))?
    }

    async fn session(&self, session_id: &str) -> Result<SessionHandle, AppError> {
        self.sessions
            .get(session_id)
            .await
            .ok_or_else(|| AppError::session_not_found(session_id))
    }
}

async fn run_turn(
    handle: SessionHandle,
    input: String,
    agent: Option<Arc<dyn CompletionCapability>>,
    limit: Duration,
) -> Result<SendOutcome, AppError> {
    let mut session = handle.lock().await;

    let mut content = input;
    if let Some(attachment) = session.take_pending_attachment() {
        content.push_str(&attachment_marker(&attachment.filename));
    }

    session.append(MessageRole::User, content.clone());
    let reply = generate_reply(agent.as_deref(), &content, limit).await;
    session.append(MessageRole::Assistant, reply);

    let conversation = session.conversation();
    match conversation.last() {
        Some(message) => Ok(SendOutcome::Replied(message.clone())),
        None => Err(AppError::Unexpected("conversation empty after send".to_string())),
    }
}

async fn generate_reply(agent: Option<&dyn CompletionCapability>, prompt: &str, limit: Duration) -> String {
    let Some(agent) = agent else {
        return DEMO_REPLY.to_string();
    };

    let result = match timeout(limit, agent.complete(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::CompletionTimeout { seconds: limit.as_secs() }),
    };

    match result {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!("{} returned an empty reply", agent.name());
            EMPTY_REPLY.to_string()
        }
        Err(e) => {
            warn!("Completion via {} failed: {e}", agent.name());
            error_reply(&e)
        }
    }
}

pub fn attachment_marker(filename: &str) -> String {
    format!("\n\n[Attached file: {filename}]")
}

fn error_reply(err: &AppError) -> String {
    format!("{ERROR_REPLY_PREFIX}: {err}")
}

fn is_allowed_attachment(filename: &str, content_type: &str) -> bool {
    let extension_ok = filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false);
    extension_ok || ALLOWED_MIME_TYPES.contains(&content_type.to_lowercase().as_str())
}
