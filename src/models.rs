use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialized as `user` / `assistant`; deserialization goes through
/// [`TryFrom<String>`] so legacy tags are normalized on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the canonical tags plus the legacy `ai` / `model` spellings for
/// the assistant side.
impl TryFrom<String> for MessageRole {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" | "ai" | "model" => Ok(MessageRole::Assistant),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// A single chat entry. Fields are private so an appended message can't be
/// edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: MessageRole,
    content: String,
    ts: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: String, ts: DateTime<Utc>) -> Self {
        Self { role, content, ts }
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn ts(&self) -> DateTime<Utc> {
        self.ts
    }
}

/// A file waiting to be referenced by the next outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PendingAttachment {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Result of a send: either ignored (blank input) or the assistant reply
/// that was appended.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Ignored,
    Replied(Message),
}
