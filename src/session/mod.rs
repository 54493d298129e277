pub mod store;

use chrono::{DateTime, Utc};

use crate::models::{Message, MessageRole, PendingAttachment};

pub use store::{SessionHandle, SessionSlot, SessionStore};

pub const GREETING: &str = "Hello! I'm Centi Sage, your AI assistant. Ask me anything.";

/// Ordered, append-only message log of one chat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Serializes the log as a pretty JSON array of `{role, content, ts}`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.messages)
    }
}

/// State of a single browser session: its conversation (once initialized)
/// and at most one pending upload.
#[derive(Debug)]
pub struct ChatSession {
    id: String,
    conversation: Option<Conversation>,
    pending_attachment: Option<PendingAttachment>,
    last_ts: Option<DateTime<Utc>>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            conversation: None,
            pending_attachment: None,
            last_ts: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Seeds the conversation with the greeting. No-op once a conversation
    /// exists, even if it has since been cleared.
    pub fn initialize(&mut self) {
        if self.conversation.is_some() {
            return;
        }
        self.conversation = Some(Conversation::default());
        self.append(MessageRole::Assistant, GREETING);
    }

    pub fn is_initialized(&self) -> bool {
        self.conversation.is_some()
    }

    pub fn append(&mut self, role: MessageRole, content: impl Into<String>) {
        let ts = self.next_timestamp();
        self.conversation
            .get_or_insert_with(Conversation::default)
            .messages
            .push(Message::new(role, content.into(), ts));
    }

    pub fn clear(&mut self) {
        if let Some(conversation) = self.conversation.as_mut() {
            conversation.messages.clear();
        }
    }

    /// Current conversation; empty when the session was never initialized.
    pub fn conversation(&self) -> Conversation {
        self.conversation.clone().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.conversation.as_ref().map_or(0, Conversation::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces any attachment already waiting.
    pub fn set_pending_attachment(&mut self, attachment: PendingAttachment) {
        self.pending_attachment = Some(attachment);
    }

    pub fn take_pending_attachment(&mut self) -> Option<PendingAttachment> {
        self.pending_attachment.take()
    }

    pub fn pending_attachment(&self) -> Option<&PendingAttachment> {
        self.pending_attachment.as_ref()
    }

    // Wall clock can step backwards; clamp to the previous stamp.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_ts {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_ts = Some(ts);
        ts
    }
}
