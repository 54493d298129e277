use crate::models::{Message, MessageRole};
use crate::session::Conversation;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// View model for a message, flattened for askama template use.
/// `content` is already HTML-escaped and is emitted with `|safe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub role: String,
    pub style_class: &'static str,
    pub avatar: &'static str,
    pub is_user: bool,
    pub content: String,
    pub timestamp: String,
}

impl From<&Message> for MessageView {
    fn from(m: &Message) -> Self {
        let is_user = m.role() == MessageRole::User;
        Self {
            role: m.role().as_str().to_string(),
            style_class: if is_user { "user" } else { "ai" },
            avatar: if is_user { "You" } else { "AI" },
            is_user,
            content: escape_html(m.content()),
            timestamp: m.ts().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Display records in chat order, computed fresh on every call.
pub fn render(conversation: &Conversation) -> impl Iterator<Item = MessageView> + '_ {
    conversation.messages().iter().map(MessageView::from)
}

/// Display records newest first, for the history table.
pub fn render_history(conversation: &Conversation) -> impl Iterator<Item = MessageView> + '_ {
    conversation.messages().iter().rev().map(MessageView::from)
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
