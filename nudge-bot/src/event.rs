use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Plain chat message
    Message,
    /// Inline button press; must be answered once
    CallbackQuery,
}

/// Who triggered the event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub username: Option<String>,
}

impl Actor {
    pub fn new(id: i64) -> Self {
        Self { id, username: None }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: String,
    pub mime_type: Option<String>,
}

/// One inbound interaction as delivered by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub kind: EventKind,
    pub actor: Actor,
    /// Conversation to reply into, when known
    pub chat_id: Option<i64>,
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
    /// Id used to answer a callback query
    pub callback_id: Option<String>,
    /// Structured payload of the pressed button
    pub callback_data: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn message(actor: Actor, chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Message,
            actor,
            chat_id: Some(chat_id),
            text: Some(text.into()),
            attachment: None,
            callback_id: None,
            callback_data: None,
            received_at: Utc::now(),
        }
    }

    pub fn callback(actor: Actor, chat_id: Option<i64>, callback_id: impl Into<String>) -> Self {
        Self {
            kind: EventKind::CallbackQuery,
            actor,
            chat_id,
            text: None,
            attachment: None,
            callback_id: Some(callback_id.into()),
            callback_data: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_text(mut self, text: Option<String>) -> Self {
        self.text = text;
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_callback_data(mut self, data: impl Into<String>) -> Self {
        self.callback_data = Some(data.into());
        self
    }

    pub fn is_callback(&self) -> bool {
        self.kind == EventKind::CallbackQuery
    }

    /// Non-blank text content
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn callback_data(&self) -> Option<&str> {
        self.callback_data.as_deref().filter(|d| !d.is_empty())
    }
}
