//! Chat Sessions
//!
//! A session is one conversation's ordered message history plus metadata.
//! Sessions are owned by the [`SessionStore`](crate::store::SessionStore),
//! which is their only mutator; everything outside the crate sees them as
//! snapshots.
//!
//! Messages are append-only with one exception: the content of an existing
//! message may be replaced in place, which is how streamed tokens grow an
//! assistant reply that was first appended as a placeholder.

use serde::{Deserialize, Serialize};

use crate::messages::{now_ms, MessageId, MessageKind, MessageRole, SessionId};

/// A message in a session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID (within the session)
    pub id: MessageId,
    /// Message content
    pub content: String,
    /// Who sent this message
    pub role: MessageRole,
    /// When the message was created (Unix timestamp ms)
    pub time: u64,
    /// How consumers should treat the message
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

impl Message {
    /// Whether the user sent this message
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

/// A message that has not been appended yet (no ID assigned)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Message content
    pub content: String,
    /// Who sent this message
    pub role: MessageRole,
    /// When the message was created (Unix timestamp ms)
    pub time: u64,
    /// How consumers should treat the message
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

impl NewMessage {
    /// A user message stamped with the current time
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: MessageRole::User,
            time: now_ms(),
            kind: MessageKind::Normal,
        }
    }

    /// An assistant message stamped with the current time
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: MessageRole::Assistant,
            time: now_ms(),
            kind: MessageKind::Normal,
        }
    }

    /// An empty assistant placeholder to be filled by a stream
    #[must_use]
    pub fn typing_placeholder() -> Self {
        Self::assistant(String::new()).with_kind(MessageKind::Typing)
    }

    /// Override the creation timestamp
    #[must_use]
    pub fn with_time(mut self, time: u64) -> Self {
        self.time = time;
        self
    }

    /// Override the message kind
    #[must_use]
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }
}

/// A conversation session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,
    /// Display title
    pub title: String,
    /// Conversation history, oldest first
    pub messages: Vec<Message>,
    /// When the session was created (Unix timestamp ms)
    pub created_at: u64,
    /// When the session was last modified (Unix timestamp ms)
    pub updated_at: u64,
}

impl Session {
    /// Create an empty session
    pub(crate) fn new(id: SessionId, title: String) -> Self {
        let now = now_ms();
        Self {
            id,
            title,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Get message by ID
    #[must_use]
    pub fn get_message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Get the most recent message
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Get current message count
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Whether the session has no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message, assigning it an ID unused in this session
    pub(crate) fn push_message(&mut self, message: NewMessage) -> MessageId {
        let mut id = MessageId::generate();
        while self.get_message(&id).is_some() {
            id = MessageId::generate();
        }

        self.messages.push(Message {
            id: id.clone(),
            content: message.content,
            role: message.role,
            time: message.time,
            kind: message.kind,
        });
        self.touch();
        id
    }

    /// Replace a message's content in place
    pub(crate) fn update_content(&mut self, id: &MessageId, content: &str) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| &m.id == id) else {
            return false;
        };
        message.content.clear();
        message.content.push_str(content);
        self.touch();
        true
    }

    /// Append a streamed fragment to a message's content
    pub(crate) fn append_content(&mut self, id: &MessageId, fragment: &str) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| &m.id == id) else {
            return false;
        };
        message.content.push_str(fragment);
        self.touch();
        true
    }

    /// Change a message's kind in place
    pub(crate) fn set_kind(&mut self, id: &MessageId, kind: MessageKind) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| &m.id == id) else {
            return false;
        };
        message.kind = kind;
        self.touch();
        true
    }

    /// Clear message history (keeps metadata)
    pub(crate) fn clear_history(&mut self) {
        self.messages.clear();
        self.touch();
    }

    /// Bump the modification time; never moves backwards
    fn touch(&mut self) {
        self.updated_at = self.updated_at.max(now_ms());
    }
}
