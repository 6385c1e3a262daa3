//! Identifiers and Shared Vocabulary
//!
//! Small value types shared by the store, the stream manager and the
//! dispatcher: message and session identifiers, message roles and kinds,
//! the process-wide connection status, and the conversation variant tag.
//!
//! # Identifier Format
//!
//! Identifiers follow the `<prefix>_<epoch-ms>_<suffix>` shape, where the
//! suffix is nine random base-36 characters:
//!
//! - sessions: `love_1718000000000_k3j9x0a1b`
//! - messages: `msg_1718000000000_0z8qwe1rt`
//!
//! The timestamp keeps identifiers roughly sortable; the suffix makes
//! collisions within the same millisecond practically impossible. Owners
//! (the store for sessions, a session for its messages) additionally
//! regenerate on the rare collision, so uniqueness is guaranteed where it
//! matters.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dispatcher::DispatchError;

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Message identifier, unique within its session
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a fresh message ID (`msg_<ms>_<suffix>`)
    #[must_use]
    pub fn generate() -> Self {
        Self(generate_id("msg"))
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session identifier, unique within the store
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh session ID for a variant (`<variant>_<ms>_<suffix>`)
    #[must_use]
    pub fn generate(variant: ConversationVariant) -> Self {
        Self(generate_id(variant.as_str()))
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Backend reply
    Assistant,
}

/// How a message should be treated by consumers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Ordinary content
    #[default]
    Normal,
    /// Placeholder shown while a reply is pending
    Typing,
    /// The reply failed; content describes the failure
    Error,
}

/// Connectivity of the most recent stream
///
/// Process-wide rather than per-session: only one session is presented at
/// a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No stream is open
    #[default]
    Disconnected,
    /// A stream has been requested but is not ready yet
    Connecting,
    /// The stream is open and delivering fragments
    Connected,
    /// The last stream failed
    Error,
}

impl ConnectionStatus {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Error => "Connection error",
        }
    }
}

/// Backend personality a conversation talks to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationVariant {
    /// Relationship-advice assistant
    #[default]
    Love,
    /// General-purpose agent
    Super,
    /// Fallback tag with no streaming endpoint
    Default,
}

impl ConversationVariant {
    /// Wire name of the variant
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Love => "love",
            Self::Super => "super",
            Self::Default => "default",
        }
    }

    /// Title given to new sessions when the caller supplies none
    #[must_use]
    pub fn default_title(&self) -> &'static str {
        match self {
            Self::Love => "AI Love Master Chat",
            Self::Super | Self::Default => "AI Super Agent Chat",
        }
    }
}

impl fmt::Display for ConversationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationVariant {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "love" => Ok(Self::Love),
            "super" => Ok(Self::Super),
            "default" => Ok(Self::Default),
            _ => Err(DispatchError::UnsupportedVariant(s.to_string())),
        }
    }
}

/// Current time in milliseconds since the Unix epoch
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn generate_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{prefix}_{}_{suffix}", now_ms())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_unique() {
        let id1 = MessageId::generate();
        let id2 = MessageId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("msg_"));
    }

    #[test]
    fn test_session_id_encodes_variant() {
        let id = SessionId::generate(ConversationVariant::Super);
        let parts: Vec<&str> = id.as_str().split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "super");
        assert!(parts[1].parse::<u64>().is_ok());
        assert_eq!(parts[2].len(), ID_SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("love".parse::<ConversationVariant>().unwrap(), ConversationVariant::Love);
        assert_eq!(" Super ".parse::<ConversationVariant>().unwrap(), ConversationVariant::Super);
        assert_eq!(
            "default".parse::<ConversationVariant>().unwrap(),
            ConversationVariant::Default
        );

        let err = "romance".parse::<ConversationVariant>().unwrap_err();
        assert_eq!(err, DispatchError::UnsupportedVariant("romance".to_string()));
    }

    #[test]
    fn test_default_titles_are_non_empty() {
        for variant in [
            ConversationVariant::Love,
            ConversationVariant::Super,
            ConversationVariant::Default,
        ] {
            assert!(!variant.default_title().is_empty());
        }
        assert_ne!(
            ConversationVariant::Love.default_title(),
            ConversationVariant::Super.default_title()
        );
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&ConversationVariant::Super).unwrap();
        assert_eq!(json, "\"super\"");
        let json = serde_json::to_string(&ConnectionStatus::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }
}
