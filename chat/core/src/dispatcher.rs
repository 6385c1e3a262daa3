//! Conversation Dispatcher
//!
//! Picks the endpoint and query parameters for a conversation variant and
//! wires stream callbacks to the session store.
//!
//! # Endpoints
//!
//! ```text
//! variant   path                      params
//! ───────   ───────────────────────   ─────────────────
//! love      /ai/love_app/chat/sse     message, chatId
//! super     /ai/manus/chat            message
//! ```
//!
//! The stream key is the endpoint path, so each endpoint carries at most
//! one live reply at a time.

use thiserror::Error;

use crate::messages::{ConnectionStatus, ConversationVariant, MessageId, MessageKind, SessionId};
use crate::session::NewMessage;
use crate::store::SessionStore;
use crate::streaming::{
    CloseReason, ConnectionManager, StreamCallbacks, StreamHandle, STREAM_DONE_SENTINEL,
};
use crate::transport::StreamError;

/// Streaming endpoint of the love-advice assistant
pub const LOVE_APP_CHAT_PATH: &str = "/ai/love_app/chat/sse";

/// Streaming endpoint of the general-purpose agent
pub const MANUS_CHAT_PATH: &str = "/ai/manus/chat";

/// Errors raised before any connection is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The variant has no streaming endpoint
    #[error("unsupported conversation variant: {0}")]
    UnsupportedVariant(String),

    /// The target session does not exist
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
}

/// Endpoint path for a variant
///
/// # Errors
///
/// Returns [`DispatchError::UnsupportedVariant`] for variants without an
/// endpoint.
pub fn endpoint_path(variant: ConversationVariant) -> Result<&'static str, DispatchError> {
    match variant {
        ConversationVariant::Love => Ok(LOVE_APP_CHAT_PATH),
        ConversationVariant::Super => Ok(MANUS_CHAT_PATH),
        ConversationVariant::Default => {
            Err(DispatchError::UnsupportedVariant(variant.to_string()))
        }
    }
}

/// An assistant reply that is being streamed into a session
#[derive(Debug, Clone)]
pub struct PendingReply {
    /// Placeholder message receiving the reply
    pub message_id: MessageId,
    /// The live stream
    pub handle: StreamHandle,
}

/// Routes chat requests to variant endpoints
#[derive(Debug, Clone)]
pub struct ChatDispatcher {
    connections: ConnectionManager,
    store: SessionStore,
    base_url: String,
}

impl ChatDispatcher {
    /// Create a dispatcher
    pub fn new(
        connections: ConnectionManager,
        store: SessionStore,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            connections,
            store,
            base_url: base_url.into(),
        }
    }

    /// Endpoint base address
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The connection manager streams are opened on
    #[must_use]
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// The store replies are written to
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Open a chat stream for `variant`
    ///
    /// `chat_id` is only sent to the love endpoint; a missing one is sent
    /// as an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnsupportedVariant`] before any connection
    /// attempt if the variant has no endpoint.
    pub fn chat(
        &self,
        variant: ConversationVariant,
        message: &str,
        chat_id: Option<&str>,
        callbacks: StreamCallbacks,
    ) -> Result<StreamHandle, DispatchError> {
        let path = endpoint_path(variant)?;

        let handle = match variant {
            ConversationVariant::Love => {
                let params = [("message", message), ("chatId", chat_id.unwrap_or_default())];
                self.connections
                    .connect(path, &self.base_url, path, &params, callbacks)
            }
            _ => {
                let params = [("message", message)];
                self.connections
                    .connect(path, &self.base_url, path, &params, callbacks)
            }
        };

        tracing::debug!(variant = %variant, connection_id = %handle.id(), "Dispatched chat");
        Ok(handle)
    }

    /// Like [`chat`](Self::chat), parsing the variant from its wire name
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnsupportedVariant`] for unknown names and
    /// for variants without an endpoint.
    pub fn chat_with_variant_name(
        &self,
        variant: &str,
        message: &str,
        chat_id: Option<&str>,
        callbacks: StreamCallbacks,
    ) -> Result<StreamHandle, DispatchError> {
        self.chat(variant.parse()?, message, chat_id, callbacks)
    }

    /// Open a stream to the love-advice assistant
    pub fn chat_with_love_app(
        &self,
        message: &str,
        chat_id: &str,
        callbacks: StreamCallbacks,
    ) -> StreamHandle {
        let params = [("message", message), ("chatId", chat_id)];
        self.connections.connect(
            LOVE_APP_CHAT_PATH,
            &self.base_url,
            LOVE_APP_CHAT_PATH,
            &params,
            callbacks,
        )
    }

    /// Open a stream to the general-purpose agent
    pub fn chat_with_manus(&self, message: &str, callbacks: StreamCallbacks) -> StreamHandle {
        self.connections.connect(
            MANUS_CHAT_PATH,
            &self.base_url,
            MANUS_CHAT_PATH,
            &[("message", message)],
            callbacks,
        )
    }

    /// Stop the live stream of a variant's endpoint, if any
    pub fn stop(&self, variant: ConversationVariant) -> bool {
        endpoint_path(variant).is_ok_and(|path| self.connections.close(path))
    }

    /// Send a user message and stream the assistant's reply into the session
    ///
    /// Appends the user message and an empty `Typing` placeholder, raises the
    /// typing indicator and sets status `Connecting`, then opens the stream.
    /// The session ID doubles as the love endpoint's chat ID. Stopping the
    /// stream before it completes lowers the indicators again.
    ///
    /// # Errors
    ///
    /// Fails before touching the store if the variant is unsupported or the
    /// session does not exist.
    pub fn send_message(
        &self,
        session_id: &SessionId,
        variant: ConversationVariant,
        text: &str,
    ) -> Result<PendingReply, DispatchError> {
        let path = endpoint_path(variant)?;
        let missing = || DispatchError::SessionNotFound(session_id.clone());
        if !self.store.contains(session_id) {
            return Err(missing());
        }

        self.store
            .add_message(session_id, NewMessage::user(text))
            .ok_or_else(missing)?;
        let message_id = self
            .store
            .add_message(session_id, NewMessage::typing_placeholder())
            .ok_or_else(missing)?;

        self.store.set_typing(true);
        self.store.set_connection_status(ConnectionStatus::Connecting);

        let callbacks =
            reply_callbacks(&self.store, &self.connections, path, session_id, &message_id);
        let handle = self.chat(variant, text, Some(session_id.as_str()), callbacks)?;

        tracing::info!(
            session_id = %session_id,
            message_id = %message_id,
            variant = %variant,
            "Streaming reply"
        );
        Ok(PendingReply { message_id, handle })
    }
}

/// Callbacks that fill `placeholder` and drive the global indicators
///
/// `key` is the stream key the reply runs under; a cancelled reply only
/// resets the indicators if no newer stream holds that key.
fn reply_callbacks(
    store: &SessionStore,
    connections: &ConnectionManager,
    key: &'static str,
    session_id: &SessionId,
    placeholder: &MessageId,
) -> StreamCallbacks {
    let on_open = {
        let store = store.clone();
        move || store.set_connection_status(ConnectionStatus::Connected)
    };

    let on_message = {
        let store = store.clone();
        let session_id = session_id.clone();
        let placeholder = placeholder.clone();
        let mut streamed = false;

        move |payload: &str| {
            if payload == STREAM_DONE_SENTINEL {
                if !streamed {
                    store.set_message_kind(&session_id, &placeholder, MessageKind::Normal);
                }
                store.set_typing(false);
                store.set_connection_status(ConnectionStatus::Disconnected);
                return;
            }

            if !streamed {
                streamed = true;
                store.set_message_kind(&session_id, &placeholder, MessageKind::Normal);
            }
            store.append_message_content(&session_id, &placeholder, payload);
        }
    };

    let on_error = {
        let store = store.clone();
        let session_id = session_id.clone();
        let placeholder = placeholder.clone();

        move |error: StreamError| {
            store.set_connection_status(ConnectionStatus::Error);
            store.set_typing(false);

            let nothing_streamed = store
                .message(&session_id, &placeholder)
                .is_some_and(|m| m.content.is_empty());
            if nothing_streamed {
                store.update_message_content(&session_id, &placeholder, &error.user_message());
            }
            store.set_message_kind(&session_id, &placeholder, MessageKind::Error);
        }
    };

    let on_close = {
        let store = store.clone();
        let connections = connections.clone();
        let session_id = session_id.clone();
        let placeholder = placeholder.clone();

        move |reason: CloseReason| {
            if reason != CloseReason::Cancelled {
                return;
            }

            let still_typing = store
                .message(&session_id, &placeholder)
                .is_some_and(|m| m.kind == MessageKind::Typing);
            if still_typing {
                store.set_message_kind(&session_id, &placeholder, MessageKind::Normal);
            }

            // Leave the indicators to a newer request on the same key
            if connections.connection_id(key).is_none() {
                store.set_typing(false);
                store.set_connection_status(ConnectionStatus::Disconnected);
            }
        }
    };

    StreamCallbacks::new()
        .on_open(on_open)
        .on_message(on_message)
        .on_error(on_error)
        .on_close(on_close)
}
