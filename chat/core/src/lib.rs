//! Chat Core - Streaming Chat Sessions
//!
//! This crate provides the session side of a streaming chat client,
//! independent of any UI. It opens server-pushed event streams, assembles
//! their fragments into ordered chat sessions, and exposes the active
//! session and connectivity state to whatever renders it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 UI / CLI (external consumers)                 │
//! │        subscribe(StoreEvent)          send_message(...)       │
//! └──────────────┬──────────────────────────────┬────────────────┘
//!                │                              │
//! ┌──────────────┴───────────┐   ┌──────────────┴───────────────┐
//! │      SessionStore        │◄──┤       ChatDispatcher         │
//! │  sessions, selection,    │   │  variant ─► path + params    │
//! │  status, typing          │   │  callbacks ─► store          │
//! └──────────────────────────┘   └──────────────┬───────────────┘
//!                                               │
//!                                ┌──────────────┴───────────────┐
//!                                │     ConnectionManager        │
//!                                │  one live stream per key     │
//!                                └──────────────┬───────────────┘
//!                                               │ StreamTransport
//!                                ┌──────────────┴───────────────┐
//!                                │  SseTransport (reqwest)      │
//!                                │  base URL, error classes     │
//!                                └──────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use chat_core::{
//!     load_config, ChatDispatcher, ConnectionManager, ConversationVariant, SessionStore,
//!     SseTransport,
//! };
//!
//! let config = load_config()?;
//! let connections = ConnectionManager::new(SseTransport::from_config(&config)?);
//! let store = SessionStore::new();
//! let dispatcher = ChatDispatcher::new(connections, store.clone(), config.resolved_base_url());
//!
//! let session = store.create_session(ConversationVariant::Love, None);
//! let reply = dispatcher.send_message(&session, ConversationVariant::Love, "hi")?;
//! ```
//!
//! # Module Overview
//!
//! - [`messages`]: Identifiers, roles, kinds, status and variant tags
//! - [`session`]: Sessions and their messages
//! - [`store`]: The session store and its change notifications
//! - [`streaming`]: Keyed stream connections
//! - [`transport`]: HTTP event-stream transport, base URLs, error classes
//! - [`dispatcher`]: Variant routing and the store glue
//! - [`config`]: TOML and environment configuration

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dispatcher;
pub mod messages;
pub mod session;
pub mod store;
pub mod streaming;
pub mod transport;

// Re-exports for convenience
pub use dispatcher::{
    endpoint_path, ChatDispatcher, DispatchError, PendingReply, LOVE_APP_CHAT_PATH,
    MANUS_CHAT_PATH,
};
pub use messages::{
    ConnectionStatus, ConversationVariant, MessageId, MessageKind, MessageRole, SessionId,
};
pub use session::{Message, NewMessage, Session};
pub use store::{SessionStore, StoreEvent, SubscriptionId};

// Streaming exports
pub use streaming::{
    build_stream_url, CloseReason, ConnectionId, ConnectionManager, StreamCallbacks, StreamHandle,
    STREAM_DONE_SENTINEL,
};

// Transport exports
pub use transport::{
    resolve_base_url, DeploymentEnv, ErrorNotifier, SseTransport, StreamError, StreamTransport,
    TransportError, TransportEvent,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, load_config_with_env, ChatConfig,
    ChatToml, ConfigError, ConfigOverrides, ConfigSource,
};
