//! Session Store
//!
//! Holds every chat session, the active selection, and the process-wide
//! connectivity and typing indicators.
//!
//! # Ownership
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ SessionStore (cloneable handle)                      │
//! │   state:     Arc<RwLock<StoreState>>                 │
//! │     ├─ sessions: Vec<Session>   (creation order)     │
//! │     ├─ current_session_id                            │
//! │     ├─ connection_status                             │
//! │     └─ is_typing                                     │
//! │   listeners: Arc<RwLock<Vec<(id, StoreListener)>>>   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Callers hold identifiers, never references into the collections: read
//! accessors return snapshots, and all mutation goes through the methods
//! below. Every mutation that changes something emits exactly one
//! [`StoreEvent`] to subscribed listeners after the state lock is released,
//! so listeners may read the store freely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::messages::{ConnectionStatus, ConversationVariant, MessageId, MessageKind, SessionId};
use crate::session::{Message, NewMessage, Session};

/// Notification emitted after a store mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    /// A session was created (and selected)
    SessionCreated {
        /// The new session
        session_id: SessionId,
    },
    /// A message was appended
    MessageAdded {
        /// Session the message belongs to
        session_id: SessionId,
        /// The new message
        message_id: MessageId,
    },
    /// A message's content or kind changed
    MessageUpdated {
        /// Session the message belongs to
        session_id: SessionId,
        /// The changed message
        message_id: MessageId,
    },
    /// A session's history was emptied
    SessionCleared {
        /// The cleared session
        session_id: SessionId,
    },
    /// A session was removed
    SessionDeleted {
        /// The removed session
        session_id: SessionId,
    },
    /// The active selection changed
    SelectionChanged {
        /// The newly selected session, if any
        session_id: Option<SessionId>,
    },
    /// The connection indicator changed
    ConnectionStatusChanged(ConnectionStatus),
    /// The typing indicator changed
    TypingChanged(bool),
}

/// Callback invoked for every [`StoreEvent`]
pub type StoreListener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Handle returned by [`SessionStore::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Default)]
struct StoreState {
    sessions: Vec<Session>,
    current_session_id: Option<SessionId>,
    connection_status: ConnectionStatus,
    is_typing: bool,
}

impl StoreState {
    fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    fn session_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }
}

/// Owner of all chat sessions
///
/// Cloning produces another handle to the same store.
#[derive(Clone, Default)]
pub struct SessionStore {
    state: Arc<RwLock<StoreState>>,
    listeners: Arc<RwLock<Vec<(SubscriptionId, StoreListener)>>>,
    next_subscription: Arc<AtomicU64>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("SessionStore")
            .field("sessions", &state.sessions.len())
            .field("current_session_id", &state.current_session_id)
            .field("connection_status", &state.connection_status)
            .field("is_typing", &state.is_typing)
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Register a listener for store events
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(sub, _)| *sub != id);
        listeners.len() != before
    }

    fn emit(&self, event: StoreEvent) {
        let listeners: Vec<StoreListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(&event);
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create a session, select it, and return its ID
    ///
    /// Without a title (or with a blank one) the variant's default title is
    /// used.
    pub fn create_session(&self, variant: ConversationVariant, title: Option<&str>) -> SessionId {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| variant.default_title())
            .to_string();

        let id = {
            let mut state = self.state.write();
            let mut id = SessionId::generate(variant);
            while state.session(&id).is_some() {
                id = SessionId::generate(variant);
            }
            state.sessions.push(Session::new(id.clone(), title));
            state.current_session_id = Some(id.clone());
            id
        };

        tracing::debug!(session_id = %id, variant = %variant, "Created session");

        self.emit(StoreEvent::SessionCreated {
            session_id: id.clone(),
        });
        self.emit(StoreEvent::SelectionChanged {
            session_id: Some(id.clone()),
        });
        id
    }

    /// Append a message to a session
    ///
    /// Returns `None` without error when the session no longer exists: a
    /// late stream fragment for a deleted session is dropped.
    pub fn add_message(&self, session_id: &SessionId, message: NewMessage) -> Option<MessageId> {
        let message_id = {
            let mut state = self.state.write();
            let Some(session) = state.session_mut(session_id) else {
                tracing::debug!(session_id = %session_id, "Dropping message for missing session");
                return None;
            };
            session.push_message(message)
        };

        self.emit(StoreEvent::MessageAdded {
            session_id: session_id.clone(),
            message_id: message_id.clone(),
        });
        Some(message_id)
    }

    /// Replace a message's content in place
    ///
    /// No-op (returns `false`) if the session or message is missing.
    pub fn update_message_content(
        &self,
        session_id: &SessionId,
        message_id: &MessageId,
        content: &str,
    ) -> bool {
        let updated = self
            .state
            .write()
            .session_mut(session_id)
            .is_some_and(|session| session.update_content(message_id, content));

        if updated {
            self.emit(StoreEvent::MessageUpdated {
                session_id: session_id.clone(),
                message_id: message_id.clone(),
            });
        }
        updated
    }

    /// Append a streamed fragment to a message's content
    ///
    /// No-op (returns `false`) if the session or message is missing.
    pub fn append_message_content(
        &self,
        session_id: &SessionId,
        message_id: &MessageId,
        fragment: &str,
    ) -> bool {
        let updated = self
            .state
            .write()
            .session_mut(session_id)
            .is_some_and(|session| session.append_content(message_id, fragment));

        if updated {
            self.emit(StoreEvent::MessageUpdated {
                session_id: session_id.clone(),
                message_id: message_id.clone(),
            });
        }
        updated
    }

    /// Change a message's kind in place
    ///
    /// No-op (returns `false`) if the session or message is missing.
    pub fn set_message_kind(
        &self,
        session_id: &SessionId,
        message_id: &MessageId,
        kind: MessageKind,
    ) -> bool {
        let updated = self
            .state
            .write()
            .session_mut(session_id)
            .is_some_and(|session| session.set_kind(message_id, kind));

        if updated {
            self.emit(StoreEvent::MessageUpdated {
                session_id: session_id.clone(),
                message_id: message_id.clone(),
            });
        }
        updated
    }

    /// Empty a session's history, keeping the session itself
    pub fn clear_session(&self, session_id: &SessionId) -> bool {
        let cleared = match self.state.write().session_mut(session_id) {
            Some(session) => {
                session.clear_history();
                true
            }
            None => false,
        };

        if cleared {
            self.emit(StoreEvent::SessionCleared {
                session_id: session_id.clone(),
            });
        }
        cleared
    }

    /// Remove a session
    ///
    /// If it was selected, the selection moves to the first remaining
    /// session, or to none when the store is empty.
    pub fn delete_session(&self, session_id: &SessionId) -> bool {
        let selection = {
            let mut state = self.state.write();
            let Some(index) = state.sessions.iter().position(|s| &s.id == session_id) else {
                return false;
            };
            state.sessions.remove(index);

            if state.current_session_id.as_ref() == Some(session_id) {
                state.current_session_id = state.sessions.first().map(|s| s.id.clone());
                Some(state.current_session_id.clone())
            } else {
                None
            }
        };

        tracing::debug!(session_id = %session_id, "Deleted session");

        self.emit(StoreEvent::SessionDeleted {
            session_id: session_id.clone(),
        });
        if let Some(session_id) = selection {
            self.emit(StoreEvent::SelectionChanged { session_id });
        }
        true
    }

    /// Select an existing session
    pub fn select_session(&self, session_id: &SessionId) -> bool {
        {
            let mut state = self.state.write();
            if state.session(session_id).is_none() {
                return false;
            }
            if state.current_session_id.as_ref() == Some(session_id) {
                return true;
            }
            state.current_session_id = Some(session_id.clone());
        }

        self.emit(StoreEvent::SelectionChanged {
            session_id: Some(session_id.clone()),
        });
        true
    }

    /// Update the process-wide connection indicator
    pub fn set_connection_status(&self, status: ConnectionStatus) {
        let changed = {
            let mut state = self.state.write();
            std::mem::replace(&mut state.connection_status, status) != status
        };
        if changed {
            self.emit(StoreEvent::ConnectionStatusChanged(status));
        }
    }

    /// Update the process-wide typing indicator
    pub fn set_typing(&self, typing: bool) {
        let changed = {
            let mut state = self.state.write();
            std::mem::replace(&mut state.is_typing, typing) != typing
        };
        if changed {
            self.emit(StoreEvent::TypingChanged(typing));
        }
    }

    // ------------------------------------------------------------------
    // Read views
    // ------------------------------------------------------------------

    /// ID of the selected session, if any
    #[must_use]
    pub fn current_session_id(&self) -> Option<SessionId> {
        self.state.read().current_session_id.clone()
    }

    /// Snapshot of the selected session
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        let state = self.state.read();
        let id = state.current_session_id.as_ref()?;
        state.session(id).cloned()
    }

    /// Messages of the selected session (empty when nothing is selected)
    #[must_use]
    pub fn current_messages(&self) -> Vec<Message> {
        self.current_session()
            .map(|session| session.messages)
            .unwrap_or_default()
    }

    /// Snapshot of a session by ID
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<Session> {
        self.state.read().session(session_id).cloned()
    }

    /// Snapshot of a single message
    #[must_use]
    pub fn message(&self, session_id: &SessionId, message_id: &MessageId) -> Option<Message> {
        self.state
            .read()
            .session(session_id)
            .and_then(|s| s.get_message(message_id))
            .cloned()
    }

    /// Snapshots of all sessions, in creation order
    #[must_use]
    pub fn sessions(&self) -> Vec<Session> {
        self.state.read().sessions.clone()
    }

    /// Number of sessions
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.state.read().sessions.len()
    }

    /// Whether a session exists
    #[must_use]
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.state.read().session(session_id).is_some()
    }

    /// Current connection indicator
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.state.read().connection_status
    }

    /// Current typing indicator
    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.state.read().is_typing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn recording_store() -> (SessionStore, Arc<Mutex<Vec<StoreEvent>>>) {
        let store = SessionStore::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        store.subscribe(move |event| sink.lock().push(event.clone()));
        (store, events)
    }

    #[test]
    fn test_create_session_selects_it() {
        let store = SessionStore::new();
        let id = store.create_session(ConversationVariant::Love, None);

        assert_eq!(store.current_session_id(), Some(id.clone()));
        let session = store.current_session().unwrap();
        assert_eq!(session.id, id);
        assert!(!session.title.is_empty());
        assert!(session.messages.is_empty());
        assert!(id.as_str().starts_with("love_"));
    }

    #[test]
    fn test_create_session_custom_title() {
        let store = SessionStore::new();
        let id = store.create_session(ConversationVariant::Super, Some("Trip planning"));
        assert_eq!(store.session(&id).unwrap().title, "Trip planning");

        let id = store.create_session(ConversationVariant::Super, Some("   "));
        assert_eq!(
            store.session(&id).unwrap().title,
            ConversationVariant::Super.default_title()
        );
    }

    #[test]
    fn test_session_ids_unique() {
        let store = SessionStore::new();
        let mut ids: Vec<SessionId> = (0..50)
            .map(|_| store.create_session(ConversationVariant::Love, None))
            .collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_add_message_in_order() {
        let store = SessionStore::new();
        let id = store.create_session(ConversationVariant::Love, None);

        let message_ids: Vec<MessageId> = (0..5)
            .map(|i| {
                store
                    .add_message(&id, NewMessage::user(format!("m{i}")))
                    .unwrap()
            })
            .collect();

        let messages = store.current_messages();
        let contents: Vec<String> = messages.iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);

        let stored_ids: Vec<MessageId> = messages.into_iter().map(|m| m.id).collect();
        assert_eq!(stored_ids, message_ids);
    }

    #[test]
    fn test_add_message_missing_session_is_noop() {
        let (store, events) = recording_store();
        let ghost = SessionId("love_0_ghost0000".to_string());

        assert!(store.add_message(&ghost, NewMessage::user("late")).is_none());
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_update_message_content() {
        let store = SessionStore::new();
        let id = store.create_session(ConversationVariant::Love, None);
        let msg = store.add_message(&id, NewMessage::typing_placeholder()).unwrap();

        assert!(store.update_message_content(&id, &msg, "He"));
        assert!(store.update_message_content(&id, &msg, "Hello"));
        assert_eq!(store.message(&id, &msg).unwrap().content, "Hello");

        let other = MessageId("msg_0_unknown00".to_string());
        assert!(!store.update_message_content(&id, &other, "x"));
        let ghost = SessionId("super_0_ghost0000".to_string());
        assert!(!store.update_message_content(&ghost, &msg, "x"));
    }

    #[test]
    fn test_append_message_content() {
        let (store, events) = recording_store();
        let id = store.create_session(ConversationVariant::Super, None);
        let msg = store.add_message(&id, NewMessage::typing_placeholder()).unwrap();
        events.lock().clear();

        for fragment in ["Mon", "day", ": rest"] {
            assert!(store.append_message_content(&id, &msg, fragment));
        }
        assert_eq!(store.message(&id, &msg).unwrap().content, "Monday: rest");
        assert_eq!(events.lock().len(), 3);

        let ghost = SessionId("super_0_ghost0000".to_string());
        assert!(!store.append_message_content(&ghost, &msg, "x"));
        assert_eq!(events.lock().len(), 3);
    }

    #[test]
    fn test_updated_at_monotonic() {
        let store = SessionStore::new();
        let id = store.create_session(ConversationVariant::Love, None);
        let mut last = store.session(&id).unwrap().updated_at;

        let msg = store.add_message(&id, NewMessage::user("a")).unwrap();
        let now = store.session(&id).unwrap().updated_at;
        assert!(now >= last);
        last = now;

        store.update_message_content(&id, &msg, "b");
        let now = store.session(&id).unwrap().updated_at;
        assert!(now >= last);
        last = now;

        store.clear_session(&id);
        let now = store.session(&id).unwrap().updated_at;
        assert!(now >= last);
    }

    #[test]
    fn test_clear_session_keeps_session() {
        let store = SessionStore::new();
        let id = store.create_session(ConversationVariant::Love, Some("Keep me"));
        store.add_message(&id, NewMessage::user("hi"));

        assert!(store.clear_session(&id));
        let session = store.session(&id).unwrap();
        assert!(session.messages.is_empty());
        assert_eq!(session.title, "Keep me");
        assert_eq!(store.current_session_id(), Some(id));
    }

    #[test]
    fn test_delete_active_moves_selection_to_first() {
        let store = SessionStore::new();
        let first = store.create_session(ConversationVariant::Love, None);
        let second = store.create_session(ConversationVariant::Super, None);
        let third = store.create_session(ConversationVariant::Love, None);
        assert_eq!(store.current_session_id(), Some(third.clone()));

        assert!(store.delete_session(&third));
        assert_eq!(store.current_session_id(), Some(first.clone()));

        assert!(store.delete_session(&first));
        assert_eq!(store.current_session_id(), Some(second.clone()));

        assert!(store.delete_session(&second));
        assert_eq!(store.current_session_id(), None);
        assert!(store.current_messages().is_empty());
        assert!(store.current_session().is_none());
    }

    #[test]
    fn test_delete_inactive_keeps_selection() {
        let store = SessionStore::new();
        let first = store.create_session(ConversationVariant::Love, None);
        let second = store.create_session(ConversationVariant::Love, None);

        assert!(store.delete_session(&first));
        assert_eq!(store.current_session_id(), Some(second));
        assert!(!store.delete_session(&first));
    }

    #[test]
    fn test_select_session() {
        let store = SessionStore::new();
        let first = store.create_session(ConversationVariant::Love, None);
        let _second = store.create_session(ConversationVariant::Love, None);

        assert!(store.select_session(&first));
        assert_eq!(store.current_session_id(), Some(first));

        let ghost = SessionId("love_0_ghost0000".to_string());
        assert!(!store.select_session(&ghost));
    }

    #[test]
    fn test_indicators() {
        let store = SessionStore::new();
        assert_eq!(store.connection_status(), ConnectionStatus::Disconnected);
        assert!(!store.is_typing());

        store.set_connection_status(ConnectionStatus::Connected);
        store.set_typing(true);
        assert_eq!(store.connection_status(), ConnectionStatus::Connected);
        assert!(store.is_typing());
    }

    #[test]
    fn test_events_emitted_once_per_effective_mutation() {
        let (store, events) = recording_store();

        let id = store.create_session(ConversationVariant::Love, None);
        let msg = store.add_message(&id, NewMessage::user("hi")).unwrap();
        store.update_message_content(&id, &msg, "hello");
        store.set_typing(true);
        store.set_typing(true);
        store.set_connection_status(ConnectionStatus::Disconnected);
        store.delete_session(&id);

        assert_eq!(
            *events.lock(),
            vec![
                StoreEvent::SessionCreated {
                    session_id: id.clone()
                },
                StoreEvent::SelectionChanged {
                    session_id: Some(id.clone())
                },
                StoreEvent::MessageAdded {
                    session_id: id.clone(),
                    message_id: msg.clone()
                },
                StoreEvent::MessageUpdated {
                    session_id: id.clone(),
                    message_id: msg
                },
                StoreEvent::TypingChanged(true),
                StoreEvent::SessionDeleted {
                    session_id: id.clone()
                },
                StoreEvent::SelectionChanged { session_id: None },
            ]
        );
    }

    #[test]
    fn test_listener_can_read_store() {
        let store = SessionStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = store.clone();
        let sink = Arc::clone(&seen);
        store.subscribe(move |event| {
            if let StoreEvent::MessageAdded {
                session_id,
                message_id,
            } = event
            {
                let content = reader.message(session_id, message_id).map(|m| m.content);
                sink.lock().push(content);
            }
        });

        let id = store.create_session(ConversationVariant::Love, None);
        store.add_message(&id, NewMessage::user("visible"));
        assert_eq!(*seen.lock(), vec![Some("visible".to_string())]);
    }

    #[test]
    fn test_unsubscribe() {
        let (store, events) = recording_store();
        let counter = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&counter);
        let sub = store.subscribe(move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        });

        store.set_typing(true);
        assert!(store.unsubscribe(sub));
        assert!(!store.unsubscribe(sub));
        store.set_typing(false);

        assert_eq!(counter.load(Ordering::Relaxed), 1);
        assert_eq!(events.lock().len(), 2);
    }
}
