//! Connection Manager Implementation
//!
//! Owns the registry of live streams and the per-connection tasks that
//! deliver their fragments.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::sync::{mpsc, oneshot};

use crate::transport::{StreamError, StreamTransport, TransportEvent};

/// Payload that marks normal completion of a stream
pub const STREAM_DONE_SENTINEL: &str = "[DONE]";

// ============================================================================
// Callbacks
// ============================================================================

/// Why a connection ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The sentinel arrived
    Completed,
    /// The transport failed (`on_error` already fired)
    Failed,
    /// Closed by `close`, `close_all`, or a newer `connect` on the same key
    Cancelled,
}

type OpenCallback = Box<dyn FnOnce() + Send>;
type MessageCallback = Box<dyn FnMut(&str) + Send>;
type ErrorCallback = Box<dyn FnOnce(StreamError) + Send>;
type CloseCallback = Box<dyn FnOnce(CloseReason) + Send>;

/// Callbacks for one connection
///
/// All callbacks of a connection run sequentially on that connection's
/// task. `on_open`, `on_error` and `on_close` fire at most once.
#[derive(Default)]
pub struct StreamCallbacks {
    on_open: Option<OpenCallback>,
    on_message: Option<MessageCallback>,
    on_error: Option<ErrorCallback>,
    on_close: Option<CloseCallback>,
}

impl StreamCallbacks {
    /// Create an empty callback set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when the transport signals readiness
    #[must_use]
    pub fn on_open(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_open = Some(Box::new(f));
        self
    }

    /// Called for every fragment, including the sentinel
    #[must_use]
    pub fn on_message(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    /// Called once if the transport fails
    #[must_use]
    pub fn on_error(mut self, f: impl FnOnce(StreamError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called once when the connection ends, for any reason
    #[must_use]
    pub fn on_close(mut self, f: impl FnOnce(CloseReason) + Send + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Identifies one connection (distinct from its key, which is reused)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Get the raw ID value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct ConnectionEntry {
    id: ConnectionId,
    url: String,
    opened_at: Instant,
    /// Dropping or firing this cancels the connection task
    shutdown: oneshot::Sender<()>,
}

impl ConnectionEntry {
    fn cancel(self, key: &str) {
        tracing::info!(
            key = %key,
            connection_id = %self.id,
            url = %self.url,
            open_ms = self.opened_at.elapsed().as_millis() as u64,
            "Closing stream connection"
        );
        let _ = self.shutdown.send(());
    }
}

#[derive(Default)]
struct Registry {
    connections: HashMap<String, ConnectionEntry>,
    next_id: u64,
    total_opened: u64,
}

impl Registry {
    /// Remove the entry for `key` only if it is still connection `id`
    fn remove_if_current(&mut self, key: &str, id: ConnectionId) -> Option<ConnectionEntry> {
        if self.connections.get(key).is_some_and(|entry| entry.id == id) {
            self.connections.remove(key)
        } else {
            None
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Caller's handle to one connection
///
/// Closing through a handle only affects the connection it was issued for;
/// once a newer connection has replaced it under the same key, the handle
/// is inert.
#[derive(Clone)]
pub struct StreamHandle {
    key: String,
    id: ConnectionId,
    registry: Weak<Mutex<Registry>>,
}

impl StreamHandle {
    /// Key the connection was registered under
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// ID of this connection
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether this connection is still registered
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|registry| {
            registry
                .lock()
                .connections
                .get(&self.key)
                .is_some_and(|entry| entry.id == self.id)
        })
    }

    /// Close this connection; returns whether it was still live
    pub fn close(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let removed = registry.lock().remove_if_current(&self.key, self.id);
        match removed {
            Some(entry) => {
                entry.cancel(&self.key);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection Manager
// ============================================================================

/// Manages live streams, at most one per key
///
/// Constructed around a [`StreamTransport`] and passed to whoever needs it;
/// clones share the same registry.
#[derive(Clone)]
pub struct ConnectionManager {
    transport: Arc<dyn StreamTransport>,
    registry: Arc<Mutex<Registry>>,
}

impl ConnectionManager {
    /// Create a manager over a transport
    pub fn new(transport: impl StreamTransport + 'static) -> Self {
        Self::with_transport(Arc::new(transport))
    }

    /// Create a manager over a shared transport
    #[must_use]
    pub fn with_transport(transport: Arc<dyn StreamTransport>) -> Self {
        Self {
            transport,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Open a stream under `key`, replacing any live stream with that key
    ///
    /// The target is `base_url + path`, plus `?` and the percent-encoded
    /// `params` when there are any. Returns immediately; opening and
    /// delivery happen on a spawned task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn connect(
        &self,
        key: impl Into<String>,
        base_url: &str,
        path: &str,
        params: &[(&str, &str)],
        callbacks: StreamCallbacks,
    ) -> StreamHandle {
        let key = key.into();
        let url = build_stream_url(base_url, path, params);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let (id, replaced) = {
            let mut registry = self.registry.lock();
            let id = ConnectionId(registry.next_id);
            registry.next_id += 1;
            registry.total_opened += 1;

            let entry = ConnectionEntry {
                id,
                url: url.clone(),
                opened_at: Instant::now(),
                shutdown: shutdown_tx,
            };
            (id, registry.connections.insert(key.clone(), entry))
        };

        if let Some(previous) = replaced {
            previous.cancel(&key);
        }

        tracing::info!(
            key = %key,
            connection_id = %id,
            transport = self.transport.name(),
            url = %url,
            "Opening stream connection"
        );

        let task = ConnectionTask {
            key: key.clone(),
            id,
            url,
            transport: Arc::clone(&self.transport),
            registry: Arc::downgrade(&self.registry),
            callbacks,
            fragments: 0,
        };
        tokio::spawn(task.run(shutdown_rx));

        StreamHandle {
            key,
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Close the stream registered under `key`; no-op if there is none
    pub fn close(&self, key: &str) -> bool {
        let removed = self.registry.lock().connections.remove(key);
        match removed {
            Some(entry) => {
                entry.cancel(key);
                true
            }
            None => false,
        }
    }

    /// Close every live stream
    pub fn close_all(&self) {
        let drained: Vec<(String, ConnectionEntry)> =
            self.registry.lock().connections.drain().collect();

        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "Closing all stream connections");
        }
        for (key, entry) in drained {
            entry.cancel(&key);
        }
    }

    /// Check if a key has a live stream
    #[must_use]
    pub fn is_connected(&self, key: &str) -> bool {
        self.registry.lock().connections.contains_key(key)
    }

    /// ID of the live stream under `key`
    #[must_use]
    pub fn connection_id(&self, key: &str) -> Option<ConnectionId> {
        self.registry.lock().connections.get(key).map(|entry| entry.id)
    }

    /// Get the number of live streams
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.registry.lock().connections.len()
    }

    /// Keys of all live streams
    #[must_use]
    pub fn active_keys(&self) -> Vec<String> {
        self.registry.lock().connections.keys().cloned().collect()
    }

    /// Check if no streams are live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.lock().connections.is_empty()
    }

    /// Get total number of connections opened (lifetime)
    #[must_use]
    pub fn total_connections_opened(&self) -> u64 {
        self.registry.lock().total_opened
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("transport", &self.transport.name())
            .field("active", &self.active_count())
            .finish()
    }
}

/// Characters escaped in query keys and values
///
/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is percent-encoded,
/// so a space becomes `%20`.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Build `base_url + path [+ "?" + query]`
///
/// Keys and values are percent-encoded and joined with `&` in the given
/// order.
#[must_use]
pub fn build_stream_url(base_url: &str, path: &str, params: &[(&str, &str)]) -> String {
    let mut url = format!("{base_url}{path}");

    for (index, (key, value)) in params.iter().enumerate() {
        url.push(if index == 0 { '?' } else { '&' });
        url.extend(utf8_percent_encode(key, QUERY_COMPONENT));
        url.push('=');
        url.extend(utf8_percent_encode(value, QUERY_COMPONENT));
    }
    url
}

// ============================================================================
// Connection Task
// ============================================================================

/// Drives one connection: open, deliver, finish
struct ConnectionTask {
    key: String,
    id: ConnectionId,
    url: String,
    transport: Arc<dyn StreamTransport>,
    registry: Weak<Mutex<Registry>>,
    callbacks: StreamCallbacks,
    fragments: u64,
}

enum Step {
    Continue,
    Finished(CloseReason),
}

impl ConnectionTask {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let opened = tokio::select! {
            biased;
            _ = &mut shutdown => {
                self.finish(CloseReason::Cancelled);
                return;
            }
            result = self.transport.open(&self.url) => result,
        };

        let mut events = match opened {
            Ok(events) => events,
            Err(error) => {
                self.fail(error);
                return;
            }
        };

        tracing::debug!(key = %self.key, connection_id = %self.id, "Stream connection opened");
        if let Some(on_open) = self.callbacks.on_open.take() {
            on_open();
        }

        let reason = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break CloseReason::Cancelled,
                event = events.recv() => {
                    if let Step::Finished(reason) = self.handle_event(event) {
                        break reason;
                    }
                }
            }
        };

        self.finish(reason);
    }

    fn handle_event(&mut self, event: Option<TransportEvent>) -> Step {
        match event {
            Some(TransportEvent::Data(payload)) => {
                self.fragments += 1;
                if let Some(on_message) = self.callbacks.on_message.as_mut() {
                    on_message(&payload);
                }

                if payload == STREAM_DONE_SENTINEL {
                    tracing::info!(
                        key = %self.key,
                        connection_id = %self.id,
                        fragments = self.fragments,
                        "Stream completed"
                    );
                    self.deregister();
                    Step::Finished(CloseReason::Completed)
                } else {
                    Step::Continue
                }
            }
            Some(TransportEvent::Error(error)) => {
                self.report_error(error);
                Step::Finished(CloseReason::Failed)
            }
            None => {
                // Channel closed without the sentinel
                self.report_error(StreamError::Disconnected);
                Step::Finished(CloseReason::Failed)
            }
        }
    }

    fn fail(mut self, error: StreamError) {
        self.report_error(error);
        self.finish(CloseReason::Failed);
    }

    fn report_error(&mut self, error: StreamError) {
        tracing::warn!(
            key = %self.key,
            connection_id = %self.id,
            fragments = self.fragments,
            error = %error,
            "Stream connection failed"
        );
        if let Some(on_error) = self.callbacks.on_error.take() {
            on_error(error);
        }
        self.deregister();
    }

    /// Drop our registry entry, unless a newer connection owns the key
    fn deregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove_if_current(&self.key, self.id);
        }
    }

    fn finish(mut self, reason: CloseReason) {
        tracing::debug!(
            key = %self.key,
            connection_id = %self.id,
            reason = ?reason,
            "Stream connection closed"
        );
        if let Some(on_close) = self.callbacks.on_close.take() {
            on_close(reason);
        }
    }
}
