//! Stream Transport Traits
//!
//! The connection manager does not care how fragments travel. Anything that
//! can "open a channel delivering ordered text fragments plus an error or
//! end-of-stream signal" satisfies [`StreamTransport`]: an SSE response
//! body, a WebSocket, or an in-memory channel in tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::StreamError;

/// Event delivered by an open transport channel
///
/// The channel closing without a sentinel fragment means the server hung up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// One server-pushed text fragment
    Data(String),
    /// The transport failed; no further events follow
    Error(StreamError),
}

/// Capability to open keyed streaming channels
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Transport name for logging (e.g., "sse")
    fn name(&self) -> &str;

    /// Open a stream to the fully-built target URL
    ///
    /// Returning `Ok` signals readiness. Fragments arrive on the receiver in
    /// the order the server emitted them.
    async fn open(&self, url: &str) -> Result<mpsc::Receiver<TransportEvent>, StreamError>;
}
