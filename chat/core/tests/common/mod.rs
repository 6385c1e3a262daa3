//! Shared helpers for chat-core integration tests

#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use chat_core::{StreamError, StreamTransport, TransportError, TransportEvent};
use tokio::sync::mpsc;

/// A stream opened through [`ScriptedTransport`], driven by the test
pub struct OpenedStream {
    /// Full target URL the manager built
    pub url: String,
    /// Feeds events to the connection task
    pub tx: mpsc::Sender<TransportEvent>,
}

impl OpenedStream {
    /// Push one fragment
    pub async fn data(&self, payload: &str) {
        self.tx
            .send(TransportEvent::Data(payload.to_string()))
            .await
            .expect("connection task gone");
    }

    /// Push a mid-stream failure
    pub async fn error(&self, error: StreamError) {
        self.tx
            .send(TransportEvent::Error(error))
            .await
            .expect("connection task gone");
    }
}

/// In-memory transport: every `open` hands the test a sender
pub struct ScriptedTransport {
    opened: mpsc::UnboundedSender<OpenedStream>,
    fail_with: Option<TransportError>,
}

impl ScriptedTransport {
    /// Transport whose opens succeed, plus the receiver of opened streams
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OpenedStream>) {
        let (opened, rx) = mpsc::unbounded_channel();
        (
            Self {
                opened,
                fail_with: None,
            },
            rx,
        )
    }

    /// Transport whose opens always fail with `error`
    pub fn failing(error: TransportError) -> Self {
        let (opened, _rx) = mpsc::unbounded_channel();
        Self {
            opened,
            fail_with: Some(error),
        }
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&self, url: &str) -> Result<mpsc::Receiver<TransportEvent>, StreamError> {
        if let Some(error) = &self.fail_with {
            return Err(StreamError::Transport(error.clone()));
        }
        let (tx, rx) = mpsc::channel(32);
        let _ = self.opened.send(OpenedStream {
            url: url.to_string(),
            tx,
        });
        Ok(rx)
    }
}

/// Wait for the next opened stream
pub async fn next_stream(rx: &mut mpsc::UnboundedReceiver<OpenedStream>) -> OpenedStream {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a stream to open")
        .expect("transport dropped")
}

/// Wait until `condition` holds, yielding to the runtime between checks
pub async fn until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
