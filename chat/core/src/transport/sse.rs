//! Server-Sent Events Transport
//!
//! HTTP implementation of [`StreamTransport`]. The request is a plain GET
//! with `Accept: text/event-stream`; the response body is decoded into
//! events by [`SseDecoder`] and each event's data is forwarded as one
//! fragment.
//!
//! # Wire Format
//!
//! ```text
//! data: He            <- one event, data "He"
//!
//! data: line one      <- one event, data "line one\nline two"
//! data: line two
//!
//! : keep-alive        <- comment, ignored
//! data:[DONE]         <- sentinel, still forwarded as a fragment
//!
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tokio::sync::mpsc;

use super::endpoint::{error_body_message, unexpected_json_body};
use super::error::{StreamError, TransportError};
use super::notify::{ErrorNotifier, TracingNotifier};
use super::traits::{StreamTransport, TransportEvent};
use crate::config::ChatConfig;

/// Incremental decoder for `text/event-stream` bodies
///
/// Feed it raw body chunks as they arrive; it returns the data of every
/// event completed by that chunk. Chunk boundaries may fall anywhere,
/// including inside a UTF-8 sequence or between `\r` and `\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of the current, not yet terminated line
    line: Vec<u8>,
    /// Data lines of the event being assembled
    data: Vec<String>,
    /// Whether the last byte seen was a `\r` line terminator
    after_cr: bool,
}

impl SseDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a body chunk, returning the data of completed events
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut events = Vec::new();

        for &byte in chunk {
            match byte {
                b'\n' if self.after_cr => {
                    // Second half of a CRLF terminator
                    self.after_cr = false;
                }
                b'\r' | b'\n' => {
                    self.after_cr = byte == b'\r';
                    let line = std::mem::take(&mut self.line);
                    if let Some(data) = self.process_line(&line) {
                        events.push(data);
                    }
                }
                _ => {
                    self.after_cr = false;
                    self.line.push(byte);
                }
            }
        }

        events
    }

    /// Whether a partial event is buffered
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.line.is_empty() || !self.data.is_empty()
    }

    fn process_line(&mut self, line: &[u8]) -> Option<String> {
        if line.is_empty() {
            // Blank line dispatches the event
            if self.data.is_empty() {
                return None;
            }
            return Some(std::mem::take(&mut self.data).join("\n"));
        }

        let line = String::from_utf8_lossy(line);
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_ref(), ""),
        };

        // event, id and retry carry nothing the manager needs
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}

/// Event-stream transport over HTTP
#[derive(Clone)]
pub struct SseTransport {
    /// HTTP client
    http_client: reqwest::Client,
    /// Buffer between the body reader and the connection task
    channel_capacity: usize,
    /// Receives one notification per failed open
    notifier: Arc<dyn ErrorNotifier>,
}

impl SseTransport {
    /// Default buffer between the body reader and the connection task
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

    /// Create a transport
    ///
    /// Only the connect phase is bounded by `connect_timeout`; a stream may
    /// legitimately stay open for as long as the server keeps talking.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (e.g., the TLS
    /// backend fails to initialize).
    pub fn new(connect_timeout: Duration, channel_capacity: usize) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            channel_capacity: channel_capacity.max(1),
            notifier: Arc::new(TracingNotifier),
        })
    }

    /// Create a transport from loaded configuration
    ///
    /// # Errors
    ///
    /// See [`SseTransport::new`].
    pub fn from_config(config: &ChatConfig) -> Result<Self, TransportError> {
        Self::new(config.connect_timeout, config.channel_capacity)
    }

    /// Replace the failure notifier
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn ErrorNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    fn fail(&self, error: TransportError) -> StreamError {
        self.notifier.notify(&error);
        StreamError::Transport(error)
    }
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StreamTransport for SseTransport {
    fn name(&self) -> &str {
        "sse"
    }

    async fn open(&self, url: &str) -> Result<mpsc::Receiver<TransportEvent>, StreamError> {
        let response = self
            .http_client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| self.fail(e.into()))?;

        // Check for HTTP errors
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = TransportError::from_status(status.as_u16(), error_body_message(&body));
            return Err(self.fail(error));
        }

        // A JSON reply here is an envelope rejecting the request
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));
        if is_json {
            let body = response.text().await.map_err(|e| self.fail(e.into()))?;
            return Err(self.fail(unexpected_json_body(status.as_u16(), &body)));
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let mut body = response.bytes_stream();

        // Spawn task to decode the body
        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();

            loop {
                let chunk = tokio::select! {
                    // Receiver dropped: stop reading and release the connection
                    () = tx.closed() => return,
                    chunk = body.next() => chunk,
                };

                match chunk {
                    Some(Ok(bytes)) => {
                        for data in decoder.feed(&bytes) {
                            if tx.send(TransportEvent::Data(data)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let error = StreamError::Transport(TransportError::from(e));
                        let _ = tx.send(TransportEvent::Error(error)).await;
                        return;
                    }
                    None => break,
                }
            }

            if decoder.has_pending() {
                tracing::debug!("Event stream ended inside an unterminated event");
            }
        });

        Ok(rx)
    }
}
