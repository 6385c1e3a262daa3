//! HTTP Transport Collaborator
//!
//! Everything the chat core needs from the network, and nothing more:
//!
//! - [`StreamTransport`]: open a channel of ordered text fragments
//! - [`SseTransport`]: the HTTP/event-stream implementation
//! - [`resolve_base_url`]: endpoint base address per deployment
//! - [`TransportError`]: status codes classified into user-facing categories
//! - [`ErrorNotifier`]: one notification per failed call
//!
//! # Usage
//!
//! ```ignore
//! use chat_core::transport::{SseTransport, StreamTransport};
//!
//! let transport = SseTransport::new(Duration::from_secs(10), 100)?;
//! let mut rx = transport.open("http://localhost:8123/api/ai/manus/chat?message=hi").await?;
//! while let Some(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! ```

mod endpoint;
mod error;
mod notify;
mod sse;
mod traits;

pub use endpoint::{
    resolve_base_url, ApiResponse, DeploymentEnv, API_SUCCESS_CODE, DEVELOPMENT_BASE_URL,
    PRODUCTION_BASE_URL,
};
pub use error::{StreamError, TransportError};
pub use notify::{ErrorNotifier, TracingNotifier};
pub use sse::{SseDecoder, SseTransport};
pub use traits::{StreamTransport, TransportEvent};
