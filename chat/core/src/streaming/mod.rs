//! Keyed Stream Connections
//!
//! The connection manager keeps at most one live server-push stream per
//! key and delivers each stream's fragments to caller-supplied callbacks.
//!
//! # Design Philosophy
//!
//! The manager is an ordinary value built around a transport and handed to
//! whoever needs it. There is no global registry: two managers never see
//! each other's connections.
//!
//! ```text
//! connect(key, base, path, params, callbacks)
//!        │
//!        ├─► registry[key] = entry   (old entry dropped ─► old task Cancelled)
//!        │
//!        └─► spawn ConnectionTask
//!                 │ transport.open(url)
//!                 ├── Err ──────────────► on_error ─► on_close(Failed)
//!                 │ on_open
//!                 ▼
//!              fragments ─► on_message (in order)
//!                 │
//!                 ├── "[DONE]" ─────────► deregister ─► on_close(Completed)
//!                 ├── error / hang-up ──► on_error ─► deregister ─► on_close(Failed)
//!                 └── close(key) ───────► on_close(Cancelled)
//! ```
//!
//! A connection only ever removes its own registry entry, so a task that
//! finishes late can never evict a newer connection under the same key.

mod stream_manager;

pub use stream_manager::{
    build_stream_url, CloseReason, ConnectionId, ConnectionManager, StreamCallbacks, StreamHandle,
    STREAM_DONE_SENTINEL,
};
