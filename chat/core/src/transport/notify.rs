//! Failure Notification
//!
//! The transport surfaces exactly one notification per failed call. Where
//! that notification goes (a toast, a status line, a log) is up to the
//! embedding application.

use super::error::TransportError;

/// Sink for classified transport failures
pub trait ErrorNotifier: Send + Sync {
    /// Surface one failure to the user
    fn notify(&self, error: &TransportError);
}

/// Notifier that writes each failure to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl ErrorNotifier for TracingNotifier {
    fn notify(&self, error: &TransportError) {
        tracing::warn!(
            status = ?error.status(),
            error = %error,
            "{}",
            error.user_message()
        );
    }
}

impl<F> ErrorNotifier for F
where
    F: Fn(&TransportError) + Send + Sync,
{
    fn notify(&self, error: &TransportError) {
        self(error);
    }
}
