//! Transport and Stream Errors
//!
//! [`TransportError`] is the collaborator's classification of an HTTP-level
//! failure into a handful of user-facing categories. The rest of the crate
//! treats it as opaque and never inspects status codes itself.
//!
//! [`StreamError`] is what a stream's `on_error` callback receives.

use thiserror::Error;

/// HTTP failure, classified into user-facing categories
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// 400: the server rejected the request parameters
    #[error("bad request: {0}")]
    BadRequest(String),

    /// 401
    #[error("unauthorized")]
    Unauthorized,

    /// 403
    #[error("forbidden")]
    Forbidden,

    /// 404
    #[error("resource not found")]
    NotFound,

    /// 500
    #[error("internal server error")]
    ServerError,

    /// No response was received
    #[error("network failure: {0}")]
    Network(String),

    /// Any other non-success status
    #[error("request failed ({status}): {message}")]
    Other {
        /// HTTP status code
        status: u16,
        /// Server-provided or generic message
        message: String,
    },

    /// A successful response whose envelope reported failure
    #[error("api error {code}: {message}")]
    Api {
        /// Envelope code
        code: i64,
        /// Envelope message
        message: String,
    },
}

impl TransportError {
    /// Classify a non-success HTTP status
    ///
    /// `server_message` is the `message` field of the error body, when the
    /// server sent one.
    #[must_use]
    pub fn from_status(status: u16, server_message: Option<String>) -> Self {
        let server_message = server_message.filter(|m| !m.trim().is_empty());
        match status {
            400 => Self::BadRequest(
                server_message.unwrap_or_else(|| "Invalid request parameters".to_string()),
            ),
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500 => Self::ServerError,
            _ => Self::Other {
                status,
                message: server_message.unwrap_or_else(|| format!("Request failed ({status})")),
            },
        }
    }

    /// Text suitable for showing to the user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::BadRequest(message) | Self::Other { message, .. } => message.clone(),
            Self::Unauthorized => "Unauthorized, please sign in again".to_string(),
            Self::Forbidden => "Access denied".to_string(),
            Self::NotFound => "The requested resource does not exist".to_string(),
            Self::ServerError => "Internal server error".to_string(),
            Self::Network(_) => "Network connection failed, please check your network".to_string(),
            Self::Api { message, .. } => {
                if message.is_empty() {
                    "Request failed".to_string()
                } else {
                    message.clone()
                }
            }
        }
    }

    /// HTTP status behind this error, if one was received
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::ServerError => Some(500),
            Self::Other { status, .. } => Some(*status),
            Self::Network(_) | Self::Api { .. } => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::from_status(status.as_u16(), None),
            None => Self::Network(error.to_string()),
        }
    }
}

/// Failure of an open stream
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The transport failed to open or broke mid-stream
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The stream ended without the completion sentinel
    #[error("stream ended before completion")]
    Disconnected,
}

impl StreamError {
    /// Text suitable for showing to the user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(error) => error.user_message(),
            Self::Disconnected => "Connection lost before the reply completed".to_string(),
        }
    }
}
