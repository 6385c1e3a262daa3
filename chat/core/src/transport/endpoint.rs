//! Endpoint Resolution and the API Envelope
//!
//! Base-address resolution depends only on the deployment environment:
//! production builds are served behind the same origin as the backend and
//! use a relative prefix, everything else talks to a local backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::TransportError;

/// Base address used in production deployments
pub const PRODUCTION_BASE_URL: &str = "/api";

/// Base address used during local development
pub const DEVELOPMENT_BASE_URL: &str = "http://localhost:8123/api";

/// Envelope code that marks success
pub const API_SUCCESS_CODE: i64 = 200;

/// Deployment environment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnv {
    /// Served alongside the backend
    Production,
    /// Local development against a local backend
    #[default]
    Development,
}

impl DeploymentEnv {
    /// Base address for this environment
    #[must_use]
    pub fn base_url(&self) -> &'static str {
        resolve_base_url(*self)
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Development => f.write_str("development"),
        }
    }
}

impl FromStr for DeploymentEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown deployment environment: {other}")),
        }
    }
}

/// Resolve the endpoint base address for an environment
#[must_use]
pub fn resolve_base_url(env: DeploymentEnv) -> &'static str {
    match env {
        DeploymentEnv::Production => PRODUCTION_BASE_URL,
        DeploymentEnv::Development => DEVELOPMENT_BASE_URL,
    }
}

/// Standard `{code, message, data}` response envelope
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Application status code (200 = success)
    pub code: i64,
    /// Human-readable status message
    #[serde(default)]
    pub message: String,
    /// Payload
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Whether the envelope reports success
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == API_SUCCESS_CODE
    }

    /// Unwrap the payload, or classify the envelope failure
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Api`] when the code is not 200.
    pub fn into_result(self) -> Result<T, TransportError> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(TransportError::Api {
                code: self.code,
                message: self.message,
            })
        }
    }
}

/// Classify a 2xx JSON body received where an event stream was expected
///
/// A failing envelope keeps its code and message; anything else is
/// reported against the HTTP status.
pub(crate) fn unexpected_json_body(status: u16, body: &str) -> TransportError {
    let envelope = serde_json::from_str::<ApiResponse<Option<serde_json::Value>>>(body);
    match envelope.map(ApiResponse::into_result) {
        Ok(Err(error)) => error,
        _ => TransportError::Other {
            status,
            message: "Expected an event stream".to_string(),
        },
    }
}

/// Extract the `message` field from a JSON error body
pub(crate) fn error_body_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(String::from)
}
