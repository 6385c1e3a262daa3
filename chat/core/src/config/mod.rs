//! TOML Configuration File Support
//!
//! Centralized configuration loading for the chat core, backed by an
//! optional TOML file at `~/.config/streamchat/chat.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments (applied by the caller via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! A missing file is not an error.
//!
//! # Example Configuration
//!
//! ```toml
//! [transport]
//! environment = "production"
//! base_url = "https://chat.example.com/api"
//! connect_timeout_ms = 10000
//! channel_capacity = 100
//!
//! [session]
//! default_variant = "super"
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Overrides |
//! |---|---|
//! | `CHAT_BASE_URL` | `transport.base_url` |
//! | `CHAT_ENV` | `transport.environment` |
//! | `CHAT_CONNECT_TIMEOUT` | `transport.connect_timeout_ms` |
//! | `CHAT_CHANNEL_CAPACITY` | `transport.channel_capacity` |
//! | `CHAT_DEFAULT_VARIANT` | `session.default_variant` |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::ConversationVariant;
use crate::transport::{resolve_base_url, DeploymentEnv, SseTransport};

/// Default connect timeout for stream requests
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Transport section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportToml {
    /// Explicit endpoint base address (wins over `environment`)
    pub base_url: Option<String>,

    /// Deployment environment used to resolve the base address
    pub environment: Option<DeploymentEnv>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Fragment buffer size per stream
    pub channel_capacity: Option<usize>,
}

/// Session section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Variant used when the caller names none
    pub default_variant: Option<ConversationVariant>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Transport configuration section
    pub transport: TransportToml,

    /// Session configuration section
    pub session: SessionToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration for the chat core
///
/// Use [`load_config`] to load it with proper priority handling.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Deployment environment
    pub environment: DeploymentEnv,

    /// Explicit base address, overriding the environment's
    pub base_url: Option<String>,

    /// Connect timeout for stream requests
    pub connect_timeout: Duration,

    /// Fragment buffer size per stream
    pub channel_capacity: usize,

    /// Variant used when the caller names none
    pub default_variant: ConversationVariant,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            environment: DeploymentEnv::default(),
            base_url: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            channel_capacity: SseTransport::DEFAULT_CHANNEL_CAPACITY,
            default_variant: ConversationVariant::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ChatConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Endpoint base address: the explicit one, else the environment's
    #[must_use]
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => resolve_base_url(self.environment).to_string(),
        }
    }

    /// Check the resolved values
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a zero channel capacity
    /// or a default variant without a streaming endpoint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.default_variant == ConversationVariant::Default {
            return Err(ConfigError::ValidationError(format!(
                "default_variant must be love or super, got {}",
                self.default_variant
            )));
        }
        if self.base_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/streamchat/chat.toml` or
/// `~/.config/streamchat/chat.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("streamchat").join("chat.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the result fails validation.
pub fn load_config() -> Result<ChatConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path plus the process environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the result fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ChatConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration reading environment variables through `env`
///
/// # Errors
///
/// See [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<ChatConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Start with defaults
    let mut config = ChatConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ChatToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Environment overrides file values
    apply_env_config(&mut config, env);

    config.validate()?;
    Ok(config)
}

fn apply_toml_config(config: &mut ChatConfig, toml: &ChatToml) {
    if toml.transport.base_url.is_some() {
        config.base_url = toml.transport.base_url.clone();
    }
    if let Some(environment) = toml.transport.environment {
        config.environment = environment;
    }
    if let Some(timeout) = toml.transport.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(timeout);
    }
    if let Some(capacity) = toml.transport.channel_capacity {
        config.channel_capacity = capacity;
    }
    if let Some(variant) = toml.session.default_variant {
        config.default_variant = variant;
    }
}

fn apply_env_config<F>(config: &mut ChatConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("CHAT_BASE_URL") {
        config.base_url = Some(url);
        config.source = ConfigSource::Env;
    }
    if let Some(value) = env("CHAT_ENV") {
        match value.parse::<DeploymentEnv>() {
            Ok(environment) => {
                config.environment = environment;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring CHAT_ENV"),
        }
    }
    if let Some(value) = env("CHAT_CONNECT_TIMEOUT") {
        match value.parse::<u64>() {
            Ok(ms) => {
                config.connect_timeout = Duration::from_millis(ms);
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(value = %value, error = %e, "Ignoring CHAT_CONNECT_TIMEOUT"),
        }
    }
    if let Some(value) = env("CHAT_CHANNEL_CAPACITY") {
        match value.parse::<usize>() {
            Ok(capacity) => {
                config.channel_capacity = capacity;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(value = %value, error = %e, "Ignoring CHAT_CHANNEL_CAPACITY"),
        }
    }
    if let Some(value) = env("CHAT_DEFAULT_VARIANT") {
        match value.parse::<ConversationVariant>() {
            Ok(variant) => {
                config.default_variant = variant;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring CHAT_DEFAULT_VARIANT"),
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base address override
    pub base_url: Option<String>,

    /// Environment override
    pub environment: Option<DeploymentEnv>,

    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,

    /// Default variant override
    pub default_variant: Option<ConversationVariant>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base address override
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set environment override
    #[must_use]
    pub fn with_environment(mut self, environment: DeploymentEnv) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Set connect timeout override
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Set default variant override
    #[must_use]
    pub fn with_default_variant(mut self, variant: ConversationVariant) -> Self {
        self.default_variant = Some(variant);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base_url.is_none()
            && self.environment.is_none()
            && self.connect_timeout_ms.is_none()
            && self.default_variant.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ChatConfig) {
        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url = Some(url.clone());
        }
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(timeout);
        }
        if let Some(variant) = self.default_variant {
            config.default_variant = variant;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
