//! Error types for the external-task worker.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level error type for setup and configuration.
///
/// Remote operations never return this: they report through
/// [`Outcome`](crate::outcome::Outcome) with an [`EngineError`] payload.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised while building the HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Error type used for faults that never reached the engine or whose
/// response could not be understood.
pub const TRANSPORT_ERROR_TYPE: &str = "TransportError";

/// Wire shape of a non-success engine response: `{"type": .., "message": ..}`.
///
/// The transport flag is set only by [`EngineError::transport`], never from
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(skip)]
    local: bool,
}

impl EngineError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            local: false,
        }
    }

    /// Build a transport-level fault (connection, timeout, malformed body).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            local: true,
            ..Self::new(TRANSPORT_ERROR_TYPE, message)
        }
    }

    /// True if this error was produced locally rather than sent by the engine.
    pub fn is_transport(&self) -> bool {
        self.local
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for EngineError {}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            "request timed out"
        } else if e.is_connect() {
            "connection failed"
        } else if e.is_decode() {
            "malformed response body"
        } else {
            "request failed"
        };
        Self::transport(format!("{kind}: {e}"))
    }
}

/// Result type alias for setup operations.
pub type Result<T> = std::result::Result<T, Error>;
