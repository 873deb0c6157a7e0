//! Layered error definitions
//!
//! Categorized by source: config / listener / index / feed

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Listener Errors =====
    /// Listener failed to process a notification
    #[error("listener '{listener}' failed: {message}")]
    ListenerDelivery { listener: String, message: String },

    // ===== Index Errors =====
    /// Notification index lookup failed
    #[error("notification index '{index}' error: {message}")]
    Index { index: String, message: String },

    // ===== Feed Errors =====
    /// Feed payload could not be interpreted
    #[error("feed payload error: {message}")]
    FeedPayload { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create listener delivery error
    pub fn listener_delivery(listener: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListenerDelivery {
            listener: listener.into(),
            message: message.into(),
        }
    }

    /// Create index error
    pub fn index(index: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Index {
            index: index.into(),
            message: message.into(),
        }
    }

    /// Create feed payload error
    pub fn feed_payload(message: impl Into<String>) -> Self {
        Self::FeedPayload {
            message: message.into(),
        }
    }
}
