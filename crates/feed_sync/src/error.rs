//! Feed sync error types

use thiserror::Error;

/// Feed-specific errors
#[derive(Debug, Error)]
pub enum FeedError {
    /// Required feed setting missing or invalid
    #[error("feed configuration error: {0}")]
    Config(#[from] contracts::ContractError),

    /// Message could not be interpreted
    #[error("malformed feed message: {0}")]
    Malformed(String),

    /// Connection could not be established
    #[error("failed to connect to '{url}' after {attempts} attempts: {message}")]
    Connect {
        url: String,
        attempts: u32,
        message: String,
    },

    /// Transport is not connected
    #[error("feed transport is not connected")]
    NotConnected,

    /// Tracking file read/write failure
    #[error("tracking file '{path}': {message}")]
    Tracking { path: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn tracking(path: &std::path::Path, message: impl Into<String>) -> Self {
        Self::Tracking {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}
