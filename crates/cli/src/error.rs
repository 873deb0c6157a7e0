//! Error types for CLI operations.

use contracts::ContractError;
use dispatcher::DispatcherError;
use feed_sync::FeedError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or failed validation
    #[error("Invalid configuration: {0}")]
    Config(#[source] ContractError),

    /// Listener set could not be built
    #[error("Failed to create listeners: {0}")]
    Dispatcher(#[from] DispatcherError),

    /// Notification index seed could not be loaded
    #[error("Failed to load notification index '{name}': {source}")]
    Index {
        name: String,
        #[source]
        source: ContractError,
    },

    /// Feed client stopped with an error
    #[error("Feed client failed: {0}")]
    Feed(#[from] FeedError),

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn index(name: impl Into<String>, source: ContractError) -> Self {
        Self::Index {
            name: name.into(),
            source,
        }
    }
}
