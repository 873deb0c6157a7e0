//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Listener could not be built from its configuration
    #[error("failed to create listener '{name}': {message}")]
    ListenerCreation { name: String, message: String },

    /// Index or listener error (from contract)
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create a listener creation error
    pub fn listener_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListenerCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
