//! Built-in listener implementations
//!
//! Contains LogListener and FileListener, plus the factory that builds
//! either one from a [`ListenerConfig`].

mod file;
mod log;

use std::time::Duration;

use contracts::{
    ContractError, ListenerConfig, ListenerType, Notification, NotificationListener, ProductFilter,
    ProductId,
};

pub use self::file::{FileListener, FileListenerConfig};
pub use self::log::LogListener;

/// Delivery settings shared by every built-in listener
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub name: String,
    pub max_tries: u32,
    pub retry_delay: Duration,
    pub use_index: bool,
    pub filter: ProductFilter,
}

impl ListenerSettings {
    /// Default settings under `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_tries: contracts::DEFAULT_MAX_TRIES,
            retry_delay: contracts::DEFAULT_RETRY_DELAY,
            use_index: false,
            filter: ProductFilter::default(),
        }
    }
}

impl From<&ListenerConfig> for ListenerSettings {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            name: config.name.clone(),
            max_tries: config.max_tries,
            retry_delay: config.retry_delay(),
            use_index: config.use_index,
            filter: config.filter.clone(),
        }
    }
}

/// A built-in listener chosen by configuration
pub enum ConfiguredListener {
    Log(LogListener),
    File(FileListener),
}

impl ConfiguredListener {
    fn settings(&self) -> &ListenerSettings {
        match self {
            Self::Log(l) => l.settings(),
            Self::File(l) => l.settings(),
        }
    }
}

impl NotificationListener for ConfiguredListener {
    fn name(&self) -> &str {
        &self.settings().name
    }

    fn max_tries(&self) -> u32 {
        self.settings().max_tries
    }

    fn retry_delay(&self) -> Duration {
        self.settings().retry_delay
    }

    fn accept(&self, product_id: &ProductId) -> bool {
        self.settings().filter.accept(product_id)
    }

    fn uses_notification_index(&self) -> bool {
        self.settings().use_index
    }

    async fn on_notification(&self, notification: &Notification) -> Result<(), ContractError> {
        match self {
            Self::Log(l) => l.on_notification(notification).await,
            Self::File(l) => l.on_notification(notification).await,
        }
    }
}

/// Build a listener from its configuration
pub fn listener_from_config(config: &ListenerConfig) -> std::io::Result<ConfiguredListener> {
    let settings = ListenerSettings::from(config);
    match config.listener_type {
        ListenerType::Log => Ok(ConfiguredListener::Log(LogListener::new(settings))),
        ListenerType::File => {
            FileListener::from_params(settings, &config.params).map(ConfiguredListener::File)
        }
    }
}
