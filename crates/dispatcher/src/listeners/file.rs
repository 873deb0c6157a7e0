//! FileListener - writes notifications to disk with folder structure

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use contracts::{ContractError, Notification};
use tracing::{debug, error, instrument};

use super::ListenerSettings;

/// Configuration for FileListener
#[derive(Debug, Clone)]
pub struct FileListenerConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl FileListenerConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        Self { base_path }
    }
}

/// Listener that stores each notification as a JSON file
///
/// Layout: `<base_path>/<source>/<type>/<code>/<updateTime millis>.json`.
/// Rewriting the same version overwrites the same file, so duplicate
/// delivery is harmless. Id parts that are not a single plain path
/// segment are refused, so nothing is written outside `base_path`.
pub struct FileListener {
    settings: ListenerSettings,
    config: FileListenerConfig,
}

impl FileListener {
    /// Create a FileListener, creating the base directory
    ///
    /// Uses blocking `std::fs`; call it during setup, not from a hot path.
    pub fn new(settings: ListenerSettings, config: FileListenerConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.base_path)?;
        Ok(Self { settings, config })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        settings: ListenerSettings,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(settings, FileListenerConfig::from_params(params))
    }

    pub fn settings(&self) -> &ListenerSettings {
        &self.settings
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Where a notification is stored
    ///
    /// # Errors
    /// `InvalidInput` when source, type or code is empty, `.`, `..` or
    /// contains a path separator.
    pub fn path_for(&self, notification: &Notification) -> io::Result<PathBuf> {
        let id = &notification.product_id;
        let mut path = self.config.base_path.clone();
        for (field, part) in [
            ("source", &id.source),
            ("type", &id.product_type),
            ("code", &id.code),
        ] {
            path.push(path_segment(field, part)?);
        }
        path.push(format!("{}.json", id.update_time.timestamp_millis()));
        Ok(path)
    }

    async fn write_notification(&self, notification: &Notification) -> io::Result<PathBuf> {
        let path = self.path_for(notification)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_vec_pretty(notification)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    #[instrument(
        name = "file_listener_notify",
        skip(self, notification),
        fields(listener = %self.settings.name, product = %notification.product_id)
    )]
    pub async fn on_notification(&self, notification: &Notification) -> Result<(), ContractError> {
        match self.write_notification(notification).await {
            Ok(path) => {
                debug!(listener = %self.settings.name, path = %path.display(), "Notification written");
                Ok(())
            }
            Err(e) => {
                error!(listener = %self.settings.name, error = %e, "Write failed");
                Err(ContractError::listener_delivery(
                    &self.settings.name,
                    e.to_string(),
                ))
            }
        }
    }
}

fn path_segment<'a>(field: &str, part: &'a str) -> io::Result<&'a str> {
    let unsafe_segment = part.is_empty()
        || part == "."
        || part == ".."
        || part.contains(['/', '\\', std::path::MAIN_SEPARATOR]);
    if unsafe_segment {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("product {field} {part:?} is not a plain path segment"),
        ));
    }
    Ok(part)
}
