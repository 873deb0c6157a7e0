//! Tracking file - persisted feed cursor
//!
//! A small JSON document naming the connection and the cursor. It is only
//! applied when the identity matches the configured one, so pointing the
//! client at a different feed never resumes from a foreign cursor.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use contracts::FeedConfig;

use crate::error::FeedError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingData {
    pub url: String,
    pub cluster_id: String,
    pub client_id: String,
    pub subject: String,
    /// Cursor: newest processed notification creation time
    pub created_after: DateTime<Utc>,
}

impl TrackingData {
    /// Tracking data for `config`'s connection at `created_after`
    pub fn for_config(config: &FeedConfig, created_after: DateTime<Utc>) -> Self {
        Self {
            url: config.url.clone(),
            cluster_id: config.cluster_id.clone(),
            client_id: config.effective_client_id(),
            subject: config.subject.clone(),
            created_after,
        }
    }

    /// Whether both describe the same connection
    pub fn same_identity(&self, other: &TrackingData) -> bool {
        self.url == other.url
            && self.cluster_id == other.cluster_id
            && self.client_id == other.client_id
            && self.subject == other.subject
    }
}

#[derive(Debug, Clone)]
pub struct TrackingFile {
    path: PathBuf,
}

impl TrackingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read tracking data; `None` when the file does not exist
    #[instrument(name = "tracking_read", skip(self), fields(path = %self.path.display()))]
    pub async fn read(&self) -> Result<Option<TrackingData>, FeedError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FeedError::tracking(&self.path, e.to_string())),
        };
        let data = serde_json::from_slice(&bytes)
            .map_err(|e| FeedError::tracking(&self.path, e.to_string()))?;
        Ok(Some(data))
    }

    /// Replace the file atomically (write a sibling temp file, then rename)
    #[instrument(name = "tracking_write", skip(self, data), fields(path = %self.path.display()))]
    pub async fn write(&self, data: &TrackingData) -> Result<(), FeedError> {
        let json = serde_json::to_vec_pretty(data)
            .map_err(|e| FeedError::tracking(&self.path, e.to_string()))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(created_after = %data.created_after, "Tracking data written");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
