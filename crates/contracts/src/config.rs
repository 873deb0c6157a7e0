//! AppConfig - Config Loader output
//!
//! Describes the feed connection, the notifier and the registered listeners.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::ProductFilter;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Feed connection
    pub feed: FeedConfig,

    /// Dispatch orchestrator settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Notification index used for startup reconciliation
    #[serde(default)]
    pub index: Option<IndexConfig>,

    /// Registered listeners
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
}

/// Feed connection settings
///
/// `url`, `cluster_id` and `subject` are required; they default to empty so
/// a missing value surfaces as a validation error naming the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed server address
    #[serde(default)]
    pub url: String,

    /// Cluster the feed belongs to
    #[serde(default)]
    pub cluster_id: String,

    /// Client identity, derived from subject and cluster when absent
    #[serde(default)]
    pub client_id: Option<String>,

    /// Feed subject
    #[serde(default)]
    pub subject: String,

    /// Where the cursor is persisted
    #[serde(default = "default_tracking_file")]
    pub tracking_file: PathBuf,

    /// How often a changed cursor is flushed to the tracking file
    #[serde(default = "default_tracking_interval_ms")]
    pub tracking_interval_ms: u64,

    /// How far back to start when there is no tracking data
    #[serde(default = "default_initial_catch_up_age_days")]
    pub initial_catch_up_age_days: f64,

    /// Re-send a catch-up request when no response arrived in this time
    #[serde(default = "default_catch_up_timeout_ms")]
    pub catch_up_timeout_ms: u64,

    /// Connection attempts before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Per-attempt connect timeout
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Catch-up backpressure
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

fn default_tracking_file() -> PathBuf {
    PathBuf::from("data/feed_tracking.json")
}

fn default_tracking_interval_ms() -> u64 {
    5_000
}

fn default_initial_catch_up_age_days() -> f64 {
    7.0
}

fn default_catch_up_timeout_ms() -> u64 {
    60_000
}

fn default_connect_attempts() -> u32 {
    5
}

fn default_connect_timeout_ms() -> u64 {
    1_000
}

impl FeedConfig {
    /// Configured client id, or `<subject>-<cluster_id>`
    pub fn effective_client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.subject, self.cluster_id))
    }

    pub fn tracking_interval(&self) -> Duration {
        Duration::from_millis(self.tracking_interval_ms)
    }

    pub fn catch_up_timeout(&self) -> Duration {
        Duration::from_millis(self.catch_up_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Initial catch-up age as a duration (negative ages count as zero)
    pub fn initial_catch_up_age(&self) -> Duration {
        Duration::from_secs_f64(self.initial_catch_up_age_days.max(0.0) * 86_400.0)
    }
}

/// Backpressure watermarks for catch-up requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Depth above which catch-up requests pause
    pub high_watermark: usize,
    /// Depth at or below which paused catch-up resumes
    pub low_watermark: usize,
    /// Time between depth checks while paused
    pub wait_interval_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            high_watermark: 50_000,
            low_watermark: 25_000,
            wait_interval_ms: 5_000,
        }
    }
}

/// Dispatch orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Housekeeping interval (error requeue and depth logging)
    pub status_interval_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: 5_000,
        }
    }
}

impl NotifierConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }
}

/// Notification index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index name
    pub name: String,

    /// JSON-lines file of notifications to load at startup
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Listener name
    pub name: String,

    /// Listener type
    pub listener_type: ListenerType,

    /// Delivery attempts before dropping
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Delay between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Replay the notification index to this listener at startup
    #[serde(default)]
    pub use_index: bool,

    /// Product acceptance rules
    #[serde(default)]
    pub filter: ProductFilter,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_max_tries() -> u32 {
    crate::DEFAULT_MAX_TRIES
}

fn default_retry_delay_ms() -> u64 {
    crate::DEFAULT_RETRY_DELAY.as_millis() as u64
}

impl ListenerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Listener type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerType {
    /// Log each notification
    Log,
    /// Write each notification to disk
    File,
}
