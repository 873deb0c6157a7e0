//! # Dispatcher
//!
//! Notification fan-out.
//!
//! Responsible for:
//! - one fair, retrying delivery worker per listener
//! - periodic requeue of failed deliveries
//! - replaying the notification index to listeners at startup
//! - isolating slow listeners so they never stall the feed

pub mod dispatcher;
pub mod error;
pub mod fair_queue;
pub mod index;
pub mod listeners;
pub mod metrics;
pub mod worker;

pub use contracts::{Notification, NotificationDispatch, NotificationListener};
pub use dispatcher::{create_dispatcher, Dispatcher};
pub use error::DispatcherError;
pub use fair_queue::{FairQueue, QueueEmpty};
pub use index::MemoryNotificationIndex;
pub use listeners::{
    listener_from_config, ConfiguredListener, FileListener, FileListenerConfig, ListenerSettings,
    LogListener,
};
pub use metrics::{MetricsSnapshot, WorkerMetrics};
pub use worker::{queue_key, Envelope, ListenerWorker};
