//! # Feed Sync
//!
//! Client for the product notification feed.
//!
//! Responsible for:
//! - catching up on history from a persisted cursor
//! - switching to the live broadcast once caught up
//! - detecting broadcast gaps and re-syncing through catch-up
//! - pausing catch-up while downstream queues are deep
//!
//! ## Usage
//!
//! ```ignore
//! use feed_sync::{FeedSyncClient, TcpLineTransport};
//!
//! let mut client = FeedSyncClient::new(config.feed.clone(), dispatcher).await?;
//! let mut transport = TcpLineTransport::from_config(&config.feed);
//! client.run(&mut transport, stop_rx).await?;
//! ```

mod client;
mod error;
mod message;
mod state;
mod throttle;
mod tracking;
mod transport;

pub use client::FeedSyncClient;
pub use error::FeedError;
pub use message::{CatchUpRequest, FeedMessage, FeedNotification};
pub use state::{SyncAction, SyncMode, SyncState};
pub use throttle::Throttle;
pub use tracking::{TrackingData, TrackingFile};
pub use transport::{
    ChannelPeer, ChannelTransport, FeedEvent, FeedTransport, LocalFeedTransport, TcpLineTransport,
};
