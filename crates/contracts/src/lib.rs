//! # Contracts
//!
//! Frozen interface contracts shared by every crate: product identity,
//! notifications, listener/index/dispatch traits and configuration.
//! Business crates depend on this crate only, never on each other in reverse.
//!
//! ## Time Model
//! - All timestamps are UTC (`chrono::DateTime<Utc>`)
//! - A product version is ordered by `ProductId::update_time`
//! - Feed progress is ordered by `Notification::issued`

mod config;
mod dispatch;
mod error;
mod filter;
mod index;
mod listener;
mod notification;
mod product;

pub use config::*;
pub use dispatch::NotificationDispatch;
pub use error::*;
pub use filter::ProductFilter;
pub use index::{IndexQuery, LocalNotificationIndex, NotificationIndex};
pub use listener::*;
pub use notification::*;
pub use product::*;
