//! NotificationListener trait - Dispatcher delivery interface
//!
//! Every downstream consumer of notifications implements this trait.

use std::time::Duration;

use crate::{ContractError, Notification, ProductId};

/// Attempts before a notification is dropped, unless a listener overrides it.
pub const DEFAULT_MAX_TRIES: u32 = 1;

/// Delay between attempts, unless a listener overrides it.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(300_000);

/// Notification consumer
///
/// Listeners must tolerate duplicate delivery.
#[trait_variant::make(NotificationListener: Send)]
pub trait LocalNotificationListener {
    /// Listener name (used for logging/metrics, and as its identity)
    fn name(&self) -> &str;

    /// Total delivery attempts before a notification is dropped
    fn max_tries(&self) -> u32 {
        DEFAULT_MAX_TRIES
    }

    /// Minimum time between a failed attempt and the next one
    fn retry_delay(&self) -> Duration {
        DEFAULT_RETRY_DELAY
    }

    /// Whether this listener wants notifications about `product_id`
    fn accept(&self, _product_id: &ProductId) -> bool {
        true
    }

    /// Whether this listener keeps its own record of processed
    /// notifications and should be replayed the index at startup
    fn uses_notification_index(&self) -> bool {
        false
    }

    /// Process one notification
    ///
    /// # Errors
    /// Any error counts as a failed attempt and may be retried
    async fn on_notification(&self, notification: &Notification) -> Result<(), ContractError>;
}
